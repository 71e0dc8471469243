use super::*;
use crate::config::StreamConfig;
use crate::error::FaceEngineError;
use crate::face::BoundingBox;
use crate::frame::{Frame, PixelFormat};
use crate::imaging::FaceLocator;
use crate::source::FrameSource;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

struct FixedSource(Option<Frame>);

impl FrameSource for FixedSource {
    fn get_frame(&self) -> Option<Frame> {
        self.0.clone()
    }
}

struct BrokenLocator;

impl FaceLocator for BrokenLocator {
    fn locate_faces(&self, _frame: &Frame) -> Result<Option<Vec<BoundingBox>>, FaceEngineError> {
        Err(FaceEngineError::Detection {
            details: "detector offline".to_string(),
        })
    }
}

fn create_test_stream_config() -> StreamConfig {
    StreamConfig {
        ip: "127.0.0.1".to_string(),
        port: 0,
        fps: 20,
        placeholder_interval_ms: 200,
        font_path: "/nonexistent/font.ttf".to_string(),
        ..StreamConfig::default()
    }
}

fn test_frame(width: u32, height: u32) -> Frame {
    Frame::new(
        9,
        SystemTime::now(),
        vec![120; (width * height * 3) as usize],
        width,
        height,
        PixelFormat::Rgb24,
    )
}

fn publisher_with(frame: Option<Frame>) -> StreamPublisher {
    StreamPublisher::new(Arc::new(FixedSource(frame)), create_test_stream_config())
}

/// JPEG payload of a multipart part
fn jpeg_payload(chunk: &[u8]) -> &[u8] {
    let header = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    assert!(chunk.starts_with(header));
    assert!(chunk.ends_with(b"\r\n"));
    &chunk[header.len()..chunk.len() - 2]
}

#[test]
fn test_mjpeg_chunk_format() {
    let chunk = mjpeg_chunk(&[0xFF, 0xD8, 0xFF, 0xD9]);

    assert_eq!(
        &chunk[..],
        b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8\xFF\xD9\r\n"
    );
    assert_eq!(MJPEG_BOUNDARY, "frame");
}

#[test]
fn test_placeholder_when_no_frame() {
    let publisher = publisher_with(None);

    let chunk = publisher.render_next().unwrap();
    assert!(chunk.is_placeholder);

    let image = image::load_from_memory(jpeg_payload(&chunk.data)).unwrap();
    assert_eq!((image.width(), image.height()), (640, 480));

    let stats = publisher.stats().snapshot();
    assert_eq!(stats.placeholders_streamed, 1);
    assert_eq!(stats.frames_streamed, 0);
}

#[test]
fn test_live_frame_is_encoded() {
    let publisher = publisher_with(Some(test_frame(64, 48)));

    let chunk = publisher.render_next().unwrap();
    assert!(!chunk.is_placeholder);

    let image = image::load_from_memory(jpeg_payload(&chunk.data)).unwrap();
    assert_eq!((image.width(), image.height()), (64, 48));
    assert_eq!(publisher.stats().snapshot().frames_streamed, 1);
}

#[test]
fn test_incomplete_frame_is_skipped() {
    let mut frame = test_frame(64, 48);
    frame.data.truncate(100);
    let publisher = publisher_with(Some(frame));

    assert!(publisher.render_next().is_none());
    assert_eq!(publisher.stats().snapshot().encode_errors, 1);
}

#[test]
fn test_overlay_failure_still_emits_frame() {
    let publisher = publisher_with(Some(test_frame(32, 24))).with_overlay(Arc::new(BrokenLocator));

    let chunk = publisher.render_next().unwrap();
    assert!(!chunk.is_placeholder);

    let stats = publisher.stats().snapshot();
    assert_eq!(stats.overlay_errors, 1);
    assert_eq!(stats.frames_streamed, 1);
}

#[tokio::test]
async fn test_placeholders_are_throttled() {
    let publisher = Arc::new(publisher_with(None));
    let mut frames = Box::pin(Arc::clone(&publisher).frames());

    let started = Instant::now();
    let first = frames.next().await.unwrap();
    let second = frames.next().await.unwrap();

    assert!(first.starts_with(b"--frame\r\n"));
    assert!(second.starts_with(b"--frame\r\n"));
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_live_frames_are_paced_and_counted() {
    let publisher = Arc::new(publisher_with(Some(test_frame(32, 24))));
    let stats = publisher.stats();
    let mut frames = Box::pin(Arc::clone(&publisher).frames());

    let started = Instant::now();
    for _ in 0..5 {
        frames.next().await.unwrap();
    }

    // First tick is immediate, then one every 50ms at 20 fps
    assert!(started.elapsed() >= Duration::from_millis(190));
    assert_eq!(stats.snapshot().active_connections, 1);
    assert_eq!(stats.snapshot().frames_streamed, 5);

    drop(frames);
    assert_eq!(stats.snapshot().active_connections, 0);
    assert_eq!(stats.snapshot().total_connections, 1);
}

#[cfg(feature = "streaming")]
mod server {
    use super::*;
    use crate::auth::AuthVerifier;
    use crate::camera::{FrameBuffer, SyntheticCamera};
    use crate::config::{AuthConfig, CameraBackendKind, CameraConfig};
    use crate::face::FaceServices;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_util::sync::CancellationToken;

    fn create_test_camera_config() -> CameraConfig {
        CameraConfig {
            index: 0,
            fallback_index: None,
            resolution: (32, 24),
            fps: 30,
            backend: CameraBackendKind::Synthetic,
            read_backoff_ms: 20,
            reopen_interval_ms: 50,
            idle_yield_ms: 1,
            max_consecutive_failures: 3,
        }
    }

    async fn http_request(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn spawn_server(
        server: StreamServer,
    ) -> (
        SocketAddr,
        CancellationToken,
        tokio::task::JoinHandle<crate::error::Result<()>>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve_on(listener, shutdown.clone()));
        (addr, shutdown, handle)
    }

    #[test]
    fn test_builder_validation() {
        let publisher = Arc::new(publisher_with(None));

        assert!(StreamServerBuilder::new()
            .publisher(Arc::clone(&publisher))
            .build()
            .is_err());
        assert!(StreamServerBuilder::new()
            .config(create_test_stream_config())
            .build()
            .is_err());

        let server = StreamServerBuilder::new()
            .config(create_test_stream_config())
            .publisher(publisher)
            .build()
            .unwrap();
        assert_eq!(server.address(), "127.0.0.1:0");
    }

    #[tokio::test]
    async fn test_health_and_page_routes() {
        let camera = Arc::new(
            FrameBuffer::start(
                create_test_camera_config(),
                Arc::new(SyntheticCamera::new().with_read_delay(Duration::from_millis(2))),
            )
            .unwrap(),
        );
        assert!(camera.wait_for_frame(Duration::from_secs(2)).await);

        let publisher = Arc::new(StreamPublisher::new(
            camera.clone(),
            create_test_stream_config(),
        ));
        let server = StreamServerBuilder::new()
            .config(create_test_stream_config())
            .publisher(publisher)
            .camera(Arc::clone(&camera))
            .build()
            .unwrap();
        let (addr, shutdown, handle) = spawn_server(server).await;

        let health = http_request(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(health.starts_with("HTTP/1.1 200"), "{}", health);
        assert!(health.contains("\"latest_frame_id\""));
        assert!(health.contains("\"device_open\":true"));

        let page = http_request(
            addr,
            "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(page.contains("/stream.mjpg"));

        shutdown.cancel();
        handle.await.unwrap().unwrap();
        camera.stop();
    }

    #[tokio::test]
    async fn test_verify_route() {
        let publisher = Arc::new(publisher_with(None));
        let verifier = AuthVerifier::new(
            Some(Arc::new(FixedSource(None))),
            Arc::new(FaceServices::new()),
            AuthConfig::default(),
        );
        let server = StreamServerBuilder::new()
            .config(create_test_stream_config())
            .publisher(publisher)
            .verifier(verifier)
            .build()
            .unwrap();
        let (addr, shutdown, handle) = spawn_server(server).await;

        let response = http_request(
            addr,
            "POST /verify?timeout=0.2 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
        assert!(response.contains("\"reason\":\"TIMEOUT_OR_NO_MATCH\""));
        assert!(response.contains("\"verified\":false"));

        let rejected = http_request(
            addr,
            "POST /verify?timeout=-1 HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(rejected.starts_with("HTTP/1.1 400"), "{}", rejected);

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_verify_without_verifier_and_health_without_camera() {
        let server = StreamServerBuilder::new()
            .config(create_test_stream_config())
            .publisher(Arc::new(publisher_with(None)))
            .build()
            .unwrap();
        let (addr, shutdown, handle) = spawn_server(server).await;

        let verify = http_request(
            addr,
            "POST /verify HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(verify.starts_with("HTTP/1.1 503"), "{}", verify);

        let health = http_request(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(health.starts_with("HTTP/1.1 503"), "{}", health);

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }
}
