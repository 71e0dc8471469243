use crate::{
    auth::AuthVerifier,
    camera::FrameBuffer,
    config::StreamConfig,
    error::{FacecamError, Result, StreamError},
};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{health_handler, mjpeg_stream_handler, stream_page_handler, verify_handler};
use super::publisher::StreamPublisher;

/// Shared state for the Axum server
#[derive(Clone)]
pub(crate) struct ServerState {
    pub(crate) publisher: Arc<StreamPublisher>,
    pub(crate) camera: Option<Arc<FrameBuffer>>,
    pub(crate) verifier: Option<AuthVerifier>,
}

/// HTTP server for the MJPEG stream, camera health and verification
pub struct StreamServer {
    pub(crate) config: StreamConfig,
    state: ServerState,
}

impl StreamServer {
    pub fn new(
        config: StreamConfig,
        publisher: Arc<StreamPublisher>,
        camera: Option<Arc<FrameBuffer>>,
        verifier: Option<AuthVerifier>,
    ) -> Self {
        Self {
            config,
            state: ServerState {
                publisher,
                camera,
                verifier,
            },
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    pub(crate) fn router(&self) -> Router {
        Router::new()
            .route("/", get(stream_page_handler))
            .route("/stream.mjpg", get(mjpeg_stream_handler))
            .route("/health", get(health_handler))
            .route("/verify", post(verify_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| StreamError::BindFailed {
                address: addr.clone(),
                source: e,
            })?;
        Ok(listener)
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled
    pub async fn serve_on(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        info!(
            "MJPEG server listening on {}",
            local.map_or_else(|| self.address(), |addr| addr.to_string())
        );

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| StreamError::StartupFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("MJPEG server stopped");
        Ok(())
    }
}

/// Stream server builder for configuration
pub struct StreamServerBuilder {
    config: Option<StreamConfig>,
    publisher: Option<Arc<StreamPublisher>>,
    camera: Option<Arc<FrameBuffer>>,
    verifier: Option<AuthVerifier>,
}

impl StreamServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            publisher: None,
            camera: None,
            verifier: None,
        }
    }

    /// Set the stream configuration
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the publisher feeding `/stream.mjpg`
    pub fn publisher(mut self, publisher: Arc<StreamPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Set the frame buffer reported by `/health`
    pub fn camera(mut self, camera: Arc<FrameBuffer>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Enable `/verify`
    pub fn verifier(mut self, verifier: AuthVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Build the stream server
    pub fn build(self) -> Result<StreamServer> {
        let config = self.config.ok_or_else(|| {
            FacecamError::Stream(StreamError::StartupFailed {
                details: "Stream configuration is required".to_string(),
            })
        })?;

        let publisher = self.publisher.ok_or_else(|| {
            FacecamError::Stream(StreamError::StartupFailed {
                details: "Stream publisher is required".to_string(),
            })
        })?;

        Ok(StreamServer::new(
            config,
            publisher,
            self.camera,
            self.verifier,
        ))
    }
}

impl Default for StreamServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
