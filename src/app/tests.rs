use super::*;
use crate::auth::VerificationReason;
use crate::camera::SyntheticCamera;
use crate::config::{CameraBackendKind, CameraConfig, FacecamConfig, FacesConfig, StreamConfig};
use std::sync::Arc;
use std::time::Duration;

fn create_test_config(database_path: &std::path::Path) -> FacecamConfig {
    FacecamConfig {
        camera: CameraConfig {
            index: 0,
            fallback_index: Some(1),
            resolution: (32, 24),
            fps: 30,
            backend: CameraBackendKind::Synthetic,
            read_backoff_ms: 20,
            reopen_interval_ms: 50,
            idle_yield_ms: 1,
            max_consecutive_failures: 3,
        },
        faces: FacesConfig {
            database_path: database_path.to_string_lossy().into_owned(),
        },
        stream: StreamConfig {
            ip: "127.0.0.1".to_string(),
            port: 0,
            font_path: "/nonexistent/font.ttf".to_string(),
            ..StreamConfig::default()
        },
        ..FacecamConfig::default()
    }
}

#[tokio::test]
async fn test_orchestrator_creation() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        FacecamOrchestrator::new(create_test_config(&dir.path().join("faces.json"))).unwrap();

    // No components registered yet
    assert!(orchestrator.get_all_component_states().await.is_empty());
    assert!(orchestrator.camera().is_none());
    assert!(orchestrator.verifier().is_none());

    orchestrator.initialize().await.unwrap();
    assert_eq!(
        orchestrator.get_component_state("camera").await,
        Some(ComponentState::Stopped)
    );
    assert_eq!(
        orchestrator.get_component_state("faces").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn test_start_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        FacecamOrchestrator::new(create_test_config(&dir.path().join("faces.json"))).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    assert_eq!(
        orchestrator.get_component_state("camera").await,
        Some(ComponentState::Running)
    );
    // A missing database file is an empty registry, not a failure
    assert_eq!(
        orchestrator.get_component_state("faces").await,
        Some(ComponentState::Running)
    );

    let camera = orchestrator.camera().unwrap();
    assert!(camera.wait_for_frame(Duration::from_secs(2)).await);

    let exit_code = orchestrator.shutdown().await.unwrap();
    assert_eq!(exit_code, 0);
    assert!(!camera.is_running());
    assert_eq!(
        orchestrator.get_component_state("camera").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test]
async fn test_degraded_camera_still_starts() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SyntheticCamera::new()
        .with_failing_index(0)
        .with_failing_index(1);
    let mut orchestrator =
        FacecamOrchestrator::new(create_test_config(&dir.path().join("faces.json")))
            .unwrap()
            .with_backend(Arc::new(backend));
    orchestrator.initialize().await.unwrap();
    orchestrator.start_core().await.unwrap();

    assert_eq!(
        orchestrator.get_component_state("camera").await,
        Some(ComponentState::Degraded)
    );

    let result = orchestrator.verify_once(Some(0.2)).await.unwrap();
    assert!(!result.verified);
    assert_eq!(result.reason, VerificationReason::TimeoutOrNoMatch);

    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
}

#[tokio::test]
async fn test_malformed_database_marks_faces_failed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("faces.json");
    std::fs::write(&path, "[broken").unwrap();

    let mut orchestrator = FacecamOrchestrator::new(create_test_config(&path)).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start_core().await.unwrap();

    assert_eq!(
        orchestrator.get_component_state("faces").await,
        Some(ComponentState::Failed)
    );
    assert!(orchestrator.services().database().is_empty());

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_verify_requires_start() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator =
        FacecamOrchestrator::new(create_test_config(&dir.path().join("faces.json"))).unwrap();

    assert!(orchestrator.verify_once(Some(0.1)).await.is_err());
}

#[tokio::test]
async fn test_run_ends_on_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        FacecamOrchestrator::new(create_test_config(&dir.path().join("faces.json"))).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let exit_code = tokio::time::timeout(Duration::from_secs(10), orchestrator.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit_code, 0);
}

#[cfg(feature = "streaming")]
#[tokio::test]
async fn test_streaming_server_is_reachable() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let dir = tempfile::tempdir().unwrap();
    let mut orchestrator =
        FacecamOrchestrator::new(create_test_config(&dir.path().join("faces.json"))).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let addr = orchestrator.server_address().unwrap();
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    assert!(String::from_utf8_lossy(&response).contains("\"camera\""));

    assert_eq!(orchestrator.shutdown().await.unwrap(), 0);
    assert_eq!(
        orchestrator.get_component_state("streaming").await,
        Some(ComponentState::Stopped)
    );
}
