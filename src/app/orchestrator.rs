use super::types::{ComponentState, ShutdownReason};
use crate::auth::AuthVerifier;
use crate::camera::{backend_for, CameraBackend, FrameBuffer};
use crate::config::FacecamConfig;
use crate::error::Result;
use crate::face::FaceServices;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

/// Main application coordinator that wires camera, face services and the stream server
pub struct FacecamOrchestrator {
    pub(super) config: FacecamConfig,
    pub(super) backend: Arc<dyn CameraBackend>,
    pub(super) services: Arc<FaceServices>,

    // Components, present once started
    pub(super) camera: Option<Arc<FrameBuffer>>,
    pub(super) verifier: Option<AuthVerifier>,
    #[cfg(feature = "streaming")]
    pub(super) server_task: Option<tokio::task::JoinHandle<Result<()>>>,
    #[cfg(feature = "streaming")]
    pub(super) server_address: Option<std::net::SocketAddr>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl FacecamOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub fn new(config: FacecamConfig) -> Result<Self> {
        let backend = backend_for(config.camera.backend)?;
        let services = Arc::new(FaceServices::with_database_path(
            &config.faces.database_path,
        ));
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            backend,
            services,
            camera: None,
            verifier: None,
            #[cfg(feature = "streaming")]
            server_task: None,
            #[cfg(feature = "streaming")]
            server_address: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Use a specific camera backend instead of the configured one
    pub fn with_backend(mut self, backend: Arc<dyn CameraBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Use an existing face registry, e.g. one with an engine installed
    pub fn with_services(mut self, services: Arc<FaceServices>) -> Self {
        self.services = services;
        self
    }

    pub fn config(&self) -> &FacecamConfig {
        &self.config
    }

    pub fn services(&self) -> Arc<FaceServices> {
        Arc::clone(&self.services)
    }

    pub fn camera(&self) -> Option<Arc<FrameBuffer>> {
        self.camera.clone()
    }

    pub fn verifier(&self) -> Option<&AuthVerifier> {
        self.verifier.as_ref()
    }

    /// Address the stream server is listening on, once started
    #[cfg(feature = "streaming")]
    pub fn server_address(&self) -> Option<std::net::SocketAddr> {
        self.server_address
    }

    /// Token that ends [`run`](Self::run) when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
