use super::{ComponentState, FacecamOrchestrator};
use crate::auth::{AuthVerifier, VerificationResult};
use crate::camera::FrameBuffer;
use crate::error::{FacecamError, Result};
use crate::source::FrameSource;
use std::sync::Arc;
use tracing::{error, info, warn};

impl FacecamOrchestrator {
    /// Register all components in the stopped state
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Facecam system components");

        let mut states = self.component_states.lock().await;
        states.insert("camera".to_string(), ComponentState::Stopped);
        states.insert("faces".to_string(), ComponentState::Stopped);
        #[cfg(feature = "streaming")]
        states.insert("streaming".to_string(), ComponentState::Stopped);
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the camera, load the face database and, when enabled, the stream server
    pub async fn start(&mut self) -> Result<()> {
        self.start_core().await?;

        #[cfg(feature = "streaming")]
        self.start_streaming().await?;

        info!("Facecam system started successfully");
        Ok(())
    }

    /// Start only the camera and face services, as used by one-shot verification
    pub async fn start_core(&mut self) -> Result<()> {
        info!("Starting Facecam system");

        self.set_component_state("camera", ComponentState::Starting)
            .await;
        let camera = FrameBuffer::start(self.config.camera.clone(), Arc::clone(&self.backend))
            .map_err(|e| {
                error!("Failed to start camera: {}", e);
                e
            })?;
        let camera = Arc::new(camera);

        if camera.is_device_open() {
            self.set_component_state("camera", ComponentState::Running)
                .await;
            info!("Camera started successfully");
        } else {
            self.set_component_state("camera", ComponentState::Degraded)
                .await;
            warn!("Camera started without a device; capture will keep retrying");
        }

        self.set_component_state("faces", ComponentState::Starting)
            .await;
        match self.services.reload_database() {
            Ok(identities) => {
                self.set_component_state("faces", ComponentState::Running)
                    .await;
                info!("Face database ready ({} identities)", identities);
            }
            Err(e) => {
                // Verification still runs and reports an empty registry
                self.set_component_state("faces", ComponentState::Failed)
                    .await;
                error!("Failed to load face database: {}", e);
            }
        }
        if !self.services.has_engine() {
            warn!("No face engine installed; verification will report the engine as not ready");
        }

        let source: Arc<dyn FrameSource> = camera.clone();
        self.verifier = Some(AuthVerifier::new(
            Some(source),
            Arc::clone(&self.services),
            self.config.auth.clone(),
        ));
        self.camera = Some(camera);

        Ok(())
    }

    #[cfg(feature = "streaming")]
    async fn start_streaming(&mut self) -> Result<()> {
        use crate::imaging::FaceLocator;
        use crate::streaming::{StreamPublisher, StreamServerBuilder};

        let camera = self
            .camera
            .clone()
            .ok_or_else(|| FacecamError::system("Camera must be started before streaming"))?;

        self.set_component_state("streaming", ComponentState::Starting)
            .await;

        let source: Arc<dyn FrameSource> = camera.clone();
        let mut publisher = StreamPublisher::new(source, self.config.stream.clone());
        if self.config.stream.overlay {
            let locator: Arc<dyn FaceLocator> = self.services.clone();
            publisher = publisher.with_overlay(locator);
        }

        let mut builder = StreamServerBuilder::new()
            .config(self.config.stream.clone())
            .publisher(Arc::new(publisher))
            .camera(camera);
        if let Some(verifier) = self.verifier.clone() {
            builder = builder.verifier(verifier);
        }
        let server = builder.build()?;

        let listener = server.bind().await.map_err(|e| {
            error!("Failed to start streaming server: {}", e);
            e
        })?;
        self.server_address = listener.local_addr().ok();

        let shutdown = self.cancellation_token.child_token();
        self.server_task = Some(tokio::spawn(async move {
            let result = server.serve_on(listener, shutdown).await;
            if let Err(e) = &result {
                error!("Stream server error: {}", e);
            }
            result
        }));

        self.set_component_state("streaming", ComponentState::Running)
            .await;
        info!(
            "Streaming server started on {}:{}",
            self.config.stream.ip, self.config.stream.port
        );
        Ok(())
    }

    /// Run one verification session against the live camera
    pub async fn verify_once(&self, max_seconds: Option<f64>) -> Result<VerificationResult> {
        let verifier = self
            .verifier
            .as_ref()
            .ok_or_else(|| FacecamError::system("System must be started before verification"))?;

        let timeout = max_seconds.unwrap_or(self.config.auth.max_seconds);
        Ok(verifier.verify_with_timeout(timeout).await)
    }
}
