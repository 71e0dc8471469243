use super::{ComponentState, FacecamOrchestrator};
use crate::error::{FacecamError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const CAMERA_STOP_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(feature = "streaming")]
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl FacecamOrchestrator {
    /// Stop components in reverse start order; returns the process exit code
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        #[cfg(feature = "streaming")]
        if let Err(e) = self.stop_streaming().await {
            error!("Error stopping streaming: {}", e);
            exit_code = 1;
        }

        if let Err(e) = self.stop_camera().await {
            error!("Error stopping camera: {}", e);
            exit_code = 1;
        }

        self.verifier = None;
        self.set_component_state("faces", ComponentState::Stopped)
            .await;

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    #[cfg(feature = "streaming")]
    async fn stop_streaming(&mut self) -> Result<()> {
        let Some(mut task) = self.server_task.take() else {
            self.set_component_state("streaming", ComponentState::Stopped)
                .await;
            return Ok(());
        };

        self.set_component_state("streaming", ComponentState::Stopping)
            .await;

        // Open MJPEG responses never finish on their own
        let result = match timeout(SERVER_STOP_TIMEOUT, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(FacecamError::component(
                "streaming",
                format!("server task failed: {}", e),
            )),
            Err(_) => {
                warn!("Stream clients still connected; aborting server");
                task.abort();
                Ok(())
            }
        };

        self.finish_stop("streaming", result).await
    }

    async fn stop_camera(&mut self) -> Result<()> {
        let Some(camera) = self.camera.take() else {
            self.set_component_state("camera", ComponentState::Stopped)
                .await;
            return Ok(());
        };

        self.set_component_state("camera", ComponentState::Stopping)
            .await;

        // stop() joins the capture thread
        let stopping = tokio::task::spawn_blocking(move || camera.stop());
        let result = self
            .await_stop("camera", CAMERA_STOP_TIMEOUT, async move {
                stopping.await.map_err(|e| {
                    FacecamError::component("camera", format!("stop task failed: {}", e))
                })
            })
            .await;

        self.finish_stop("camera", result).await
    }

    async fn await_stop<F>(&self, component: &str, limit: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match timeout(limit, stop).await {
            Ok(result) => result,
            Err(_) => Err(FacecamError::System {
                message: format!("{} component stop timeout", component),
            }),
        }
    }

    async fn finish_stop(&self, component: &str, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Err(e) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("Error stopping {} component: {}", component, e);
                Err(e)
            }
        }
    }
}
