use super::outcome::{AuthFailure, AuthOutcome, VerificationResult};
use crate::config::AuthConfig;
use crate::error::FaceEngineError;
use crate::face::{CosineMatcher, FaceDatabase, FaceEngine, FaceMatcher, FaceServices};
use crate::frame::Frame;
use crate::source::FrameSource;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Face authentication against the registered face database.
///
/// Each attempt pulls a frame, detects faces and accepts the first face (in
/// detection order) whose best match is a registered identity. The session
/// loop repeats attempts until one verifies or the time budget runs out.
#[derive(Clone)]
pub struct AuthVerifier {
    source: Option<Arc<dyn FrameSource>>,
    services: Arc<FaceServices>,
    matcher: Arc<dyn FaceMatcher>,
    config: AuthConfig,
}

impl AuthVerifier {
    /// Create a verifier using the cosine matcher.
    ///
    /// `source` is `None` when no camera is wired into the process; attempts
    /// without an explicit frame then fail with
    /// [`AuthFailure::CameraNotConnected`].
    pub fn new(
        source: Option<Arc<dyn FrameSource>>,
        services: Arc<FaceServices>,
        config: AuthConfig,
    ) -> Self {
        Self {
            source,
            services,
            matcher: Arc::new(CosineMatcher::new()),
            config,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn FaceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Run one authentication attempt.
    ///
    /// Uses `frame` when given, otherwise the latest frame from the source.
    /// Never panics or returns an error: every failure becomes a rejection.
    pub fn check_face_auth(&self, frame: Option<Frame>) -> AuthOutcome {
        let frame = match frame {
            Some(frame) => frame,
            None => {
                let Some(source) = self.source.as_ref() else {
                    return AuthOutcome::Rejected(AuthFailure::CameraNotConnected);
                };
                match source.get_frame() {
                    Some(frame) => frame,
                    None => return AuthOutcome::Rejected(AuthFailure::CameraUnavailable),
                }
            }
        };

        let Some(engine) = self.services.engine() else {
            return AuthOutcome::Rejected(AuthFailure::EngineNotReady);
        };

        let database = self.services.database();
        if database.is_empty() {
            return AuthOutcome::Rejected(AuthFailure::NoFacesRegistered);
        }

        let threshold = self.config.match_threshold;
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.match_first_face(engine.as_ref(), &frame, &database, threshold)
        }));

        match attempt {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Technical error during face check on frame {}: {}", frame.id, e);
                AuthOutcome::Rejected(AuthFailure::ProcessingError)
            }
            Err(_) => {
                error!("Face engine panicked while checking frame {}", frame.id);
                AuthOutcome::Rejected(AuthFailure::ProcessingError)
            }
        }
    }

    fn match_first_face(
        &self,
        engine: &dyn FaceEngine,
        frame: &Frame,
        database: &FaceDatabase,
        threshold: f32,
    ) -> Result<AuthOutcome, FaceEngineError> {
        let faces = engine.detect(frame)?;
        if faces.is_empty() {
            return Ok(AuthOutcome::Rejected(AuthFailure::NoFaceFound));
        }

        for (position, face) in faces.iter().enumerate() {
            let found = self
                .matcher
                .best_match(&face.embedding, database, threshold)?;
            if !found.is_unknown() {
                debug!(
                    "Face {} of {} matched {} ({:.3})",
                    position + 1,
                    faces.len(),
                    found.identity,
                    found.score
                );
                return Ok(AuthOutcome::Verified {
                    identity: found.identity,
                    score: found.score,
                });
            }
            debug!(
                "Face {} of {} is unknown (best score {:.3})",
                position + 1,
                faces.len(),
                found.score
            );
        }

        Ok(AuthOutcome::Rejected(AuthFailure::UnknownFace))
    }

    /// Run a verification session with the configured time budget
    pub async fn verify_default(&self) -> VerificationResult {
        self.verify_with_timeout(self.config.max_seconds).await
    }

    /// Repeat attempts until one verifies or `max_seconds` elapse.
    ///
    /// The deadline is checked before every attempt, so the session ends at
    /// most one attempt after the budget runs out. The attempt counter is
    /// bookkeeping only.
    pub async fn verify_with_timeout(&self, max_seconds: f64) -> VerificationResult {
        let session = Uuid::new_v4();
        let budget = Duration::try_from_secs_f64(max_seconds).unwrap_or(Duration::ZERO);
        let retry_interval = self.config.retry_interval();
        let start = Instant::now();
        let mut attempts: u32 = 0;

        info!(%session, "Starting face verification (timeout={:?})", budget);

        while start.elapsed() < budget {
            attempts += 1;
            if attempts == self.config.max_attempts.saturating_add(1) {
                warn!(
                    %session,
                    "Verification passed {} attempts; continuing until the deadline",
                    self.config.max_attempts
                );
            }

            let outcome = self.run_attempt().await;
            if outcome.is_verified() {
                let message = outcome.message();
                info!(%session, attempts, "Face verified: {}", message);
                return VerificationResult::matched(
                    message,
                    attempts,
                    start.elapsed().as_millis() as u64,
                );
            }

            debug!(%session, attempts, "Attempt rejected: {}", outcome.message());

            let remaining = budget.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(retry_interval.min(remaining)).await;
        }

        let elapsed = start.elapsed();
        info!(
            %session,
            attempts,
            "Face verification timed out after {:?}",
            elapsed
        );
        VerificationResult::timed_out(attempts, elapsed.as_millis() as u64)
    }

    /// Run one attempt on the blocking pool so detection never stalls the runtime
    async fn run_attempt(&self) -> AuthOutcome {
        let verifier = self.clone();
        match tokio::task::spawn_blocking(move || verifier.check_face_auth(None)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Verification attempt did not complete: {}", e);
                AuthOutcome::Rejected(AuthFailure::ProcessingError)
            }
        }
    }
}
