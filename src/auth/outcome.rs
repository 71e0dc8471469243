use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a single authentication attempt did not verify.
///
/// These are expected negative results, not process errors; the retry loop
/// decides what to do with them.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("camera is not connected to the system")]
    CameraNotConnected,

    #[error("could not get a frame from the camera")]
    CameraUnavailable,

    #[error("face engine is not ready")]
    EngineNotReady,

    #[error("no faces registered")]
    NoFacesRegistered,

    #[error("no face found")]
    NoFaceFound,

    #[error("unknown face")]
    UnknownFace,

    #[error("processing error")]
    ProcessingError,
}

/// Outcome of one authentication attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Verified { identity: String, score: f32 },
    Rejected(AuthFailure),
}

impl AuthOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, AuthOutcome::Verified { .. })
    }

    pub fn failure(&self) -> Option<AuthFailure> {
        match self {
            AuthOutcome::Verified { .. } => None,
            AuthOutcome::Rejected(failure) => Some(*failure),
        }
    }

    /// Human-readable message for callers
    pub fn message(&self) -> String {
        match self {
            AuthOutcome::Verified { identity, .. } => format!("recognized: {}", identity),
            AuthOutcome::Rejected(failure) => failure.to_string(),
        }
    }
}

impl From<AuthOutcome> for (bool, String) {
    fn from(outcome: AuthOutcome) -> Self {
        (outcome.is_verified(), outcome.message())
    }
}

/// Why a verification session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerificationReason {
    #[serde(rename = "FACE_MATCH")]
    FaceMatch,
    #[serde(rename = "TIMEOUT_OR_NO_MATCH")]
    TimeoutOrNoMatch,
}

impl VerificationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationReason::FaceMatch => "FACE_MATCH",
            VerificationReason::TimeoutOrNoMatch => "TIMEOUT_OR_NO_MATCH",
        }
    }
}

impl fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one verification session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub verified: bool,
    pub reason: VerificationReason,
    pub message: String,
    /// Attempts made during the session
    pub attempts: u32,
    /// Wall-clock duration of the session
    pub elapsed_ms: u64,
}

impl VerificationResult {
    pub(crate) fn matched(message: String, attempts: u32, elapsed_ms: u64) -> Self {
        Self {
            verified: true,
            reason: VerificationReason::FaceMatch,
            message,
            attempts,
            elapsed_ms,
        }
    }

    pub(crate) fn timed_out(attempts: u32, elapsed_ms: u64) -> Self {
        Self {
            verified: false,
            reason: VerificationReason::TimeoutOrNoMatch,
            message: "timed out: face not recognized".to_string(),
            attempts,
            elapsed_ms,
        }
    }
}
