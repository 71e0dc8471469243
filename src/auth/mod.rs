mod outcome;
mod verifier;

pub use outcome::{AuthFailure, AuthOutcome, VerificationReason, VerificationResult};
pub use verifier::AuthVerifier;
