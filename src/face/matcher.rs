use super::database::FaceDatabase;
use super::engine::FaceMatcher;
use super::types::FaceMatch;
use crate::error::FaceEngineError;
use tracing::trace;

/// Cosine similarity of two equal-length vectors; 0.0 when either is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

/// Scores each identity by its most similar reference embedding
#[derive(Debug, Default, Clone)]
pub struct CosineMatcher;

impl CosineMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl FaceMatcher for CosineMatcher {
    fn best_match(
        &self,
        embedding: &[f32],
        database: &FaceDatabase,
        threshold: f32,
    ) -> Result<FaceMatch, FaceEngineError> {
        if let Some(expected) = database.dimension() {
            if embedding.len() != expected {
                return Err(FaceEngineError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                });
            }
        }

        let mut best: Option<(&str, f32)> = None;
        for (identity, references) in database.iter() {
            for reference in references {
                let score = cosine_similarity(embedding, reference);
                trace!("Similarity to {}: {:.3}", identity, score);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((identity, score));
                }
            }
        }

        Ok(match best {
            Some((identity, score)) if score >= threshold => FaceMatch {
                identity: identity.to_string(),
                score,
            },
            Some((_, score)) => FaceMatch::unknown(score),
            None => FaceMatch::unknown(0.0),
        })
    }
}
