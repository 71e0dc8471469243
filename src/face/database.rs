use super::types::UNKNOWN_IDENTITY;
use crate::error::FaceDbError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Registered identities and their reference embeddings.
///
/// Stored on disk as JSON: `{"alice": [[0.1, ...], [0.2, ...]], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceDatabase {
    identities: BTreeMap<String, Vec<Vec<f32>>>,
}

impl FaceDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the database, treating a missing file as an empty database
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FaceDbError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Face database {} not found; starting empty", path_str);
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(FaceDbError::Read {
                    path: path_str,
                    source,
                })
            }
        };

        let database: FaceDatabase =
            serde_json::from_str(&contents).map_err(|source| FaceDbError::Parse {
                path: path_str.clone(),
                source,
            })?;
        database.validate()?;

        info!(
            "Loaded face database {} ({} identities, {} embeddings)",
            path_str,
            database.len(),
            database.embedding_count()
        );
        Ok(database)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FaceDbError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let json = serde_json::to_string_pretty(self).map_err(|e| FaceDbError::Write {
            path: path_str.clone(),
            details: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(|e| FaceDbError::Write {
            path: path_str.clone(),
            details: e.to_string(),
        })?;

        debug!("Saved face database to {}", path_str);
        Ok(())
    }

    /// Register one more reference embedding for `identity`
    pub fn insert(&mut self, identity: &str, embedding: Vec<f32>) -> Result<(), FaceDbError> {
        Self::check_embedding(identity, &embedding, self.dimension())?;
        self.identities
            .entry(identity.to_string())
            .or_default()
            .push(embedding);
        Ok(())
    }

    pub fn remove(&mut self, identity: &str) -> bool {
        self.identities.remove(identity).is_some()
    }

    /// True when no identity is registered
    pub fn is_empty(&self) -> bool {
        self.identities.values().all(|embeddings| embeddings.is_empty())
    }

    /// Number of identities
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn embedding_count(&self) -> usize {
        self.identities.values().map(Vec::len).sum()
    }

    /// Embedding length shared by every stored vector
    pub fn dimension(&self) -> Option<usize> {
        self.identities
            .values()
            .flat_map(|embeddings| embeddings.iter())
            .map(Vec::len)
            .next()
    }

    pub fn embeddings(&self, identity: &str) -> Option<&[Vec<f32>]> {
        self.identities.get(identity).map(Vec::as_slice)
    }

    /// Iterate identities in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Vec<f32>])> {
        self.identities
            .iter()
            .map(|(name, embeddings)| (name.as_str(), embeddings.as_slice()))
    }

    fn validate(&self) -> Result<(), FaceDbError> {
        let dimension = self.dimension();
        for (identity, embeddings) in self.iter() {
            for embedding in embeddings {
                Self::check_embedding(identity, embedding, dimension)?;
            }
        }
        Ok(())
    }

    fn check_embedding(
        identity: &str,
        embedding: &[f32],
        dimension: Option<usize>,
    ) -> Result<(), FaceDbError> {
        if identity.trim().is_empty() {
            return Err(FaceDbError::InvalidEmbedding {
                identity: identity.to_string(),
                details: "identity name is empty".to_string(),
            });
        }
        if identity == UNKNOWN_IDENTITY {
            return Err(FaceDbError::InvalidEmbedding {
                identity: identity.to_string(),
                details: format!("'{}' is reserved for unmatched faces", UNKNOWN_IDENTITY),
            });
        }
        if embedding.is_empty() {
            return Err(FaceDbError::InvalidEmbedding {
                identity: identity.to_string(),
                details: "embedding is empty".to_string(),
            });
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(FaceDbError::InvalidEmbedding {
                identity: identity.to_string(),
                details: "embedding contains non-finite values".to_string(),
            });
        }
        if let Some(expected) = dimension {
            if embedding.len() != expected {
                return Err(FaceDbError::InvalidEmbedding {
                    identity: identity.to_string(),
                    details: format!("expected {} values, got {}", expected, embedding.len()),
                });
            }
        }
        Ok(())
    }
}
