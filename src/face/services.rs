use super::database::FaceDatabase;
use super::engine::{FaceDetector, FaceEngine};
use crate::error::{FaceDbError, FaceEngineError};
use parking_lot::{Mutex, RwLock};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Deferred constructor for a face engine
pub type EngineLoader =
    Box<dyn Fn() -> Result<Arc<dyn FaceEngine>, FaceEngineError> + Send + Sync>;

/// Registry for the face engine and face database.
///
/// Consumers resolve both at call time, so a slow or missing engine never
/// blocks components that do not need it. The database is swapped as a
/// whole; readers keep the snapshot they already hold.
pub struct FaceServices {
    engine: RwLock<Option<Arc<dyn FaceEngine>>>,
    detector: RwLock<Option<Arc<dyn FaceDetector>>>,
    loader: Mutex<Option<EngineLoader>>,
    database: RwLock<Arc<FaceDatabase>>,
    database_path: Option<PathBuf>,
}

impl FaceServices {
    /// Registry with no engine and an empty database
    pub fn new() -> Self {
        Self {
            engine: RwLock::new(None),
            detector: RwLock::new(None),
            loader: Mutex::new(None),
            database: RwLock::new(Arc::new(FaceDatabase::new())),
            database_path: None,
        }
    }

    /// Registry backed by a database file; call [`reload_database`](Self::reload_database) to read it
    pub fn with_database_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            database_path: Some(path.as_ref().to_path_buf()),
            ..Self::new()
        }
    }

    pub fn with_database(self, database: FaceDatabase) -> Self {
        self.replace_database(database);
        self
    }

    pub fn with_engine(self, engine: Arc<dyn FaceEngine>) -> Self {
        self.install_engine(engine);
        self
    }

    pub fn with_detector(self, detector: Arc<dyn FaceDetector>) -> Self {
        self.install_detector(detector);
        self
    }

    /// Install a box-only detector for the stream overlay
    pub fn install_detector(&self, detector: Arc<dyn FaceDetector>) {
        *self.detector.write() = Some(detector);
        info!("Face detector installed");
    }

    pub fn detector(&self) -> Option<Arc<dyn FaceDetector>> {
        self.detector.read().clone()
    }

    /// Install a ready engine, replacing any previous one
    pub fn install_engine(&self, engine: Arc<dyn FaceEngine>) {
        *self.engine.write() = Some(engine);
        info!("Face engine installed");
    }

    /// Register a constructor run on the first engine lookup
    pub fn set_engine_loader(&self, loader: EngineLoader) {
        *self.loader.lock() = Some(loader);
        debug!("Face engine loader registered");
    }

    /// Current engine, loading it on first use if a loader is registered.
    ///
    /// A failed or panicking load is logged and retried on the next call.
    pub fn engine(&self) -> Option<Arc<dyn FaceEngine>> {
        if let Some(engine) = self.engine.read().as_ref() {
            return Some(Arc::clone(engine));
        }

        let loader = self.loader.lock();
        // Another caller may have finished loading while we waited
        if let Some(engine) = self.engine.read().as_ref() {
            return Some(Arc::clone(engine));
        }

        let load = loader.as_ref()?;
        match panic::catch_unwind(AssertUnwindSafe(|| load())) {
            Ok(Ok(engine)) => {
                info!("Face engine loaded");
                *self.engine.write() = Some(Arc::clone(&engine));
                Some(engine)
            }
            Ok(Err(e)) => {
                warn!("Face engine failed to load: {}", e);
                None
            }
            Err(_) => {
                error!("Face engine loader panicked; will retry on next use");
                None
            }
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.read().is_some()
    }

    /// Snapshot of the current database
    pub fn database(&self) -> Arc<FaceDatabase> {
        self.database.read().clone()
    }

    pub fn replace_database(&self, database: FaceDatabase) {
        let identities = database.len();
        *self.database.write() = Arc::new(database);
        debug!("Face database replaced ({} identities)", identities);
    }

    /// Re-read the database file and swap it in; returns the identity count
    pub fn reload_database(&self) -> Result<usize, FaceDbError> {
        let Some(path) = self.database_path.as_ref() else {
            debug!("No face database path configured; keeping current database");
            return Ok(self.database.read().len());
        };

        let database = FaceDatabase::load(path)?;
        let identities = database.len();
        self.replace_database(database);
        Ok(identities)
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }
}

impl Default for FaceServices {
    fn default() -> Self {
        Self::new()
    }
}
