//! Loading of named resources: template PDFs, images and nested configurations.
//!
//! The composition engine never touches the filesystem directly. Every
//! external input is requested by name through a [`ResourceProvider`], which
//! keeps rendering testable with purely in-memory fixtures.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ResourceError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to load resource '{path}': {message}")]
    LoadFailed { path: String, message: String },

    #[error("Invalid resource format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::Io(err.to_string())
    }
}

/// Reference-counted resource bytes, cheap to hand to several caches.
pub type SharedResourceData = Arc<Vec<u8>>;

/// Source of template documents, images and imported configurations.
///
/// Implementations must be shareable across threads even though the
/// composition engine itself uses them from a single thread.
pub trait ResourceProvider: Send + Sync + Debug {
    /// Load a resource by name.
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError>;

    /// Check if a resource exists without loading it.
    fn exists(&self, path: &str) -> bool;

    /// Load a resource and decode it as UTF-8 text (configuration sources).
    fn load_text(&self, path: &str) -> Result<String, ResourceError> {
        let data = self.load(path)?;
        String::from_utf8(data.to_vec()).map_err(|e| {
            ResourceError::InvalidFormat(format!("'{}' is not valid UTF-8: {}", path, e))
        })
    }

    /// Base directory names are resolved against, if the provider has one.
    fn base_path(&self) -> Option<&str> {
        None
    }

    /// Human-readable provider name for log messages.
    fn name(&self) -> &'static str;
}

/// A resource provider backed by a map of pre-registered byte buffers.
#[derive(Debug, Default)]
pub struct InMemoryResourceProvider {
    resources: RwLock<HashMap<String, SharedResourceData>>,
}

fn poisoned(path: &str) -> ResourceError {
    ResourceError::LoadFailed {
        path: path.to_string(),
        message: "resource store lock poisoned".to_string(),
    }
}

impl InMemoryResourceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration, convenient for assembling fixtures.
    pub fn with(self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        if let Ok(mut resources) = self.resources.write() {
            resources.insert(path.into(), Arc::new(data.into()));
        }
        self
    }

    /// Register or replace a resource.
    pub fn add(&self, path: impl Into<String>, data: Vec<u8>) -> Result<(), ResourceError> {
        self.add_shared(path, Arc::new(data))
    }

    pub fn add_shared(
        &self,
        path: impl Into<String>,
        data: SharedResourceData,
    ) -> Result<(), ResourceError> {
        let path = path.into();
        let mut resources = self.resources.write().map_err(|_| poisoned(&path))?;
        resources.insert(path, data);
        Ok(())
    }

    pub fn remove(&self, path: &str) -> Option<SharedResourceData> {
        self.resources.write().ok()?.remove(path)
    }

    pub fn len(&self) -> usize {
        self.resources.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.read().map(|r| r.is_empty()).unwrap_or(true)
    }
}

impl ResourceProvider for InMemoryResourceProvider {
    fn load(&self, path: &str) -> Result<SharedResourceData, ResourceError> {
        let resources = self.resources.read().map_err(|_| poisoned(path))?;
        resources
            .get(path)
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.resources
            .read()
            .map(|r| r.contains_key(path))
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "InMemoryResourceProvider"
    }
}
