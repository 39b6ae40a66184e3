//! Per-render caches for source documents, template geometry and images.
//!
//! Everything is loaded on first use and kept until the renderer is dropped;
//! nothing is invalidated.

use crate::error::{ComposeError, ErrorLog};
use log::{debug, warn};
use lopdf::Document;
use quire_pdf_composer::{PageGeometry, page_count, page_geometry};
use quire_render_core::RenderError;
use quire_traits::{ResourceError, ResourceProvider, SharedResourceData};
use quire_types::SourceName;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Arc;

/// A located and decodable image.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub data: SharedResourceData,
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// Height over width.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 {
            1.0
        } else {
            self.height as f32 / self.width as f32
        }
    }
}

#[derive(Debug)]
pub struct Session {
    provider: Arc<dyn ResourceProvider>,
    documents: HashMap<SourceName, Arc<Document>>,
    unavailable: HashSet<SourceName>,
    geometry: HashMap<(SourceName, u32), PageGeometry>,
    images: HashMap<SourceName, Option<ImageInfo>>,
    errors: ErrorLog,
}

impl Session {
    pub fn new(provider: Arc<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            documents: HashMap::new(),
            unavailable: HashSet::new(),
            geometry: HashMap::new(),
            images: HashMap::new(),
            errors: ErrorLog::new(),
        }
    }

    pub fn provider(&self) -> &dyn ResourceProvider {
        self.provider.as_ref()
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorLog {
        &mut self.errors
    }

    /// Loads and parses a source PDF. A file that could not be loaded once is
    /// reported as missing from then on without touching the provider again.
    pub fn document(&mut self, name: &SourceName) -> Result<Arc<Document>, ComposeError> {
        if let Some(doc) = self.documents.get(name) {
            return Ok(Arc::clone(doc));
        }
        if self.unavailable.contains(name) {
            return Err(ComposeError::TemplateNotFound {
                path: name.to_string(),
            });
        }
        match self.load_document(name) {
            Ok(doc) => {
                let doc = Arc::new(doc);
                self.documents.insert(name.clone(), Arc::clone(&doc));
                Ok(doc)
            }
            Err(e) => {
                self.unavailable.insert(name.clone());
                Err(e)
            }
        }
    }

    fn load_document(&self, name: &SourceName) -> Result<Document, ComposeError> {
        let data = self.provider.load(name.as_str()).map_err(|e| match e {
            ResourceError::NotFound(path) => ComposeError::TemplateNotFound { path },
            other => ComposeError::Resource(other),
        })?;
        let doc = Document::load_mem(&data).map_err(|e| {
            warn!("'{}' is not a readable PDF: {}", name, e);
            ComposeError::Render(RenderError::Pdf(format!("{}: {}", name, e)))
        })?;
        debug!("Loaded source document '{}' ({} pages)", name, page_count(&doc));
        Ok(doc)
    }

    pub fn page_count(&mut self, name: &SourceName) -> Result<usize, ComposeError> {
        Ok(page_count(&*self.document(name)?))
    }

    /// Geometry of one page (1-based), derived once per (file, page).
    pub fn geometry(&mut self, name: &SourceName, page: u32) -> Result<PageGeometry, ComposeError> {
        let key = (name.clone(), page);
        if let Some(geometry) = self.geometry.get(&key) {
            return Ok(*geometry);
        }
        let doc = self.document(name)?;
        let geometry = page_geometry(&doc, page).map_err(|e| {
            debug!("No geometry for '{}' page {}: {}", name, page, e);
            ComposeError::TemplateNotFound {
                path: format!("{}#{}", name, page),
            }
        })?;
        self.geometry.insert(key, geometry);
        Ok(geometry)
    }

    /// Locates an image and reads its pixel dimensions. Missing or undecodable
    /// images yield `None`.
    pub fn image(&mut self, name: &SourceName) -> Option<ImageInfo> {
        if let Some(cached) = self.images.get(name) {
            return cached.clone();
        }
        let info = self.load_image(name);
        self.images.insert(name.clone(), info.clone());
        info
    }

    fn load_image(&self, name: &SourceName) -> Option<ImageInfo> {
        let data = match self.provider.load(name.as_str()) {
            Ok(data) => data,
            Err(e) => {
                debug!("Image '{}' not available: {}", name, e);
                return None;
            }
        };
        let dimensions = image::ImageReader::new(Cursor::new(data.as_slice()))
            .with_guessed_format()
            .map_err(|e| e.to_string())
            .and_then(|reader| reader.into_dimensions().map_err(|e| e.to_string()));
        match dimensions {
            Ok((width, height)) => Some(ImageInfo {
                data,
                width,
                height,
            }),
            Err(e) => {
                debug!("Image '{}' cannot be decoded: {}", name, e);
                None
            }
        }
    }
}
