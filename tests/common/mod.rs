pub mod fixtures;
pub mod pdf_assertions;

use lopdf::Document as LopdfDocument;
use quire::{
    ComposeError, InMemoryResourceProvider, LopdfBackend, RecordingBackend, RenderSummary,
    Renderer, RendererBuilder, VecDataSource,
};
use serde_json::Value;
use std::sync::Arc;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wrapper around a generated PDF with helper methods
pub struct GeneratedPdf {
    pub bytes: Vec<u8>,
    pub doc: LopdfDocument,
    pub summary: RenderSummary,
    pub errors: Vec<String>,
}

impl GeneratedPdf {
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Text runs shown directly on page `page` (1-based).
    pub fn texts(&self, page: u32) -> Vec<String> {
        pdf_assertions::page_texts(&self.doc, page)
    }

    /// `(width, height)` of page `page` (1-based).
    pub fn page_size(&self, page: u32) -> (f32, f32) {
        pdf_assertions::page_size(&self.doc, page)
    }

    /// Save PDF to a file for manual debugging
    pub fn save_for_debug(&self, name: &str) -> std::io::Result<()> {
        std::fs::write(format!("test_output_{}.pdf", name), &self.bytes)
    }
}

pub fn builder(xml: &str, provider: InMemoryResourceProvider) -> Result<RendererBuilder, ComposeError> {
    RendererBuilder::new()
        .with_provider(Arc::new(provider))
        .with_config_source(xml, "form.xml")
}

/// Renders onto the recording backend so tests can inspect draw calls.
pub fn record(
    xml: &str,
    provider: InMemoryResourceProvider,
    entities: Vec<Value>,
) -> Result<Renderer<RecordingBackend>, ComposeError> {
    let mut renderer = builder(xml, provider)?.build(RecordingBackend::new())?;
    renderer.render(&mut VecDataSource::new(entities))?;
    Ok(renderer)
}

/// Renders a real PDF and loads it back.
pub fn render_pdf(
    xml: &str,
    provider: InMemoryResourceProvider,
    entities: Vec<Value>,
) -> Result<GeneratedPdf, Box<dyn std::error::Error>> {
    let mut renderer = builder(xml, provider)?.build(LopdfBackend::new())?;
    renderer.render(&mut VecDataSource::new(entities))?;
    let bytes = renderer.finish()?;
    let doc = LopdfDocument::load_mem(&bytes)?;
    Ok(GeneratedPdf {
        bytes,
        doc,
        summary: renderer.summary().clone(),
        errors: renderer.errors().iter().map(ToString::to_string).collect(),
    })
}
