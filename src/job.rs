//! File-to-file rendering as done by the `quire` binary.

use crate::error::QuireError;
use log::{info, warn};
use quire_engine::{Registry, RenderSummary, RendererBuilder};
use quire_render_lopdf::LopdfBackend;
use quire_resource::FilesystemResourceProvider;
use quire_source::JsonDataSource;
use quire_traits::ResourceProvider;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Splits a `name=value` command line parameter.
pub fn parse_param(arg: &str) -> Result<(String, String), QuireError> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(QuireError::InvalidParam(arg.to_string())),
    }
}

/// Outcome of a finished job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub summary: RenderSummary,
    /// Non-fatal errors, rendered as text.
    pub warnings: Vec<String>,
    pub output_bytes: usize,
}

/// Renders a configuration file against a JSON data file into a PDF file.
///
/// Relative resource names (templates, images, imports, appended PDFs)
/// resolve against the base directory, which defaults to the directory of
/// the configuration file.
#[derive(Debug)]
pub struct RenderJob {
    config: PathBuf,
    data: PathBuf,
    output: PathBuf,
    base_dir: Option<PathBuf>,
    params: Vec<(String, String)>,
    registry: Registry,
}

impl RenderJob {
    pub fn new(config: impl AsRef<Path>, data: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            config: config.as_ref().to_path_buf(),
            data: data.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            base_dir: None,
            params: Vec::new(),
            registry: Registry::new(),
        }
    }

    pub fn with_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.base_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Custom conversion functions and plugins.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn run(self) -> Result<JobReport, QuireError> {
        let provider: Arc<dyn ResourceProvider> = Arc::new(match &self.base_dir {
            Some(dir) => FilesystemResourceProvider::new(dir),
            None => FilesystemResourceProvider::for_file(&self.config),
        });
        let name = self
            .config
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.display().to_string());
        info!("Loading configuration from {}", self.config.display());
        let source = fs::read_to_string(&self.config)?;

        let mut builder = RendererBuilder::new()
            .with_registry(self.registry)
            .with_provider(provider);
        for (param, value) in self.params {
            builder = builder.with_param(param, value);
        }
        let mut renderer = builder
            .with_config_source(&source, &name)?
            .build(LopdfBackend::new())?;

        info!("Loading data from {}", self.data.display());
        let mut data = JsonDataSource::from_reader(BufReader::new(File::open(&self.data)?))?;
        renderer.render(&mut data)?;
        let bytes = renderer.finish()?;
        fs::write(&self.output, &bytes)?;

        let warnings: Vec<String> = renderer.errors().iter().map(ToString::to_string).collect();
        if !warnings.is_empty() {
            warn!("{} problems were recovered from while rendering", warnings.len());
        }
        info!("Wrote {} ({} bytes)", self.output.display(), bytes.len());
        Ok(JobReport {
            summary: renderer.summary().clone(),
            warnings,
            output_bytes: bytes.len(),
        })
    }
}
