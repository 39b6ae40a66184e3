use log::warn;
use quire_config::ConfigError;
use quire_expr::ExprError;
use quire_render_core::RenderError;
use quire_source::SourceError;
use quire_traits::ResourceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template not found: {path}")]
    TemplateNotFound { path: String },

    #[error("Data error in grid '{grid}': {message}")]
    GridData { grid: String, message: String },

    #[error("Plugin '{class}' failed: {message}")]
    Plugin { class: String, message: String },

    #[error("Field '{field}' resolved to a non-finite coordinate ({value})")]
    Coordinate { field: String, value: f32 },

    #[error("Expression error in '{field}': {source}")]
    Expression {
        field: String,
        #[source]
        source: ExprError,
    },

    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Data source error: {0}")]
    Source(#[from] SourceError),
}

impl ComposeError {
    /// Whether the error aborts the whole render. Everything else is recorded
    /// and the affected page, grid or field is skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            ComposeError::TemplateNotFound { .. }
            | ComposeError::GridData { .. }
            | ComposeError::Plugin { .. }
            | ComposeError::Expression { .. } => false,
            ComposeError::Render(RenderError::Barcode(_) | RenderError::Image(_)) => false,
            _ => true,
        }
    }
}

/// Non-fatal errors collected over a render session.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Vec<ComposeError>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: ComposeError) {
        warn!("{}", error);
        self.entries.push(error);
    }

    /// Records a non-fatal error and swallows it; fatal errors pass through.
    pub fn absorb(&mut self, result: Result<(), ComposeError>) -> Result<(), ComposeError> {
        match result {
            Err(e) if !e.is_fatal() => {
                self.record(e);
                Ok(())
            }
            other => other,
        }
    }

    pub fn last(&self) -> Option<&ComposeError> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[ComposeError] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
