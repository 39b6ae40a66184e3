use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF generation error: {0}")]
    Pdf(String),
    #[error("Template page {page} not found in '{source_name}'")]
    TemplatePage { source_name: String, page: u32 },
    #[error("Unknown template handle {0}")]
    UnknownTemplate(u32),
    #[error("Image error: {0}")]
    Image(String),
    #[error("Barcode error: {0}")]
    Barcode(String),
    #[error("No page has been started")]
    NoPage,
    #[error("Other rendering error: {0}")]
    Other(String),
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::Pdf(err.to_string())
    }
}

impl From<&str> for RenderError {
    fn from(s: &str) -> Self {
        RenderError::Other(s.to_string())
    }
}
