use lopdf::ObjectId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposerError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: u32, count: usize },

    #[error("Source document is encrypted")]
    Encrypted,

    #[error("Malformed page object {0:?}: {1}")]
    MalformedPage(ObjectId, String),
}
