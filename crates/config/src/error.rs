use quire_expr::ExprError;
use quire_traits::ResourceError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

impl From<roxmltree::TextPos> for Location {
    fn from(pos: roxmltree::TextPos) -> Self {
        Location {
            line: pos.row,
            col: pos.col,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("XML parsing error: {0}")]
    XmlParse(#[from] roxmltree::Error),

    #[error("Configuration structure error at {location}: {message}")]
    Structure { message: String, location: Location },

    #[error("Invalid value '{value}' for attribute '{attribute}' on <{element}> at {location}: {message}")]
    InvalidAttribute {
        element: String,
        attribute: String,
        value: String,
        message: String,
        location: Location,
    },

    #[error("Missing required attribute '{attribute}' on <{element}> at {location}")]
    MissingAttribute {
        element: String,
        attribute: String,
        location: Location,
    },

    #[error("Duplicate field '{field}' on page '{page}'")]
    DuplicateField { page: String, field: String },

    #[error("Grid '{grid}' on page '{page}' references unknown field '{field}'")]
    UnknownGridField {
        page: String,
        grid: String,
        field: String,
    },

    #[error("Expression error in '{input}': {source}")]
    Expression {
        input: String,
        #[source]
        source: ExprError,
    },

    #[error("Configuration '{0}' contains no page that can draw anything")]
    NoContent(String),

    #[error("Import of '{0}' exceeds the maximum nesting depth")]
    ImportDepth(String),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}
