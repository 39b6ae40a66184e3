//! Newtype wrappers for semantic identifiers.
//!
//! These keep resource names, configuration scopes and template handles from
//! being mixed up with one another or with plain strings and integers.

use serde::Serialize;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// The name of an external resource (template PDF, image, nested configuration).
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SourceName(Arc<str>);

impl SourceName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SourceName {
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&str> for SourceName {
    fn from(s: &str) -> Self {
        Self(s.into())
    }
}

impl AsRef<str> for SourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one configuration inside a composed document: the root
/// configuration is scope 0, every nested import gets the next id.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Opaque handle for a template page imported into the output document.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct TemplateHandle(pub u32);
