//! Data entity sources.
//!
//! The render driver pulls one JSON record per entity from a [`DataSource`]
//! and composes the full page sequence for it. Sources are consumed once.
//!
//! ```ignore
//! use quire_source::{DataSource, JsonDataSource};
//!
//! let mut source = JsonDataSource::from_str(r#"[{"id": 1}, {"id": 2}]"#)?;
//! while let Some(entity) = source.next() {
//!     renderer.render_entity(&entity)?;
//! }
//! ```

use log::debug;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Read;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid JSON data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error reading data: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data must be an object or an array of objects, found {0}")]
    Shape(&'static str),
}

pub trait DataSource: Send {
    /// Next entity, or `None` when the source is exhausted.
    fn next(&mut self) -> Option<Value>;

    /// Total number of entities, when known up front.
    fn size_hint(&self) -> Option<usize> {
        None
    }

    fn has_known_size(&self) -> bool {
        self.size_hint().is_some()
    }
}

/// Wraps any iterator of records.
pub struct IteratorDataSource<I>
where
    I: Iterator<Item = Value> + Send,
{
    inner: I,
    size_hint: Option<usize>,
}

impl<I> IteratorDataSource<I>
where
    I: Iterator<Item = Value> + Send,
{
    pub fn new(inner: I) -> Self {
        let (lower, upper) = inner.size_hint();
        let size_hint = (upper == Some(lower)).then_some(lower);
        Self { inner, size_hint }
    }
}

impl<I> DataSource for IteratorDataSource<I>
where
    I: Iterator<Item = Value> + Send,
{
    fn next(&mut self) -> Option<Value> {
        self.inner.next()
    }

    fn size_hint(&self) -> Option<usize> {
        self.size_hint
    }
}

/// Entities held in memory and handed out by value.
pub struct VecDataSource {
    data: VecDeque<Value>,
    total: usize,
}

impl VecDataSource {
    pub fn new(data: Vec<Value>) -> Self {
        let total = data.len();
        Self {
            data: data.into(),
            total,
        }
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }
}

impl DataSource for VecDataSource {
    fn next(&mut self) -> Option<Value> {
        self.data.pop_front()
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}

/// Entities parsed from a JSON document.
///
/// A top-level object is a single entity; a top-level array yields one entity
/// per element. Anything else is rejected.
pub struct JsonDataSource {
    inner: VecDataSource,
}

impl JsonDataSource {
    pub fn from_value(value: Value) -> Result<Self, SourceError> {
        let entities = match value {
            Value::Object(_) => vec![value],
            Value::Array(items) => items,
            Value::Null => return Err(SourceError::Shape("null")),
            Value::Bool(_) => return Err(SourceError::Shape("a boolean")),
            Value::Number(_) => return Err(SourceError::Shape("a number")),
            Value::String(_) => return Err(SourceError::Shape("a string")),
        };
        debug!("JSON data source holds {} entities", entities.len());
        Ok(Self {
            inner: VecDataSource::new(entities),
        })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, SourceError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, SourceError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::from_str(&text)
    }
}

impl DataSource for JsonDataSource {
    fn next(&mut self) -> Option<Value> {
        self.inner.next()
    }

    fn size_hint(&self) -> Option<usize> {
        self.inner.size_hint()
    }
}

impl DataSource for Box<dyn DataSource> {
    fn next(&mut self) -> Option<Value> {
        (**self).next()
    }

    fn size_hint(&self) -> Option<usize> {
        (**self).size_hint()
    }
}
