//! Drawing backend contract for quire.
//!
//! - [`DrawingBackend`]: page, text, vector, image, barcode and template primitives
//! - [`Plugin`] / [`PluginFactory`]: externally supplied field renderers
//! - [`RenderError`] for backend failures
//! - text metrics and small text utilities shared by backends and the engine

mod backend;
mod error;
pub mod metrics;
mod plugin;
pub mod utils;

pub use backend::{DrawingBackend, FontSelection, GraphicsState, PaintMode};
pub use error::RenderError;
pub use plugin::{Plugin, PluginArgs, PluginFactory};
