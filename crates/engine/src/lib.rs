//! Composition engine for quire.
//!
//! Takes a parsed [`DocumentConfig`](quire_config::DocumentConfig), flattens
//! it with its imports, and renders one page sequence per data entity onto a
//! [`DrawingBackend`](quire_render_core::DrawingBackend):
//!
//! - [`compose`]: import and append resolution into a [`DocumentBuild`]
//! - [`resolver`]: background template queues per configuration scope
//! - [`field`]: drawing a single field definition
//! - [`grid`], [`flextable`], [`datablock`]: repeated content
//! - [`driver`]: the [`Renderer`] and its builder
//!
//! Errors that only spoil part of a page are collected in an [`ErrorLog`];
//! everything else aborts the run.

pub mod compose;
pub mod datablock;
pub mod driver;
pub mod error;
pub mod field;
pub mod flextable;
pub mod format;
pub mod grid;
pub mod recording;
pub mod registry;
pub mod resolver;
pub mod session;

#[cfg(test)]
mod testing;

pub use compose::{ComposedPage, DocumentBuild, MAX_IMPORT_DEPTH, compose};
pub use driver::{RenderSummary, Renderer, RendererBuilder, TruncatedGrid};
pub use error::{ComposeError, ErrorLog};
pub use field::{FieldContext, FieldRenderer};
pub use format::format_money;
pub use recording::{DrawOp, RecordedPage, RecordingBackend};
pub use registry::Registry;
pub use resolver::{PageImage, TemplateResolver};
pub use session::Session;
