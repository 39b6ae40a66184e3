//! quire fills existing PDF pages with data.
//!
//! An XML configuration names background template pages and places fields,
//! grids, tables and blocks on them; every JSON entity yields one sequence of
//! output pages. This crate ties the workspace together and carries the
//! file-to-file [`RenderJob`] behind the `quire` binary.
//!
//! ```ignore
//! use quire::{LopdfBackend, RendererBuilder};
//! use serde_json::json;
//!
//! let mut renderer = RendererBuilder::new()
//!     .with_config_source(xml, "form.xml")?
//!     .build(LopdfBackend::new())?;
//! renderer.render_entity(&json!({ "name": "Ada" }))?;
//! let pdf = renderer.finish()?;
//! ```

mod error;
mod job;

pub use error::QuireError;
pub use job::{JobReport, RenderJob, parse_param};

pub use quire_config::{self as config, ConfigError, ConfigLoader, DocumentConfig};
pub use quire_engine::{
    ComposeError, DrawOp, RecordingBackend, Registry, RenderSummary, Renderer, RendererBuilder,
    TruncatedGrid,
};
pub use quire_expr::{self as expr, ExprFunction, FunctionRegistry};
pub use quire_render_core::{DrawingBackend, Plugin, PluginArgs, PluginFactory, RenderError};
pub use quire_render_lopdf::LopdfBackend;
pub use quire_resource::{FilesystemResourceProvider, InMemoryResourceProvider};
pub use quire_source::{DataSource, IteratorDataSource, JsonDataSource, VecDataSource};
pub use quire_traits::ResourceProvider;
pub use quire_types::{self as types, Color, Orientation, Point, Size, SourceName, TemplateHandle};
