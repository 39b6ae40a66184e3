//! Contract for externally supplied field renderers.

use crate::backend::DrawingBackend;
use quire_types::Rect;
use serde_json::Value;
use std::collections::HashMap;

/// Construction arguments for a plugin instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginArgs {
    /// Parsed `k=v;k2=v2` option string of the field.
    pub options: HashMap<String, String>,
    /// Target rectangle in points.
    pub rect: Rect,
}

/// Renders into its rectangle. A `false` return marks a failure whose reason
/// is available from [`error_message`](Plugin::error_message).
pub trait Plugin {
    fn render(&mut self, backend: &mut dyn DrawingBackend, data: &Value) -> bool;

    fn error_message(&self) -> String;
}

/// Builds plugins for one class name.
pub trait PluginFactory: Send + Sync {
    fn create(&self, args: PluginArgs) -> Box<dyn Plugin>;
}

impl<F> PluginFactory for F
where
    F: Fn(PluginArgs) -> Box<dyn Plugin> + Send + Sync,
{
    fn create(&self, args: PluginArgs) -> Box<dyn Plugin> {
        self(args)
    }
}
