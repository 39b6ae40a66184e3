//! Function table and plugin factories shared by loading and rendering.

use quire_config::ConfigLoader;
use quire_expr::{ExprFunction, FunctionRegistry};
use quire_render_core::PluginFactory;
use std::collections::HashMap;
use std::fmt;

#[derive(Default)]
pub struct Registry {
    functions: FunctionRegistry,
    plugins: HashMap<String, Box<dyn PluginFactory>>,
}

impl Registry {
    /// A registry with the built-in expression functions and no plugins.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Registers a function usable in `convert`, `visible` and `condition`
    /// expressions. Must happen before configurations are loaded.
    pub fn register_function(&mut self, name: &str, func: ExprFunction) {
        self.functions.register(name, func);
    }

    /// Registers a plugin factory for a field class. Class names are
    /// case-insensitive.
    pub fn register_plugin(&mut self, class: &str, factory: impl PluginFactory + 'static) {
        self.plugins
            .insert(class.to_ascii_lowercase(), Box::new(factory));
    }

    pub fn plugin(&self, class: &str) -> Option<&dyn PluginFactory> {
        self.plugins
            .get(&class.to_ascii_lowercase())
            .map(|factory| factory.as_ref())
    }

    /// A configuration loader that resolves calls against this registry.
    pub fn loader(&self) -> ConfigLoader {
        ConfigLoader::new(self.functions.clone())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut plugins: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        plugins.sort_unstable();
        f.debug_struct("Registry")
            .field("functions", &self.functions.names().len())
            .field("plugins", &plugins)
            .finish()
    }
}
