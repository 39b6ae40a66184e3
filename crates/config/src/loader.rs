use crate::error::ConfigError;
use crate::model::DocumentConfig;
use crate::parser::ConfigParser;
use log::debug;
use quire_expr::FunctionRegistry;
use quire_traits::ResourceProvider;

/// Loads configurations, resolving expression functions against one registry.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    functions: FunctionRegistry,
}

impl ConfigLoader {
    pub fn new(functions: FunctionRegistry) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Parses a configuration held in memory.
    pub fn load(&self, source: &str) -> Result<DocumentConfig, ConfigError> {
        self.load_named(source, "<inline>")
    }

    /// Parses a configuration, naming it `name` in diagnostics.
    pub fn load_named(&self, source: &str, name: &str) -> Result<DocumentConfig, ConfigError> {
        let config = ConfigParser::new(&self.functions, name).parse(source)?;
        if !config.has_drawable_page() && !config.has_imports() {
            return Err(ConfigError::NoContent(name.to_string()));
        }
        Ok(config)
    }

    /// Loads a configuration by name through a resource provider.
    pub fn load_resource(
        &self,
        provider: &dyn ResourceProvider,
        name: &str,
    ) -> Result<DocumentConfig, ConfigError> {
        debug!("Loading configuration '{}' via {}", name, provider.name());
        let text = provider.load_text(name)?;
        self.load_named(&text, name)
    }
}

/// Parses a configuration with the built-in function registry.
pub fn load(source: &str) -> Result<DocumentConfig, ConfigError> {
    ConfigLoader::default().load(source)
}
