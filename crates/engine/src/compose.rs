//! Flattens a configuration and its imports into one ordered page list.
//!
//! Every configuration taking part gets a scope. Pages keep the scope they
//! came from so they resolve templates, parameters and block definitions
//! against their own configuration, and read their data from the scope's
//! sub-record of the entity.

use log::{debug, warn};
use quire_config::{
    AppendDirective, AppendNumbering, ConfigError, ConfigLoader, DocumentConfig, FieldDefinition,
    ImportDirective, PageDefinition, PageEntry,
};
use quire_traits::ResourceProvider;
use quire_types::ScopeId;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Deepest allowed chain of nested imports.
pub const MAX_IMPORT_DEPTH: usize = 16;

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub name: String,
    pub config: Arc<DocumentConfig>,
    /// Key path of the scope's record inside the entity record.
    pub datasub: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ComposedPage {
    pub scope: ScopeId,
    /// 1-based position among the pages of its own configuration.
    pub index_in_scope: usize,
    pub definition: PageDefinition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledAppend {
    pub src: String,
    /// Index of the composed page the document follows; `None` puts it
    /// before the first page.
    pub after: Option<usize>,
    pub numbering: AppendNumbering,
}

#[derive(Debug, Default)]
pub struct DocumentBuild {
    pub scopes: Vec<Scope>,
    pub pages: Vec<ComposedPage>,
    pub all_pages: Vec<(ScopeId, FieldDefinition)>,
    pub appends: Vec<ScheduledAppend>,
}

impl DocumentBuild {
    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    pub fn root(&self) -> Option<&Scope> {
        self.scopes.first()
    }

    pub fn appends_after(&self, page: Option<usize>) -> impl Iterator<Item = &ScheduledAppend> {
        self.appends.iter().filter(move |a| a.after == page)
    }

    /// The record `page` renders: the scope's sub-record of `entity`, with a
    /// `_page<N>` object merged over it when present.
    pub fn record_for(&self, page: &ComposedPage, entity: &Value) -> Value {
        let scoped = self
            .scope(page.scope)
            .map(|scope| sub_record(entity, &scope.datasub))
            .unwrap_or_else(|| entity.clone());
        let key = format!("_page{}", page.index_in_scope);
        match scoped.get(&key) {
            Some(Value::Object(overlay)) => merge(scoped.clone(), overlay),
            _ => scoped,
        }
    }
}

fn sub_record(entity: &Value, path: &[String]) -> Value {
    let mut current = entity;
    for key in path {
        let next = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            other => other.get(key),
        };
        match next {
            Some(v) => current = v,
            None => {
                debug!("Data path '{}' not present in record", path.join("."));
                return Value::Object(Map::new());
            }
        }
    }
    current.clone()
}

fn merge(base: Value, overlay: &Map<String, Value>) -> Value {
    match base {
        Value::Object(mut map) => {
            for (k, v) in overlay {
                map.insert(k.clone(), v.clone());
            }
            Value::Object(map)
        }
        _ => Value::Object(overlay.clone()),
    }
}

#[derive(Debug)]
struct PendingAppend {
    directive: AppendDirective,
    scope: ScopeId,
    preceding: Option<usize>,
}

struct Composer<'a> {
    loader: &'a ConfigLoader,
    provider: &'a dyn ResourceProvider,
    build: DocumentBuild,
    pending: Vec<PendingAppend>,
    chain: Vec<String>,
}

/// Composes `root` (named `name` in diagnostics) and everything it imports.
pub fn compose(
    root: DocumentConfig,
    name: &str,
    loader: &ConfigLoader,
    provider: &dyn ResourceProvider,
) -> Result<DocumentBuild, ConfigError> {
    let mut composer = Composer {
        loader,
        provider,
        build: DocumentBuild::default(),
        pending: Vec::new(),
        chain: Vec::new(),
    };
    composer.scope(Arc::new(root), name, Vec::new())?;
    let Composer {
        mut build, pending, ..
    } = composer;

    let appends = pending
        .into_iter()
        .map(|p| ScheduledAppend {
            after: resolve_after(&build, &p),
            src: p.directive.src,
            numbering: p.directive.numbering,
        })
        .collect();
    build.appends = appends;

    if !build.pages.iter().any(|p| p.definition.has_content()) {
        return Err(ConfigError::NoContent(name.to_string()));
    }
    debug!(
        "Composed '{}': {} scopes, {} pages, {} appends",
        name,
        build.scopes.len(),
        build.pages.len(),
        build.appends.len()
    );
    Ok(build)
}

fn resolve_after(build: &DocumentBuild, pending: &PendingAppend) -> Option<usize> {
    let Some(target) = &pending.directive.after else {
        return pending.preceding;
    };
    let named = |same_scope: bool| {
        build.pages.iter().position(|p| {
            p.definition.name == *target && (!same_scope || p.scope == pending.scope)
        })
    };
    named(true).or_else(|| named(false)).or_else(|| {
        warn!(
            "Append of '{}' names unknown page '{}', keeping its position",
            pending.directive.src, target
        );
        pending.preceding
    })
}

impl Composer<'_> {
    fn scope(
        &mut self,
        config: Arc<DocumentConfig>,
        name: &str,
        datasub: Vec<String>,
    ) -> Result<(), ConfigError> {
        let id = ScopeId(self.build.scopes.len() as u32);
        self.build.scopes.push(Scope {
            id,
            name: name.to_string(),
            config: Arc::clone(&config),
            datasub: datasub.clone(),
        });
        self.build
            .all_pages
            .extend(config.all_pages.fields.iter().map(|f| (id, f.clone())));
        self.chain.push(name.to_string());

        let mut index_in_scope = 0;
        for entry in &config.entries {
            match entry {
                PageEntry::Page(page) => {
                    index_in_scope += 1;
                    self.build.pages.push(ComposedPage {
                        scope: id,
                        index_in_scope,
                        definition: page.clone(),
                    });
                }
                PageEntry::Import(import) => self.import(import, &datasub)?,
                PageEntry::Append(append) => self.pending.push(PendingAppend {
                    directive: append.clone(),
                    scope: id,
                    preceding: self.build.pages.len().checked_sub(1),
                }),
            }
        }
        for import in &config.imports {
            self.import(import, &datasub)?;
        }

        self.chain.pop();
        Ok(())
    }

    fn import(&mut self, import: &ImportDirective, parent_sub: &[String]) -> Result<(), ConfigError> {
        if self.chain.len() >= MAX_IMPORT_DEPTH || self.chain.iter().any(|n| *n == import.src) {
            return Err(ConfigError::ImportDepth(import.src.clone()));
        }
        let child = self.loader.load_resource(self.provider, &import.src)?;
        let mut datasub = parent_sub.to_vec();
        if let Some(sub) = &import.datasub {
            datasub.extend(sub.split('.').filter(|s| !s.is_empty()).map(String::from));
        }
        debug!("Importing '{}' at depth {}", import.src, self.chain.len());
        self.scope(Arc::new(child), &import.src, datasub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_traits::InMemoryResourceProvider;
    use serde_json::json;

    const ROOT: &str = r#"<document>
      <allpages><field name="stamp" value="X" x="1" y="1"/></allpages>
      <pages>
        <page name="first"><field name="a" x="10" y="10"/></page>
        <appendpdf src="terms.pdf"/>
        <importdef src="child.xml" datasub="annex"/>
        <page name="last"><field name="b" x="10" y="10"/></page>
        <appendpdf src="late.pdf" after="first" numbering="inherit"/>
      </pages>
    </document>"#;

    const CHILD: &str = r#"<document>
      <allpages><field name="mark" value="C" x="1" y="1"/></allpages>
      <pages>
        <page name="c1"><field name="x" x="1" y="1"/></page>
        <page name="c2"><field name="y" x="1" y="1"/></page>
      </pages>
    </document>"#;

    fn build(root: &str, provider: &InMemoryResourceProvider) -> Result<DocumentBuild, ConfigError> {
        let loader = ConfigLoader::default();
        let config = loader.load_named(root, "root.xml")?;
        compose(config, "root.xml", &loader, provider)
    }

    #[test]
    fn test_imports_are_spliced_in_order() {
        let provider = InMemoryResourceProvider::new().with("child.xml", CHILD);
        let b = build(ROOT, &provider).unwrap();
        let names: Vec<(&str, u32, usize)> = b
            .pages
            .iter()
            .map(|p| (p.definition.name.as_str(), p.scope.0, p.index_in_scope))
            .collect();
        assert_eq!(
            names,
            vec![("first", 0, 1), ("c1", 1, 1), ("c2", 1, 2), ("last", 0, 2)]
        );
        assert_eq!(b.scopes[1].datasub, vec!["annex".to_string()]);
        assert_eq!(b.all_pages.len(), 2);
        assert_eq!(b.all_pages[1].0, ScopeId(1));
    }

    #[test]
    fn test_appends_are_scheduled() {
        let provider = InMemoryResourceProvider::new().with("child.xml", CHILD);
        let b = build(ROOT, &provider).unwrap();
        assert_eq!(
            b.appends,
            vec![
                ScheduledAppend {
                    src: "terms.pdf".into(),
                    after: Some(0),
                    numbering: AppendNumbering::None,
                },
                ScheduledAppend {
                    src: "late.pdf".into(),
                    after: Some(0),
                    numbering: AppendNumbering::Inherit,
                },
            ]
        );
        assert_eq!(b.appends_after(Some(0)).count(), 2);
        assert_eq!(b.appends_after(None).count(), 0);
    }

    #[test]
    fn test_import_cycle_is_rejected() {
        let looping = r#"<document><pages>
            <page name="p"><field name="a" x="1" y="1"/></page>
            <importdef src="loop.xml"/>
        </pages></document>"#;
        let provider = InMemoryResourceProvider::new().with("loop.xml", looping);
        let err = build(looping, &provider).unwrap_err();
        assert!(matches!(err, ConfigError::ImportDepth(_)));
    }

    #[test]
    fn test_missing_import_is_config_error() {
        let err = build(ROOT, &InMemoryResourceProvider::new()).unwrap_err();
        assert!(matches!(err, ConfigError::Resource(_)));
    }

    #[test]
    fn test_build_without_content_is_rejected() {
        let loader = ConfigLoader::default();
        let provider = InMemoryResourceProvider::new();
        let err = compose(DocumentConfig::default(), "blank", &loader, &provider).unwrap_err();
        assert!(matches!(err, ConfigError::NoContent(ref name) if name == "blank"));
    }

    #[test]
    fn test_record_routing() {
        let provider = InMemoryResourceProvider::new().with("child.xml", CHILD);
        let b = build(ROOT, &provider).unwrap();
        let entity = json!({
            "a": 1,
            "annex": { "x": "child", "_page2": { "y": "only on c2" } },
            "_page2": { "b": "routed" }
        });
        assert_eq!(b.record_for(&b.pages[0], &entity)["a"], 1);
        assert_eq!(b.record_for(&b.pages[1], &entity)["x"], "child");
        assert_eq!(b.record_for(&b.pages[2], &entity)["y"], "only on c2");
        assert_eq!(b.record_for(&b.pages[3], &entity)["b"], "routed");
        assert!(b.record_for(&b.pages[1], &json!({}))["x"].is_null());
    }
}
