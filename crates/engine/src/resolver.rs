//! Chooses the source PDF page that becomes the background of each output page.
//!
//! Every configuration scope owns an ordered list of template files. The
//! resolver walks that list with a cursor, expanding each file into its pages
//! the first time the cursor reaches it. Missing files are skipped with a
//! recorded notice; once the list is exhausted pages get no background.

use crate::error::ComposeError;
use crate::session::Session;
use log::{debug, warn};
use quire_config::{TemplateFileRef, TemplateOverride, TemplateSource};
use quire_expr::{EvaluationContext, FunctionRegistry, evaluate_as_string};
use quire_types::{Orientation, ScopeId, Size, SourceName};
use serde_json::Value;
use std::collections::HashMap;

/// One resolved template page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub source: SourceName,
    /// 1-based page number inside `source`.
    pub page: u32,
    pub orientation: Orientation,
    pub size: Size,
    /// `false` when the owning template file suppresses page numbers.
    pub paginate: bool,
}

#[derive(Debug)]
struct ScopeTemplates {
    files: Vec<TemplateFileRef>,
    params: HashMap<String, Value>,
    /// Expanded pages per file; `None` until the cursor first reaches it.
    expanded: Vec<Option<Vec<PageImage>>>,
    file: usize,
    page: usize,
}

impl ScopeTemplates {
    fn rewind(&mut self) {
        self.file = 0;
        self.page = 0;
    }
}

#[derive(Debug, Default)]
pub struct TemplateResolver {
    scopes: HashMap<ScopeId, ScopeTemplates>,
}

impl TemplateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the template queue of a configuration scope. `params` are the
    /// user parameters visible to template name expressions.
    pub fn add_scope(
        &mut self,
        scope: ScopeId,
        files: Vec<TemplateFileRef>,
        params: HashMap<String, Value>,
    ) {
        let expanded = vec![None; files.len()];
        self.scopes.insert(
            scope,
            ScopeTemplates {
                files,
                params,
                expanded,
                file: 0,
                page: 0,
            },
        );
    }

    /// Moves every cursor back to the first template page. Expanded file
    /// lists are kept.
    pub fn reset(&mut self) {
        self.scopes.values_mut().for_each(ScopeTemplates::rewind);
    }

    /// Next template page of `scope`, or `None` once its files are exhausted.
    pub fn next_template_page(
        &mut self,
        scope: ScopeId,
        session: &mut Session,
        functions: &FunctionRegistry,
    ) -> Option<PageImage> {
        let state = self.scopes.get_mut(&scope)?;
        while state.file < state.files.len() {
            if state.expanded[state.file].is_none() {
                let pages = expand_file(&state.files[state.file], &state.params, session, functions);
                state.expanded[state.file] = Some(pages);
            }
            let pages = state.expanded[state.file].as_deref().unwrap_or_default();
            if let Some(image) = pages.get(state.page) {
                state.page += 1;
                return Some(image.clone());
            }
            state.file += 1;
            state.page = 0;
        }
        None
    }

    /// Resolves an explicit per-page template. The shared cursors are not
    /// touched.
    pub fn explicit(
        &self,
        template: &TemplateOverride,
        session: &mut Session,
    ) -> Result<PageImage, ComposeError> {
        let source = SourceName::from(template.src.as_str());
        page_image(session, &source, template.page, true).map_err(|e| {
            debug!("Explicit template '{}' page {} unavailable: {}", source, template.page, e);
            ComposeError::TemplateNotFound {
                path: format!("{}#{}", source, template.page),
            }
        })
    }
}

fn page_image(
    session: &mut Session,
    source: &SourceName,
    page: u32,
    paginate: bool,
) -> Result<PageImage, ComposeError> {
    let geometry = session.geometry(source, page)?;
    let orientation = if geometry.is_landscape() {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    };
    Ok(PageImage {
        source: source.clone(),
        page,
        orientation,
        size: Size::new(geometry.width(), geometry.height()),
        paginate,
    })
}

fn file_name(
    file: &TemplateFileRef,
    params: &HashMap<String, Value>,
    functions: &FunctionRegistry,
) -> Option<String> {
    match &file.src {
        TemplateSource::Literal(name) => Some(name.clone()),
        TemplateSource::Expression(expr) => {
            let node = Value::Null;
            let e_ctx = EvaluationContext::new(&node, params, functions);
            match evaluate_as_string(expr, &e_ctx) {
                Ok(name) if !name.trim().is_empty() => Some(name.trim().to_string()),
                Ok(_) => None,
                Err(e) => {
                    warn!("Template file expression failed: {}", e);
                    None
                }
            }
        }
    }
}

/// Expands one template file into its page images. A missing file expands to
/// nothing and records a notice.
fn expand_file(
    file: &TemplateFileRef,
    params: &HashMap<String, Value>,
    session: &mut Session,
    functions: &FunctionRegistry,
) -> Vec<PageImage> {
    let Some(name) = file_name(file, params, functions) else {
        session.errors_mut().record(ComposeError::TemplateNotFound {
            path: "<empty template name>".to_string(),
        });
        return Vec::new();
    };
    let source = SourceName::from(name);
    let count = match session.page_count(&source) {
        Ok(count) => count as u32,
        Err(e) => {
            session.errors_mut().record(e);
            return Vec::new();
        }
    };

    let numbers: Vec<u32> = match &file.pages {
        Some(list) => list
            .iter()
            .copied()
            .filter(|&n| {
                let in_range = n >= 1 && n <= count;
                if !in_range {
                    warn!("Template '{}' has no page {} ({} pages), skipping", source, n, count);
                }
                in_range
            })
            .collect(),
        None => (1..=count).collect(),
    };

    let mut pages = Vec::with_capacity(numbers.len());
    for n in numbers {
        match page_image(session, &source, n, file.paginate) {
            Ok(image) => pages.push(image),
            Err(e) => session.errors_mut().record(e),
        }
    }
    debug!("Template '{}' expanded to {} pages", source, pages.len());
    pages
}
