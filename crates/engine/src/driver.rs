//! The render loop: entities in, pages out.

use crate::compose::{ComposedPage, DocumentBuild, ScheduledAppend, compose};
use crate::datablock::{block_record, placed_fields};
use crate::error::ComposeError;
use crate::field::{FieldContext, FieldRenderer};
use crate::flextable::{self, TableLayout};
use crate::grid::{self, GridStep};
use crate::registry::Registry;
use crate::resolver::{PageImage, TemplateResolver};
use crate::session::Session;
use log::{debug, info, warn};
use quire_config::{
    AllPagesOrder, AppendNumbering, ConfigError, DataGrid, DocumentConfig, FieldDefinition,
    FillEmpty, FontSpec, Margins,
};
use quire_expr::{EvaluationContext, evaluate_as_bool};
use quire_pdf_composer::page_count;
use quire_render_core::DrawingBackend;
use quire_render_core::metrics::ASCENT;
use quire_source::DataSource;
use quire_traits::{InMemoryResourceProvider, ResourceProvider};
use quire_types::{HAlign, Orientation, ScopeId, Size, SourceName, TemplateHandle};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

/// A grid or table that could not show all of its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruncatedGrid {
    /// 0-based index of the entity being rendered.
    pub entity: usize,
    pub page: String,
    pub grid: String,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSummary {
    pub entities: usize,
    /// Pages drawn by the engine, appended pages excluded.
    pub pages: usize,
    pub appended_pages: usize,
    /// Page definitions skipped because their explicit template was missing.
    pub skipped_pages: usize,
    pub truncated_grids: Vec<TruncatedGrid>,
    /// Non-fatal errors recorded so far.
    pub recorded_errors: usize,
}

/// Builds a [`Renderer`] from a configuration and its surroundings.
pub struct RendererBuilder {
    registry: Registry,
    provider: Arc<dyn ResourceProvider>,
    params: HashMap<String, Value>,
    config: Option<(DocumentConfig, String)>,
}

impl Default for RendererBuilder {
    fn default() -> Self {
        Self {
            registry: Registry::new(),
            provider: Arc::new(InMemoryResourceProvider::new()),
            params: HashMap::new(),
            config: None,
        }
    }
}

impl RendererBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Functions and plugins. Set this before loading a configuration from
    /// source so custom functions resolve.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Where template PDFs, images and imported configurations come from.
    pub fn with_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Overrides a user parameter in every configuration scope.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_config(mut self, config: DocumentConfig, name: &str) -> Self {
        self.config = Some((config, name.to_string()));
        self
    }

    /// Parses a configuration held in memory.
    pub fn with_config_source(mut self, source: &str, name: &str) -> Result<Self, ComposeError> {
        let config = self.registry.loader().load_named(source, name)?;
        self.config = Some((config, name.to_string()));
        Ok(self)
    }

    /// Loads a configuration by name through the provider.
    pub fn with_config_resource(mut self, name: &str) -> Result<Self, ComposeError> {
        let config = self
            .registry
            .loader()
            .load_resource(self.provider.as_ref(), name)?;
        self.config = Some((config, name.to_string()));
        Ok(self)
    }

    /// Composes the configuration with its imports and binds the backend.
    pub fn build<B: DrawingBackend>(self, backend: B) -> Result<Renderer<B>, ComposeError> {
        let (mut config, name) = self
            .config
            .ok_or_else(|| ConfigError::NoContent("<no configuration>".to_string()))?;
        config.user_params.extend(self.params.clone());
        let build = compose(config, &name, &self.registry.loader(), self.provider.as_ref())?;

        let root_params = build
            .root()
            .map(|s| s.config.user_params.clone())
            .unwrap_or_default();
        let mut resolver = TemplateResolver::new();
        let mut params = Vec::with_capacity(build.scopes.len());
        for scope in &build.scopes {
            let mut scope_params = root_params.clone();
            if !scope.id.is_root() {
                scope_params.extend(scope.config.user_params.clone());
                scope_params.extend(self.params.clone());
            }
            resolver.add_scope(scope.id, scope.config.template_files.clone(), scope_params.clone());
            params.push(scope_params);
        }

        Ok(Renderer {
            build,
            registry: self.registry,
            session: Session::new(self.provider),
            resolver,
            params,
            backend,
            summary: RenderSummary::default(),
            started: false,
        })
    }
}

pub struct Renderer<B: DrawingBackend> {
    build: DocumentBuild,
    registry: Registry,
    session: Session,
    resolver: TemplateResolver,
    /// User parameters per scope, indexed by scope id.
    params: Vec<HashMap<String, Value>>,
    backend: B,
    summary: RenderSummary,
    started: bool,
}

impl<B: DrawingBackend> Renderer<B> {
    pub fn builder() -> RendererBuilder {
        RendererBuilder::new()
    }

    /// Renders every entity the source yields.
    pub fn render(&mut self, source: &mut dyn DataSource) -> Result<(), ComposeError> {
        match source.size_hint() {
            Some(n) => info!("Rendering {} entities", n),
            None => info!("Rendering entities from a streaming source"),
        }
        while let Some(entity) = source.next() {
            self.render_entity(&entity)?;
        }
        info!(
            "Rendered {} entities into {} pages ({} appended)",
            self.summary.entities, self.summary.pages, self.summary.appended_pages
        );
        Ok(())
    }

    /// Renders the full page sequence for one entity.
    pub fn render_entity(&mut self, entity: &Value) -> Result<(), ComposeError> {
        let root = self
            .build
            .root()
            .map(|s| Arc::clone(&s.config))
            .ok_or_else(|| ConfigError::NoContent("<empty build>".to_string()))?;
        if !self.started {
            if !root.charset_is_native() {
                warn!("Charset '{}' is ignored, text is written as WinAnsi", root.charset);
            }
            self.backend.set_document_info(&root.info);
            self.backend.set_protection(root.protection.as_deref());
            self.started = true;
        }
        self.resolver.reset();

        let index = self.summary.entities;
        let mut pass = EntityPass {
            build: &self.build,
            root: &root,
            registry: &self.registry,
            params: &self.params,
            session: &mut self.session,
            resolver: &mut self.resolver,
            backend: &mut self.backend,
            summary: &mut self.summary,
            entity: index,
            counter: 0,
            own_counters: HashMap::new(),
        };
        let result = pass.run(entity);
        self.summary.recorded_errors = self.session.errors().len();
        result?;
        self.summary.entities += 1;
        Ok(())
    }

    /// Serializes the output document.
    pub fn finish(&mut self) -> Result<Vec<u8>, ComposeError> {
        info!("Finishing document with {} pages", self.backend.page_count());
        Ok(self.backend.output()?)
    }

    pub fn summary(&self) -> &RenderSummary {
        &self.summary
    }

    /// The most recent non-fatal error.
    pub fn last_error(&self) -> Option<&ComposeError> {
        self.session.errors().last()
    }

    pub fn errors(&self) -> &[ComposeError] {
        self.session.errors().entries()
    }

    pub fn document(&self) -> &DocumentBuild {
        &self.build
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

/// The physical-page settings of one page definition for one entity.
struct PageFrame<'p> {
    page: &'p ComposedPage,
    record: &'p Value,
    params: &'p HashMap<String, Value>,
    font: FontSpec,
    margins: Margins,
    size: Size,
    orientation: Orientation,
    template: Option<TemplateHandle>,
    paginate: bool,
}

impl PageFrame<'_> {
    fn field_context<'a>(&'a self, record: &'a Value) -> FieldContext<'a> {
        FieldContext {
            record,
            params: self.params,
            font: &self.font,
            page_size: self.size,
            margins: self.margins,
            orientation: self.orientation,
        }
    }
}

/// State of one entity's render pass.
struct EntityPass<'r> {
    build: &'r DocumentBuild,
    root: &'r DocumentConfig,
    registry: &'r Registry,
    params: &'r [HashMap<String, Value>],
    session: &'r mut Session,
    resolver: &'r mut TemplateResolver,
    backend: &'r mut dyn DrawingBackend,
    summary: &'r mut RenderSummary,
    entity: usize,
    /// Global page counter of the entity.
    counter: u32,
    own_counters: HashMap<ScopeId, u32>,
}

impl EntityPass<'_> {
    fn run(&mut self, entity: &Value) -> Result<(), ComposeError> {
        let build = self.build;
        for append in build.appends_after(None) {
            self.append(append)?;
        }
        for (index, page) in build.pages.iter().enumerate() {
            self.page(page, entity)?;
            for append in build.appends_after(Some(index)) {
                self.append(append)?;
            }
        }
        Ok(())
    }

    fn page(&mut self, page: &ComposedPage, entity: &Value) -> Result<(), ComposeError> {
        let def = &page.definition;
        if def.hide {
            debug!("Page '{}' is hidden", def.name);
            return Ok(());
        }
        let build = self.build;
        let record = build.record_for(page, entity);
        let all_params = self.params;
        let params = all_params
            .get(page.scope.0 as usize)
            .ok_or_else(|| ConfigError::NoContent(format!("unknown {}", page.scope)))?;

        if let Some(condition) = &def.condition {
            let e_ctx = EvaluationContext::new(&record, params, self.registry.functions());
            match evaluate_as_bool(condition, &e_ctx) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Page '{}' excluded by its condition", def.name);
                    return Ok(());
                }
                Err(source) => {
                    self.session.errors_mut().record(ComposeError::Expression {
                        field: def.name.clone(),
                        source,
                    });
                    return Ok(());
                }
            }
        }

        let image = match &def.template {
            Some(explicit) => match self.resolver.explicit(explicit, self.session) {
                Ok(image) => Some(image),
                Err(e) => {
                    self.session.errors_mut().record(e);
                    self.summary.skipped_pages += 1;
                    return Ok(());
                }
            },
            None => self
                .resolver
                .next_template_page(page.scope, self.session, self.registry.functions()),
        };

        let scope_config = build
            .scope(page.scope)
            .map(|s| s.config.as_ref())
            .unwrap_or(self.root);
        let orientation = image
            .as_ref()
            .map(|i| i.orientation)
            .or(def.orientation)
            .unwrap_or(self.root.page_setup.orientation);
        let size = match &image {
            Some(i) => i.size,
            None => scope_config.page_setup.size_for(orientation),
        };
        let template = match &image {
            Some(image) => self.import_template(image)?,
            None => None,
        };
        let frame = PageFrame {
            page,
            record: &record,
            params,
            font: def.font.apply_to(&scope_config.font),
            margins: scope_config.margins,
            size: orientation.apply(size),
            orientation,
            template,
            paginate: self.root.pagination.is_some()
                && !def.no_pagination
                && image.as_ref().is_none_or(|i| i.paginate),
        };
        debug!(
            "Page '{}' ({}) with template {:?}",
            def.name,
            page.scope,
            image.as_ref().map(|i| (i.source.as_str(), i.page))
        );

        self.start_page(&frame)?;
        let paging_grid = def.grid_page.as_deref();
        for grid in def.grids.iter().filter(|g| Some(g.name.as_str()) != paging_grid) {
            self.grid(grid, &frame, false)?;
        }
        for table in &def.flex_tables {
            self.flex_table(table, &frame)?;
        }
        for block in &def.data_blocks {
            let definition = scope_config
                .block_defs
                .get(&block.name)
                .or_else(|| self.root.block_defs.get(&block.name));
            let Some(definition) = definition else {
                warn!("Data block '{}' has no definition", block.name);
                continue;
            };
            let data = match block_record(block, &record, params, self.registry.functions()) {
                Ok(Some(data)) => data,
                Ok(None) => continue,
                Err(e) => {
                    self.session.errors_mut().absorb(Err(e))?;
                    continue;
                }
            };
            let ctx = frame.field_context(&data);
            for field in placed_fields(block, definition) {
                self.record_field(&field, &ctx)?;
            }
        }
        if let Some(grid) = paging_grid.and_then(|name| def.grid(name)) {
            self.grid(grid, &frame, true)?;
        }
        self.footer(&frame)
    }

    /// Imports the template page into the output. A source that cannot be
    /// read leaves the page without a background.
    fn import_template(&mut self, image: &PageImage) -> Result<Option<TemplateHandle>, ComposeError> {
        let document = match self.session.document(&image.source) {
            Ok(document) => document,
            Err(e) => {
                self.session.errors_mut().record(e);
                return Ok(None);
            }
        };
        Ok(Some(self.backend.import_page(&image.source, &document, image.page)?))
    }

    /// Starts a physical page and draws everything that repeats on each
    /// continuation page: background, all-pages fields and own fields.
    fn start_page(&mut self, frame: &PageFrame) -> Result<(), ComposeError> {
        let def = &frame.page.definition;
        self.backend.add_page(frame.size, frame.orientation)?;
        self.counter += 1;
        if def.own_numbering {
            match self.own_counters.entry(frame.page.scope) {
                Entry::Vacant(slot) => {
                    slot.insert(def.start_number);
                }
                Entry::Occupied(mut slot) => *slot.get_mut() += 1,
            }
        }
        self.summary.pages += 1;
        if let Some(handle) = frame.template {
            self.backend.use_template(handle)?;
        }

        let ctx = frame.field_context(frame.record);
        let build = self.build;
        if self.root.all_pages.order == AllPagesOrder::Before {
            self.fields(build.all_pages.iter().map(|(_, f)| f), &ctx)?;
        }
        self.fields(def.fields.iter(), &ctx)?;
        for offset in &def.repeats {
            for field in &def.fields {
                self.record_field(&field.offset(offset.x, offset.y), &ctx)?;
            }
        }
        if self.root.all_pages.order == AllPagesOrder::After {
            self.fields(build.all_pages.iter().map(|(_, f)| f), &ctx)?;
        }
        Ok(())
    }

    fn fields<'f>(
        &mut self,
        fields: impl Iterator<Item = &'f FieldDefinition>,
        ctx: &FieldContext,
    ) -> Result<(), ComposeError> {
        for field in fields {
            self.record_field(field, ctx)?;
        }
        Ok(())
    }

    /// Draws `field` with its value taken from the context record.
    fn record_field(&mut self, field: &FieldDefinition, ctx: &FieldContext) -> Result<(), ComposeError> {
        let result = FieldRenderer::new(&mut *self.backend, &mut *self.session, self.registry)
            .draw_from_record(field, ctx);
        self.session.errors_mut().absorb(result)
    }

    fn field(&mut self, field: &FieldDefinition, value: &Value, ctx: &FieldContext) -> Result<(), ComposeError> {
        let result = FieldRenderer::new(&mut *self.backend, &mut *self.session, self.registry)
            .draw(field, value, ctx);
        self.session.errors_mut().absorb(result)
    }

    fn footer(&mut self, frame: &PageFrame) -> Result<(), ComposeError> {
        let Some(pagination) = self.root.pagination.as_ref().filter(|_| frame.paginate) else {
            return Ok(());
        };
        let number = if frame.page.definition.own_numbering {
            self.own_counters
                .get(&frame.page.scope)
                .copied()
                .unwrap_or(self.counter)
        } else {
            self.counter
        };
        let text = pagination.render(number);
        let saved = self.backend.graphics_state();
        self.backend
            .set_font(&self.root.font.name, Default::default(), pagination.font_size);
        self.backend.set_text_color(self.root.font.color);
        let width = self.backend.text_width(&text);
        let left = frame.margins.left;
        let right = frame.size.width - frame.margins.right;
        let x = match pagination.align {
            HAlign::Left | HAlign::Justify => left,
            HAlign::Center => left + (right - left - width) / 2.0,
            HAlign::Right => right - width,
        };
        let y = frame.size.height - frame.margins.bottom / 2.0 + pagination.font_size * (ASCENT - 0.5);
        let result = self.backend.draw_text(x, y, &text);
        self.backend.restore_graphics_state(&saved);
        Ok(result?)
    }

    fn grid(&mut self, grid: &DataGrid, frame: &PageFrame, paginate: bool) -> Result<(), ComposeError> {
        let records = match grid::records(grid, frame.record, frame.params, self.registry.functions()) {
            Ok(records) => records,
            Err(e) => return self.session.errors_mut().absorb(Err(e)),
        };
        let plan = grid::plan(grid, records.len(), paginate);
        debug!(
            "Grid '{}': {} records, {} page breaks",
            grid.name,
            records.len(),
            plan.page_breaks()
        );
        if plan.dropped > 0 {
            warn!(
                "Grid '{}' on page '{}' is full, {} records dropped",
                grid.name, frame.page.definition.name, plan.dropped
            );
            self.truncated(frame, &grid.name, plan.dropped);
        }

        let segments = grid::segments(grid);
        for step in &plan.steps {
            match *step {
                GridStep::Draw {
                    record,
                    segment,
                    slot,
                } => {
                    let (dx, dy) = grid::slot_offset(grid, slot);
                    let row = &records[record];
                    let ctx = frame.field_context(row);
                    for field in grid::segment_fields(grid, &segments[segment]) {
                        let value = grid::cell_value(field, row);
                        self.field(&field.offset(dx, dy), &value, &ctx)?;
                    }
                }
                GridStep::NewPage => {
                    self.footer(frame)?;
                    self.start_page(frame)?;
                }
                GridStep::Placeholder { segment, slot } => {
                    let (dx, dy) = grid::slot_offset(grid, slot);
                    let ctx = frame.field_context(frame.record);
                    for field in grid::segment_fields(grid, &segments[segment]) {
                        let policy = match &field.fill_empty {
                            FillEmpty::None => FillEmpty::Line,
                            other => other.clone(),
                        };
                        let placed = field.offset(dx, dy);
                        let result = FieldRenderer::new(&mut *self.backend, &mut *self.session, self.registry)
                            .draw_placeholder(&placed, &policy, &ctx);
                        self.session.errors_mut().absorb(result)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn flex_table(&mut self, table: &quire_config::FlexTable, frame: &PageFrame) -> Result<(), ComposeError> {
        let rows = match flextable::rows(table, frame.record, frame.params, self.registry.functions()) {
            Ok(rows) => rows,
            Err(e) => return self.session.errors_mut().absorb(Err(e)),
        };
        let layout = TableLayout {
            page_size: frame.size,
            margins: frame.margins,
            font: &frame.font,
        };
        let outcome = flextable::render(&mut *self.backend, table, &rows, &layout)?;
        if outcome.dropped > 0 {
            self.truncated(frame, &table.name, outcome.dropped);
        }
        Ok(())
    }

    fn truncated(&mut self, frame: &PageFrame, grid: &str, dropped: usize) {
        self.summary.truncated_grids.push(TruncatedGrid {
            entity: self.entity,
            page: frame.page.definition.name.clone(),
            grid: grid.to_string(),
            dropped,
        });
    }

    /// Copies every page of an external document into the output.
    fn append(&mut self, append: &ScheduledAppend) -> Result<(), ComposeError> {
        let source = SourceName::from(append.src.as_str());
        let document = match self.session.document(&source) {
            Ok(document) => document,
            Err(e) => {
                self.session.errors_mut().record(e);
                return Ok(());
            }
        };
        let count = page_count(&document);
        for page in 1..=count as u32 {
            self.backend.append_page(&source, &document, page)?;
        }
        self.summary.appended_pages += count;
        if append.numbering == AppendNumbering::Inherit {
            self.counter += count as u32;
        }
        debug!("Appended {} pages of '{}'", count, source);
        Ok(())
    }
}
