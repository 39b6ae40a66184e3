use crate::helpers::{self, fill_color_op, matrix_op, rect_op, rotation_matrix, stroke_color_op};
use crate::images::{self, ImageXObject};
use crate::symbols;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use quire_pdf_composer::{self as composer, ComposerError, FormXObject, IdMap};
use quire_render_core::utils::get_styled_font_name;
use quire_render_core::{DrawingBackend, FontSelection, GraphicsState, PaintMode, RenderError, metrics};
use quire_types::{
    BarcodeKind, Color, DocumentInfo, FontStyle, Orientation, Point, QrLevel, Rect, Size,
    SourceName, TemplateHandle,
};
use std::collections::{BTreeMap, HashMap};

const PRODUCER: &str = "quire";

/// Operations and resources of the page being drawn.
struct PageBuilder {
    size: Size,
    operations: Vec<Operation>,
    fonts: BTreeMap<String, ObjectId>,
    xobjects: BTreeMap<String, ObjectId>,
    ext_gstates: BTreeMap<String, ObjectId>,
}

impl PageBuilder {
    fn new(size: Size) -> Self {
        Self {
            size,
            operations: Vec::new(),
            fonts: BTreeMap::new(),
            xobjects: BTreeMap::new(),
            ext_gstates: BTreeMap::new(),
        }
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    fn resources(&self) -> Dictionary {
        fn named(map: &BTreeMap<String, ObjectId>) -> Dictionary {
            let mut dict = Dictionary::new();
            for (name, id) in map {
                dict.set(name.as_bytes().to_vec(), Object::Reference(*id));
            }
            dict
        }
        let mut resources = Dictionary::new();
        if !self.fonts.is_empty() {
            resources.set("Font", named(&self.fonts));
        }
        if !self.xobjects.is_empty() {
            resources.set("XObject", named(&self.xobjects));
        }
        if !self.ext_gstates.is_empty() {
            resources.set("ExtGState", named(&self.ext_gstates));
        }
        resources
    }
}

/// A [`DrawingBackend`] that builds a PDF document in memory with lopdf.
///
/// Fonts are the standard-14 Type1 fonts with WinAnsi encoding. Imported
/// template pages become Form XObjects; appended pages are deep copied.
pub struct LopdfBackend {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    current: Option<PageBuilder>,
    state: GraphicsState,
    transform_depth: usize,
    fonts: HashMap<String, (String, ObjectId)>,
    templates: Vec<FormXObject>,
    template_index: HashMap<(SourceName, u32), TemplateHandle>,
    id_maps: HashMap<SourceName, IdMap>,
    images: HashMap<SourceName, ImageXObject>,
    opacity_states: HashMap<u32, (String, ObjectId)>,
    info: DocumentInfo,
    protection: Option<String>,
}

impl Default for LopdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfBackend {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            current: None,
            state: GraphicsState::default(),
            transform_depth: 0,
            fonts: HashMap::new(),
            templates: Vec::new(),
            template_index: HashMap::new(),
            id_maps: HashMap::new(),
            images: HashMap::new(),
            opacity_states: HashMap::new(),
            info: DocumentInfo::default(),
            protection: None,
        }
    }

    /// The protection password handed to [`DrawingBackend::set_protection`].
    /// It is recorded only; the output is not encrypted.
    pub fn protection(&self) -> Option<&str> {
        self.protection.as_deref()
    }

    fn page_mut(&mut self) -> Result<&mut PageBuilder, RenderError> {
        self.current.as_mut().ok_or(RenderError::NoPage)
    }

    /// Writes the page being drawn, if any, into the document.
    fn finish_page(&mut self) -> Result<(), RenderError> {
        let Some(mut page) = self.current.take() else {
            return Ok(());
        };
        if self.transform_depth > 0 {
            log::warn!("{} unbalanced transform(s) closed at page end", self.transform_depth);
            for _ in 0..self.transform_depth {
                page.push("Q", vec![]);
            }
            self.transform_depth = 0;
        }
        self.write_page(page)
    }

    fn write_page(&mut self, page: PageBuilder) -> Result<(), RenderError> {
        let resources = page.resources();
        let content = Content {
            operations: page.operations,
        }
        .encode()?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.0.into(), 0.0.into(), page.size.width.into(), page.size.height.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id);
        Ok(())
    }

    /// Resource name and object of the base font for the current selection.
    fn font_object(&mut self) -> (String, ObjectId) {
        let base = get_styled_font_name(&self.state.font.name, self.state.font.style);
        if let Some(entry) = self.fonts.get(&base) {
            return entry.clone();
        }
        let mut font = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base.clone(),
        };
        if base != "Symbol" && base != "ZapfDingbats" {
            font.set("Encoding", "WinAnsiEncoding");
        }
        let id = self.doc.add_object(font);
        let entry = (format!("F{}", self.fonts.len() + 1), id);
        self.fonts.insert(base, entry.clone());
        entry
    }

    fn opacity_state(&mut self, opacity: f32) -> (String, ObjectId) {
        let alpha = opacity.clamp(0.0, 1.0);
        let key = (alpha * 1000.0).round() as u32;
        if let Some(entry) = self.opacity_states.get(&key) {
            return entry.clone();
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => alpha,
            "CA" => alpha,
        });
        let entry = (format!("GS{}", self.opacity_states.len() + 1), id);
        self.opacity_states.insert(key, entry.clone());
        entry
    }

    /// Color set-up operations and the painting operator for `mode`.
    fn paint(&self, mode: PaintMode) -> (Vec<Operation>, &'static str) {
        let stroke = || {
            vec![
                stroke_color_op(self.state.draw_color),
                Operation::new("w", vec![self.state.line_width.into()]),
            ]
        };
        match mode {
            PaintMode::Fill => (vec![fill_color_op(self.state.fill_color)], "f"),
            PaintMode::Stroke => (stroke(), "S"),
            PaintMode::FillStroke => {
                let mut ops = vec![fill_color_op(self.state.fill_color)];
                ops.extend(stroke());
                (ops, "B")
            }
        }
    }

    /// Fills `rects` as one path in the text color.
    fn fill_modules(&mut self, rects: Vec<Rect>) -> Result<(), RenderError> {
        let color = self.state.text_color;
        let page = self.page_mut()?;
        let height = page.size.height;
        page.operations.push(fill_color_op(color));
        for rect in rects {
            page.operations.push(rect_op(rect, height));
        }
        page.push("f", vec![]);
        Ok(())
    }

    fn info_dictionary(&self) -> Dictionary {
        let mut info = dictionary! { "Producer" => helpers::text_string_object(PRODUCER) };
        let entries = [
            ("Title", &self.info.title),
            ("Author", &self.info.author),
            ("Subject", &self.info.subject),
            ("Creator", &self.info.creator),
            ("Keywords", &self.info.keywords),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                info.set(key, helpers::text_string_object(value));
            }
        }
        info
    }
}

fn composer_error(source: &SourceName, page: u32, err: ComposerError) -> RenderError {
    match err {
        ComposerError::PageOutOfRange { .. } => RenderError::TemplatePage {
            source_name: source.to_string(),
            page,
        },
        other => RenderError::Pdf(format!("{}: {}", source, other)),
    }
}

impl DrawingBackend for LopdfBackend {
    fn set_document_info(&mut self, info: &DocumentInfo) {
        self.info = info.clone();
    }

    fn set_protection(&mut self, password: Option<&str>) {
        if password.is_some() {
            log::warn!("Document protection is passed through only; output is not encrypted");
        }
        self.protection = password.map(str::to_string);
    }

    fn add_page(&mut self, size: Size, orientation: Orientation) -> Result<(), RenderError> {
        self.finish_page()?;
        let size = orientation.apply(size);
        if !(size.width > 0.0 && size.height > 0.0) {
            return Err(RenderError::Other(format!(
                "Invalid page size {}x{}",
                size.width, size.height
            )));
        }
        log::debug!("Starting page {} ({}x{})", self.kids.len() + 1, size.width, size.height);
        self.current = Some(PageBuilder::new(size));
        Ok(())
    }

    fn current_page_size(&self) -> Option<Size> {
        self.current.as_ref().map(|p| p.size)
    }

    fn import_page(
        &mut self,
        source: &SourceName,
        document: &Document,
        page: u32,
    ) -> Result<TemplateHandle, RenderError> {
        let key = (source.clone(), page);
        if let Some(handle) = self.template_index.get(&key) {
            return Ok(*handle);
        }
        let id_map = self.id_maps.entry(source.clone()).or_default();
        let form = composer::import_page_as_form(&mut self.doc, document, page, id_map)
            .map_err(|e| composer_error(source, page, e))?;
        let handle = TemplateHandle(self.templates.len() as u32);
        self.templates.push(form);
        self.template_index.insert(key, handle);
        Ok(handle)
    }

    fn use_template(&mut self, handle: TemplateHandle) -> Result<(), RenderError> {
        let form = *self
            .templates
            .get(handle.0 as usize)
            .ok_or(RenderError::UnknownTemplate(handle.0))?;
        let page = self.page_mut()?;
        let name = format!("Tpl{}", handle.0);
        page.xobjects.insert(name.clone(), form.id);
        // Anchor the template at the top-left corner of the page.
        let dy = page.size.height - form.geometry.height();
        page.push("q", vec![]);
        page.operations.push(matrix_op([1.0, 0.0, 0.0, 1.0, 0.0, dy]));
        page.push("Do", vec![helpers::name(&name)]);
        page.push("Q", vec![]);
        Ok(())
    }

    fn append_page(
        &mut self,
        source: &SourceName,
        document: &Document,
        page: u32,
    ) -> Result<(), RenderError> {
        self.finish_page()?;
        let id_map = self.id_maps.entry(source.clone()).or_default();
        let (page_id, _) = composer::copy_page(&mut self.doc, document, page, self.pages_id, id_map)
            .map_err(|e| composer_error(source, page, e))?;
        self.kids.push(page_id);
        Ok(())
    }

    fn graphics_state(&self) -> GraphicsState {
        self.state.clone()
    }

    fn restore_graphics_state(&mut self, state: &GraphicsState) {
        self.state = state.clone();
    }

    fn set_font(&mut self, name: &str, style: FontStyle, size: f32) {
        self.state.font = FontSelection {
            name: name.to_string(),
            style,
            size,
        };
    }

    fn set_text_color(&mut self, color: Color) {
        self.state.text_color = color;
    }

    fn set_draw_color(&mut self, color: Color) {
        self.state.draw_color = color;
    }

    fn set_fill_color(&mut self, color: Color) {
        self.state.fill_color = color;
    }

    fn set_line_width(&mut self, width: f32) {
        self.state.line_width = width;
    }

    fn push_transform(
        &mut self,
        rotation: f32,
        origin: Point,
        opacity: Option<f32>,
    ) -> Result<(), RenderError> {
        self.page_mut()?;
        let gs = match opacity {
            Some(alpha) if alpha < 1.0 => Some(self.opacity_state(alpha)),
            _ => None,
        };
        let page = self.page_mut()?;
        let height = page.size.height;
        page.push("q", vec![]);
        if let Some((name, id)) = gs {
            page.push("gs", vec![helpers::name(&name)]);
            page.ext_gstates.insert(name, id);
        }
        if rotation != 0.0 && rotation.is_finite() {
            page.operations
                .push(matrix_op(rotation_matrix(rotation, origin.x, height - origin.y)));
        }
        self.transform_depth += 1;
        Ok(())
    }

    fn pop_transform(&mut self) -> Result<(), RenderError> {
        if self.transform_depth == 0 {
            return Err(RenderError::Other(
                "pop_transform without a matching push_transform".to_string(),
            ));
        }
        self.page_mut()?.push("Q", vec![]);
        self.transform_depth -= 1;
        Ok(())
    }

    fn draw_text(&mut self, x: f32, baseline: f32, text: &str) -> Result<(), RenderError> {
        self.page_mut()?;
        if text.is_empty() {
            return Ok(());
        }
        let (resource, font_id) = self.font_object();
        let size = self.state.font.size;
        let color = self.state.text_color;
        let underline_width = self
            .state
            .font
            .style
            .underline
            .then(|| self.text_width(text));

        let page = self.page_mut()?;
        let y = page.size.height - baseline;
        page.fonts.insert(resource.clone(), font_id);
        page.push("BT", vec![]);
        page.operations.push(fill_color_op(color));
        page.push("Tf", vec![helpers::name(&resource), size.into()]);
        page.push("Td", vec![x.into(), y.into()]);
        page.push("Tj", vec![helpers::text_string(text)]);
        page.push("ET", vec![]);

        if let Some(width) = underline_width {
            let line_y = y - size * 0.12;
            page.operations.push(stroke_color_op(color));
            page.push("w", vec![(size * 0.05).into()]);
            page.push("m", vec![x.into(), line_y.into()]);
            page.push("l", vec![(x + width).into(), line_y.into()]);
            page.push("S", vec![]);
        }
        Ok(())
    }

    fn draw_rect(&mut self, rect: Rect, mode: PaintMode) -> Result<(), RenderError> {
        let (setup, paint) = self.paint(mode);
        let page = self.page_mut()?;
        let height = page.size.height;
        page.operations.extend(setup);
        page.operations.push(rect_op(rect, height));
        page.push(paint, vec![]);
        Ok(())
    }

    fn draw_line(&mut self, from: Point, to: Point) -> Result<(), RenderError> {
        let (setup, _) = self.paint(PaintMode::Stroke);
        let page = self.page_mut()?;
        let height = page.size.height;
        page.operations.extend(setup);
        page.push("m", vec![from.x.into(), (height - from.y).into()]);
        page.push("l", vec![to.x.into(), (height - to.y).into()]);
        page.push("S", vec![]);
        Ok(())
    }

    fn draw_polygon(&mut self, points: &[Point], mode: PaintMode) -> Result<(), RenderError> {
        let Some((first, rest)) = points.split_first() else {
            return Ok(());
        };
        if rest.is_empty() {
            return Ok(());
        }
        let (setup, paint) = self.paint(mode);
        let page = self.page_mut()?;
        let height = page.size.height;
        page.operations.extend(setup);
        page.push("m", vec![first.x.into(), (height - first.y).into()]);
        for p in rest {
            page.push("l", vec![p.x.into(), (height - p.y).into()]);
        }
        page.push("h", vec![]);
        page.push(paint, vec![]);
        Ok(())
    }

    fn draw_image(&mut self, source: &SourceName, data: &[u8], rect: Rect) -> Result<(), RenderError> {
        self.page_mut()?;
        let image = match self.images.get(source) {
            Some(image) => *image,
            None => {
                let image = images::embed_image(&mut self.doc, data)?;
                self.images.insert(source.clone(), image);
                image
            }
        };
        let page = self.page_mut()?;
        let name = format!("Im{}", image.id.0);
        page.xobjects.insert(name.clone(), image.id);
        let y = page.size.height - rect.y - rect.height;
        page.push("q", vec![]);
        page.operations
            .push(matrix_op([rect.width, 0.0, 0.0, rect.height, rect.x, y]));
        page.push("Do", vec![helpers::name(&name)]);
        page.push("Q", vec![]);
        Ok(())
    }

    fn draw_barcode(&mut self, kind: BarcodeKind, data: &str, rect: Rect) -> Result<(), RenderError> {
        self.page_mut()?;
        let bars = symbols::barcode_bars(kind, data)?;
        if bars.is_empty() {
            return Err(RenderError::Barcode(format!("empty bar pattern for '{}'", data)));
        }
        let module = rect.width / bars.len() as f32;
        let rects = symbols::runs(bars.iter().map(|b| *b == 1))
            .into_iter()
            .map(|(start, len)| {
                Rect::new(
                    rect.x + start as f32 * module,
                    rect.y,
                    len as f32 * module,
                    rect.height,
                )
            })
            .collect();
        self.fill_modules(rects)
    }

    fn draw_qrcode(&mut self, level: QrLevel, data: &str, rect: Rect) -> Result<(), RenderError> {
        self.page_mut()?;
        let (width, modules) = symbols::qr_modules(level, data)?;
        if width == 0 {
            return Ok(());
        }
        let module = rect.width.min(rect.height) / width as f32;
        let mut rects = Vec::new();
        for (row, cells) in modules.chunks(width).enumerate() {
            for (start, len) in symbols::runs(cells.iter().copied()) {
                rects.push(Rect::new(
                    rect.x + start as f32 * module,
                    rect.y + row as f32 * module,
                    len as f32 * module,
                    module,
                ));
            }
        }
        self.fill_modules(rects)
    }

    fn text_width(&self, text: &str) -> f32 {
        let font = &self.state.font;
        metrics::text_width(text, &font.name, font.style, font.size)
    }

    fn page_count(&self) -> usize {
        self.kids.len() + usize::from(self.current.is_some())
    }

    fn output(&mut self) -> Result<Vec<u8>, RenderError> {
        self.finish_page()?;
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.kids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        let info_id = self.doc.add_object(self.info_dictionary());
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        log::info!("Wrote PDF with {} pages ({} bytes)", self.kids.len(), buffer.len());
        Ok(buffer)
    }
}
