//! A drawing backend that records calls instead of producing a PDF.
//!
//! Used for dry runs (page counting, layout previews) and throughout the
//! engine's tests.

use quire_pdf_composer::page_id;
use quire_render_core::metrics::text_width;
use quire_render_core::{DrawingBackend, FontSelection, GraphicsState, PaintMode, RenderError};
use quire_types::{
    BarcodeKind, Color, DocumentInfo, FontStyle, Orientation, Point, QrLevel, Rect, Size,
    SourceName, TemplateHandle,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Template(TemplateHandle),
    Text {
        x: f32,
        baseline: f32,
        text: String,
        font: FontSelection,
        color: Color,
    },
    Rect {
        rect: Rect,
        mode: PaintMode,
    },
    Line {
        from: Point,
        to: Point,
    },
    Polygon {
        points: Vec<Point>,
        mode: PaintMode,
    },
    Image {
        source: SourceName,
        rect: Rect,
    },
    Barcode {
        kind: BarcodeKind,
        data: String,
        rect: Rect,
    },
    QrCode {
        level: QrLevel,
        data: String,
        rect: Rect,
    },
    PushTransform {
        rotation: f32,
        origin: Point,
        opacity: Option<f32>,
    },
    PopTransform,
}

/// One output page as seen by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPage {
    pub size: Size,
    pub orientation: Orientation,
    /// Source page copied verbatim, for appended pages.
    pub appended: Option<(SourceName, u32)>,
    pub ops: Vec<DrawOp>,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub pages: Vec<RecordedPage>,
    pub info: Option<DocumentInfo>,
    pub protection: Option<String>,
    /// Makes every barcode fail to encode.
    pub fail_barcodes: bool,
    templates: Vec<(SourceName, u32)>,
    template_index: HashMap<(SourceName, u32), TemplateHandle>,
    state: GraphicsState,
    transform_depth: usize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> Result<&mut RecordedPage, RenderError> {
        self.pages.last_mut().ok_or(RenderError::NoPage)
    }

    fn record(&mut self, op: DrawOp) -> Result<(), RenderError> {
        self.current()?.ops.push(op);
        Ok(())
    }

    /// Operations drawn on page `index` (0-based); empty for unknown pages.
    pub fn ops(&self, index: usize) -> &[DrawOp] {
        self.pages.get(index).map(|p| p.ops.as_slice()).unwrap_or_default()
    }

    /// Text runs drawn on page `index`, in drawing order.
    pub fn texts(&self, index: usize) -> Vec<&str> {
        self.ops(index)
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every text run, page by page.
    pub fn all_texts(&self) -> Vec<Vec<&str>> {
        (0..self.pages.len()).map(|i| self.texts(i)).collect()
    }

    pub fn lines(&self, index: usize) -> usize {
        self.ops(index)
            .iter()
            .filter(|op| matches!(op, DrawOp::Line { .. }))
            .count()
    }

    /// Source page behind a template handle.
    pub fn template_source(&self, handle: TemplateHandle) -> Option<&(SourceName, u32)> {
        self.templates.get(handle.0 as usize)
    }

    /// Template pages used as backgrounds of page `index`.
    pub fn backgrounds(&self, index: usize) -> Vec<&(SourceName, u32)> {
        self.ops(index)
            .iter()
            .filter_map(|op| match op {
                DrawOp::Template(handle) => self.template_source(*handle),
                _ => None,
            })
            .collect()
    }
}

impl DrawingBackend for RecordingBackend {
    fn set_document_info(&mut self, info: &DocumentInfo) {
        self.info = Some(info.clone());
    }

    fn set_protection(&mut self, password: Option<&str>) {
        self.protection = password.map(String::from);
    }

    fn add_page(&mut self, size: Size, orientation: Orientation) -> Result<(), RenderError> {
        self.pages.push(RecordedPage {
            size: orientation.apply(size),
            orientation,
            appended: None,
            ops: Vec::new(),
        });
        self.transform_depth = 0;
        Ok(())
    }

    fn current_page_size(&self) -> Option<Size> {
        self.pages.last().map(|p| p.size)
    }

    fn import_page(
        &mut self,
        source: &SourceName,
        document: &lopdf::Document,
        page: u32,
    ) -> Result<TemplateHandle, RenderError> {
        let key = (source.clone(), page);
        if let Some(handle) = self.template_index.get(&key) {
            return Ok(*handle);
        }
        page_id(document, page).map_err(|_| RenderError::TemplatePage {
            source_name: source.to_string(),
            page,
        })?;
        let handle = TemplateHandle(self.templates.len() as u32);
        self.templates.push(key.clone());
        self.template_index.insert(key, handle);
        Ok(handle)
    }

    fn use_template(&mut self, handle: TemplateHandle) -> Result<(), RenderError> {
        if self.template_source(handle).is_none() {
            return Err(RenderError::UnknownTemplate(handle.0));
        }
        self.record(DrawOp::Template(handle))
    }

    fn append_page(
        &mut self,
        source: &SourceName,
        document: &lopdf::Document,
        page: u32,
    ) -> Result<(), RenderError> {
        page_id(document, page).map_err(|_| RenderError::TemplatePage {
            source_name: source.to_string(),
            page,
        })?;
        self.pages.push(RecordedPage {
            size: Size::zero(),
            orientation: Orientation::Portrait,
            appended: Some((source.clone(), page)),
            ops: Vec::new(),
        });
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
        self.record(DrawOp::PushTransform {
            rotation,
            origin,
            opacity,
        })?;
        self.transform_depth += 1;
        Ok(())
    }

    fn pop_transform(&mut self) -> Result<(), RenderError> {
        if self.transform_depth == 0 {
            return Err(RenderError::Other("pop_transform without push".into()));
        }
        self.transform_depth -= 1;
        self.record(DrawOp::PopTransform)
    }

    fn draw_text(&mut self, x: f32, baseline: f32, text: &str) -> Result<(), RenderError> {
        let op = DrawOp::Text {
            x,
            baseline,
            text: text.to_string(),
            font: self.state.font.clone(),
            color: self.state.text_color,
        };
        self.record(op)
    }

    fn draw_rect(&mut self, rect: Rect, mode: PaintMode) -> Result<(), RenderError> {
        self.record(DrawOp::Rect { rect, mode })
    }

    fn draw_line(&mut self, from: Point, to: Point) -> Result<(), RenderError> {
        self.record(DrawOp::Line { from, to })
    }

    fn draw_polygon(&mut self, points: &[Point], mode: PaintMode) -> Result<(), RenderError> {
        self.record(DrawOp::Polygon {
            points: points.to_vec(),
            mode,
        })
    }

    fn draw_image(&mut self, source: &SourceName, _data: &[u8], rect: Rect) -> Result<(), RenderError> {
        self.record(DrawOp::Image {
            source: source.clone(),
            rect,
        })
    }

    fn draw_barcode(&mut self, kind: BarcodeKind, data: &str, rect: Rect) -> Result<(), RenderError> {
        if self.fail_barcodes {
            return Err(RenderError::Barcode(format!("cannot encode '{}'", data)));
        }
        self.record(DrawOp::Barcode {
            kind,
            data: data.to_string(),
            rect,
        })
    }

    fn draw_qrcode(&mut self, level: QrLevel, data: &str, rect: Rect) -> Result<(), RenderError> {
        self.record(DrawOp::QrCode {
            level,
            data: data.to_string(),
            rect,
        })
    }

    fn text_width(&self, text: &str) -> f32 {
        let font = &self.state.font;
        text_width(text, &font.name, font.style, font.size)
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// One line per page with its size and text runs.
    fn output(&mut self) -> Result<Vec<u8>, RenderError> {
        let mut out = String::new();
        for (i, page) in self.pages.iter().enumerate() {
            out.push_str(&format!(
                "page {} {}x{}: {}\n",
                i + 1,
                page.size.width,
                page.size.height,
                self.texts(i).join(" | ")
            ));
        }
        Ok(out.into_bytes())
    }
}
