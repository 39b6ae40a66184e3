use crate::error::RenderError;
use crate::utils::wrap_text;
use quire_types::{
    BarcodeKind, Color, DocumentInfo, FontStyle, Orientation, Point, QrLevel, Rect, Size,
    SourceName, TemplateHandle,
};

#[derive(Debug, Clone, PartialEq)]
pub struct FontSelection {
    pub name: String,
    pub style: FontStyle,
    pub size: f32,
}

impl Default for FontSelection {
    fn default() -> Self {
        Self {
            name: "helvetica".to_string(),
            style: FontStyle::default(),
            size: 10.0,
        }
    }
}

/// The drawing state a caller may change and must be able to put back.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub font: FontSelection,
    pub text_color: Color,
    pub draw_color: Color,
    pub fill_color: Color,
    pub line_width: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            font: FontSelection::default(),
            text_color: Color::BLACK,
            draw_color: Color::BLACK,
            fill_color: Color::WHITE,
            line_width: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMode {
    Stroke,
    Fill,
    FillStroke,
}

/// Page-drawing primitives consumed by the composition engine.
///
/// All coordinates are PDF points with the origin at the top-left corner of
/// the current page and y growing downwards. Text is positioned by its
/// baseline.
pub trait DrawingBackend {
    fn set_document_info(&mut self, info: &DocumentInfo);

    /// Records a protection password. Backends may only pass it through.
    fn set_protection(&mut self, password: Option<&str>);

    fn add_page(&mut self, size: Size, orientation: Orientation) -> Result<(), RenderError>;

    fn current_page_size(&self) -> Option<Size>;

    /// Imports one page (1-based) of a source document as a reusable template.
    /// Importing the same page twice returns the same handle.
    fn import_page(
        &mut self,
        source: &SourceName,
        document: &lopdf::Document,
        page: u32,
    ) -> Result<TemplateHandle, RenderError>;

    /// Draws an imported template as the background of the current page.
    fn use_template(&mut self, handle: TemplateHandle) -> Result<(), RenderError>;

    /// Appends one page of a source document verbatim as a new output page.
    fn append_page(
        &mut self,
        source: &SourceName,
        document: &lopdf::Document,
        page: u32,
    ) -> Result<(), RenderError>;

    fn graphics_state(&self) -> GraphicsState;

    fn restore_graphics_state(&mut self, state: &GraphicsState);

    fn set_font(&mut self, name: &str, style: FontStyle, size: f32);

    fn set_text_color(&mut self, color: Color);

    fn set_draw_color(&mut self, color: Color);

    fn set_fill_color(&mut self, color: Color);

    fn set_line_width(&mut self, width: f32);

    /// Rotates (degrees, counter-clockwise) around `origin` and applies an
    /// optional opacity until the matching [`pop_transform`](Self::pop_transform).
    fn push_transform(
        &mut self,
        rotation: f32,
        origin: Point,
        opacity: Option<f32>,
    ) -> Result<(), RenderError>;

    fn pop_transform(&mut self) -> Result<(), RenderError>;

    fn draw_text(&mut self, x: f32, baseline: f32, text: &str) -> Result<(), RenderError>;

    fn draw_rect(&mut self, rect: Rect, mode: PaintMode) -> Result<(), RenderError>;

    fn draw_line(&mut self, from: Point, to: Point) -> Result<(), RenderError>;

    /// Draws a closed polygon.
    fn draw_polygon(&mut self, points: &[Point], mode: PaintMode) -> Result<(), RenderError>;

    fn draw_image(
        &mut self,
        source: &SourceName,
        data: &[u8],
        rect: Rect,
    ) -> Result<(), RenderError>;

    fn draw_barcode(&mut self, kind: BarcodeKind, data: &str, rect: Rect)
    -> Result<(), RenderError>;

    fn draw_qrcode(&mut self, level: QrLevel, data: &str, rect: Rect) -> Result<(), RenderError>;

    /// Width of `text` in the current font.
    fn text_width(&self, text: &str) -> f32;

    /// Greedy word wrap of `text` into lines no wider than `width`.
    fn wrap_text(&self, text: &str, width: f32) -> Vec<String> {
        wrap_text(text, width, |s| self.text_width(s))
    }

    fn measure_wrapped_height(&self, text: &str, width: f32, line_height: f32) -> f32 {
        self.wrap_text(text, width).len().max(1) as f32 * line_height
    }

    fn page_count(&self) -> usize;

    /// Serializes the finished document.
    fn output(&mut self) -> Result<Vec<u8>, RenderError>;
}
