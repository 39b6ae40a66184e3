//! Typed form configuration.
//!
//! Every length in this model is already converted to PDF points; the
//! configuration unit only matters while parsing. Font sizes are points in
//! the source as well.

use quire_expr::Expression;
pub use quire_types::{BarcodeKind, DocumentInfo, FontStyle, HAlign, QrLevel, VAlign};
use quire_types::{Color, Orientation, PageFormat, Point, Size, Unit};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_GRID_ROWS: usize = 10;
pub const DEFAULT_GRID_COLS: usize = 1;
pub const DEFAULT_MARGIN: f32 = 10.0;
pub const DEFAULT_FONT: &str = "helvetica";
pub const DEFAULT_FONT_SIZE: f32 = 10.0;
pub const DEFAULT_CHARSET: &str = "cp1252";
pub const ADD_PAGE_SENTINEL: &str = "@addpage";
/// Upper bound on the slots of one grid page (`rows * cols`).
pub const MAX_GRID_SLOTS: usize = 10_000;
/// Upper bound on the entries of a template `pages` list.
pub const MAX_PAGE_LIST: usize = 10_000;

/// A fully loaded configuration source.
#[derive(Debug, Clone, Default)]
pub struct DocumentConfig {
    pub info: DocumentInfo,
    pub page_setup: PageSetup,
    pub font: FontSpec,
    pub margins: Margins,
    pub pagination: Option<Pagination>,
    /// Declared encoding of the configuration's texts. Informational only:
    /// data arrives as UTF-8 JSON and text is written in the standard fonts'
    /// WinAnsi encoding.
    pub charset: String,
    pub protection: Option<String>,
    pub template_files: Vec<TemplateFileRef>,
    pub user_params: HashMap<String, Value>,
    pub block_defs: HashMap<String, BlockDef>,
    pub all_pages: AllPages,
    pub entries: Vec<PageEntry>,
    pub imports: Vec<ImportDirective>,
}

impl DocumentConfig {
    pub fn pages(&self) -> impl Iterator<Item = &PageDefinition> {
        self.entries.iter().filter_map(|e| match e {
            PageEntry::Page(p) => Some(p),
            _ => None,
        })
    }

    /// Whether the declared charset agrees with how text is written. Empty
    /// means undeclared.
    pub fn charset_is_native(&self) -> bool {
        matches!(
            self.charset.as_str(),
            "" | "cp1252" | "windows-1252" | "utf-8" | "utf8"
        )
    }

    /// True when the configuration can contribute output without imports.
    pub fn has_drawable_page(&self) -> bool {
        self.pages().any(PageDefinition::has_content)
    }

    /// True when the configuration pulls pages from other configurations.
    pub fn has_imports(&self) -> bool {
        !self.imports.is_empty()
            || self
                .entries
                .iter()
                .any(|e| matches!(e, PageEntry::Import(_)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PageSetup {
    pub orientation: Orientation,
    pub format: PageFormat,
    pub unit: Unit,
}

impl PageSetup {
    /// Physical page size in points for the given orientation.
    pub fn size_for(&self, orientation: Orientation) -> Size {
        orientation.apply(self.format.size_pt(self.unit))
    }

    pub fn size(&self) -> Size {
        self.size_for(self.orientation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub name: String,
    pub size: f32,
    pub style: FontStyle,
    pub color: Color,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_FONT.to_string(),
            size: DEFAULT_FONT_SIZE,
            style: FontStyle::default(),
            color: Color::BLACK,
        }
    }
}

/// Partial font settings; unset parts fall back to the enclosing scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontOverride {
    pub name: Option<String>,
    pub size: Option<f32>,
    pub style: Option<FontStyle>,
    pub color: Option<Color>,
}

impl FontOverride {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.size.is_none() && self.style.is_none() && self.color.is_none()
    }

    pub fn apply_to(&self, base: &FontSpec) -> FontSpec {
        FontSpec {
            name: self.name.clone().unwrap_or_else(|| base.name.clone()),
            size: self.size.unwrap_or(base.size),
            style: self.style.unwrap_or(base.style),
            color: self.color.unwrap_or(base.color),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Margins {
    pub fn uniform(value: f32) -> Self {
        Self {
            left: value,
            top: value,
            right: value,
            bottom: value,
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(Unit::Mm.to_pt(DEFAULT_MARGIN))
    }
}

/// Page-number footer settings. `format` contains the `%page%` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub format: String,
    pub font_size: f32,
    pub align: HAlign,
}

impl Pagination {
    pub fn render(&self, page_number: u32) -> String {
        self.format.replace("%page%", &page_number.to_string())
    }
}

/// Where a template file name comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateSource {
    Literal(String),
    /// Evaluated against user parameters the first time the file is needed.
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateFileRef {
    pub src: TemplateSource,
    /// Explicit 1-based page subset; `None` means every page of the file.
    pub pages: Option<Vec<u32>>,
    /// `false` suppresses page-number footers on pages backed by this file.
    pub paginate: bool,
}

/// Explicit per-page template. Bypasses the shared template queue.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateOverride {
    pub src: String,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEntry {
    Page(PageDefinition),
    Import(ImportDirective),
    Append(AppendDirective),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDirective {
    pub src: String,
    /// Key of the sub-object that becomes the record for imported pages.
    pub datasub: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppendNumbering {
    /// Appended pages get no page number and do not advance the counter.
    #[default]
    None,
    /// Appended pages continue the running page counter.
    Inherit,
    /// Appended pages are numbered from 1 on their own.
    Own,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendDirective {
    pub src: String,
    /// Name of the page after which the document is inserted.
    pub after: Option<String>,
    pub numbering: AppendNumbering,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDefinition {
    /// 0-based position among the pages of its configuration.
    pub index: usize,
    pub name: String,
    pub orientation: Option<Orientation>,
    pub template: Option<TemplateOverride>,
    pub font: FontOverride,
    pub fields: Vec<FieldDefinition>,
    /// Name of the grid that paginates this page.
    pub grid_page: Option<String>,
    pub grids: Vec<DataGrid>,
    pub flex_tables: Vec<FlexTable>,
    pub data_blocks: Vec<DataBlock>,
    /// Offsets at which the page's own fields are drawn again.
    pub repeats: Vec<Point>,
    pub hide: bool,
    pub own_numbering: bool,
    pub start_number: u32,
    pub no_pagination: bool,
    pub condition: Option<Expression>,
}

impl PageDefinition {
    pub fn has_content(&self) -> bool {
        !self.fields.is_empty()
            || !self.grids.is_empty()
            || !self.flex_tables.is_empty()
            || !self.data_blocks.is_empty()
            || self.template.is_some()
    }

    pub fn grid(&self, name: &str) -> Option<&DataGrid> {
        self.grids.iter().find(|g| g.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldKind {
    #[default]
    Text,
    Money,
    Date,
    Image,
    Checkbox,
    Barcode(BarcodeKind),
    QrCode(QrLevel),
    Rect,
    Poly,
    Cross,
    Html,
    Plugin(String),
}

impl FieldKind {
    /// Kinds that draw a shape rather than text.
    pub fn is_shape(&self) -> bool {
        matches!(self, FieldKind::Rect | FieldKind::Poly | FieldKind::Cross)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XPlacement {
    Single(f32),
    /// One x coordinate per character.
    List(Vec<f32>),
    /// Characters start at `start` and advance by `step`.
    Stepped { start: f32, step: f32 },
}

impl Default for XPlacement {
    fn default() -> Self {
        XPlacement::Single(0.0)
    }
}

impl XPlacement {
    pub fn start(&self) -> f32 {
        match self {
            XPlacement::Single(x) => *x,
            XPlacement::List(xs) => xs.first().copied().unwrap_or(0.0),
            XPlacement::Stepped { start, .. } => *start,
        }
    }

    pub fn offset(&self, dx: f32) -> Self {
        match self {
            XPlacement::Single(x) => XPlacement::Single(x + dx),
            XPlacement::List(xs) => XPlacement::List(xs.iter().map(|x| x + dx).collect()),
            XPlacement::Stepped { start, step } => XPlacement::Stepped {
                start: start + dx,
                step: *step,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum YPlacement {
    Single(f32),
    /// Vertex coordinates for polygons.
    List(Vec<f32>),
}

impl Default for YPlacement {
    fn default() -> Self {
        YPlacement::Single(0.0)
    }
}

impl YPlacement {
    pub fn start(&self) -> f32 {
        match self {
            YPlacement::Single(y) => *y,
            YPlacement::List(ys) => ys.first().copied().unwrap_or(0.0),
        }
    }

    pub fn offset(&self, dy: f32) -> Self {
        match self {
            YPlacement::Single(y) => YPlacement::Single(y + dy),
            YPlacement::List(ys) => YPlacement::List(ys.iter().map(|y| y + dy).collect()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BorderSides {
    pub left: bool,
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
}

impl BorderSides {
    pub const ALL: BorderSides = BorderSides {
        left: true,
        top: true,
        right: true,
        bottom: true,
    };

    /// `1` means all sides; otherwise any combination of `L`, `T`, `R`, `B`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_ascii_uppercase();
        if s == "1" {
            return Self::ALL;
        }
        Self {
            left: s.contains('L'),
            top: s.contains('T'),
            right: s.contains('R'),
            bottom: s.contains('B'),
        }
    }

    pub fn any(&self) -> bool {
        self.left || self.top || self.right || self.bottom
    }

    pub fn all(&self) -> bool {
        self.left && self.top && self.right && self.bottom
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum FillEmpty {
    #[default]
    None,
    /// A stroke at the baseline, or a zigzag for tall fields.
    Line,
    Zigzag,
    Text(String),
}

impl FillEmpty {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "0" => FillEmpty::None,
            "1" | "line" => FillEmpty::Line,
            "zigzag" => FillEmpty::Zigzag,
            other => FillEmpty::Text(other.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, FillEmpty::None)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub x: XPlacement,
    pub y: YPlacement,
    /// `0.0` extends the field to the right page margin.
    pub width: f32,
    /// `0.0` means one line of text.
    pub height: f32,
    pub font: FontOverride,
    pub rotate: f32,
    pub opacity: Option<f32>,
    pub bg_color: Option<Color>,
    pub border: BorderSides,
    pub border_width: Option<f32>,
    pub border_color: Option<Color>,
    pub align: HAlign,
    pub valign: VAlign,
    pub line_height: Option<f32>,
    pub convert: Option<Expression>,
    pub fill_empty: FillEmpty,
    pub orientation: Option<Orientation>,
    pub visible: Option<Expression>,
    pub value: Option<String>,
    pub src: Option<String>,
    pub options: HashMap<String, String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    /// Copy of the field shifted by `(dx, dy)`.
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x.offset(dx),
            y: self.y.offset(dy),
            ..self.clone()
        }
    }
}

/// Parses a plugin option string such as `k=v;k2=v2`.
pub fn parse_options(s: &str) -> HashMap<String, String> {
    s.split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            match pair.split_once('=') {
                Some((k, v)) => Some((k.trim().to_string(), v.trim().to_string())),
                None => Some((pair.to_string(), String::new())),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FillOrder {
    /// Fill down each column first.
    #[default]
    RowFirst,
    /// Fill across each row first.
    ColumnFirst,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GridField {
    Field(FieldDefinition),
    AddPage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataGrid {
    pub name: String,
    pub fields: Vec<GridField>,
    pub datasource: Option<Expression>,
    pub rows: usize,
    pub cols: usize,
    pub step_x: f32,
    pub step_y: f32,
    pub order: FillOrder,
    pub fill_empty: bool,
}

impl DataGrid {
    pub fn capacity(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    pub fn field_defs(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter_map(|f| match f {
            GridField::Field(def) => Some(def),
            GridField::AddPage => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlexColumn {
    pub field: String,
    pub width: f32,
    pub title: String,
    pub align: HAlign,
    pub header_font: FontOverride,
    pub header_bg: Option<Color>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlexTable {
    pub name: String,
    pub datasource: Expression,
    pub x: f32,
    pub y: f32,
    pub columns: Vec<FlexColumn>,
    pub header: bool,
    pub row_backgrounds: Vec<Color>,
    pub border_width: f32,
    pub border_color: Color,
    pub padding: f32,
    pub min_row_height: f32,
    pub font: FontOverride,
}

impl FlexTable {
    pub fn total_width(&self) -> f32 {
        self.columns.iter().map(|c| c.width).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockDef {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataBlock {
    pub name: String,
    pub datasource: Option<Expression>,
    pub x: f32,
    pub y: f32,
    pub shifts: HashMap<String, Point>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AllPagesOrder {
    Before,
    #[default]
    After,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllPages {
    pub order: AllPagesOrder,
    pub fields: Vec<FieldDefinition>,
}
