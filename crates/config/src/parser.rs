//! XML to [`DocumentConfig`] conversion.
//!
//! Lengths are converted to points as soon as they are read, using the unit
//! declared in `<baseparameters><page units=".."/>`.

use crate::error::{ConfigError, Location};
use crate::model::*;
use log::{debug, warn};
use quire_expr::{Expression, FunctionRegistry, compile};
use quire_types::{Color, Orientation, PageFormat, Point, Unit};
use roxmltree::Node;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

type Result<T> = std::result::Result<T, ConfigError>;

/// Read access to one element's attributes with unit conversion.
#[derive(Clone, Copy)]
struct Element<'a, 'input> {
    node: Node<'a, 'input>,
    unit: Unit,
}

impl<'a, 'input: 'a> Element<'a, 'input> {
    fn new(node: Node<'a, 'input>, unit: Unit) -> Self {
        Self { node, unit }
    }

    fn tag(&self) -> &'a str {
        self.node.tag_name().name()
    }

    fn location(&self) -> Location {
        self.node.document().text_pos_at(self.node.range().start).into()
    }

    fn attr(&self, name: &str) -> Option<&'a str> {
        self.node.attribute(name)
    }

    /// Attribute value with surrounding whitespace removed; empty counts as absent.
    fn value(&self, name: &str) -> Option<&'a str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<&'a str> {
        self.value(name).ok_or_else(|| ConfigError::MissingAttribute {
            element: self.tag().to_string(),
            attribute: name.to_string(),
            location: self.location(),
        })
    }

    fn invalid(&self, attribute: &str, value: &str, message: impl Into<String>) -> ConfigError {
        ConfigError::InvalidAttribute {
            element: self.tag().to_string(),
            attribute: attribute.to_string(),
            value: value.to_string(),
            message: message.into(),
            location: self.location(),
        }
    }

    fn structure(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::Structure {
            message: message.into(),
            location: self.location(),
        }
    }

    fn parsed<T: FromStr<Err = String>>(&self, name: &str) -> Result<Option<T>> {
        self.value(name)
            .map(|v| v.parse::<T>().map_err(|e| self.invalid(name, v, e)))
            .transpose()
    }

    fn number(&self, name: &str) -> Result<Option<f32>> {
        self.value(name)
            .map(|v| parse_number(v).ok_or_else(|| self.invalid(name, v, "expected a number")))
            .transpose()
    }

    fn length(&self, name: &str) -> Result<Option<f32>> {
        Ok(self.number(name)?.map(|v| self.unit.to_pt(v)))
    }

    fn length_or(&self, name: &str, default_units: f32) -> Result<f32> {
        Ok(self
            .length(name)?
            .unwrap_or_else(|| self.unit.to_pt(default_units)))
    }

    fn lengths(&self, name: &str) -> Result<Option<Vec<f32>>> {
        let Some(raw) = self.value(name) else {
            return Ok(None);
        };
        raw.split(',')
            .map(|part| {
                parse_number(part)
                    .map(|v| self.unit.to_pt(v))
                    .ok_or_else(|| self.invalid(name, raw, "expected a comma separated list of numbers"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn flag(&self, name: &str) -> bool {
        self.value(name).is_some_and(is_true)
    }

    fn flag_or(&self, name: &str, default: bool) -> bool {
        self.value(name).map(is_true).unwrap_or(default)
    }

    fn count(&self, name: &str, default: usize) -> Result<usize> {
        match self.value(name) {
            None => Ok(default),
            Some(v) => match v.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(self.invalid(name, v, "expected a positive integer")),
            },
        }
    }

    fn color(&self, name: &str) -> Result<Option<Color>> {
        self.parsed::<Color>(name)
    }

    fn font_override(&self, prefix: &str) -> Result<FontOverride> {
        Ok(FontOverride {
            name: self
                .value(&format!("{prefix}font"))
                .map(|s| s.to_ascii_lowercase()),
            size: self.number(&format!("{prefix}fontsize"))?,
            style: self.value(&format!("{prefix}fontstyle")).map(FontStyle::parse),
            color: self.color(&format!("{prefix}color"))?,
        })
    }

    fn children(&self) -> impl Iterator<Item = Element<'a, 'input>> + 'a {
        let unit = self.unit;
        self.node
            .children()
            .filter(|n| n.is_element())
            .map(move |n| Element::new(n, unit))
    }

    fn child(&self, tag: &str) -> Option<Element<'a, 'input>> {
        self.children().find(|c| c.tag() == tag)
    }

    fn text(&self) -> Option<&'a str> {
        self.node.text().map(str::trim).filter(|t| !t.is_empty())
    }
}

fn parse_number(s: &str) -> Option<f32> {
    s.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

fn is_true(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Parses a page list such as `1,3-5`.
fn parse_page_list(s: &str) -> std::result::Result<Vec<u32>, String> {
    let mut pages = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let bad = || format!("invalid page number '{}'", part);
        match part.split_once('-') {
            Some((a, b)) => {
                let start: u32 = a.trim().parse().map_err(|_| bad())?;
                let end: u32 = b.trim().parse().map_err(|_| bad())?;
                if start == 0 || end < start {
                    return Err(bad());
                }
                if (end - start) as usize >= MAX_PAGE_LIST - pages.len().min(MAX_PAGE_LIST) {
                    return Err(format!("page list longer than {} entries", MAX_PAGE_LIST));
                }
                pages.extend(start..=end);
            }
            None => {
                let page: u32 = part.parse().map_err(|_| bad())?;
                if page == 0 {
                    return Err(bad());
                }
                if pages.len() >= MAX_PAGE_LIST {
                    return Err(format!("page list longer than {} entries", MAX_PAGE_LIST));
                }
                pages.push(page);
            }
        }
    }
    Ok(pages)
}

pub(crate) struct ConfigParser<'r> {
    functions: &'r FunctionRegistry,
    source_name: String,
}

impl<'r> ConfigParser<'r> {
    pub(crate) fn new(functions: &'r FunctionRegistry, source_name: &str) -> Self {
        Self {
            functions,
            source_name: source_name.to_string(),
        }
    }

    fn expression(&self, el: &Element, name: &str) -> Result<Option<Expression>> {
        el.value(name)
            .map(|src| {
                compile(src, self.functions).map_err(|source| ConfigError::Expression {
                    input: src.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub(crate) fn parse(&self, text: &str) -> Result<DocumentConfig> {
        let doc = roxmltree::Document::parse(text)?;
        let root = doc.root_element();

        let unit = root
            .children()
            .find(|n| n.has_tag_name("baseparameters"))
            .and_then(|bp| bp.children().find(|n| n.has_tag_name("page")))
            .map(|page| Element::new(page, Unit::default()).parsed::<Unit>("units"))
            .transpose()?
            .flatten()
            .unwrap_or_default();

        let root = Element::new(root, unit);
        if root.tag() != "document" {
            return Err(root.structure(format!(
                "expected <document> root element, found <{}>",
                root.tag()
            )));
        }

        let mut config = DocumentConfig {
            info: DocumentInfo {
                title: root.value("title").map(String::from),
                author: root.value("author").map(String::from),
                subject: root.value("subject").map(String::from),
                creator: root.value("creator").map(String::from),
                keywords: root.value("keywords").map(String::from),
            },
            page_setup: PageSetup {
                unit,
                ..Default::default()
            },
            margins: Margins::uniform(unit.to_pt(DEFAULT_MARGIN)),
            charset: DEFAULT_CHARSET.to_string(),
            ..Default::default()
        };

        for child in root.children() {
            match child.tag() {
                "baseparameters" => self.parse_base_parameters(&child, &mut config)?,
                "userparameters" => {
                    for param in child.children().filter(|c| c.tag() == "param") {
                        let name = param.required("name")?;
                        let value = param.attr("value").or_else(|| param.text()).unwrap_or("");
                        config
                            .user_params
                            .insert(name.to_string(), Value::String(value.to_string()));
                    }
                }
                "blockdefs" => {
                    for block in child.children().filter(|c| c.tag() == "block") {
                        let name = block.required("name")?.to_string();
                        let fields = self.parse_field_list(&block, &name)?;
                        config.block_defs.insert(name.clone(), BlockDef { name, fields });
                    }
                }
                "allpages" => {
                    config.all_pages.order = match child.value("order") {
                        None => AllPagesOrder::After,
                        Some(v) if v.eq_ignore_ascii_case("before") => AllPagesOrder::Before,
                        Some(v) if v.eq_ignore_ascii_case("after") => AllPagesOrder::After,
                        Some(v) => return Err(child.invalid("order", v, "expected 'before' or 'after'")),
                    };
                    config.all_pages.fields = self.parse_field_list(&child, "allpages")?;
                }
                "pages" => {
                    let mut index = 0;
                    for entry in child.children() {
                        match entry.tag() {
                            "page" => {
                                let page = self.parse_page(&entry, index, &config.block_defs)?;
                                config.entries.push(PageEntry::Page(page));
                                index += 1;
                            }
                            "importdef" => {
                                config.entries.push(PageEntry::Import(parse_import(&entry)?))
                            }
                            "appendpdf" => {
                                config.entries.push(PageEntry::Append(parse_append(&entry)?))
                            }
                            other => {
                                return Err(entry.structure(format!(
                                    "unexpected <{}> inside <pages>",
                                    other
                                )));
                            }
                        }
                    }
                }
                "import" => {
                    for entry in child.children().filter(|c| c.tag() == "importdef") {
                        config.imports.push(parse_import(&entry)?);
                    }
                }
                other => debug!("Ignoring unknown element <{}> in '{}'", other, self.source_name),
            }
        }

        debug!(
            "Loaded configuration '{}': {} entries, {} imports, {} template files",
            self.source_name,
            config.entries.len(),
            config.imports.len(),
            config.template_files.len()
        );
        Ok(config)
    }

    fn parse_base_parameters(&self, el: &Element, config: &mut DocumentConfig) -> Result<()> {
        for child in el.children() {
            match child.tag() {
                "page" => {
                    if let Some(o) = child.parsed::<Orientation>("orientation")? {
                        config.page_setup.orientation = o;
                    }
                    if let Some(f) = child.parsed::<PageFormat>("size")? {
                        config.page_setup.format = f;
                    }
                }
                "font" => {
                    let over = FontOverride {
                        name: child.value("name").map(|s| s.to_ascii_lowercase()),
                        size: child.number("size")?,
                        style: child.value("style").map(FontStyle::parse),
                        color: child.color("color")?,
                    };
                    config.font = over.apply_to(&config.font);
                }
                "margins" => {
                    config.margins = Margins {
                        left: child.length_or("left", DEFAULT_MARGIN)?,
                        top: child.length_or("top", DEFAULT_MARGIN)?,
                        right: child.length_or("right", DEFAULT_MARGIN)?,
                        bottom: child.length_or("bottom", DEFAULT_MARGIN)?,
                    };
                }
                "pagination" => {
                    let format = child.required("format")?.to_string();
                    let align = match child.value("align") {
                        None => HAlign::Center,
                        Some(v) => HAlign::parse(v)
                            .ok_or_else(|| child.invalid("align", v, "expected L, C, R or J"))?,
                    };
                    config.pagination = Some(Pagination {
                        format,
                        font_size: child.number("fontsize")?.unwrap_or(config.font.size),
                        align,
                    });
                }
                "charset" => {
                    if let Some(cs) = child.text().or_else(|| child.value("name")) {
                        config.charset = cs.to_ascii_lowercase();
                    }
                }
                "protect" => {
                    config.protection = Some(child.attr("password").unwrap_or("").to_string());
                }
                "templatefiles" => {
                    for tpl in child.children().filter(|c| c.tag() == "template") {
                        config.template_files.push(self.parse_template_file(&tpl)?);
                    }
                }
                other => debug!("Ignoring unknown base parameter <{}>", other),
            }
        }
        Ok(())
    }

    fn parse_template_file(&self, el: &Element) -> Result<TemplateFileRef> {
        let raw = el.required("src")?;
        let src = if raw.starts_with('$') || raw.contains('(') {
            let expr = self
                .expression(el, "src")?
                .ok_or_else(|| el.invalid("src", raw, "empty template expression"))?;
            TemplateSource::Expression(expr)
        } else {
            TemplateSource::Literal(raw.to_string())
        };
        let pages = el
            .value("pages")
            .map(|v| parse_page_list(v).map_err(|e| el.invalid("pages", v, e)))
            .transpose()?;
        Ok(TemplateFileRef {
            src,
            pages,
            paginate: el.flag_or("paginate", true),
        })
    }

    fn parse_field_list(&self, el: &Element, scope: &str) -> Result<Vec<FieldDefinition>> {
        let mut fields = Vec::new();
        for child in el.children() {
            if let Some(field) = self.parse_field_element(&child)? {
                fields.push(field);
            }
        }
        check_unique(scope, &fields)?;
        Ok(fields)
    }

    /// Parses `<field>`, `<image>` and `<plugin>`; other elements yield `None`.
    fn parse_field_element(&self, el: &Element) -> Result<Option<FieldDefinition>> {
        let kind = match el.tag() {
            "field" => self.parse_kind(el)?,
            "image" => FieldKind::Image,
            "plugin" => FieldKind::Plugin(el.required("class")?.to_string()),
            _ => return Ok(None),
        };
        self.parse_field(el, kind).map(Some)
    }

    fn parse_kind(&self, el: &Element) -> Result<FieldKind> {
        let Some(raw) = el.value("type") else {
            return Ok(FieldKind::Text);
        };
        let (base, sub) = match raw.split_once(':') {
            Some((b, s)) => (b.trim(), Some(s.trim())),
            None => (raw, None),
        };
        let kind = match base.to_ascii_lowercase().as_str() {
            "text" => FieldKind::Text,
            "money" => FieldKind::Money,
            "date" => FieldKind::Date,
            "image" => FieldKind::Image,
            "checkbox" => FieldKind::Checkbox,
            "rect" => FieldKind::Rect,
            "poly" => FieldKind::Poly,
            "cross" => FieldKind::Cross,
            "html" => FieldKind::Html,
            "barcode" => FieldKind::Barcode(match sub {
                None => BarcodeKind::default(),
                Some(s) => BarcodeKind::parse(s).unwrap_or_else(|| {
                    warn!("Unknown barcode type '{}' at {}, using C128", s, el.location());
                    BarcodeKind::default()
                }),
            }),
            "qrcode" => FieldKind::QrCode(match sub {
                None => QrLevel::default(),
                Some(s) => QrLevel::parse(s).unwrap_or_else(|| {
                    warn!("Unknown QR error level '{}' at {}, using M", s, el.location());
                    QrLevel::default()
                }),
            }),
            "plugin" => match sub.filter(|s| !s.is_empty()).or_else(|| el.value("class")) {
                Some(class) => FieldKind::Plugin(class.to_string()),
                None => return Err(el.invalid("type", raw, "plugin fields need a class")),
            },
            _ => return Err(el.invalid("type", raw, "unknown field type")),
        };
        Ok(kind)
    }

    fn parse_field(&self, el: &Element, kind: FieldKind) -> Result<FieldDefinition> {
        let x = match el.lengths("x")? {
            Some(xs) if xs.len() > 1 => XPlacement::List(xs),
            Some(xs) => {
                let start = xs.first().copied().unwrap_or(0.0);
                match el.length("step")? {
                    Some(step) if step != 0.0 => XPlacement::Stepped { start, step },
                    _ => XPlacement::Single(start),
                }
            }
            None => XPlacement::Single(0.0),
        };
        let y = match el.lengths("y")? {
            Some(ys) if ys.len() > 1 => YPlacement::List(ys),
            Some(ys) => YPlacement::Single(ys.first().copied().unwrap_or(0.0)),
            None => YPlacement::Single(0.0),
        };
        if kind == FieldKind::Poly {
            let (nx, ny) = match (&x, &y) {
                (XPlacement::List(xs), YPlacement::List(ys)) => (xs.len(), ys.len()),
                _ => (1, 1),
            };
            if nx != ny || nx < 2 {
                return Err(el.invalid(
                    "x",
                    el.attr("x").unwrap_or(""),
                    "polygon needs matching x and y lists with at least two points",
                ));
            }
        }

        let align = match el.value("align") {
            None => HAlign::Left,
            Some(v) => HAlign::parse(v).ok_or_else(|| el.invalid("align", v, "expected L, C, R or J"))?,
        };
        let valign = match el.value("valign") {
            None => VAlign::Top,
            Some(v) => VAlign::parse(v).ok_or_else(|| el.invalid("valign", v, "expected T, M or B"))?,
        };
        let opacity = el.number("opacity")?.map(|o| o.clamp(0.0, 1.0));

        Ok(FieldDefinition {
            name: el.value("name").unwrap_or("").to_string(),
            kind,
            x,
            y,
            width: el.length("width")?.unwrap_or(0.0).max(0.0),
            height: el.length("height")?.unwrap_or(0.0).max(0.0),
            font: el.font_override("")?,
            rotate: el.number("rotate")?.unwrap_or(0.0),
            opacity,
            bg_color: el.color("bgcolor")?,
            border: el.value("border").map(BorderSides::parse).unwrap_or_default(),
            border_width: el.length("borderwidth")?,
            border_color: el.color("bordercolor")?,
            align,
            valign,
            line_height: el.length("lineheight")?,
            convert: self.expression(el, "convert")?,
            fill_empty: el.attr("fillempty").map(FillEmpty::parse).unwrap_or_default(),
            orientation: el.parsed::<Orientation>("orientation")?,
            visible: self.expression(el, "visible")?,
            value: el.attr("value").map(String::from),
            src: el.value("src").map(String::from),
            options: el.value("options").map(parse_options).unwrap_or_default(),
        })
    }

    fn parse_page(
        &self,
        el: &Element,
        index: usize,
        block_defs: &HashMap<String, BlockDef>,
    ) -> Result<PageDefinition> {
        let name = el
            .value("name")
            .map(String::from)
            .unwrap_or_else(|| format!("page{}", index + 1));

        let mut page = PageDefinition {
            index,
            name: name.clone(),
            orientation: el.parsed::<Orientation>("orientation")?,
            font: el.font_override("")?,
            grid_page: el.value("gridpage").map(String::from),
            hide: el.flag("hide"),
            own_numbering: el.flag("ownnumbering"),
            start_number: match el.value("startnumber") {
                None => 1,
                Some(v) => v
                    .parse::<u32>()
                    .map_err(|_| el.invalid("startnumber", v, "expected a non-negative integer"))?,
            },
            no_pagination: el.flag("nopagination"),
            condition: self.expression(el, "condition")?,
            ..Default::default()
        };

        let mut grid_elements = Vec::new();
        for child in el.children() {
            match child.tag() {
                "template" => {
                    let page_no = match child.value("page") {
                        None => 1,
                        Some(v) => match v.parse::<u32>() {
                            Ok(n) if n > 0 => n,
                            _ => return Err(child.invalid("page", v, "expected a page number >= 1")),
                        },
                    };
                    page.template = Some(TemplateOverride {
                        src: child.required("src")?.to_string(),
                        page: page_no,
                    });
                }
                "field" | "image" | "plugin" => {
                    if let Some(field) = self.parse_field_element(&child)? {
                        page.fields.push(field);
                    }
                }
                "datagrid" => grid_elements.push(child),
                "flextable" => page.flex_tables.push(self.parse_flex_table(&child)?),
                "datablock" => {
                    let block = self.parse_data_block(&child)?;
                    if !block_defs.contains_key(&block.name) {
                        return Err(child.structure(format!("unknown block '{}'", block.name)));
                    }
                    page.data_blocks.push(block);
                }
                "repeat" => page.repeats.push(Point::new(
                    child.length("x")?.unwrap_or(0.0),
                    child.length("y")?.unwrap_or(0.0),
                )),
                other => debug!("Ignoring unknown element <{}> on page '{}'", other, name),
            }
        }
        check_unique(&name, &page.fields)?;

        let mut grid_owned = HashSet::new();
        for grid_el in &grid_elements {
            let grid = self.parse_grid(grid_el, &page, &mut grid_owned)?;
            page.grids.push(grid);
        }
        page.fields.retain(|f| !grid_owned.contains(&f.name));

        if let Some(grid_name) = &page.grid_page
            && page.grid(grid_name).is_none()
        {
            return Err(el.invalid("gridpage", grid_name, "no datagrid with that name on the page"));
        }
        Ok(page)
    }

    fn parse_grid(
        &self,
        el: &Element,
        page: &PageDefinition,
        grid_owned: &mut HashSet<String>,
    ) -> Result<DataGrid> {
        let name = el.required("name")?.to_string();
        let mut inline = Vec::new();
        for child in el.children() {
            if let Some(field) = self.parse_field_element(&child)? {
                inline.push(field);
            }
        }

        let fields = match el.value("fields") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|field_name| {
                    if field_name.eq_ignore_ascii_case(ADD_PAGE_SENTINEL) {
                        return Ok(GridField::AddPage);
                    }
                    if let Some(def) = inline.iter().find(|f| f.name == field_name) {
                        return Ok(GridField::Field(def.clone()));
                    }
                    match page.fields.iter().find(|f| f.name == field_name) {
                        Some(def) => {
                            grid_owned.insert(def.name.clone());
                            Ok(GridField::Field(def.clone()))
                        }
                        None => Err(ConfigError::UnknownGridField {
                            page: page.name.clone(),
                            grid: name.clone(),
                            field: field_name.to_string(),
                        }),
                    }
                })
                .collect::<Result<Vec<_>>>()?,
            None => inline.into_iter().map(GridField::Field).collect(),
        };

        let order = match el.value("order") {
            None => FillOrder::RowFirst,
            Some(v) if v.eq_ignore_ascii_case("R") => FillOrder::RowFirst,
            Some(v) if v.eq_ignore_ascii_case("C") => FillOrder::ColumnFirst,
            Some(v) => return Err(el.invalid("order", v, "expected R or C")),
        };

        let rows = el.count("rows", DEFAULT_GRID_ROWS)?;
        let cols = el.count("cols", DEFAULT_GRID_COLS)?;
        if rows.checked_mul(cols).is_none_or(|slots| slots > MAX_GRID_SLOTS) {
            let (attribute, value) = if rows >= cols { ("rows", rows) } else { ("cols", cols) };
            return Err(el.invalid(
                attribute,
                &value.to_string(),
                format!("a grid page holds at most {} slots", MAX_GRID_SLOTS),
            ));
        }

        Ok(DataGrid {
            name,
            fields,
            datasource: self.expression(el, "datasource")?,
            rows,
            cols,
            step_x: el.length("step_x")?.unwrap_or(0.0),
            step_y: el.length("step_y")?.unwrap_or(0.0),
            order,
            fill_empty: el.flag("fillempty"),
        })
    }

    fn parse_flex_table(&self, el: &Element) -> Result<FlexTable> {
        let name = el.required("name")?.to_string();
        let datasource_src = el.required("datasource")?;
        let datasource = self
            .expression(el, "datasource")?
            .ok_or_else(|| el.invalid("datasource", datasource_src, "empty datasource"))?;

        let mut columns = Vec::new();
        for col in el.children().filter(|c| c.tag() == "column") {
            let width = col.length("width")?.unwrap_or(0.0);
            if width <= 0.0 {
                return Err(col.invalid("width", col.attr("width").unwrap_or(""), "column width must be positive"));
            }
            let align = match col.value("align") {
                None => HAlign::Left,
                Some(v) => HAlign::parse(v).ok_or_else(|| col.invalid("align", v, "expected L, C, R or J"))?,
            };
            let mut header_font = col.font_override("header")?;
            if header_font.style.is_none() {
                header_font.style = Some(FontStyle {
                    bold: true,
                    ..Default::default()
                });
            }
            columns.push(FlexColumn {
                field: col.required("field")?.to_string(),
                width,
                title: col.attr("title").unwrap_or("").to_string(),
                align,
                header_font,
                header_bg: col.color("headerbg")?,
            });
        }
        if columns.is_empty() {
            return Err(el.structure(format!("flextable '{}' has no columns", name)));
        }

        let row_backgrounds = match el.value("bgcolors") {
            None => Vec::new(),
            Some(raw) => {
                let sep = if raw.contains(';') { ';' } else { ',' };
                raw.split(sep)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|c| c.parse::<Color>().map_err(|e| el.invalid("bgcolors", raw, e)))
                    .collect::<Result<Vec<_>>>()?
            }
        };

        Ok(FlexTable {
            name,
            datasource,
            x: el.length("x")?.unwrap_or(0.0),
            y: el.length("y")?.unwrap_or(0.0),
            columns,
            header: el.flag_or("header", true),
            row_backgrounds,
            border_width: el.length("border")?.unwrap_or(0.0).max(0.0),
            border_color: el.color("bordercolor")?.unwrap_or(Color::BLACK),
            padding: el.length("padding")?.unwrap_or(0.0).max(0.0),
            min_row_height: el.length("minrowheight")?.unwrap_or(0.0).max(0.0),
            font: el.font_override("")?,
        })
    }

    fn parse_data_block(&self, el: &Element) -> Result<DataBlock> {
        let mut shifts = HashMap::new();
        for shift in el.children().filter(|c| c.tag() == "shift") {
            shifts.insert(
                shift.required("field")?.to_string(),
                Point::new(
                    shift.length("x")?.unwrap_or(0.0),
                    shift.length("y")?.unwrap_or(0.0),
                ),
            );
        }
        Ok(DataBlock {
            name: el.required("name")?.to_string(),
            datasource: self.expression(el, "datasource")?,
            x: el.length("x")?.unwrap_or(0.0),
            y: el.length("y")?.unwrap_or(0.0),
            shifts,
        })
    }
}

fn parse_import(el: &Element) -> Result<ImportDirective> {
    Ok(ImportDirective {
        src: el.required("src")?.to_string(),
        datasub: el.value("datasub").map(String::from),
    })
}

fn parse_append(el: &Element) -> Result<AppendDirective> {
    let numbering = match el.value("numbering") {
        None => AppendNumbering::None,
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "none" | "0" => AppendNumbering::None,
            "inherit" | "1" => AppendNumbering::Inherit,
            "own" => AppendNumbering::Own,
            _ => return Err(el.invalid("numbering", v, "expected none, inherit or own")),
        },
    };
    Ok(AppendDirective {
        src: el.required("src")?.to_string(),
        after: el.value("after").map(String::from),
        numbering,
    })
}

fn check_unique(scope: &str, fields: &[FieldDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for field in fields.iter().filter(|f| !f.name.is_empty()) {
        if !seen.insert(field.name.as_str()) {
            return Err(ConfigError::DuplicateField {
                page: scope.to_string(),
                field: field.name.clone(),
            });
        }
    }
    Ok(())
}
