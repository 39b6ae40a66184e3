//! Draws one configured field with its data value.

use crate::error::ComposeError;
use crate::format::format_money;
use crate::registry::Registry;
use crate::session::Session;
use log::debug;
use quire_config::{FieldDefinition, FieldKind, FillEmpty, FontSpec, Margins, XPlacement, YPlacement};
use quire_expr::{EvaluationContext, evaluate, evaluate_as_bool, is_truthy, value_to_string};
use quire_render_core::metrics::{ASCENT, line_height};
use quire_render_core::utils::html_to_text;
use quire_render_core::{DrawingBackend, PaintMode, PluginArgs};
use quire_types::{HAlign, Orientation, Point, Rect, Size, SourceName, VAlign};
use serde_json::Value;
use std::collections::HashMap;

/// What a field needs to know about the page and record it is drawn for.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    /// Record visibility predicates are evaluated against.
    pub record: &'a Value,
    pub params: &'a HashMap<String, Value>,
    /// Effective page-scope font.
    pub font: &'a FontSpec,
    pub page_size: Size,
    pub margins: Margins,
    pub orientation: Orientation,
}

/// Value of `field` for `record`: the record entry named after the field,
/// else the field's static value.
pub fn field_value(field: &FieldDefinition, record: &Value) -> Value {
    if !field.name.is_empty()
        && let Some(v) = record.get(&field.name).filter(|v| !v.is_null())
    {
        return v.clone();
    }
    field
        .value
        .as_ref()
        .map(|s| Value::String(s.clone()))
        .unwrap_or(Value::Null)
}

pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

/// Resolved box and font of a field.
#[derive(Debug, Clone)]
struct Frame {
    font: FontSpec,
    rect: Rect,
    line_height: f32,
}

pub struct FieldRenderer<'r> {
    backend: &'r mut dyn DrawingBackend,
    session: &'r mut Session,
    registry: &'r Registry,
}

impl<'r> FieldRenderer<'r> {
    pub fn new(
        backend: &'r mut dyn DrawingBackend,
        session: &'r mut Session,
        registry: &'r Registry,
    ) -> Self {
        Self {
            backend,
            session,
            registry,
        }
    }

    pub fn draw_from_record(
        &mut self,
        field: &FieldDefinition,
        ctx: &FieldContext,
    ) -> Result<(), ComposeError> {
        let value = field_value(field, ctx.record);
        self.draw(field, &value, ctx)
    }

    /// Draws `field` showing `value`. The backend's graphics state is the same
    /// afterwards as before, whether or not drawing succeeded.
    pub fn draw(
        &mut self,
        field: &FieldDefinition,
        value: &Value,
        ctx: &FieldContext,
    ) -> Result<(), ComposeError> {
        if let Some(only) = field.orientation
            && only != ctx.orientation
        {
            debug!("Field '{}' skipped on {:?} page", field.name, ctx.orientation);
            return Ok(());
        }
        let functions = self.registry.functions();
        if let Some(visible) = &field.visible {
            let e_ctx = EvaluationContext::new(ctx.record, ctx.params, functions);
            let shown = evaluate_as_bool(visible, &e_ctx).map_err(|source| ComposeError::Expression {
                field: field.name.clone(),
                source,
            })?;
            if !shown {
                return Ok(());
            }
        }
        let value = match &field.convert {
            Some(convert) => {
                let e_ctx = EvaluationContext::new(value, ctx.params, functions);
                evaluate(convert, &e_ctx).map_err(|source| ComposeError::Expression {
                    field: field.name.clone(),
                    source,
                })?
            }
            None => value.clone(),
        };

        let frame = frame(field, ctx)?;
        if is_empty_value(&value) {
            return match field.kind {
                FieldKind::Text | FieldKind::Money | FieldKind::Date | FieldKind::Html => {
                    self.placeholder(field, &field.fill_empty, &frame)
                }
                FieldKind::Image | FieldKind::Plugin(_) => {
                    self.wrapped(field, &frame, |r| r.body(field, &value, &frame))
                }
                _ => Ok(()),
            };
        }
        if field.kind == FieldKind::Checkbox && !is_truthy(&value) {
            return Ok(());
        }
        self.wrapped(field, &frame, |r| r.body(field, &value, &frame))
    }

    /// Draws the empty-value placeholder of `field` with the given policy.
    pub fn draw_placeholder(
        &mut self,
        field: &FieldDefinition,
        policy: &FillEmpty,
        ctx: &FieldContext,
    ) -> Result<(), ComposeError> {
        let frame = frame(field, ctx)?;
        self.placeholder(field, policy, &frame)
    }

    fn placeholder(
        &mut self,
        field: &FieldDefinition,
        policy: &FillEmpty,
        frame: &Frame,
    ) -> Result<(), ComposeError> {
        if policy.is_none() {
            return Ok(());
        }
        self.wrapped(field, frame, |r| {
            let rect = frame.rect;
            match policy {
                FillEmpty::None => {}
                FillEmpty::Text(text) => r.text_lines(field, vec![text.clone()], frame)?,
                FillEmpty::Line if rect.height <= frame.line_height * 1.5 => {
                    let y = baseline(rect.y, frame.line_height, frame.font.size);
                    r.backend
                        .draw_line(Point::new(rect.x, y), Point::new(rect.right(), y))?;
                }
                FillEmpty::Line | FillEmpty::Zigzag => {
                    let corners = [
                        Point::new(rect.x, rect.y),
                        Point::new(rect.right(), rect.y),
                        Point::new(rect.x, rect.bottom()),
                        Point::new(rect.right(), rect.bottom()),
                    ];
                    for pair in corners.windows(2) {
                        r.backend.draw_line(pair[0], pair[1])?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Saves the graphics state, applies rotation, opacity and the field's
    /// colors, runs `body`, then puts everything back.
    fn wrapped<F>(&mut self, field: &FieldDefinition, frame: &Frame, body: F) -> Result<(), ComposeError>
    where
        F: FnOnce(&mut Self) -> Result<(), ComposeError>,
    {
        let saved = self.backend.graphics_state();
        let transformed = field.rotate != 0.0 || field.opacity.is_some();
        let mut result = Ok(());
        if transformed {
            result = self
                .backend
                .push_transform(field.rotate, frame.rect.origin(), field.opacity)
                .map_err(ComposeError::from);
        }
        if result.is_ok() {
            let font = &frame.font;
            self.backend.set_font(&font.name, font.style, font.size);
            self.backend.set_text_color(font.color);
            self.backend.set_draw_color(field.border_color.unwrap_or(font.color));
            if let Some(width) = field.border_width {
                self.backend.set_line_width(width);
            }
            result = body(self);
            if transformed {
                let popped = self.backend.pop_transform().map_err(ComposeError::from);
                result = result.and(popped);
            }
        }
        self.backend.restore_graphics_state(&saved);
        result
    }

    fn body(&mut self, field: &FieldDefinition, value: &Value, frame: &Frame) -> Result<(), ComposeError> {
        let rect = frame.rect;
        if let Some(bg) = field.bg_color
            && field.kind != FieldKind::Poly
        {
            self.backend.set_fill_color(bg);
            self.backend.draw_rect(rect, PaintMode::Fill)?;
        }
        match &field.kind {
            FieldKind::Text | FieldKind::Date => {
                self.text(field, &value_to_string(value), frame)?;
            }
            FieldKind::Money => self.text(field, &format_money(value), frame)?,
            FieldKind::Html => {
                let text = html_to_text(&value_to_string(value));
                let lines = self.backend.wrap_text(&text, rect.width);
                self.text_lines(field, lines, frame)?;
            }
            FieldKind::Image => self.image(field, value, frame)?,
            FieldKind::Checkbox => {
                let side = match (field.width > 0.0, field.height > 0.0) {
                    (true, true) => field.width.min(field.height),
                    (true, false) => field.width,
                    (false, true) => field.height,
                    (false, false) => frame.font.size,
                };
                let inset = side * 0.15;
                let (x0, y0) = (rect.x + inset, rect.y + inset);
                let (x1, y1) = (rect.x + side - inset, rect.y + side - inset);
                if field.border_width.is_none() {
                    self.backend.set_line_width((side * 0.08).max(0.5));
                }
                self.backend.draw_line(Point::new(x0, y0), Point::new(x1, y1))?;
                self.backend.draw_line(Point::new(x1, y0), Point::new(x0, y1))?;
            }
            FieldKind::Barcode(kind) => {
                self.backend.draw_barcode(*kind, &value_to_string(value), rect)?;
            }
            FieldKind::QrCode(level) => {
                let side = if field.height > 0.0 { rect.width.min(rect.height) } else { rect.width };
                let square = Rect::new(rect.x, rect.y, side, side);
                self.backend.draw_qrcode(*level, &value_to_string(value), square)?;
            }
            FieldKind::Rect => self.backend.draw_rect(rect, PaintMode::Stroke)?,
            FieldKind::Cross => {
                self.backend
                    .draw_line(rect.origin(), Point::new(rect.right(), rect.bottom()))?;
                self.backend
                    .draw_line(Point::new(rect.right(), rect.y), Point::new(rect.x, rect.bottom()))?;
            }
            FieldKind::Poly => {
                let points = polygon(field);
                let mode = match field.bg_color {
                    Some(bg) => {
                        self.backend.set_fill_color(bg);
                        PaintMode::FillStroke
                    }
                    None => PaintMode::Stroke,
                };
                self.backend.draw_polygon(&points, mode)?;
            }
            FieldKind::Plugin(class) => self.plugin(class, field, value, rect)?,
        }
        if !field.kind.is_shape() {
            self.border(field, rect)?;
        }
        Ok(())
    }

    fn border(&mut self, field: &FieldDefinition, rect: Rect) -> Result<(), ComposeError> {
        let sides = field.border;
        if sides.all() {
            self.backend.draw_rect(rect, PaintMode::Stroke)?;
            return Ok(());
        }
        let (left, top) = (rect.x, rect.y);
        let (right, bottom) = (rect.right(), rect.bottom());
        if sides.left {
            self.backend.draw_line(Point::new(left, top), Point::new(left, bottom))?;
        }
        if sides.top {
            self.backend.draw_line(Point::new(left, top), Point::new(right, top))?;
        }
        if sides.right {
            self.backend.draw_line(Point::new(right, top), Point::new(right, bottom))?;
        }
        if sides.bottom {
            self.backend.draw_line(Point::new(left, bottom), Point::new(right, bottom))?;
        }
        Ok(())
    }

    fn text(&mut self, field: &FieldDefinition, text: &str, frame: &Frame) -> Result<(), ComposeError> {
        let rect = frame.rect;
        let size = frame.font.size;
        match &field.x {
            XPlacement::List(xs) => {
                let y = baseline(rect.y, frame.line_height, size);
                for (c, x) in text.chars().zip(xs.iter()) {
                    self.backend.draw_text(*x, y, &c.to_string())?;
                }
                if text.chars().count() > xs.len() {
                    debug!("Field '{}' has more characters than positions", field.name);
                }
                Ok(())
            }
            XPlacement::Stepped { start, step } => {
                let y = baseline(rect.y, frame.line_height, size);
                for (i, c) in text.chars().enumerate() {
                    self.backend.draw_text(start + step * i as f32, y, &c.to_string())?;
                }
                Ok(())
            }
            XPlacement::Single(_) => {
                let lines = if field.height > frame.line_height {
                    let mut lines = self.backend.wrap_text(text, rect.width);
                    let fit = ((rect.height / frame.line_height).floor() as usize).max(1);
                    if lines.len() > fit {
                        debug!("Field '{}' clipped to {} lines", field.name, fit);
                        lines.truncate(fit);
                    }
                    lines
                } else {
                    vec![text.replace('\n', " ")]
                };
                self.text_lines(field, lines, frame)
            }
        }
    }

    fn text_lines(
        &mut self,
        field: &FieldDefinition,
        lines: Vec<String>,
        frame: &Frame,
    ) -> Result<(), ComposeError> {
        let rect = frame.rect;
        let lh = frame.line_height;
        let block = lines.len() as f32 * lh;
        let top = match field.valign {
            VAlign::Top => rect.y,
            VAlign::Middle => rect.y + (rect.height - block) / 2.0,
            VAlign::Bottom => rect.y + rect.height - block,
        };
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            let y = baseline(top + i as f32 * lh, lh, frame.font.size);
            if field.align == HAlign::Justify && i < last {
                self.justified(line, rect, y)?;
                continue;
            }
            let width = self.backend.text_width(line);
            let x = match field.align {
                HAlign::Left | HAlign::Justify => rect.x,
                HAlign::Center => rect.x + (rect.width - width) / 2.0,
                HAlign::Right => rect.right() - width,
            };
            self.backend.draw_text(x, y, line)?;
        }
        Ok(())
    }

    fn justified(&mut self, line: &str, rect: Rect, y: f32) -> Result<(), ComposeError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 2 {
            self.backend.draw_text(rect.x, y, line)?;
            return Ok(());
        }
        let used: f32 = words.iter().map(|w| self.backend.text_width(w)).sum();
        let gap = (rect.width - used) / (words.len() - 1) as f32;
        let mut x = rect.x;
        for word in words {
            self.backend.draw_text(x, y, word)?;
            x += self.backend.text_width(word) + gap;
        }
        Ok(())
    }

    fn image(&mut self, field: &FieldDefinition, value: &Value, frame: &Frame) -> Result<(), ComposeError> {
        let from_value = Some(value_to_string(value)).filter(|s| !s.is_empty());
        let Some(name) = from_value.or_else(|| field.src.clone()) else {
            return Ok(());
        };
        let source = SourceName::from(name);
        let Some(info) = self.session.image(&source) else {
            debug!("Image '{}' for field '{}' skipped", source, field.name);
            return Ok(());
        };
        let aspect = info.aspect();
        let (width, height) = match (field.width > 0.0, field.height > 0.0) {
            (true, true) => (field.width, field.height),
            (true, false) => (field.width, field.width * aspect),
            (false, true) => (field.height / aspect, field.height),
            (false, false) => (info.width as f32, info.height as f32),
        };
        let rect = Rect::new(frame.rect.x, frame.rect.y, width, height);
        self.backend.draw_image(&source, &info.data, rect)?;
        Ok(())
    }

    fn plugin(
        &mut self,
        class: &str,
        field: &FieldDefinition,
        value: &Value,
        rect: Rect,
    ) -> Result<(), ComposeError> {
        let Some(factory) = self.registry.plugin(class) else {
            return Err(ComposeError::Plugin {
                class: class.to_string(),
                message: format!("no plugin registered for field '{}'", field.name),
            });
        };
        let mut plugin = factory.create(PluginArgs {
            options: field.options.clone(),
            rect,
        });
        if plugin.render(&mut *self.backend, value) {
            Ok(())
        } else {
            Err(ComposeError::Plugin {
                class: class.to_string(),
                message: plugin.error_message(),
            })
        }
    }
}

/// Baseline of a line whose box starts at `top`.
pub(crate) fn baseline(top: f32, line_height: f32, font_size: f32) -> f32 {
    top + (line_height - font_size) / 2.0 + ASCENT * font_size
}

fn polygon(field: &FieldDefinition) -> Vec<Point> {
    let xs: Vec<f32> = match &field.x {
        XPlacement::List(xs) => xs.clone(),
        other => vec![other.start()],
    };
    let ys: Vec<f32> = match &field.y {
        YPlacement::List(ys) => ys.clone(),
        YPlacement::Single(y) => vec![*y],
    };
    xs.into_iter().zip(ys).map(|(x, y)| Point::new(x, y)).collect()
}

fn frame(field: &FieldDefinition, ctx: &FieldContext) -> Result<Frame, ComposeError> {
    let coordinates: Vec<f32> = match (&field.x, &field.y) {
        (XPlacement::List(xs), YPlacement::List(ys)) => xs.iter().chain(ys).copied().collect(),
        (XPlacement::List(xs), y) => xs.iter().copied().chain([y.start()]).collect(),
        (x, YPlacement::List(ys)) => ys.iter().copied().chain([x.start()]).collect(),
        (x, y) => vec![x.start(), y.start()],
    };
    if let Some(bad) = coordinates.into_iter().find(|v| !v.is_finite()) {
        return Err(ComposeError::Coordinate {
            field: field.name.clone(),
            value: bad,
        });
    }

    let font = field.font.apply_to(ctx.font);
    let lh = field.line_height.unwrap_or_else(|| line_height(font.size));
    let x = field.x.start();
    let y = field.y.start();
    let width = if field.width > 0.0 {
        field.width
    } else {
        (ctx.page_size.width - ctx.margins.right - x).max(0.0)
    };
    let height = if field.height > 0.0 { field.height } else { lh };
    Ok(Frame {
        font,
        rect: Rect::new(x, y, width, height),
        line_height: lh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawOp, RecordingBackend};
    use quire_config::{BorderSides, FontOverride};
    use quire_expr::compile;
    use quire_render_core::{Plugin, RenderError};
    use quire_traits::InMemoryResourceProvider;
    use quire_types::{Color, FontStyle};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        backend: RecordingBackend,
        session: Session,
        registry: Registry,
        font: FontSpec,
        params: HashMap<String, Value>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut backend = RecordingBackend::new();
            backend
                .add_page(Size::new(595.0, 842.0), Orientation::Portrait)
                .unwrap();
            Self {
                backend,
                session: Session::new(Arc::new(InMemoryResourceProvider::new())),
                registry: Registry::new(),
                font: FontSpec::default(),
                params: HashMap::new(),
            }
        }

        fn draw(&mut self, field: &FieldDefinition, record: &Value) -> Result<(), ComposeError> {
            let ctx = FieldContext {
                record,
                params: &self.params,
                font: &self.font,
                page_size: Size::new(595.0, 842.0),
                margins: Margins::uniform(20.0),
                orientation: Orientation::Portrait,
            };
            FieldRenderer::new(&mut self.backend, &mut self.session, &self.registry)
                .draw_from_record(field, &ctx)
        }
    }

    fn text_field(name: &str, x: f32, y: f32) -> FieldDefinition {
        FieldDefinition {
            x: XPlacement::Single(x),
            y: YPlacement::Single(y),
            ..FieldDefinition::new(name, FieldKind::Text)
        }
    }

    #[test]
    fn test_money_field_text() {
        let mut f = Fixture::new();
        let field = FieldDefinition {
            kind: FieldKind::Money,
            ..text_field("amount", 10.0, 10.0)
        };
        f.draw(&field, &json!({ "amount": 1234.5 })).unwrap();
        assert_eq!(f.backend.texts(0), vec!["1 234.50"]);
    }

    #[test]
    fn test_state_is_restored_after_field() {
        let mut f = Fixture::new();
        let before = f.backend.graphics_state();
        let field = FieldDefinition {
            font: FontOverride {
                name: Some("times".into()),
                size: Some(18.0),
                style: Some(FontStyle::BOLD),
                color: Some(Color::rgb(200, 0, 0)),
            },
            bg_color: Some(Color::gray(230)),
            border: BorderSides::ALL,
            border_width: Some(2.0),
            rotate: 30.0,
            opacity: Some(0.5),
            ..text_field("title", 10.0, 10.0)
        };
        f.draw(&field, &json!({ "title": "Hello" })).unwrap();
        assert_eq!(f.backend.graphics_state(), before);
        let ops = f.backend.ops(0);
        assert!(matches!(ops.first(), Some(DrawOp::PushTransform { .. })));
        assert!(matches!(ops.last(), Some(DrawOp::PopTransform)));
    }

    #[test]
    fn test_static_value_and_convert() {
        let mut f = Fixture::new();
        let funcs = f.registry.functions().clone();
        let field = FieldDefinition {
            value: Some("fallback".into()),
            convert: Some(compile("upper(.)", &funcs).unwrap()),
            ..text_field("label", 10.0, 10.0)
        };
        f.draw(&field, &json!({})).unwrap();
        f.draw(&field, &json!({ "label": "data" })).unwrap();
        assert_eq!(f.backend.texts(0), vec!["FALLBACK", "DATA"]);
    }

    #[test]
    fn test_visibility_and_orientation_filters() {
        let mut f = Fixture::new();
        let funcs = f.registry.functions().clone();
        let hidden = FieldDefinition {
            visible: Some(compile("show", &funcs).unwrap()),
            ..text_field("a", 10.0, 10.0)
        };
        let landscape_only = FieldDefinition {
            orientation: Some(Orientation::Landscape),
            ..text_field("a", 10.0, 30.0)
        };
        f.draw(&hidden, &json!({ "a": "x", "show": false })).unwrap();
        f.draw(&landscape_only, &json!({ "a": "x" })).unwrap();
        assert!(f.backend.ops(0).is_empty());
        f.draw(&hidden, &json!({ "a": "x", "show": true })).unwrap();
        assert_eq!(f.backend.texts(0), vec!["x"]);
    }

    #[test]
    fn test_per_character_positions() {
        let mut f = Fixture::new();
        let field = FieldDefinition {
            x: XPlacement::List(vec![10.0, 20.0, 30.0]),
            ..text_field("inn", 0.0, 50.0)
        };
        f.draw(&field, &json!({ "inn": "1234" })).unwrap();
        let xs: Vec<f32> = f
            .backend
            .ops(0)
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { x, .. } => Some(*x),
                _ => None,
            })
            .collect();
        assert_eq!(xs, vec![10.0, 20.0, 30.0]);

        let stepped = FieldDefinition {
            x: XPlacement::Stepped { start: 100.0, step: 5.0 },
            ..text_field("code", 0.0, 70.0)
        };
        f.draw(&stepped, &json!({ "code": "ab" })).unwrap();
        assert!(f.backend.ops(0).iter().any(|op| matches!(op, DrawOp::Text { x, text, .. } if *x == 105.0 && text == "b")));
    }

    #[test]
    fn test_right_alignment_uses_margin_when_width_is_zero() {
        let mut f = Fixture::new();
        let field = FieldDefinition {
            align: HAlign::Right,
            ..text_field("n", 100.0, 10.0)
        };
        f.draw(&field, &json!({ "n": "42" })).unwrap();
        let width = f.backend.text_width("42");
        let x = f
            .backend
            .ops(0)
            .iter()
            .find_map(|op| match op {
                DrawOp::Text { x, .. } => Some(*x),
                _ => None,
            })
            .unwrap();
        assert!((x + width - 575.0).abs() < 1e-3);
    }

    #[test]
    fn test_tall_field_wraps_and_short_field_does_not() {
        let mut f = Fixture::new();
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let tall = FieldDefinition {
            width: 60.0,
            height: 100.0,
            ..text_field("t", 10.0, 10.0)
        };
        f.draw(&tall, &json!({ "t": text })).unwrap();
        assert!(f.backend.texts(0).len() > 1);

        let mut g = Fixture::new();
        let short = FieldDefinition {
            width: 60.0,
            ..text_field("t", 10.0, 10.0)
        };
        g.draw(&short, &json!({ "t": text })).unwrap();
        assert_eq!(g.backend.texts(0), vec![text]);
    }

    #[test]
    fn test_fill_empty_placeholders() {
        let mut f = Fixture::new();
        let line = FieldDefinition {
            width: 50.0,
            fill_empty: FillEmpty::Line,
            ..text_field("a", 10.0, 10.0)
        };
        f.draw(&line, &json!({})).unwrap();
        assert_eq!(f.backend.lines(0), 1);

        let tall = FieldDefinition {
            height: 60.0,
            ..line.clone()
        };
        f.draw(&tall, &json!({ "a": "" })).unwrap();
        assert_eq!(f.backend.lines(0), 4);

        let dash = FieldDefinition {
            fill_empty: FillEmpty::Text("---".into()),
            ..line
        };
        f.draw(&dash, &json!({})).unwrap();
        assert_eq!(f.backend.texts(0), vec!["---"]);
    }

    #[test]
    fn test_checkbox_only_when_truthy() {
        let mut f = Fixture::new();
        let field = FieldDefinition {
            width: 10.0,
            height: 10.0,
            ..FieldDefinition::new("ok", FieldKind::Checkbox)
        };
        f.draw(&field, &json!({ "ok": false })).unwrap();
        f.draw(&field, &json!({ "ok": "0" })).unwrap();
        assert_eq!(f.backend.lines(0), 0);
        f.draw(&field, &json!({ "ok": true })).unwrap();
        assert_eq!(f.backend.lines(0), 2);
    }

    #[test]
    fn test_shapes_need_a_value() {
        let mut f = Fixture::new();
        let rect = FieldDefinition {
            width: 20.0,
            height: 10.0,
            ..FieldDefinition::new("box", FieldKind::Rect)
        };
        f.draw(&rect, &json!({})).unwrap();
        assert!(f.backend.ops(0).is_empty());
        let stamped = FieldDefinition {
            value: Some("1".into()),
            ..rect
        };
        f.draw(&stamped, &json!({})).unwrap();
        assert!(matches!(f.backend.ops(0)[0], DrawOp::Rect { mode: PaintMode::Stroke, .. }));
    }

    #[test]
    fn test_non_finite_coordinate_is_error() {
        let mut f = Fixture::new();
        let field = text_field("bad", f32::NAN, 10.0);
        let err = f.draw(&field, &json!({ "bad": "x" })).unwrap_err();
        assert!(matches!(err, ComposeError::Coordinate { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_image_is_skipped() {
        let mut f = Fixture::new();
        let field = FieldDefinition {
            src: Some("logo.png".into()),
            width: 30.0,
            ..FieldDefinition::new("logo", FieldKind::Image)
        };
        f.draw(&field, &json!({})).unwrap();
        assert!(f.backend.ops(0).is_empty());
    }

    #[test]
    fn test_image_height_from_aspect_ratio() {
        let mut img = Vec::new();
        image::RgbImage::new(40, 20)
            .write_to(&mut std::io::Cursor::new(&mut img), image::ImageFormat::Png)
            .unwrap();
        let mut f = Fixture::new();
        f.session = Session::new(Arc::new(InMemoryResourceProvider::new().with("logo.png", img)));
        let field = FieldDefinition {
            src: Some("logo.png".into()),
            width: 30.0,
            ..FieldDefinition::new("logo", FieldKind::Image)
        };
        f.draw(&field, &json!({})).unwrap();
        match &f.backend.ops(0)[0] {
            DrawOp::Image { rect, .. } => assert!((rect.height - 15.0).abs() < 1e-4),
            other => panic!("unexpected op {:?}", other),
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn render(&mut self, _backend: &mut dyn DrawingBackend, _data: &Value) -> bool {
            false
        }

        fn error_message(&self) -> String {
            "device not ready".into()
        }
    }

    #[test]
    fn test_plugin_errors_are_recoverable() {
        let mut f = Fixture::new();
        let field = FieldDefinition::new("sig", FieldKind::Plugin("signature".into()));
        let missing = f.draw(&field, &json!({})).unwrap_err();
        assert!(matches!(missing, ComposeError::Plugin { ref class, .. } if class == "signature"));
        assert!(!missing.is_fatal());

        f.registry
            .register_plugin("signature", |_: PluginArgs| -> Box<dyn Plugin> { Box::new(Failing) });
        let failed = f.draw(&field, &json!({})).unwrap_err();
        assert!(matches!(failed, ComposeError::Plugin { ref message, .. } if message == "device not ready"));
    }

    #[test]
    fn test_bad_barcode_data_is_recoverable() {
        let mut f = Fixture::new();
        f.backend.fail_barcodes = true;
        let field = FieldDefinition {
            width: 40.0,
            height: 10.0,
            ..FieldDefinition::new("code", FieldKind::Barcode(Default::default()))
        };
        let err = f.draw(&field, &json!({ "code": "abc" })).unwrap_err();
        assert!(matches!(err, ComposeError::Render(RenderError::Barcode(_))));
        assert!(!err.is_fatal());
    }
}
