//! Flex tables: one row per record, row heights follow the wrapped content.
//! Tables never paginate; rows crossing the bottom margin are dropped.

use crate::error::ComposeError;
use crate::field::baseline;
use log::{debug, warn};
use quire_config::{FlexTable, FontSpec, Margins};
use quire_expr::{EvaluationContext, FunctionRegistry, evaluate, value_to_string};
use quire_render_core::metrics::line_height;
use quire_render_core::{DrawingBackend, PaintMode};
use quire_types::{Color, HAlign, Rect, Size};
use serde_json::Value;
use std::collections::HashMap;

/// Column widths, scaled down proportionally when the table is wider than
/// `available`.
pub fn column_widths(table: &FlexTable, available: f32) -> Vec<f32> {
    let total = table.total_width();
    let scale = if total > available && total > 0.0 && available > 0.0 {
        available / total
    } else {
        1.0
    };
    table.columns.iter().map(|c| c.width * scale).collect()
}

/// Records of a table. A missing array is an empty table.
pub fn rows(
    table: &FlexTable,
    record: &Value,
    params: &HashMap<String, Value>,
    functions: &FunctionRegistry,
) -> Result<Vec<Value>, ComposeError> {
    let e_ctx = EvaluationContext::new(record, params, functions);
    let data = evaluate(&table.datasource, &e_ctx).map_err(|e| ComposeError::GridData {
        grid: table.name.clone(),
        message: e.to_string(),
    })?;
    match data {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        _ => Err(ComposeError::GridData {
            grid: table.name.clone(),
            message: "datasource is not an array".to_string(),
        }),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableOutcome {
    pub rows: usize,
    pub dropped: usize,
}

struct Cell {
    text: String,
    font: FontSpec,
    background: Option<Color>,
    align: HAlign,
    width: f32,
}

pub struct TableLayout<'a> {
    pub page_size: Size,
    pub margins: Margins,
    pub font: &'a FontSpec,
}

/// Draws the table, restoring the backend's graphics state afterwards.
pub fn render(
    backend: &mut dyn DrawingBackend,
    table: &FlexTable,
    records: &[Value],
    layout: &TableLayout,
) -> Result<TableOutcome, ComposeError> {
    let saved = backend.graphics_state();
    let result = draw(backend, table, records, layout);
    backend.restore_graphics_state(&saved);
    result
}

fn draw(
    backend: &mut dyn DrawingBackend,
    table: &FlexTable,
    records: &[Value],
    layout: &TableLayout,
) -> Result<TableOutcome, ComposeError> {
    let available = layout.page_size.width - layout.margins.left - layout.margins.right;
    let widths = column_widths(table, available);
    let body_font = table.font.apply_to(layout.font);
    let limit = layout.page_size.height - layout.margins.bottom;
    let mut outcome = TableOutcome::default();
    let mut y = table.y;

    backend.set_draw_color(table.border_color);
    if table.border_width > 0.0 {
        backend.set_line_width(table.border_width);
    }

    if table.header {
        let header: Vec<Cell> = table
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, width)| Cell {
                text: col.title.clone(),
                font: col.header_font.apply_to(&body_font),
                background: col.header_bg,
                align: col.align,
                width: *width,
            })
            .collect();
        let height = row_height(backend, table, &header);
        if y + height > limit {
            warn!("Flex table '{}' does not fit below y={}", table.name, y);
            outcome.dropped = records.len();
            return Ok(outcome);
        }
        draw_row(backend, table, &header, y, height)?;
        y += height;
    }

    for (i, record) in records.iter().enumerate() {
        let background = match table.row_backgrounds.len() {
            0 => None,
            n => Some(table.row_backgrounds[i % n]),
        };
        let cells: Vec<Cell> = table
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, width)| Cell {
                text: value_to_string(&cell_value(record, &col.field)),
                font: body_font.clone(),
                background,
                align: col.align,
                width: *width,
            })
            .collect();
        let height = row_height(backend, table, &cells);
        if y + height > limit {
            outcome.dropped = records.len() - i;
            warn!(
                "Flex table '{}': {} rows cross the bottom margin and were dropped",
                table.name, outcome.dropped
            );
            break;
        }
        draw_row(backend, table, &cells, y, height)?;
        y += height;
        outcome.rows += 1;
    }
    debug!("Flex table '{}' drew {} rows", table.name, outcome.rows);
    Ok(outcome)
}

fn cell_value(record: &Value, field: &str) -> Value {
    match record {
        Value::Object(map) => map.get(field).cloned().unwrap_or(Value::Null),
        scalar => scalar.clone(),
    }
}

fn row_height(backend: &mut dyn DrawingBackend, table: &FlexTable, cells: &[Cell]) -> f32 {
    let content = cells
        .iter()
        .map(|cell| {
            backend.set_font(&cell.font.name, cell.font.style, cell.font.size);
            let inner = (cell.width - 2.0 * table.padding).max(0.0);
            backend.measure_wrapped_height(&cell.text, inner, line_height(cell.font.size))
                + 2.0 * table.padding
        })
        .fold(0.0_f32, f32::max);
    content.max(table.min_row_height)
}

fn draw_row(
    backend: &mut dyn DrawingBackend,
    table: &FlexTable,
    cells: &[Cell],
    y: f32,
    height: f32,
) -> Result<(), ComposeError> {
    let mut x = table.x;
    for cell in cells {
        let width = cell.width;
        let rect = Rect::new(x, y, width, height);
        if let Some(bg) = cell.background {
            backend.set_fill_color(bg);
            backend.draw_rect(rect, PaintMode::Fill)?;
        }
        if table.border_width > 0.0 {
            backend.draw_rect(rect, PaintMode::Stroke)?;
        }

        let font = &cell.font;
        backend.set_font(&font.name, font.style, font.size);
        backend.set_text_color(font.color);
        let lh = line_height(font.size);
        let inner = (width - 2.0 * table.padding).max(0.0);
        let left = x + table.padding;
        for (k, line) in backend.wrap_text(&cell.text, inner).iter().enumerate() {
            let line_width = backend.text_width(line);
            let tx = match cell.align {
                HAlign::Left | HAlign::Justify => left,
                HAlign::Center => left + (inner - line_width) / 2.0,
                HAlign::Right => left + inner - line_width,
            };
            let ty = baseline(y + table.padding + k as f32 * lh, lh, font.size);
            backend.draw_text(tx, ty, line)?;
        }
        x += width;
    }
    Ok(())
}
