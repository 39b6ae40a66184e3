//! Data grid expansion.
//!
//! A grid places one record per slot on a `rows x cols` lattice. Expansion is
//! planned up front as a flat list of [`GridStep`]s; the driver executes the
//! plan, starting new physical pages where the plan says so.

use crate::error::ComposeError;
use log::{debug, warn};
use quire_config::{DataGrid, FieldDefinition, FillOrder, GridField, MAX_GRID_SLOTS};
use quire_expr::{EvaluationContext, FunctionRegistry, evaluate};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::ops::Range;

/// Upper bound on numbered clone records (`name1`, `name2`, ...).
const MAX_CLONES: usize = 10_000;

/// `(row, col)` of slot `k`.
pub fn slot_position(order: FillOrder, rows: usize, cols: usize, k: usize) -> (usize, usize) {
    match order {
        FillOrder::RowFirst => (k % rows.max(1), k / rows.max(1)),
        FillOrder::ColumnFirst => (k / cols.max(1), k % cols.max(1)),
    }
}

/// Offset applied to the fields of slot `k`.
pub fn slot_offset(grid: &DataGrid, k: usize) -> (f32, f32) {
    let (row, col) = slot_position(grid.order, grid.rows, grid.cols, k);
    (col as f32 * grid.step_x, row as f32 * grid.step_y)
}

/// Field ranges separated by `@addpage` markers.
pub fn segments(grid: &DataGrid) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, f) in grid.fields.iter().enumerate() {
        if matches!(f, GridField::AddPage) {
            out.push(start..i);
            start = i + 1;
        }
    }
    out.push(start..grid.fields.len());
    out
}

/// Field definitions of one segment.
pub fn segment_fields<'g>(
    grid: &'g DataGrid,
    segment: &Range<usize>,
) -> impl Iterator<Item = &'g FieldDefinition> {
    grid.fields[segment.clone()].iter().filter_map(|f| match f {
        GridField::Field(def) => Some(def),
        GridField::AddPage => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridStep {
    /// Draw the fields of `segment` for `record` in `slot`.
    Draw {
        record: usize,
        segment: usize,
        slot: usize,
    },
    /// Emit the current page and continue on a fresh one.
    NewPage,
    /// Draw fill-empty placeholders for the fields of `segment` in an
    /// unused slot.
    Placeholder { segment: usize, slot: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridPlan {
    pub steps: Vec<GridStep>,
    /// Records that did not fit a fixed grid.
    pub dropped: usize,
}

impl GridPlan {
    pub fn page_breaks(&self) -> usize {
        self.steps.iter().filter(|s| **s == GridStep::NewPage).count()
    }
}

/// Plans the expansion of `records` records. `paginate` is set for the
/// page's grid-page grid; any other grid stops at capacity.
pub fn plan(grid: &DataGrid, records: usize, paginate: bool) -> GridPlan {
    let capacity = grid.capacity();
    let segments = segments(grid);
    let mut plan = GridPlan::default();
    if capacity == 0 {
        plan.dropped = records;
        return plan;
    }

    let mut slot = 0;
    for record in 0..records {
        if slot >= capacity {
            if !paginate {
                plan.dropped = records - record;
                break;
            }
            plan.steps.push(GridStep::NewPage);
            slot = 0;
        }
        for segment in 0..segments.len() {
            if segment > 0 {
                plan.steps.push(GridStep::NewPage);
                slot = 0;
            }
            plan.steps.push(GridStep::Draw {
                record,
                segment,
                slot,
            });
        }
        slot += 1;
    }

    if plan.dropped == 0 && grid.fill_empty {
        // The open page holds the last segment once any record was drawn.
        let segment = if records > 0 { segments.len() - 1 } else { 0 };
        plan.steps.extend(
            (slot..capacity.min(MAX_GRID_SLOTS)).map(|slot| GridStep::Placeholder { segment, slot }),
        );
    }
    plan
}

/// Records feeding a grid for one entity record.
pub fn records(
    grid: &DataGrid,
    record: &Value,
    params: &HashMap<String, Value>,
    functions: &FunctionRegistry,
) -> Result<Vec<Value>, ComposeError> {
    let Some(datasource) = &grid.datasource else {
        return Ok(numbered_clones(grid, record));
    };
    let e_ctx = EvaluationContext::new(record, params, functions);
    let data = evaluate(datasource, &e_ctx).map_err(|e| ComposeError::GridData {
        grid: grid.name.clone(),
        message: e.to_string(),
    })?;
    match data {
        Value::Array(items) => Ok(items),
        Value::Null => {
            debug!("Grid '{}' has no data", grid.name);
            Ok(Vec::new())
        }
        other => Err(ComposeError::GridData {
            grid: grid.name.clone(),
            message: format!("datasource is not an array but {}", kind_of(&other)),
        }),
    }
}

/// Builds records from `field1`, `field2`, ... keys of the entity record
/// until none of the grid's fields has a value for the next index.
fn numbered_clones(grid: &DataGrid, record: &Value) -> Vec<Value> {
    let names: Vec<&str> = grid.field_defs().map(|f| f.name.as_str()).collect();
    let mut out = Vec::new();
    for i in 1..=MAX_CLONES {
        let row: Map<String, Value> = names
            .iter()
            .filter_map(|name| {
                record
                    .get(format!("{}{}", name, i))
                    .filter(|v| !v.is_null())
                    .map(|v| (name.to_string(), v.clone()))
            })
            .collect();
        if row.is_empty() {
            break;
        }
        out.push(Value::Object(row));
    }
    if out.len() == MAX_CLONES {
        warn!("Grid '{}' stopped after {} numbered records", grid.name, MAX_CLONES);
    }
    out
}

/// Value of a grid field inside one grid record. Scalar records feed every
/// field directly.
pub fn cell_value(field: &FieldDefinition, record: &Value) -> Value {
    match record {
        Value::Object(map) => map
            .get(&field.name)
            .cloned()
            .filter(|v| !v.is_null())
            .or_else(|| field.value.clone().map(Value::String))
            .unwrap_or(Value::Null),
        scalar => scalar.clone(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_config::FieldKind;
    use quire_expr::compile;
    use serde_json::json;

    fn grid(rows: usize, cols: usize, order: FillOrder, fields: Vec<GridField>) -> DataGrid {
        DataGrid {
            name: "items".into(),
            fields,
            datasource: None,
            rows,
            cols,
            step_x: 50.0,
            step_y: 10.0,
            order,
            fill_empty: false,
        }
    }

    fn field(name: &str) -> GridField {
        GridField::Field(FieldDefinition::new(name, FieldKind::Text))
    }

    fn draws(plan: &GridPlan) -> Vec<(usize, usize)> {
        plan.steps
            .iter()
            .filter_map(|s| match s {
                GridStep::Draw { record, slot, .. } => Some((*record, *slot)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_slot_positions() {
        assert_eq!(slot_position(FillOrder::RowFirst, 3, 2, 0), (0, 0));
        assert_eq!(slot_position(FillOrder::RowFirst, 3, 2, 4), (1, 1));
        assert_eq!(slot_position(FillOrder::ColumnFirst, 3, 2, 3), (1, 1));
        assert_eq!(slot_position(FillOrder::ColumnFirst, 3, 2, 4), (2, 0));

        let g = grid(3, 2, FillOrder::RowFirst, vec![field("a")]);
        assert_eq!(slot_offset(&g, 4), (50.0, 10.0));
    }

    #[test]
    fn test_fixed_grid_drops_excess() {
        let g = grid(2, 1, FillOrder::RowFirst, vec![field("a")]);
        let p = plan(&g, 3, false);
        assert_eq!(draws(&p), vec![(0, 0), (1, 1)]);
        assert_eq!(p.dropped, 1);
        assert_eq!(p.page_breaks(), 0);
    }

    #[test]
    fn test_paginating_grid_page_count() {
        let g = grid(2, 2, FillOrder::RowFirst, vec![field("a")]);
        for (n, pages) in [(0, 1), (1, 1), (4, 1), (5, 2), (9, 3)] {
            let p = plan(&g, n, true);
            assert_eq!(p.page_breaks() + 1, pages, "{} records", n);
            assert_eq!(p.dropped, 0);
        }
    }

    #[test]
    fn test_addpage_continues_record_on_fresh_page() {
        let g = grid(3, 1, FillOrder::RowFirst, vec![field("a"), GridField::AddPage, field("b")]);
        let p = plan(&g, 2, true);
        assert_eq!(
            p.steps,
            vec![
                GridStep::Draw { record: 0, segment: 0, slot: 0 },
                GridStep::NewPage,
                GridStep::Draw { record: 0, segment: 1, slot: 0 },
                GridStep::Draw { record: 1, segment: 0, slot: 1 },
                GridStep::NewPage,
                GridStep::Draw { record: 1, segment: 1, slot: 0 },
            ]
        );
        let segs = segments(&g);
        assert_eq!(segs, vec![0..1, 2..3]);
        assert_eq!(segment_fields(&g, &segs[1]).next().map(|f| f.name.as_str()), Some("b"));
    }

    #[test]
    fn test_fill_empty_pads_remaining_slots() {
        let mut g = grid(2, 2, FillOrder::ColumnFirst, vec![field("a")]);
        g.fill_empty = true;
        let p = plan(&g, 5, true);
        let placeholders: Vec<usize> = p
            .steps
            .iter()
            .filter_map(|s| match s {
                GridStep::Placeholder { slot, .. } => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(placeholders, vec![1, 2, 3]);
    }

    #[test]
    fn test_fill_empty_after_addpage_uses_last_segment() {
        let mut g = grid(3, 1, FillOrder::RowFirst, vec![field("a"), GridField::AddPage, field("b")]);
        g.fill_empty = true;
        let p = plan(&g, 1, true);
        assert_eq!(
            &p.steps[3..],
            &[
                GridStep::Placeholder { segment: 1, slot: 1 },
                GridStep::Placeholder { segment: 1, slot: 2 },
            ]
        );

        let empty = plan(&g, 0, true);
        assert_eq!(empty.steps.len(), 3);
        assert!(empty.steps.iter().all(|s| matches!(s, GridStep::Placeholder { segment: 0, .. })));
    }

    #[test]
    fn test_huge_grid_does_not_overflow() {
        let mut g = grid(usize::MAX, usize::MAX, FillOrder::RowFirst, vec![field("a")]);
        g.fill_empty = true;
        assert_eq!(g.capacity(), usize::MAX);
        let p = plan(&g, 2, false);
        assert_eq!(p.dropped, 0);
        assert_eq!(p.steps.len(), MAX_GRID_SLOTS);
    }

    #[test]
    fn test_records_from_datasource() {
        let funcs = FunctionRegistry::default();
        let params = HashMap::new();
        let mut g = grid(2, 1, FillOrder::RowFirst, vec![field("a")]);
        g.datasource = Some(compile("items", &funcs).unwrap());

        let data = json!({ "items": [{ "a": 1 }, { "a": 2 }] });
        assert_eq!(records(&g, &data, &params, &funcs).unwrap().len(), 2);
        assert!(records(&g, &json!({}), &params, &funcs).unwrap().is_empty());

        let err = records(&g, &json!({ "items": "oops" }), &params, &funcs).unwrap_err();
        assert!(matches!(err, ComposeError::GridData { ref grid, .. } if grid == "items"));
    }

    #[test]
    fn test_numbered_clones() {
        let funcs = FunctionRegistry::default();
        let params = HashMap::new();
        let g = grid(5, 1, FillOrder::RowFirst, vec![field("pos"), field("title")]);
        let data = json!({ "pos1": 1, "title1": "a", "title2": "b", "pos4": 4 });
        let rows = records(&g, &data, &params, &funcs).unwrap();
        assert_eq!(rows, vec![json!({ "pos": 1, "title": "a" }), json!({ "title": "b" })]);
    }

    #[test]
    fn test_cell_values() {
        let f = FieldDefinition::new("a", FieldKind::Text);
        assert_eq!(cell_value(&f, &json!({ "a": "x" })), json!("x"));
        assert_eq!(cell_value(&f, &json!("scalar")), json!("scalar"));
        assert_eq!(cell_value(&f, &json!({})), Value::Null);
    }
}
