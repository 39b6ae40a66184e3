//! Data blocks: a named group of fields instantiated at an offset.

use crate::error::ComposeError;
use log::debug;
use quire_config::{BlockDef, DataBlock, FieldDefinition};
use quire_expr::{EvaluationContext, FunctionRegistry, evaluate};
use serde_json::Value;
use std::collections::HashMap;

/// The record a block reads its values from: the addressed sub-record, or
/// the page record when the block has no datasource. `None` when the address
/// does not lead to an object.
pub fn block_record(
    block: &DataBlock,
    record: &Value,
    params: &HashMap<String, Value>,
    functions: &FunctionRegistry,
) -> Result<Option<Value>, ComposeError> {
    let Some(datasource) = &block.datasource else {
        return Ok(Some(record.clone()));
    };
    let e_ctx = EvaluationContext::new(record, params, functions);
    let data = evaluate(datasource, &e_ctx).map_err(|source| ComposeError::Expression {
        field: block.name.clone(),
        source,
    })?;
    if data.is_object() {
        Ok(Some(data))
    } else {
        debug!("Data block '{}' has no record", block.name);
        Ok(None)
    }
}

/// The block definition's fields moved to the block origin plus any per-field
/// shift.
pub fn placed_fields(block: &DataBlock, def: &BlockDef) -> Vec<FieldDefinition> {
    def.fields
        .iter()
        .map(|field| {
            let shift = block.shifts.get(&field.name).copied().unwrap_or_default();
            field.offset(block.x + shift.x, block.y + shift.y)
        })
        .collect()
}
