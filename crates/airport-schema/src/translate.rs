//! Wire schema to engine table definition

use std::collections::HashMap;
use std::sync::Arc;

use airport_codec::TableCheckConstraints;
use airport_core::metadata_keys::{self, has_flag, non_empty};
use airport_core::{AirportError, LocationDescriptor, LogicalType, Result};
use arrow::datatypes::{Field, Schema, SchemaRef};
use tracing::debug;

use crate::naming::{column_name, deduplicate_names};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub logical_type: LogicalType,
    /// Position of the source field in the wire schema.
    pub wire_index: usize,
    pub comment: Option<String>,
    pub default_expr: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
            wire_index: 0,
            comment: None,
            default_expr: None,
        }
    }
}

/// Constraint indexes refer to positions in [`TranslatedTable::columns`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    NotNull(usize),
    Unique(usize),
    Check(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslatedTable {
    pub columns: Vec<ColumnDefinition>,
    pub constraints: Vec<Constraint>,
    /// Type of the hidden row-id column, if the table has one.
    pub rowid_type: Option<LogicalType>,
}

impl TranslatedTable {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_types(&self) -> Vec<LogicalType> {
        self.columns.iter().map(|c| c.logical_type.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn is_not_null(&self, index: usize) -> bool {
        self.constraints
            .iter()
            .any(|c| matches!(c, Constraint::NotNull(i) if *i == index))
    }

    pub fn check_expressions(&self) -> impl Iterator<Item = &str> {
        self.constraints.iter().filter_map(|c| match c {
            Constraint::Check(expr) => Some(expr.as_str()),
            _ => None,
        })
    }

    /// Arrow schema describing this table, with NOT NULL columns as
    /// non-nullable fields and comments/defaults as field metadata.
    pub fn to_arrow_schema(&self, location: &LocationDescriptor) -> Result<SchemaRef> {
        let mut fields = Vec::with_capacity(self.columns.len());
        for (index, column) in self.columns.iter().enumerate() {
            let data_type = column.logical_type.to_arrow().ok_or_else(|| {
                AirportError::protocol(
                    location,
                    format!("column '{}' has no physical type ({})", column.name, column.logical_type),
                )
            })?;
            let mut metadata = HashMap::new();
            if let Some(comment) = &column.comment {
                metadata.insert(metadata_keys::COMMENT.to_string(), comment.clone());
            }
            if let Some(default_expr) = &column.default_expr {
                metadata.insert(metadata_keys::DEFAULT.to_string(), default_expr.clone());
            }
            fields.push(
                Field::new(&column.name, data_type, !self.is_not_null(index)).with_metadata(metadata),
            );
        }
        Ok(Arc::new(Schema::new(fields)))
    }
}

/// Translate an annotated wire schema.
///
/// A field flagged `is_rowid` is pulled out into `rowid_type` and excluded
/// from `columns`; every later column shifts down by one, which is tracked
/// explicitly so each definition pairs the name and type of its own wire
/// field.
pub fn translate_schema(schema: &Schema, location: &LocationDescriptor) -> Result<TranslatedTable> {
    let mut rowid_type = None;
    let mut names = Vec::with_capacity(schema.fields().len());
    let mut types = Vec::with_capacity(schema.fields().len());
    let mut not_null = Vec::new();

    // Pass 1: names, types and nullability of the visible columns.
    for (wire_index, field) in schema.fields().iter().enumerate() {
        let logical_type = field_type(field, location)?;
        if has_flag(field.metadata(), metadata_keys::IS_ROWID) {
            if rowid_type.is_some() {
                return Err(AirportError::protocol(
                    location,
                    format!("second row-id column '{}' at wire index {}", field.name(), wire_index),
                ));
            }
            rowid_type = Some(logical_type);
            continue;
        }
        if !field.is_nullable() {
            not_null.push(names.len());
        }
        names.push(column_name(field, wire_index));
        types.push(logical_type);
    }

    deduplicate_names(&mut names);

    // Pass 2: column definitions, indexed through the row-id adjustment.
    let mut rowid_adjust = 0;
    let mut columns = Vec::with_capacity(names.len());
    for (wire_index, field) in schema.fields().iter().enumerate() {
        if has_flag(field.metadata(), metadata_keys::IS_ROWID) {
            rowid_adjust += 1;
            continue;
        }
        let dense = wire_index - rowid_adjust;
        columns.push(ColumnDefinition {
            name: names[dense].clone(),
            logical_type: types[dense].clone(),
            wire_index,
            comment: non_empty(field.metadata(), metadata_keys::COMMENT).map(str::to_string),
            default_expr: non_empty(field.metadata(), metadata_keys::DEFAULT).map(str::to_string),
        });
    }

    let mut constraints = check_constraints(schema, location)?;
    constraints.extend(not_null.into_iter().map(Constraint::NotNull));

    debug!(
        location = %location,
        columns = columns.len(),
        has_rowid = rowid_type.is_some(),
        "Translated wire schema"
    );

    Ok(TranslatedTable {
        columns,
        constraints,
        rowid_type,
    })
}

pub(crate) fn field_type(field: &Field, location: &LocationDescriptor) -> Result<LogicalType> {
    LogicalType::from_arrow(field.data_type()).map_err(|message| {
        AirportError::protocol(location, format!("column '{}': {}", field.name(), message))
    })
}

fn check_constraints(schema: &Schema, location: &LocationDescriptor) -> Result<Vec<Constraint>> {
    let Some(encoded) = non_empty(schema.metadata(), metadata_keys::CHECK_CONSTRAINTS) else {
        return Ok(Vec::new());
    };
    let parsed = parse_check_constraints(encoded.as_bytes())
        .map_err(|e| AirportError::decode(location, "table check constraints", e))?;
    parsed
        .constraints
        .into_iter()
        .map(|expr| {
            if expr.trim().is_empty() {
                Err(AirportError::protocol(location, "empty CHECK constraint expression"))
            } else {
                Ok(Constraint::Check(expr))
            }
        })
        .collect()
}

/// msgpack `{constraints: [...]}`, or the same record as JSON since Arrow
/// metadata values must be valid UTF-8 to survive IPC decoding here.
fn parse_check_constraints(bytes: &[u8]) -> std::result::Result<TableCheckConstraints, String> {
    match airport_codec::decode::<TableCheckConstraints>(bytes) {
        Ok(parsed) => Ok(parsed),
        Err(msgpack_err) => serde_json::from_slice(bytes).map_err(|_| msgpack_err.to_string()),
    }
}
