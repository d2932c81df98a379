//! Function signatures derived from annotated input schemas

use std::collections::BTreeMap;

use airport_core::metadata_keys::{self, has_flag};
use airport_core::{LocationDescriptor, LogicalType, Result};
use arrow::datatypes::{Field, Schema};

use crate::naming::column_name;
use crate::translate::field_type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub logical_type: LogicalType,
}

/// Parameters of a table function, split the way a binder consumes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionSignature {
    /// Every input field in wire order; table inputs typed `TABLE`.
    pub all: Vec<Parameter>,
    /// Positional slots in call order, table inputs included.
    pub positional: Vec<Parameter>,
    pub named: BTreeMap<String, LogicalType>,
    pub has_table_input: bool,
}

impl FunctionSignature {
    pub fn positional_types(&self) -> Vec<LogicalType> {
        self.positional.iter().map(|p| p.logical_type.clone()).collect()
    }
}

fn declared_type(field: &Field, location: &LocationDescriptor) -> Result<LogicalType> {
    if has_flag(field.metadata(), metadata_keys::IS_ANY_TYPE) {
        Ok(LogicalType::Any)
    } else {
        field_type(field, location)
    }
}

/// Input types of a scalar function; `is_any_type` fields accept anything.
pub fn scalar_input_types(schema: &Schema, location: &LocationDescriptor) -> Result<Vec<LogicalType>> {
    schema
        .fields()
        .iter()
        .map(|f| declared_type(f, location))
        .collect()
}

/// Column names and types of a function's output schema.
pub fn output_types(schema: &Schema, location: &LocationDescriptor) -> Result<Vec<Parameter>> {
    schema
        .fields()
        .iter()
        .enumerate()
        .map(|(i, f)| {
            Ok(Parameter {
                name: column_name(f, i),
                logical_type: field_type(f, location)?,
            })
        })
        .collect()
}

pub fn function_signature(schema: &Schema, location: &LocationDescriptor) -> Result<FunctionSignature> {
    let mut signature = FunctionSignature::default();
    for (wire_index, field) in schema.fields().iter().enumerate() {
        let metadata = field.metadata();
        let value_type = declared_type(field, location)?;
        let is_table_input = has_flag(metadata, metadata_keys::IS_TABLE_INPUT);
        let slot_type = if is_table_input {
            signature.has_table_input = true;
            LogicalType::Table
        } else {
            value_type.clone()
        };
        let name = column_name(field, wire_index);
        signature.all.push(Parameter {
            name: name.clone(),
            logical_type: slot_type.clone(),
        });
        if has_flag(metadata, metadata_keys::IS_NAMED_PARAMETER) {
            signature.named.insert(name, value_type);
        } else {
            signature.positional.push(Parameter {
                name,
                logical_type: slot_type,
            });
        }
    }
    Ok(signature)
}
