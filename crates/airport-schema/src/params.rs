//! Dynamic function parameter marshalling
//!
//! A function's declared input schema mixes three kinds of fields:
//! positional parameters, named parameters (`is_named_parameter`) and table
//! inputs (`is_table_input`). Table inputs are streamed separately through
//! an exchange, so they are dropped from the parameter payload and do not
//! consume a positional argument.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use airport_codec::ipc::write_ipc_stream;
use airport_core::metadata_keys::{self, has_flag};
use airport_core::{AirportError, ArrowResultExt, LocationDescriptor, Result, Value};
use arrow::array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow::datatypes::{Schema, SchemaRef};

/// Caller-supplied arguments to a dynamic function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub named: HashMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }
}

/// Input schema with every `is_table_input` field removed.
pub fn schema_without_table_inputs(schema: &Schema) -> SchemaRef {
    let fields: Vec<_> = schema
        .fields()
        .iter()
        .filter(|f| !has_flag(f.metadata(), metadata_keys::IS_TABLE_INPUT))
        .cloned()
        .collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

/// Build the single-row parameter batch for `schema`.
///
/// Named fields look up `args.named` (absent names become NULL); every
/// other non-table field takes the next positional argument. Leftover
/// positional arguments or unknown names are rejected.
pub fn marshal_parameters(
    schema: &Schema,
    args: &Arguments,
    location: &LocationDescriptor,
) -> Result<RecordBatch> {
    let output_schema = schema_without_table_inputs(schema);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(output_schema.fields().len());
    let mut next_positional = 0;
    let mut used_names = HashSet::new();

    for field in schema.fields() {
        let metadata = field.metadata();
        if has_flag(metadata, metadata_keys::IS_TABLE_INPUT) {
            continue;
        }
        let value = if has_flag(metadata, metadata_keys::IS_NAMED_PARAMETER) {
            used_names.insert(field.name().as_str());
            args.named.get(field.name()).unwrap_or(&Value::Null)
        } else {
            let value = args.positional.get(next_positional).ok_or_else(|| {
                AirportError::protocol(
                    location,
                    format!(
                        "missing positional argument {} for parameter '{}'",
                        next_positional,
                        field.name()
                    ),
                )
            })?;
            next_positional += 1;
            value
        };
        let array = value
            .to_array(field.data_type())
            .at(location, &format!("parameter '{}'", field.name()))?;
        columns.push(array);
    }

    if next_positional < args.positional.len() {
        return Err(AirportError::protocol(
            location,
            format!(
                "{} positional arguments supplied, {} expected",
                args.positional.len(),
                next_positional
            ),
        ));
    }
    let mut unknown: Vec<&str> = args
        .named
        .keys()
        .map(String::as_str)
        .filter(|name| !used_names.contains(name))
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(AirportError::protocol(
            location,
            format!("unknown named arguments: {}", unknown.join(", ")),
        ));
    }

    let options = RecordBatchOptions::new().with_row_count(Some(1));
    RecordBatch::try_new_with_options(output_schema, columns, &options)
        .at(location, "parameter batch")
}

/// Marshal and serialize as an Arrow IPC stream.
pub fn serialize_parameters(
    schema: &Schema,
    args: &Arguments,
    location: &LocationDescriptor,
) -> Result<Vec<u8>> {
    let batch = marshal_parameters(schema, args, location)?;
    write_ipc_stream(&batch.schema(), &[batch])
        .map_err(|e| AirportError::decode(location, "serialize parameters", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::AsArray;
    use arrow::datatypes::{DataType, Field, Int64Type};

    fn flagged(name: &str, key: &str) -> Field {
        Field::new(name, DataType::Int64, true)
            .with_metadata(HashMap::from([(key.to_string(), "1".to_string())]))
    }

    fn location() -> LocationDescriptor {
        LocationDescriptor::server("grpc://h:1")
    }

    #[test]
    fn test_missing_named_is_null() {
        let schema = Schema::new(vec![flagged("n", metadata_keys::IS_NAMED_PARAMETER)]);
        let batch = marshal_parameters(&schema, &Arguments::new(), &location()).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert!(batch.column(0).is_null(0));
    }

    #[test]
    fn test_only_table_input() {
        let schema = Schema::new(vec![flagged("t", metadata_keys::IS_TABLE_INPUT)]);
        let batch = marshal_parameters(&schema, &Arguments::new(), &location()).unwrap();
        assert_eq!(batch.num_columns(), 0);
        assert_eq!(batch.num_rows(), 1);
    }

    #[test]
    fn test_too_few_positional() {
        let schema = Schema::new(vec![
            Field::new("a", DataType::Int64, true),
            Field::new("b", DataType::Int64, true),
        ]);
        let args = Arguments::new().positional(1i64);
        assert!(marshal_parameters(&schema, &args, &location())
            .unwrap_err()
            .is_protocol_violation());
    }

    #[test]
    fn test_too_many_positional() {
        let schema = Schema::new(vec![Field::new("a", DataType::Int64, true)]);
        let args = Arguments::new().positional(1i64).positional(2i64);
        assert!(marshal_parameters(&schema, &args, &location())
            .unwrap_err()
            .is_protocol_violation());
    }

    #[test]
    fn test_unknown_named() {
        let schema = Schema::new(vec![Field::new("a", DataType::Int64, true)]);
        let args = Arguments::new().positional(1i64).named("zzz", 3i64);
        let err = marshal_parameters(&schema, &args, &location()).unwrap_err();
        assert!(err.to_string().contains("zzz"));
    }

    #[test]
    fn test_value_is_cast_to_field_type() {
        let schema = Schema::new(vec![Field::new("a", DataType::Int64, true)]);
        let args = Arguments::new().positional(7i32);
        let batch = marshal_parameters(&schema, &args, &location()).unwrap();
        assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(0), 7);
    }
}
