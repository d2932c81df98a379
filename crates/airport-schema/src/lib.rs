//! Schema translation for Airport remote objects
//!
//! Converts annotated Arrow wire schemas into engine column definitions,
//! function signatures and single-row parameter payloads.

pub mod function;
pub mod naming;
pub mod params;
pub mod translate;

pub use function::{function_signature, output_types, scalar_input_types, FunctionSignature};
pub use params::{marshal_parameters, schema_without_table_inputs, serialize_parameters, Arguments};
pub use translate::{translate_schema, ColumnDefinition, Constraint, TranslatedTable};
