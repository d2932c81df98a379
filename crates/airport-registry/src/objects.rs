//! Descriptors of tables and functions discovered in a remote schema

use std::sync::Arc;

use airport_codec::ipc::deserialize_schema;
use airport_codec::FlightAppMetadata;
use airport_core::{AirportError, LocationDescriptor, LogicalType, Result};
use airport_schema::{
    function_signature, output_types, scalar_input_types, translate_schema, FunctionSignature,
    TranslatedTable,
};
use arrow::datatypes::SchemaRef;
use arrow_flight::FlightInfo;
use prost::Message;

/// Provenance shared by every remote object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectInfo {
    pub catalog: String,
    pub schema: String,
    pub name: String,
    pub comment: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub location: LocationDescriptor,
    pub info: ObjectInfo,
    /// Wire schema as advertised by the server.
    pub schema: SchemaRef,
    pub table: TranslatedTable,
}

#[derive(Debug, Clone)]
pub struct ScalarFunctionDescriptor {
    pub location: LocationDescriptor,
    pub info: ObjectInfo,
    pub input_schema: SchemaRef,
    pub output_schema: SchemaRef,
    pub input_types: Vec<LogicalType>,
    pub return_type: LogicalType,
}

#[derive(Debug, Clone)]
pub struct TableFunctionDescriptor {
    pub location: LocationDescriptor,
    pub info: ObjectInfo,
    pub input_schema: SchemaRef,
    /// Advertised output; the bound call reports the authoritative one.
    pub output_schema: SchemaRef,
    pub action_name: String,
    pub signature: FunctionSignature,
}

impl TableFunctionDescriptor {
    /// In-out functions consume a table input through an exchange.
    pub fn is_in_out(&self) -> bool {
        self.signature.has_table_input
    }
}

/// A discovered object, keyed by the `type` in its app metadata.
#[derive(Debug, Clone)]
pub enum RemoteObject {
    Table(TableDescriptor),
    ScalarFunction(ScalarFunctionDescriptor),
    TableFunction(TableFunctionDescriptor),
}

impl RemoteObject {
    pub fn info(&self) -> &ObjectInfo {
        match self {
            RemoteObject::Table(t) => &t.info,
            RemoteObject::ScalarFunction(f) => &f.info,
            RemoteObject::TableFunction(f) => &f.info,
        }
    }

    pub fn location(&self) -> &LocationDescriptor {
        match self {
            RemoteObject::Table(t) => &t.location,
            RemoteObject::ScalarFunction(f) => &f.location,
            RemoteObject::TableFunction(f) => &f.location,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RemoteObject::Table(_) => "table",
            RemoteObject::ScalarFunction(_) => "scalar_function",
            RemoteObject::TableFunction(_) => "table_function",
        }
    }

    /// Build a descriptor from a `FlightInfo` served by `server_location`.
    pub fn from_flight_info(flight_info: &FlightInfo, server_location: &str) -> Result<Self> {
        let server = LocationDescriptor::server(server_location);
        let descriptor = flight_info
            .flight_descriptor
            .clone()
            .ok_or_else(|| AirportError::protocol(&server, "flight info without a descriptor"))?;
        let location = server.with_descriptor(descriptor);

        let metadata: FlightAppMetadata = airport_codec::decode(&flight_info.app_metadata)
            .map_err(|e| AirportError::decode(&location, "flight app metadata", e))?;
        let info = ObjectInfo {
            catalog: metadata.catalog,
            schema: metadata.schema,
            name: metadata.name,
            comment: metadata.comment,
            description: metadata.description,
        };
        let schema = flight_schema(flight_info, &location)?;

        match metadata.object_type.as_str() {
            "table" => {
                let table = translate_schema(&schema, &location)?;
                Ok(RemoteObject::Table(TableDescriptor {
                    location,
                    info,
                    schema,
                    table,
                }))
            }
            "scalar_function" => {
                let input_schema = required_input_schema(metadata.input_schema, &info, &location)?;
                let outputs = output_types(&schema, &location)?;
                let [output] = outputs.as_slice() else {
                    return Err(AirportError::protocol(
                        &location,
                        format!(
                            "scalar function '{}' must return exactly one column, found {}",
                            info.name,
                            outputs.len()
                        ),
                    ));
                };
                let return_type = output.logical_type.clone();
                Ok(RemoteObject::ScalarFunction(ScalarFunctionDescriptor {
                    input_types: scalar_input_types(&input_schema, &location)?,
                    return_type,
                    location,
                    info,
                    input_schema,
                    output_schema: schema,
                }))
            }
            "table_function" => {
                let input_schema = required_input_schema(metadata.input_schema, &info, &location)?;
                let signature = function_signature(&input_schema, &location)?;
                let action_name = metadata.action_name.unwrap_or_else(|| info.name.clone());
                Ok(RemoteObject::TableFunction(TableFunctionDescriptor {
                    location,
                    info,
                    input_schema,
                    output_schema: schema,
                    action_name,
                    signature,
                }))
            }
            other => Err(AirportError::protocol(
                &location,
                format!("unknown object type '{}' for '{}'", other, info.name),
            )),
        }
    }
}

/// Decode a protobuf-serialized `FlightInfo`.
pub fn decode_flight_info(bytes: &[u8], location: &LocationDescriptor) -> Result<FlightInfo> {
    FlightInfo::decode(bytes).map_err(|e| AirportError::decode(location, "flight info", e))
}

/// Schema carried by a `FlightInfo`; absent schemas are a protocol error.
pub fn flight_schema(flight_info: &FlightInfo, location: &LocationDescriptor) -> Result<SchemaRef> {
    if flight_info.schema.is_empty() {
        return Err(AirportError::protocol(location, "flight info without a schema"));
    }
    deserialize_schema(&flight_info.schema)
        .map(Arc::new)
        .map_err(|e| AirportError::decode(location, "flight info schema", e))
}

fn required_input_schema(
    bytes: Option<airport_codec::WireBytes>,
    info: &ObjectInfo,
    location: &LocationDescriptor,
) -> Result<SchemaRef> {
    let bytes = bytes.filter(|b| !b.is_empty()).ok_or_else(|| {
        AirportError::protocol(location, format!("function '{}' has no input schema", info.name))
    })?;
    deserialize_schema(&bytes)
        .map(Arc::new)
        .map_err(|e| AirportError::decode(location, "function input schema", e))
}
