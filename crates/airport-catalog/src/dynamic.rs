//! Dynamic table functions
//!
//! Binding marshals the arguments and asks the server for the flight that
//! serves this particular call. Functions without a table input are then
//! scanned like a table; in-out functions run through an exchange that
//! streams the table input to the server.

use airport_codec::ipc::serialize_schema;
use airport_codec::{TableFunctionFlightInfoRequest, TableFunctionParameters, WireBytes};
use airport_core::{AirportError, LocationDescriptor, Result};
use airport_flight::headers::{OPERATION, RETURN_CHUNKS};
use airport_flight::{CallHeaders, ExchangeSession, ScanOptions, ScanStream};
use airport_registry::{decode_flight_info, flight_schema, TableFunctionDescriptor};
use airport_schema::{serialize_parameters, Arguments};
use arrow::datatypes::SchemaRef;
use arrow_flight::FlightInfo;
use bytes::Bytes;
use prost::Message;
use tracing::info;

use crate::CatalogAttachment;

pub const GET_FLIGHT_INFO_TABLE_FUNCTION: &str = "get_flight_info_table_function";
pub const TABLE_IN_OUT_FUNCTION: &str = "table_in_out_function";

/// A table function call resolved by the server.
#[derive(Debug, Clone)]
pub struct BoundTableFunction {
    pub function: TableFunctionDescriptor,
    /// Where this call's output is served; carries the output schema.
    pub flight_info: FlightInfo,
    pub output_schema: SchemaRef,
    /// Single-row Arrow IPC stream of the marshalled arguments.
    pub parameters: Bytes,
    pub table_input_schema: Option<SchemaRef>,
    /// Headers of the bind call; later calls for this invocation reuse its trace id.
    pub headers: CallHeaders,
}

impl BoundTableFunction {
    pub fn location(&self) -> LocationDescriptor {
        match &self.flight_info.flight_descriptor {
            Some(d) => self.function.location.with_descriptor(d.clone()),
            None => self.function.location.clone(),
        }
    }
}

impl CatalogAttachment {
    /// Bind `function` to `args`. In-out functions need the schema of the
    /// table they will consume.
    pub async fn bind_table_function(
        &self,
        function: &TableFunctionDescriptor,
        args: &Arguments,
        table_input_schema: Option<SchemaRef>,
    ) -> Result<BoundTableFunction> {
        let location = &function.location;
        if function.is_in_out() && table_input_schema.is_none() {
            return Err(AirportError::protocol(
                location,
                format!("table function '{}' requires a table input", function.info.name),
            ));
        }

        let parameters = serialize_parameters(&function.input_schema, args, location)?;
        let serialized_input_schema = match &table_input_schema {
            Some(schema) => serialize_schema(schema)
                .map_err(|e| AirportError::decode(location, "serialize table input schema", e))?,
            None => Vec::new(),
        };
        let call = TableFunctionParameters {
            schema_name: function.info.schema.clone(),
            action_name: function.action_name.clone(),
            parameters: WireBytes(parameters.clone()),
            table_input_schema: WireBytes(serialized_input_schema),
        };
        let descriptor = location
            .descriptor()
            .ok_or_else(|| AirportError::protocol(location, "table function has no descriptor"))?;
        let request = TableFunctionFlightInfoRequest {
            descriptor: WireBytes(descriptor.encode_to_vec()),
            parameters: WireBytes(
                airport_codec::encode(&call)
                    .map_err(|e| AirportError::decode(location, "table function parameters", e))?,
            ),
        };
        let body = airport_codec::encode(&request)
            .map_err(|e| AirportError::decode(location, "get_flight_info_table_function request", e))?;

        let headers = self.headers();
        let transport = self.transport_for(location)?;
        let result = self
            .single_action(transport.as_ref(), GET_FLIGHT_INFO_TABLE_FUNCTION, body, &headers)
            .await?;
        let flight_info = decode_flight_info(&result, location)?;
        let output_schema = flight_schema(&flight_info, location)?;
        info!(
            function = %function.info.name,
            in_out = function.is_in_out(),
            columns = output_schema.fields().len(),
            "Bound table function"
        );

        Ok(BoundTableFunction {
            function: function.clone(),
            flight_info,
            output_schema,
            parameters: Bytes::from(parameters),
            table_input_schema,
            headers,
        })
    }

    /// Read the output of a bound function that takes no table input.
    pub fn scan_table_function(
        &self,
        bound: &BoundTableFunction,
        options: ScanOptions,
    ) -> Result<ScanStream> {
        if bound.function.is_in_out() {
            return Err(AirportError::protocol(
                &bound.location(),
                "in-out table functions run through an exchange",
            ));
        }
        self.scan_flight(
            &bound.function.location,
            &bound.flight_info,
            options,
            bound.headers.clone(),
        )
    }

    /// Open the exchange of an in-out function. The parameter frame is the
    /// raw argument stream; the write schema is the table input's.
    pub async fn open_in_out(&self, bound: &BoundTableFunction) -> Result<ExchangeSession> {
        let location = bound.location();
        let write_schema = bound.table_input_schema.clone().ok_or_else(|| {
            AirportError::protocol(&location, "in-out call bound without a table input schema")
        })?;
        let descriptor = location
            .descriptor()
            .cloned()
            .ok_or_else(|| AirportError::protocol(&location, "table function has no descriptor"))?;
        let headers = bound
            .headers
            .with_action(bound.function.action_name.clone())
            .with_header(OPERATION, TABLE_IN_OUT_FUNCTION)
            .with_header(RETURN_CHUNKS, "1");

        let transport = self.transport_for(&bound.function.location)?;
        ExchangeSession::open(
            transport.as_ref(),
            descriptor,
            &headers,
            bound.parameters.clone(),
            write_schema,
        )
        .await
    }
}
