//! Remote `CREATE TABLE`

use airport_codec::ipc::serialize_schema;
use airport_codec::{CreateTableParameters, OnConflict, WireBytes};
use airport_core::{AirportError, Result};
use airport_registry::{decode_flight_info, flight_schema, ObjectInfo, TableDescriptor};
use airport_schema::{translate_schema, ColumnDefinition, Constraint, TranslatedTable};
use arrow_flight::FlightDescriptor;
use tracing::info;

use crate::CatalogAttachment;

pub const CREATE_TABLE: &str = "create_table";

#[derive(Debug, Clone, Default)]
pub struct CreateTableRequest {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnDefinition>,
    /// Indexes refer to `columns`.
    pub constraints: Vec<Constraint>,
    pub on_conflict: OnConflict,
}

impl CreateTableRequest {
    /// Encode as the `create_table` action body.
    pub fn to_parameters(
        &self,
        catalog: &str,
        location: &airport_core::LocationDescriptor,
    ) -> Result<CreateTableParameters> {
        let definition = TranslatedTable {
            columns: self.columns.clone(),
            constraints: self.constraints.clone(),
            rowid_type: None,
        };
        let arrow_schema = definition.to_arrow_schema(location)?;
        let arrow_schema = serialize_schema(&arrow_schema)
            .map_err(|e| AirportError::decode(location, "serialize table schema", e))?;

        let mut params = CreateTableParameters {
            catalog_name: catalog.to_string(),
            schema_name: self.schema.clone(),
            table_name: self.table.clone(),
            arrow_schema: WireBytes(arrow_schema),
            on_conflict: self.on_conflict,
            ..Default::default()
        };
        for constraint in &self.constraints {
            match constraint {
                Constraint::NotNull(i) => params.not_null_constraints.push(*i as u64),
                Constraint::Unique(i) => params.unique_constraints.push(*i as u64),
                Constraint::Check(expr) => params.check_constraints.push(expr.clone()),
            }
        }
        Ok(params)
    }
}

impl CatalogAttachment {
    /// Create a table on the server and describe it from the server's answer.
    pub async fn create_table(&self, request: &CreateTableRequest) -> Result<TableDescriptor> {
        let location = self.location().with_descriptor(FlightDescriptor::new_path(vec![
            request.schema.clone(),
            request.table.clone(),
        ]));
        let params = request.to_parameters(self.catalog(), &location)?;
        let body = airport_codec::encode(&params)
            .map_err(|e| AirportError::decode(&location, "create_table parameters", e))?;

        let result = self
            .single_action(self.transport().as_ref(), CREATE_TABLE, body, &self.headers())
            .await?;
        let flight_info = decode_flight_info(&result, &location)?;
        let descriptor = flight_info.flight_descriptor.clone().ok_or_else(|| {
            AirportError::protocol(&location, "create_table returned no flight descriptor")
        })?;
        let location = self.location().with_descriptor(descriptor);
        let schema = flight_schema(&flight_info, &location)?;
        let table = translate_schema(&schema, &location)?;

        self.forget_schema(&request.schema);
        info!(
            catalog = %self.catalog(),
            schema = %request.schema,
            table = %request.table,
            "Created table"
        );
        Ok(TableDescriptor {
            location,
            info: ObjectInfo {
                catalog: self.catalog().to_string(),
                schema: request.schema.clone(),
                name: request.table.clone(),
                ..Default::default()
            },
            schema,
            table,
        })
    }
}
