use arrow_flight::FlightInfo;
use tracing::debug;

use airport_core::Result;

use crate::{RemoteObject, ScalarFunctionDescriptor, TableDescriptor, TableFunctionDescriptor};

/// Everything discovered in one remote schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaContents {
    pub tables: Vec<TableDescriptor>,
    pub scalar_functions: Vec<ScalarFunctionDescriptor>,
    pub table_functions: Vec<TableFunctionDescriptor>,
}

impl SchemaContents {
    pub fn from_flight_infos<'a>(
        infos: impl IntoIterator<Item = &'a FlightInfo>,
        server_location: &str,
    ) -> Result<Self> {
        let mut contents = SchemaContents::default();
        for info in infos {
            contents.push(RemoteObject::from_flight_info(info, server_location)?);
        }
        debug!(
            tables = contents.tables.len(),
            scalar_functions = contents.scalar_functions.len(),
            table_functions = contents.table_functions.len(),
            "Loaded schema contents"
        );
        Ok(contents)
    }

    pub fn push(&mut self, object: RemoteObject) {
        match object {
            RemoteObject::Table(t) => self.tables.push(t),
            RemoteObject::ScalarFunction(f) => self.scalar_functions.push(f),
            RemoteObject::TableFunction(f) => self.table_functions.push(f),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|t| t.info.name.eq_ignore_ascii_case(name))
    }

    pub fn table_functions_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a TableFunctionDescriptor> + 'a {
        self.table_functions
            .iter()
            .filter(move |f| f.info.name.eq_ignore_ascii_case(name))
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.scalar_functions.is_empty() && self.table_functions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tables.len() + self.scalar_functions.len() + self.table_functions.len()
    }
}
