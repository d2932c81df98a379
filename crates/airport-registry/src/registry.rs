//! Overload sets of remote functions

use std::collections::HashMap;
use std::sync::Arc;

use airport_core::LogicalType;
use thiserror::Error;

use crate::{ScalarFunctionDescriptor, SchemaContents, TableFunctionDescriptor};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Type mismatch for function {func}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        func: String,
        expected: Vec<Vec<LogicalType>>,
        actual: Vec<LogicalType>,
    },
}

/// Functions sharing (catalog, schema, name) form one overload set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    pub catalog: String,
    pub schema: String,
    pub name: String,
}

impl FunctionKey {
    /// Names compare case-insensitively.
    pub fn new(catalog: &str, schema: &str, name: &str) -> Self {
        Self {
            catalog: catalog.to_lowercase(),
            schema: schema.to_lowercase(),
            name: name.to_lowercase(),
        }
    }
}

impl std::fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.name)
    }
}

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    scalar: HashMap<FunctionKey, Vec<Arc<ScalarFunctionDescriptor>>>,
    table: HashMap<FunctionKey, Vec<Arc<TableFunctionDescriptor>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contents(contents: &SchemaContents) -> Self {
        let mut registry = Self::new();
        for f in &contents.scalar_functions {
            registry.register_scalar(f.clone());
        }
        for f in &contents.table_functions {
            registry.register_table(f.clone());
        }
        registry
    }

    pub fn register_scalar(&mut self, function: ScalarFunctionDescriptor) {
        let key = FunctionKey::new(&function.info.catalog, &function.info.schema, &function.info.name);
        self.scalar.entry(key).or_default().push(Arc::new(function));
    }

    pub fn register_table(&mut self, function: TableFunctionDescriptor) {
        let key = FunctionKey::new(&function.info.catalog, &function.info.schema, &function.info.name);
        self.table.entry(key).or_default().push(Arc::new(function));
    }

    pub fn scalar_overloads(&self, key: &FunctionKey) -> &[Arc<ScalarFunctionDescriptor>] {
        self.scalar.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn table_overloads(&self, key: &FunctionKey) -> &[Arc<TableFunctionDescriptor>] {
        self.table.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn lookup_scalar(
        &self,
        key: &FunctionKey,
        arg_types: &[LogicalType],
    ) -> Result<Arc<ScalarFunctionDescriptor>, RegistryError> {
        let overloads = self
            .scalar
            .get(key)
            .ok_or_else(|| RegistryError::FunctionNotFound(key.to_string()))?;
        resolve(key, overloads, arg_types, |f| &f.input_types)
    }

    /// Resolve by positional slot types; a table input slot is `TABLE`.
    pub fn lookup_table(
        &self,
        key: &FunctionKey,
        arg_types: &[LogicalType],
    ) -> Result<Arc<TableFunctionDescriptor>, RegistryError> {
        let overloads = self
            .table
            .get(key)
            .ok_or_else(|| RegistryError::FunctionNotFound(key.to_string()))?;
        let positional: Vec<Vec<LogicalType>> = overloads
            .iter()
            .map(|f| f.signature.positional_types())
            .collect();
        overloads
            .iter()
            .zip(&positional)
            .find(|(_, expected)| accepts(expected, arg_types))
            .map(|(f, _)| Arc::clone(f))
            .ok_or_else(|| RegistryError::TypeMismatch {
                func: key.to_string(),
                expected: positional.clone(),
                actual: arg_types.to_vec(),
            })
    }

    pub fn keys(&self) -> impl Iterator<Item = &FunctionKey> {
        self.scalar.keys().chain(self.table.keys())
    }
}

fn resolve<T>(
    key: &FunctionKey,
    overloads: &[Arc<T>],
    arg_types: &[LogicalType],
    params: impl Fn(&T) -> &Vec<LogicalType>,
) -> Result<Arc<T>, RegistryError> {
    overloads
        .iter()
        .find(|f| accepts(params(f), arg_types))
        .cloned()
        .ok_or_else(|| RegistryError::TypeMismatch {
            func: key.to_string(),
            expected: overloads.iter().map(|f| params(f).clone()).collect(),
            actual: arg_types.to_vec(),
        })
}

/// Exact match per slot, with `ANY` accepting every type.
fn accepts(expected: &[LogicalType], actual: &[LogicalType]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(e, a)| e == a || *e == LogicalType::Any)
}
