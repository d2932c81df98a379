//! Remote object descriptors and function overload registry

mod contents;
mod objects;
mod registry;

pub use contents::SchemaContents;
pub use objects::*;
pub use registry::{FunctionKey, FunctionRegistry, RegistryError};
