//! Shared vocabulary for the Airport remote catalog client
//!
//! Every other crate in the workspace speaks in these terms:
//! - [`LocationDescriptor`]: which server / which remote object an operation targets
//! - [`AirportError`]: the error taxonomy, always attributed to a location
//! - [`LogicalType`]: the engine-side type model wire schemas translate into
//! - [`Value`]: caller-supplied function arguments

mod error;
mod location;
pub mod metadata_keys;
mod types;
mod value;

pub use error::*;
pub use location::LocationDescriptor;
pub use types::*;
pub use value::Value;
