//! Catalog attachment for Airport servers
//!
//! Discovers schemas and their objects, caches schema content by hash,
//! tracks the catalog version, and drives table creation, scans and dynamic
//! table functions against the server.

mod attachment;
pub mod cache;
mod create_table;
mod dynamic;
pub mod fetch;
pub mod pool;
mod schema_items;

pub use attachment::{AttachParameters, CatalogAttachment, RemoteSchema, GET_CATALOG_VERSION, LIST_SCHEMAS};
pub use cache::ContentCache;
pub use create_table::{CreateTableRequest, CREATE_TABLE};
pub use dynamic::{BoundTableFunction, GET_FLIGHT_INFO_TABLE_FUNCTION, TABLE_IN_OUT_FUNCTION};
pub use fetch::{ContentFetcher, HttpFetcher, UrlFetcher};
pub use pool::{ClientPool, PooledClient};
pub use schema_items::parse_schema_items;
