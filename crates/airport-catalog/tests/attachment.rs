//! Catalog attachment against a scripted server

mod common;

use std::sync::Arc;

use airport_catalog::{CreateTableRequest, CREATE_TABLE, GET_CATALOG_VERSION, LIST_SCHEMAS};
use airport_codec::compression::{compress_envelope, DEFAULT_LEVEL};
use airport_codec::{
    CatalogRoot, CatalogSchemaRequest, CatalogVersion, ContentsWithHash, CreateTableParameters,
    OnConflict, SerializedSchema,
};
use airport_core::{AirportError, LogicalType};
use airport_flight::headers::{ACTION_NAME, AUTHORIZATION};
use airport_flight::mock::{MockFlightTransport, RecordedCall};
use airport_flight::{ScanOptions, StreamChunk};
use airport_schema::{ColumnDefinition, Constraint};
use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Schema};
use arrow::record_batch::RecordBatch;
use arrow_flight::{FlightDescriptor, FlightEndpoint, FlightInfo, Ticket};
use bytes::Bytes;
use futures::TryStreamExt;
use prost::Message;
use tempfile::TempDir;

use common::*;

fn version_result(version: u64, is_fixed: bool) -> Vec<Bytes> {
    vec![Bytes::from(
        airport_codec::encode(&CatalogVersion { version, is_fixed }).unwrap(),
    )]
}

fn list_schemas_result(root: &CatalogRoot) -> Vec<Bytes> {
    let payload = airport_codec::encode(root).unwrap();
    vec![Bytes::from(compress_envelope(&payload, DEFAULT_LEVEL).unwrap())]
}

fn events_schema() -> Schema {
    Schema::new(vec![
        field("rowid", DataType::Int64, &[("is_rowid", "1")]),
        field("id", DataType::Int64, &[]),
        field("name", DataType::Utf8, &[("comment", "display name")]),
    ])
}

fn events_blob() -> Vec<u8> {
    schema_blob(&[object_info("table", "main", "events", &events_schema(), None)])
}

fn root_with(schemas: Vec<SerializedSchema>, version: CatalogVersion) -> CatalogRoot {
    CatalogRoot {
        contents: ContentsWithHash::default(),
        schemas,
        version_info: version,
    }
}

fn main_schema(contents: ContentsWithHash) -> SerializedSchema {
    SerializedSchema {
        schema: "main".to_string(),
        description: "primary schema".to_string(),
        tags: Default::default(),
        contents,
    }
}

#[tokio::test]
async fn test_fixed_version_short_circuits() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    transport.on_action(GET_CATALOG_VERSION, version_result(7, true));
    let catalog = attach(transport.clone(), params());

    let first = catalog.catalog_version().await.unwrap();
    let second = catalog.catalog_version().await.unwrap();
    assert_eq!(first, CatalogVersion { version: 7, is_fixed: true });
    assert_eq!(first, second);
    assert_eq!(transport.action_count(GET_CATALOG_VERSION), 1);

    // The fixed version survives a cache clear.
    catalog.clear_cache();
    catalog.catalog_version().await.unwrap();
    assert_eq!(transport.action_count(GET_CATALOG_VERSION), 1);
}

#[tokio::test]
async fn test_volatile_version_is_requeried() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    transport.on_action(GET_CATALOG_VERSION, version_result(3, false));
    let catalog = attach(transport.clone(), params());

    catalog.catalog_version().await.unwrap();
    catalog.catalog_version().await.unwrap();
    assert_eq!(transport.action_count(GET_CATALOG_VERSION), 2);
    assert!(catalog.fixed_version().is_none());

    match &transport.calls()[0] {
        RecordedCall::Action { body, headers, .. } => {
            assert_eq!(body.as_ref(), b"demo");
            let pairs = headers.pairs();
            assert!(pairs.contains(&(ACTION_NAME.to_string(), GET_CATALOG_VERSION.to_string())));
            assert!(pairs.contains(&(AUTHORIZATION.to_string(), "Bearer token".to_string())));
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_version_transport_error_has_location() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    transport.fail_action(GET_CATALOG_VERSION, "connection refused");
    let catalog = attach(transport, params());

    let err = catalog.catalog_version().await.unwrap_err();
    assert!(matches!(err, AirportError::Transport { .. }));
    assert_eq!(err.location().server_location(), SERVER);
}

#[tokio::test]
async fn test_list_schemas_and_load_items() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    let blob = events_blob();
    transport.on_action(
        LIST_SCHEMAS,
        list_schemas_result(&root_with(
            vec![main_schema(inline(&blob))],
            CatalogVersion { version: 2, is_fixed: true },
        )),
    );
    let catalog = attach(transport.clone(), params().with_cache_dir(dir.path()));

    let schemas = catalog.list_schemas().await.unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].name, "main");
    assert_eq!(schemas[0].comment, "primary schema");

    // The root's fixed version seeds the version cache.
    assert_eq!(catalog.catalog_version().await.unwrap().version, 2);
    assert_eq!(transport.action_count(GET_CATALOG_VERSION), 0);

    match &transport.calls()[0] {
        RecordedCall::Action { body, .. } => {
            let request: CatalogSchemaRequest = airport_codec::decode(body).unwrap();
            assert_eq!(request.catalog_name, "demo");
        }
        other => panic!("unexpected call {:?}", other),
    }

    let contents = catalog.schema_items(&schemas[0]).await.unwrap();
    assert_eq!(contents.tables.len(), 1);
    let events = contents.table("EVENTS").unwrap();
    assert_eq!(events.table.column_names(), vec!["id", "name"]);
    assert_eq!(events.table.rowid_type, Some(LogicalType::BigInt));
    assert_eq!(events.table.columns[1].comment.as_deref(), Some("display name"));
    assert_eq!(events.info.comment, "events comment");

    // Memoized per attachment until cleared.
    let again = catalog.schema_items(&schemas[0]).await.unwrap();
    assert!(Arc::ptr_eq(&contents, &again));
    catalog.clear_cache();
    let reloaded = catalog.schema_items(&schemas[0]).await.unwrap();
    assert!(!Arc::ptr_eq(&contents, &reloaded));
}

#[tokio::test]
async fn test_cached_blob_needs_no_source() {
    let dir = TempDir::new().unwrap();
    let blob = events_blob();

    // First attachment stores the inline blob.
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    transport.on_action(
        LIST_SCHEMAS,
        list_schemas_result(&root_with(vec![main_schema(inline(&blob))], Default::default())),
    );
    let first = attach(transport, params().with_cache_dir(dir.path()));
    let schemas = first.list_schemas().await.unwrap();
    first.schema_items(&schemas[0]).await.unwrap();

    // Second attachment only gets the hash.
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    transport.on_action(
        LIST_SCHEMAS,
        list_schemas_result(&root_with(vec![main_schema(hash_only(&blob))], Default::default())),
    );
    let second = attach(transport, params().with_cache_dir(dir.path()));
    let schemas = second.list_schemas().await.unwrap();
    let contents = second.schema_items(&schemas[0]).await.unwrap();
    assert_eq!(contents.len(), 1);

    // Without a cache the same reference cannot be resolved.
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    transport.on_action(
        LIST_SCHEMAS,
        list_schemas_result(&root_with(vec![main_schema(hash_only(&blob))], Default::default())),
    );
    let uncached = attach(transport, params());
    let schemas = uncached.list_schemas().await.unwrap();
    assert!(uncached
        .schema_items(&schemas[0])
        .await
        .unwrap_err()
        .is_protocol_violation());
}

#[tokio::test]
async fn test_root_bundle_populates_cache() {
    let dir = TempDir::new().unwrap();
    let blob = events_blob();
    let bundle_payload = airport_codec::encode(&vec![inline(&blob)]).unwrap();
    let bundle = compress_envelope(&bundle_payload, DEFAULT_LEVEL).unwrap();

    let transport = Arc::new(MockFlightTransport::new(SERVER));
    let mut root = root_with(vec![main_schema(hash_only(&blob))], Default::default());
    root.contents = inline(&bundle);
    transport.on_action(LIST_SCHEMAS, list_schemas_result(&root));

    let catalog = attach(transport, params().with_cache_dir(dir.path()));
    let schemas = catalog.list_schemas().await.unwrap();
    let contents = catalog.schema_items(&schemas[0]).await.unwrap();
    assert_eq!(contents.tables[0].info.name, "events");
}

#[tokio::test]
async fn test_inline_hash_mismatch_is_fatal() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    let blob = events_blob();
    let mut contents = inline(&blob);
    contents.sha256 = airport_catalog::cache::sha256_hex(b"something else");
    transport.on_action(
        LIST_SCHEMAS,
        list_schemas_result(&root_with(vec![main_schema(contents)], Default::default())),
    );
    let catalog = attach(transport, params());
    let schemas = catalog.list_schemas().await.unwrap();
    let err = catalog.schema_items(&schemas[0]).await.unwrap_err();
    assert!(matches!(err, AirportError::HashMismatch { .. }));
}

#[tokio::test]
async fn test_function_without_input_schema_is_rejected() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    let output = Schema::new(vec![field("result", DataType::Int64, &[])]);
    let blob = schema_blob(&[object_info("scalar_function", "main", "f", &output, None)]);
    transport.on_action(
        LIST_SCHEMAS,
        list_schemas_result(&root_with(vec![main_schema(inline(&blob))], Default::default())),
    );
    let catalog = attach(transport, params());
    let schemas = catalog.list_schemas().await.unwrap();
    assert!(catalog
        .schema_items(&schemas[0])
        .await
        .unwrap_err()
        .is_protocol_violation());
}

#[tokio::test]
async fn test_create_table() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    let created = object_info("table", "main", "events", &events_schema(), None);
    transport.on_action(CREATE_TABLE, vec![Bytes::from(created.encode_to_vec())]);
    let catalog = attach(transport.clone(), params());

    let request = CreateTableRequest {
        schema: "main".to_string(),
        table: "events".to_string(),
        columns: vec![
            ColumnDefinition::new("id", LogicalType::BigInt),
            ColumnDefinition::new("name", LogicalType::Varchar),
        ],
        constraints: vec![Constraint::NotNull(0)],
        on_conflict: OnConflict::Replace,
    };
    let table = catalog.create_table(&request).await.unwrap();
    assert_eq!(table.info.name, "events");
    assert_eq!(table.table.rowid_type, Some(LogicalType::BigInt));
    assert_eq!(table.table.columns.len(), 2);

    match &transport.calls()[0] {
        RecordedCall::Action { name, body, headers } => {
            assert_eq!(name, CREATE_TABLE);
            assert_eq!(headers.action_name(), Some(CREATE_TABLE));
            let sent: CreateTableParameters = airport_codec::decode(body).unwrap();
            assert_eq!(sent.table_name, "events");
            assert_eq!(sent.on_conflict, OnConflict::Replace);
            assert_eq!(sent.not_null_constraints, vec![0]);
        }
        other => panic!("unexpected call {:?}", other),
    }
}

#[tokio::test]
async fn test_create_table_requires_a_result() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    transport.on_action(CREATE_TABLE, vec![]);
    let catalog = attach(transport, params());
    let request = CreateTableRequest {
        schema: "main".to_string(),
        table: "t".to_string(),
        columns: vec![ColumnDefinition::new("a", LogicalType::Integer)],
        ..Default::default()
    };
    assert!(catalog.create_table(&request).await.unwrap_err().is_protocol_violation());
}

#[tokio::test]
async fn test_scan_table() {
    let transport = Arc::new(MockFlightTransport::new(SERVER));
    let blob = events_blob();
    transport.on_action(
        LIST_SCHEMAS,
        list_schemas_result(&root_with(vec![main_schema(inline(&blob))], Default::default())),
    );

    let wire = Arc::new(Schema::new(vec![field("id", DataType::Int64, &[])]));
    let batch = RecordBatch::try_new(wire.clone(), vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();
    let descriptor = FlightDescriptor::new_path(vec!["main".to_string(), "events".to_string()]);
    transport.on_flight_info(
        descriptor.clone(),
        FlightInfo::new()
            .try_with_schema(&wire)
            .unwrap()
            .with_descriptor(descriptor)
            .with_endpoint(FlightEndpoint::new().with_ticket(Ticket::new("events-0")))
            .with_endpoint(FlightEndpoint::new().with_ticket(Ticket::new("events-1"))),
    );
    transport.on_stream("events-0", vec![StreamChunk::batch(batch.clone()), StreamChunk::end()]);
    transport.on_stream("events-1", vec![StreamChunk::batch(batch), StreamChunk::end()]);

    let catalog = attach(transport.clone(), params());
    let schemas = catalog.list_schemas().await.unwrap();
    let contents = catalog.schema_items(&schemas[0]).await.unwrap();
    let table = contents.table("events").unwrap();

    let batches: Vec<RecordBatch> = catalog
        .scan(table, ScanOptions::default())
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 6);

    // list_schemas is its own operation; the flight info request and both
    // endpoint reads belong to the scan.
    let calls = transport.calls();
    let listing = calls
        .iter()
        .find_map(|call| match call {
            RecordedCall::Action { headers, .. } => Some(headers.trace_id().to_string()),
            _ => None,
        })
        .unwrap();
    let scan_ids: Vec<String> = calls
        .iter()
        .filter_map(|call| match call {
            RecordedCall::GetFlightInfo { headers, .. } | RecordedCall::DoGet { headers, .. } => {
                Some(headers.trace_id().to_string())
            }
            _ => None,
        })
        .collect();
    assert_eq!(scan_ids.len(), 3);
    assert!(scan_ids.iter().all(|id| id == &scan_ids[0]));
    assert_ne!(listing, scan_ids[0]);
}
