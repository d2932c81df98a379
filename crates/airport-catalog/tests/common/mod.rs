//! Builders for scripted Airport server responses

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use airport_catalog::cache::sha256_hex;
use airport_catalog::{AttachParameters, CatalogAttachment, UrlFetcher};
use airport_codec::compression::{compress_envelope, DEFAULT_LEVEL};
use airport_codec::ipc::serialize_schema;
use airport_codec::{ContentsWithHash, FlightAppMetadata, WireBytes};
use airport_core::{AirportError, LocationDescriptor, Result};
use airport_flight::mock::{MockConnector, MockFlightTransport, RecordedCall};
use arrow::datatypes::{DataType, Field, Schema};
use arrow_flight::{FlightDescriptor, FlightInfo};
use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;

pub const SERVER: &str = "grpc://airport:50312";

/// URL fetcher that knows no URLs.
pub struct NoUrls;

#[async_trait]
impl UrlFetcher for NoUrls {
    async fn fetch(&self, url: &str, location: &LocationDescriptor) -> Result<Bytes> {
        Err(AirportError::transport(location, format!("GET {}", url), "unreachable"))
    }
}

pub fn attach(transport: Arc<MockFlightTransport>, params: AttachParameters) -> CatalogAttachment {
    CatalogAttachment::with_transport(params, transport, Arc::new(MockConnector::new()), Arc::new(NoUrls))
}

pub fn params() -> AttachParameters {
    AttachParameters::new(SERVER, "demo").with_auth_token(Some("token".to_string()))
}

pub fn field(name: &str, data_type: DataType, metadata: &[(&str, &str)]) -> Field {
    let metadata: HashMap<String, String> = metadata
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Field::new(name, data_type, true).with_metadata(metadata)
}

pub fn object_info(
    object_type: &str,
    schema_name: &str,
    name: &str,
    schema: &Schema,
    input_schema: Option<&Schema>,
) -> FlightInfo {
    let metadata = FlightAppMetadata {
        object_type: object_type.to_string(),
        schema: schema_name.to_string(),
        catalog: "demo".to_string(),
        name: name.to_string(),
        comment: format!("{} comment", name),
        input_schema: input_schema.map(|s| WireBytes(serialize_schema(s).unwrap())),
        action_name: None,
        description: None,
    };
    FlightInfo::new()
        .try_with_schema(schema)
        .unwrap()
        .with_descriptor(FlightDescriptor::new_path(vec![
            schema_name.to_string(),
            name.to_string(),
        ]))
        .with_app_metadata(airport_codec::encode(&metadata).unwrap())
}

/// Compressed msgpack array of serialized flight infos.
pub fn schema_blob(infos: &[FlightInfo]) -> Vec<u8> {
    let serialized: Vec<WireBytes> = infos.iter().map(|i| WireBytes(i.encode_to_vec())).collect();
    compress_envelope(&airport_codec::encode(&serialized).unwrap(), DEFAULT_LEVEL).unwrap()
}

pub fn inline(blob: &[u8]) -> ContentsWithHash {
    ContentsWithHash {
        sha256: sha256_hex(blob),
        url: None,
        inline_bytes: Some(WireBytes(blob.to_vec())),
    }
}

pub fn hash_only(blob: &[u8]) -> ContentsWithHash {
    ContentsWithHash {
        sha256: sha256_hex(blob),
        ..Default::default()
    }
}

/// Trace id of every recorded call, in call order.
pub fn trace_ids(transport: &MockFlightTransport) -> Vec<String> {
    transport
        .calls()
        .iter()
        .map(|call| match call {
            RecordedCall::Action { headers, .. }
            | RecordedCall::GetFlightInfo { headers, .. }
            | RecordedCall::DoGet { headers, .. }
            | RecordedCall::DoExchange { headers, .. } => headers.trace_id().to_string(),
        })
        .collect()
}
