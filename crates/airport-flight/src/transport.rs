//! The Flight RPC surface consumed from an Airport server

use std::sync::Arc;

use airport_core::{LocationDescriptor, Result};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use arrow_flight::{Action, FlightDescriptor, FlightInfo, Ticket};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::CallHeaders;

/// One message of a server stream.
///
/// A chunk with neither data nor metadata marks the end of the stream.
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    pub data: Option<RecordBatch>,
    pub app_metadata: Option<Bytes>,
}

impl StreamChunk {
    pub fn batch(batch: RecordBatch) -> Self {
        Self {
            data: Some(batch),
            app_metadata: None,
        }
    }

    pub fn metadata(metadata: impl Into<Bytes>) -> Self {
        Self {
            data: None,
            app_metadata: Some(metadata.into()),
        }
    }

    pub fn end() -> Self {
        Self::default()
    }
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// Write half of an exchange.
#[async_trait]
pub trait ExchangeWriter: Send {
    /// Send a metadata-only frame.
    async fn write_metadata(&mut self, metadata: Bytes) -> Result<()>;

    /// Send the schema every following batch conforms to.
    async fn begin(&mut self, schema: &Schema) -> Result<()>;

    async fn write_batch(&mut self, batch: &RecordBatch) -> Result<()>;

    /// Half-close the write direction.
    async fn done_writing(&mut self) -> Result<()>;
}

pub struct ExchangeChannel {
    pub writer: Box<dyn ExchangeWriter>,
    pub reader: ChunkStream,
}

#[async_trait]
pub trait FlightTransport: Send + Sync {
    /// Server this transport talks to.
    fn location(&self) -> &LocationDescriptor;

    /// Run an action and collect every result body.
    async fn do_action(&self, action: Action, headers: &CallHeaders) -> Result<Vec<Bytes>>;

    async fn get_flight_info(
        &self,
        descriptor: FlightDescriptor,
        headers: &CallHeaders,
    ) -> Result<FlightInfo>;

    async fn do_get(&self, ticket: Ticket, headers: &CallHeaders) -> Result<ChunkStream>;

    async fn do_exchange(
        &self,
        descriptor: FlightDescriptor,
        headers: &CallHeaders,
    ) -> Result<ExchangeChannel>;
}

/// Opens transports for endpoint locations other than the catalog's server.
pub trait Connector: Send + Sync {
    fn connect(&self, location: &str) -> Result<Arc<dyn FlightTransport>>;
}
