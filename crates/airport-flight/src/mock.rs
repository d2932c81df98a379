//! In-memory transport for tests
//!
//! Serves scripted action results, flight infos, ticket streams and exchange
//! responses, and records every call it receives.

use std::collections::HashMap;
use std::sync::Arc;

use airport_core::{AirportError, LocationDescriptor, Result};
use arrow::datatypes::{Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow_flight::{Action, FlightDescriptor, FlightInfo, Ticket};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use parking_lot::Mutex;

use crate::transport::{
    ChunkStream, Connector, ExchangeChannel, ExchangeWriter, FlightTransport, StreamChunk,
};
use crate::CallHeaders;

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Action { name: String, body: Bytes, headers: CallHeaders },
    GetFlightInfo { descriptor: FlightDescriptor, headers: CallHeaders },
    DoGet { ticket: Bytes, headers: CallHeaders },
    DoExchange { descriptor: FlightDescriptor, headers: CallHeaders },
}

/// Frames written by the client side of a mock exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeFrame {
    Metadata(Bytes),
    Schema(SchemaRef),
    Batch(RecordBatch),
    DoneWriting,
}

#[derive(Default)]
struct MockState {
    actions: HashMap<String, std::result::Result<Vec<Bytes>, String>>,
    flight_infos: Vec<(FlightDescriptor, FlightInfo)>,
    streams: HashMap<Bytes, Vec<StreamChunk>>,
    exchange: Vec<StreamChunk>,
    calls: Vec<RecordedCall>,
}

pub struct MockFlightTransport {
    location: LocationDescriptor,
    state: Mutex<MockState>,
    frames: Arc<Mutex<Vec<ExchangeFrame>>>,
}

impl MockFlightTransport {
    pub fn new(server_location: &str) -> Self {
        Self {
            location: LocationDescriptor::server(server_location),
            state: Mutex::new(MockState::default()),
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn on_action(&self, name: &str, results: Vec<Bytes>) {
        self.state.lock().actions.insert(name.to_string(), Ok(results));
    }

    /// Make an action fail with a transport error.
    pub fn fail_action(&self, name: &str, message: &str) {
        self.state
            .lock()
            .actions
            .insert(name.to_string(), Err(message.to_string()));
    }

    pub fn on_flight_info(&self, descriptor: FlightDescriptor, info: FlightInfo) {
        self.state.lock().flight_infos.push((descriptor, info));
    }

    pub fn on_stream(&self, ticket: impl Into<Bytes>, chunks: Vec<StreamChunk>) {
        self.state.lock().streams.insert(ticket.into(), chunks);
    }

    /// Chunks the server side of the next exchange replies with.
    pub fn on_exchange(&self, chunks: Vec<StreamChunk>) {
        self.state.lock().exchange = chunks;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    pub fn action_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RecordedCall::Action { name: n, .. } if n == name))
            .count()
    }

    pub fn exchange_frames(&self) -> Vec<ExchangeFrame> {
        self.frames.lock().clone()
    }

    fn record(&self, call: RecordedCall) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl FlightTransport for MockFlightTransport {
    fn location(&self) -> &LocationDescriptor {
        &self.location
    }

    async fn do_action(&self, action: Action, headers: &CallHeaders) -> Result<Vec<Bytes>> {
        self.record(RecordedCall::Action {
            name: action.r#type.clone(),
            body: action.body.clone(),
            headers: headers.clone(),
        });
        match self.state.lock().actions.get(&action.r#type) {
            Some(Ok(results)) => Ok(results.clone()),
            Some(Err(message)) => Err(AirportError::transport(
                &self.location,
                format!("do_action {}", action.r#type),
                message.clone(),
            )),
            None => Err(AirportError::transport(
                &self.location,
                format!("do_action {}", action.r#type),
                "unknown action",
            )),
        }
    }

    async fn get_flight_info(
        &self,
        descriptor: FlightDescriptor,
        headers: &CallHeaders,
    ) -> Result<FlightInfo> {
        self.record(RecordedCall::GetFlightInfo {
            descriptor: descriptor.clone(),
            headers: headers.clone(),
        });
        self.state
            .lock()
            .flight_infos
            .iter()
            .find(|(d, _)| *d == descriptor)
            .map(|(_, info)| info.clone())
            .ok_or_else(|| {
                AirportError::transport(
                    &self.location.with_descriptor(descriptor),
                    "get_flight_info",
                    "no such flight",
                )
            })
    }

    async fn do_get(&self, ticket: Ticket, headers: &CallHeaders) -> Result<ChunkStream> {
        self.record(RecordedCall::DoGet {
            ticket: ticket.ticket.clone(),
            headers: headers.clone(),
        });
        let chunks = self
            .state
            .lock()
            .streams
            .get(&ticket.ticket)
            .cloned()
            .ok_or_else(|| AirportError::transport(&self.location, "do_get", "unknown ticket"))?;
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }

    async fn do_exchange(
        &self,
        descriptor: FlightDescriptor,
        headers: &CallHeaders,
    ) -> Result<ExchangeChannel> {
        self.record(RecordedCall::DoExchange {
            descriptor,
            headers: headers.clone(),
        });
        let chunks = std::mem::take(&mut self.state.lock().exchange);
        Ok(ExchangeChannel {
            writer: Box::new(MockExchangeWriter {
                frames: self.frames.clone(),
            }),
            reader: stream::iter(chunks.into_iter().map(Ok)).boxed(),
        })
    }
}

struct MockExchangeWriter {
    frames: Arc<Mutex<Vec<ExchangeFrame>>>,
}

#[async_trait]
impl ExchangeWriter for MockExchangeWriter {
    async fn write_metadata(&mut self, metadata: Bytes) -> Result<()> {
        self.frames.lock().push(ExchangeFrame::Metadata(metadata));
        Ok(())
    }

    async fn begin(&mut self, schema: &Schema) -> Result<()> {
        self.frames
            .lock()
            .push(ExchangeFrame::Schema(Arc::new(schema.clone())));
        Ok(())
    }

    async fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        self.frames.lock().push(ExchangeFrame::Batch(batch.clone()));
        Ok(())
    }

    async fn done_writing(&mut self) -> Result<()> {
        self.frames.lock().push(ExchangeFrame::DoneWriting);
        Ok(())
    }
}

/// Hands out registered mock transports by location.
#[derive(Default)]
pub struct MockConnector {
    transports: Mutex<HashMap<String, Arc<MockFlightTransport>>>,
    connects: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, transport: Arc<MockFlightTransport>) {
        let location = transport.location().server_location().to_string();
        self.transports.lock().insert(location, transport);
    }

    pub fn connects(&self) -> Vec<String> {
        self.connects.lock().clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, location: &str) -> Result<Arc<dyn FlightTransport>> {
        self.connects.lock().push(location.to_string());
        let transport = self.transports.lock().get(location).cloned().ok_or_else(|| {
            AirportError::transport(
                &LocationDescriptor::server(location),
                "connect",
                "no transport registered",
            )
        })?;
        Ok(transport)
    }
}
