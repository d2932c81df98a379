//! Bidirectional exchange driver for in-out table functions
//!
//! ```text
//! Init -> SchemaSent -> Streaming -> DoneWriting -> Finished
//!            \______________\______________\______> Aborted
//! ```
//!
//! Opening writes one metadata frame with the call parameters and then the
//! write schema. Every input batch written is paired with one pull from the
//! read side. After the caller finishes input, [`ExchangeSession::finalize`]
//! pulls one chunk per call until the server's last metadata is the literal
//! `finished`.

use airport_core::{AirportError, ArrowResultExt, LocationDescriptor, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow_flight::FlightDescriptor;
use bytes::Bytes;
use tracing::debug;

use crate::transport::{ExchangeWriter, FlightTransport};
use crate::{CallHeaders, FlightBatchStream, StreamEvent};

pub const FINISHED_SENTINEL: &[u8] = b"finished";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    Init,
    SchemaSent,
    Streaming,
    DoneWriting,
    Finished,
    Aborted,
}

/// Outcome of one finalize step, with the output pulled by that step.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeResult {
    /// The server has more output; call `finalize` again.
    HaveMoreOutput(Option<RecordBatch>),
    Finished(Option<RecordBatch>),
}

impl FinalizeResult {
    pub fn is_finished(&self) -> bool {
        matches!(self, FinalizeResult::Finished(_))
    }

    pub fn into_batch(self) -> Option<RecordBatch> {
        match self {
            FinalizeResult::HaveMoreOutput(b) | FinalizeResult::Finished(b) => b,
        }
    }
}

pub struct ExchangeSession {
    location: LocationDescriptor,
    writer: Box<dyn ExchangeWriter>,
    reader: FlightBatchStream,
    write_schema: SchemaRef,
    state: ExchangeState,
}

impl std::fmt::Debug for ExchangeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeSession")
            .field("location", &self.location)
            .field("state", &self.state)
            .finish()
    }
}

impl ExchangeSession {
    /// Open the call, send `parameters` as a metadata frame, then the write schema.
    pub async fn open(
        transport: &dyn FlightTransport,
        descriptor: FlightDescriptor,
        headers: &CallHeaders,
        parameters: Bytes,
        write_schema: SchemaRef,
    ) -> Result<Self> {
        let location = transport.location().with_descriptor(descriptor.clone());
        let channel = transport.do_exchange(descriptor, headers).await?;
        let mut session = Self {
            reader: FlightBatchStream::new(location.clone(), channel.reader),
            writer: channel.writer,
            location,
            write_schema,
            state: ExchangeState::Init,
        };
        let result = session.handshake(parameters).await;
        session.abort_on_error(result)?;
        Ok(session)
    }

    async fn handshake(&mut self, parameters: Bytes) -> Result<()> {
        self.writer.write_metadata(parameters).await?;
        self.writer.begin(&self.write_schema).await?;
        self.state = ExchangeState::SchemaSent;
        debug!(location = %self.location, "exchange schema sent");
        Ok(())
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    pub fn location(&self) -> &LocationDescriptor {
        &self.location
    }

    pub fn write_schema(&self) -> &SchemaRef {
        &self.write_schema
    }

    pub fn last_app_metadata(&self) -> Option<&Bytes> {
        self.reader.last_app_metadata()
    }

    /// Write one input batch and pull at most one output batch.
    ///
    /// `Ok(None)` means the server has produced no rows yet.
    pub async fn process(&mut self, input: &RecordBatch) -> Result<Option<RecordBatch>> {
        match self.state {
            ExchangeState::SchemaSent | ExchangeState::Streaming => {}
            state => {
                return Err(AirportError::protocol(
                    &self.location,
                    format!("cannot write input in state {:?}", state),
                ))
            }
        }
        let result = self.write_and_pull(input).await;
        self.abort_on_error(result)
    }

    async fn write_and_pull(&mut self, input: &RecordBatch) -> Result<Option<RecordBatch>> {
        let options = RecordBatchOptions::new().with_row_count(Some(input.num_rows()));
        let batch = RecordBatch::try_new_with_options(
            self.write_schema.clone(),
            input.columns().to_vec(),
            &options,
        )
        .at(&self.location, "bind input to exchange schema")?;
        self.writer.write_batch(&batch).await?;
        self.state = ExchangeState::Streaming;

        if self.reader.is_ended() {
            return Ok(None);
        }
        match self.reader.next_event().await? {
            StreamEvent::Batch(batch) => Ok(Some(batch)),
            StreamEvent::Metadata(_) | StreamEvent::End => Ok(None),
        }
    }

    /// Signal end of input on the first call, then pull one chunk per call.
    pub async fn finalize(&mut self) -> Result<FinalizeResult> {
        match self.state {
            ExchangeState::SchemaSent | ExchangeState::Streaming | ExchangeState::DoneWriting => {}
            state => {
                return Err(AirportError::protocol(
                    &self.location,
                    format!("cannot finalize in state {:?}", state),
                ))
            }
        }
        let result = self.finalize_step().await;
        self.abort_on_error(result)
    }

    async fn finalize_step(&mut self) -> Result<FinalizeResult> {
        if self.state != ExchangeState::DoneWriting {
            self.writer.done_writing().await?;
            self.state = ExchangeState::DoneWriting;
            debug!(location = %self.location, "exchange done writing");
        }

        if self.saw_sentinel() {
            self.state = ExchangeState::Finished;
            return Ok(FinalizeResult::Finished(None));
        }
        if self.reader.is_ended() {
            return Err(self.missing_sentinel());
        }

        let output = match self.reader.next_event().await? {
            StreamEvent::Batch(batch) => Some(batch),
            StreamEvent::Metadata(_) | StreamEvent::End => None,
        };
        if self.saw_sentinel() {
            self.state = ExchangeState::Finished;
            debug!(location = %self.location, "exchange finished");
            return Ok(FinalizeResult::Finished(output));
        }
        if self.reader.is_ended() {
            return Err(self.missing_sentinel());
        }
        Ok(FinalizeResult::HaveMoreOutput(output))
    }

    fn saw_sentinel(&self) -> bool {
        self.reader.last_app_metadata().map(|m| &m[..]) == Some(FINISHED_SENTINEL)
    }

    fn missing_sentinel(&self) -> AirportError {
        AirportError::protocol(
            &self.location,
            "exchange stream ended without the finished sentinel",
        )
    }

    fn abort_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(location = %self.location, state = ?self.state, error = %e, "exchange aborted");
            self.state = ExchangeState::Aborted;
        }
        result
    }
}
