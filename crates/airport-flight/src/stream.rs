//! Pull-based bridge over a remote chunk stream
//!
//! Each pull yields at most one event. Side-channel metadata updates the
//! endpoint's [`ScanProgress`] and is kept verbatim as the last observed metadata;
//! data batches are word-aligned before they are returned. The end of the
//! stream is signalled exactly once; pulling past it is a caller error.

use std::sync::Arc;

use airport_codec::ProgressReport;
use airport_core::{AirportError, ArrowResultExt, LocationDescriptor, Result};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{stream, StreamExt};
use tracing::trace;

use crate::align::align_batch;
use crate::transport::ChunkStream;
use crate::ScanProgress;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Batch(RecordBatch),
    /// A chunk that carried metadata but no rows.
    Metadata(Bytes),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeState {
    Streaming,
    Ended,
}

pub struct FlightBatchStream {
    location: LocationDescriptor,
    inner: ChunkStream,
    state: BridgeState,
    progress: Arc<ScanProgress>,
    last_app_metadata: Option<Bytes>,
}

impl std::fmt::Debug for FlightBatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightBatchStream")
            .field("location", &self.location)
            .field("state", &self.state)
            .field("progress", &self.progress.get())
            .finish()
    }
}

impl FlightBatchStream {
    pub fn new(location: LocationDescriptor, inner: ChunkStream) -> Self {
        Self {
            location,
            inner,
            state: BridgeState::Streaming,
            progress: Arc::new(ScanProgress::new()),
            last_app_metadata: None,
        }
    }

    /// Report into a progress cell owned by the caller.
    pub fn with_progress(mut self, progress: Arc<ScanProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn progress(&self) -> &Arc<ScanProgress> {
        &self.progress
    }

    pub fn last_app_metadata(&self) -> Option<&Bytes> {
        self.last_app_metadata.as_ref()
    }

    pub fn location(&self) -> &LocationDescriptor {
        &self.location
    }

    pub fn is_ended(&self) -> bool {
        self.state == BridgeState::Ended
    }

    /// Pull one event.
    ///
    /// Calling this again after [`StreamEvent::End`] is a protocol violation.
    pub async fn next_event(&mut self) -> Result<StreamEvent> {
        if self.is_ended() {
            return Err(AirportError::protocol(
                &self.location,
                "stream pulled after end of stream",
            ));
        }

        let chunk = match self.inner.next().await {
            Some(chunk) => chunk?,
            None => {
                self.state = BridgeState::Ended;
                return Ok(StreamEvent::End);
            }
        };

        if let Some(metadata) = &chunk.app_metadata {
            // Metadata that is not a progress record is only kept verbatim.
            if let Ok(report) = airport_codec::decode::<ProgressReport>(metadata) {
                self.progress.update(report.progress);
            }
            self.last_app_metadata = Some(metadata.clone());
        }

        match (chunk.data, chunk.app_metadata) {
            (Some(batch), _) => {
                let batch = align_batch(batch).at(&self.location, "align batch")?;
                trace!(location = %self.location, rows = batch.num_rows(), "batch");
                Ok(StreamEvent::Batch(batch))
            }
            (None, Some(metadata)) => Ok(StreamEvent::Metadata(metadata)),
            (None, None) => {
                self.state = BridgeState::Ended;
                Ok(StreamEvent::End)
            }
        }
    }

    /// Next data batch, skipping metadata-only chunks; `None` at end of stream.
    pub async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        loop {
            match self.next_event().await? {
                StreamEvent::Batch(batch) => return Ok(Some(batch)),
                StreamEvent::Metadata(_) => continue,
                StreamEvent::End => return Ok(None),
            }
        }
    }

    /// Adapt into a stream of batches that ends after the end-of-stream event.
    pub fn into_stream(self) -> BoxStream<'static, Result<RecordBatch>> {
        stream::unfold(Some(self), |state| async move {
            let mut bridge = state?;
            match bridge.next_batch().await {
                Ok(Some(batch)) => Some((Ok(batch), Some(bridge))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}
