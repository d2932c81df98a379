//! Multi-endpoint scans
//!
//! A scan over a `FlightInfo` runs a fixed pool of workers. Workers claim
//! endpoints through one atomic cursor, so every endpoint is read by exactly
//! one worker and order across endpoints is unspecified.

use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use airport_core::{AirportError, ArrowResultExt, LocationDescriptor, Result};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use arrow_flight::{FlightEndpoint, FlightInfo};
use futures::Stream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::headers::FILTERS;
use crate::transport::{Connector, FlightTransport};
use crate::{CallHeaders, EndpointProgress, FlightBatchStream};

/// Endpoint locations with this prefix mean "use the connection you already have".
const REUSE_CONNECTION: &str = "arrow-flight-reuse-connection:";

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Upper bound on concurrent endpoint readers.
    pub workers: usize,
    /// JSON filter description forwarded to the server.
    pub filters: Option<String>,
    /// Batches buffered between workers and the consumer.
    pub channel_capacity: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            filters: None,
            channel_capacity: 8,
        }
    }
}

/// Endpoints handed out once each through an atomic cursor.
#[derive(Debug)]
pub struct EndpointQueue {
    endpoints: Vec<FlightEndpoint>,
    cursor: AtomicUsize,
}

impl EndpointQueue {
    pub fn new(endpoints: Vec<FlightEndpoint>) -> Self {
        Self {
            endpoints,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claim the next unclaimed endpoint, returning its index.
    pub fn claim(&self) -> Option<(usize, &FlightEndpoint)> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.endpoints.get(index).map(|e| (index, e))
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

pub struct ParallelScan {
    transport: Arc<dyn FlightTransport>,
    connector: Arc<dyn Connector>,
    headers: CallHeaders,
    options: ScanOptions,
}

impl ParallelScan {
    pub fn new(
        transport: Arc<dyn FlightTransport>,
        connector: Arc<dyn Connector>,
        headers: CallHeaders,
        options: ScanOptions,
    ) -> Self {
        Self {
            transport,
            connector,
            headers,
            options,
        }
    }

    /// Spawn the worker pool for `info`. Must be called within a tokio runtime.
    pub fn start(self, info: &FlightInfo) -> Result<ScanStream> {
        let location = match &info.flight_descriptor {
            Some(d) => self.transport.location().with_descriptor(d.clone()),
            None => self.transport.location().clone(),
        };
        let schema = Arc::new(
            info.clone()
                .try_decode_schema()
                .at(&location, "decode scan schema")?,
        );
        let total_records = u64::try_from(info.total_records).ok();
        let queue = Arc::new(EndpointQueue::new(info.endpoint.clone()));
        let progress = Arc::new(EndpointProgress::new(queue.len()));

        let workers = self.options.workers.max(1).min(queue.len());
        info!(
            location = %location,
            endpoints = queue.len(),
            workers,
            trace_id = self.headers.trace_id(),
            "starting scan"
        );

        let headers = match &self.options.filters {
            Some(filters) => self.headers.clone().with_header(FILTERS, filters.clone()),
            None => self.headers.clone(),
        };
        let worker = Arc::new(ScanWorker {
            location,
            transport: self.transport,
            connector: self.connector,
            headers,
            queue,
            progress: progress.clone(),
        });

        let (tx, receiver) = mpsc::channel(self.options.channel_capacity.max(1));
        let handles = (0..workers)
            .map(|id| {
                let worker = worker.clone();
                let tx = tx.clone();
                tokio::spawn(async move { worker.run(id, tx).await })
            })
            .collect();

        Ok(ScanStream {
            schema,
            receiver,
            workers: handles,
            progress,
            total_records,
        })
    }
}

struct ScanWorker {
    location: LocationDescriptor,
    transport: Arc<dyn FlightTransport>,
    connector: Arc<dyn Connector>,
    headers: CallHeaders,
    queue: Arc<EndpointQueue>,
    progress: Arc<EndpointProgress>,
}

impl ScanWorker {
    async fn run(&self, id: usize, tx: mpsc::Sender<Result<RecordBatch>>) {
        while let Some((index, endpoint)) = self.queue.claim() {
            debug!(worker = id, endpoint = index, location = %self.location, "claimed endpoint");
            match self.read_endpoint(index, endpoint, &tx).await {
                Ok(true) => self.progress.endpoint(index).update(1.0),
                // Consumer went away.
                Ok(false) => return,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    }

    fn transport_for(&self, endpoint: &FlightEndpoint) -> Result<Arc<dyn FlightTransport>> {
        match endpoint.location.first() {
            Some(loc) if !loc.uri.is_empty() && !loc.uri.starts_with(REUSE_CONNECTION) => {
                self.connector.connect(&loc.uri)
            }
            _ => Ok(self.transport.clone()),
        }
    }

    /// Returns `false` once the receiving side is gone.
    async fn read_endpoint(
        &self,
        index: usize,
        endpoint: &FlightEndpoint,
        tx: &mpsc::Sender<Result<RecordBatch>>,
    ) -> Result<bool> {
        let ticket = endpoint
            .ticket
            .clone()
            .ok_or_else(|| AirportError::protocol(&self.location, "endpoint has no ticket"))?;
        let transport = self.transport_for(endpoint)?;
        let chunks = transport.do_get(ticket, &self.headers).await?;
        let mut bridge = FlightBatchStream::new(self.location.clone(), chunks)
            .with_progress(self.progress.endpoint(index));
        while let Some(batch) = bridge.next_batch().await? {
            if tx.send(Ok(batch)).await.is_err() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Batches of a running scan. Dropping it aborts the workers.
pub struct ScanStream {
    schema: SchemaRef,
    receiver: mpsc::Receiver<Result<RecordBatch>>,
    workers: Vec<JoinHandle<()>>,
    progress: Arc<EndpointProgress>,
    total_records: Option<u64>,
}

impl std::fmt::Debug for ScanStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanStream")
            .field("columns", &self.schema.fields().len())
            .field("workers", &self.workers.len())
            .field("progress", &self.progress.get())
            .field("total_records", &self.total_records)
            .finish()
    }
}

impl ScanStream {
    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    /// Mean progress across endpoints; a finished endpoint counts as complete.
    pub fn progress(&self) -> Arc<EndpointProgress> {
        self.progress.clone()
    }

    /// Server-side estimate, when one was given.
    pub fn total_records(&self) -> Option<u64> {
        self.total_records
    }

    pub async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        self.receiver.recv().await.transpose()
    }

    /// Blocking adapter; `handle` must belong to a runtime this thread is not driving.
    pub fn into_blocking(self, handle: Handle) -> BlockingBatchReader {
        BlockingBatchReader {
            stream: self,
            handle,
        }
    }
}

impl Stream for ScanStream {
    type Item = Result<RecordBatch>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ScanStream {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// `RecordBatchReader` over a scan, for synchronous consumers.
pub struct BlockingBatchReader {
    stream: ScanStream,
    handle: Handle,
}

impl BlockingBatchReader {
    pub fn progress(&self) -> Arc<EndpointProgress> {
        self.stream.progress()
    }
}

impl Iterator for BlockingBatchReader {
    type Item = std::result::Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = &mut self.stream;
        self.handle
            .block_on(stream.next_batch())
            .map_err(|e| ArrowError::ExternalError(Box::new(e)))
            .transpose()
    }
}

impl RecordBatchReader for BlockingBatchReader {
    fn schema(&self) -> SchemaRef {
        self.stream.schema()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use arrow_flight::Ticket;

    fn endpoints(n: usize) -> Vec<FlightEndpoint> {
        (0..n)
            .map(|i| FlightEndpoint::new().with_ticket(Ticket::new(format!("t{}", i))))
            .collect()
    }

    #[test]
    fn test_each_endpoint_claimed_once() {
        let queue = Arc::new(EndpointQueue::new(endpoints(100)));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    let mut claimed = Vec::new();
                    while let Some((index, _)) = queue.claim() {
                        claimed.push(index);
                    }
                    claimed
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for t in threads {
            for index in t.join().unwrap() {
                assert!(seen.insert(index), "endpoint {} claimed twice", index);
            }
        }
        assert_eq!(seen.len(), 100);
        assert!(queue.claim().is_none());
    }

    #[test]
    fn test_default_options() {
        let options = ScanOptions::default();
        assert_eq!(options.workers, 4);
        assert!(options.filters.is_none());
    }
}
