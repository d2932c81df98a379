//! Arrow Flight plumbing for Airport
//!
//! - [`FlightTransport`]: the RPC surface, with a tonic implementation in [`grpc`]
//! - [`FlightBatchStream`]: pull-based bridge over a remote chunk stream
//! - [`ParallelScan`]: endpoints claimed by a fixed worker pool
//! - [`ExchangeSession`]: the bidirectional table-function protocol
//! - [`mock`]: scripted in-memory transport for tests

pub mod align;
pub mod exchange;
pub mod grpc;
pub mod headers;
pub mod mock;
pub mod progress;
pub mod scan;
pub mod stream;
pub mod transport;

pub use exchange::{ExchangeSession, ExchangeState, FinalizeResult, FINISHED_SENTINEL};
pub use grpc::{GrpcConnector, GrpcTransport};
pub use headers::CallHeaders;
pub use progress::{EndpointProgress, ScanProgress};
pub use scan::{BlockingBatchReader, EndpointQueue, ParallelScan, ScanOptions, ScanStream};
pub use stream::{FlightBatchStream, StreamEvent};
pub use transport::{
    ChunkStream, Connector, ExchangeChannel, ExchangeWriter, FlightTransport, StreamChunk,
};
