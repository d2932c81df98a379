//! tonic-backed [`FlightTransport`]

use std::sync::Arc;

use airport_core::{AirportError, LocationDescriptor, Result, TransportResultExt};
use arrow::datatypes::Schema;
use arrow::ipc::writer::{DictionaryTracker, IpcDataGenerator, IpcWriteOptions};
use arrow::record_batch::RecordBatch;
use arrow_flight::decode::{DecodedPayload, FlightDataDecoder};
use arrow_flight::error::FlightError;
use arrow_flight::flight_service_client::FlightServiceClient;
use arrow_flight::{Action, FlightData, FlightDescriptor, FlightInfo, SchemaAsIpc, Ticket};
use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{stream, SinkExt, StreamExt, TryStreamExt};
use tokio::task::AbortHandle;
use tonic::transport::{Channel, Endpoint};
use tracing::{debug, trace};

use crate::transport::{ChunkStream, Connector, ExchangeChannel, ExchangeWriter, FlightTransport, StreamChunk};
use crate::CallHeaders;

const EXCHANGE_BUFFER: usize = 16;

/// Map an Airport location to an HTTP/2 endpoint URI.
///
/// `grpc://` and `grpc+tcp://` are plaintext; TLS locations are rejected.
pub fn endpoint_uri(location: &str) -> std::result::Result<String, String> {
    if let Some(rest) = location
        .strip_prefix("grpc+tcp://")
        .or_else(|| location.strip_prefix("grpc://"))
    {
        return Ok(format!("http://{}", rest));
    }
    if location.starts_with("http://") {
        return Ok(location.to_string());
    }
    if location.starts_with("grpc+tls://") || location.starts_with("https://") {
        return Err(format!("TLS locations are not supported: {}", location));
    }
    Err(format!("unsupported location scheme: {}", location))
}

#[derive(Debug, Clone)]
pub struct GrpcTransport {
    location: LocationDescriptor,
    client: FlightServiceClient<Channel>,
}

impl GrpcTransport {
    /// Build a transport whose connection is established on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(location: &str) -> Result<Self> {
        let descriptor = LocationDescriptor::server(location);
        let uri = endpoint_uri(location).map_err(|m| AirportError::protocol(&descriptor, m))?;
        let channel = Endpoint::from_shared(uri)
            .transport_at(&descriptor, "parse endpoint")?
            .connect_lazy();
        Ok(Self {
            location: descriptor,
            client: FlightServiceClient::new(channel),
        })
    }

    fn request<T>(&self, message: T, headers: &CallHeaders) -> Result<tonic::Request<T>> {
        let mut request = tonic::Request::new(message);
        headers
            .apply(request.metadata_mut())
            .map_err(|m| AirportError::protocol(&self.location, m))?;
        Ok(request)
    }
}

#[async_trait]
impl FlightTransport for GrpcTransport {
    fn location(&self) -> &LocationDescriptor {
        &self.location
    }

    async fn do_action(&self, action: Action, headers: &CallHeaders) -> Result<Vec<Bytes>> {
        let action_type = action.r#type.clone();
        debug!(location = %self.location, action = %action_type, trace_id = headers.trace_id(), "do_action");
        let request = self.request(action, headers)?;
        let mut client = self.client.clone();
        let context = format!("do_action {}", action_type);
        let results: Vec<arrow_flight::Result> = client
            .do_action(request)
            .await
            .transport_at(&self.location, &context)?
            .into_inner()
            .try_collect()
            .await
            .transport_at(&self.location, &context)?;
        Ok(results.into_iter().map(|r| r.body).collect())
    }

    async fn get_flight_info(
        &self,
        descriptor: FlightDescriptor,
        headers: &CallHeaders,
    ) -> Result<FlightInfo> {
        let location = self.location.with_descriptor(descriptor.clone());
        debug!(location = %location, trace_id = headers.trace_id(), "get_flight_info");
        let request = self.request(descriptor, headers)?;
        let mut client = self.client.clone();
        Ok(client
            .get_flight_info(request)
            .await
            .transport_at(&location, "get_flight_info")?
            .into_inner())
    }

    async fn do_get(&self, ticket: Ticket, headers: &CallHeaders) -> Result<ChunkStream> {
        debug!(location = %self.location, trace_id = headers.trace_id(), "do_get");
        let request = self.request(ticket, headers)?;
        let mut client = self.client.clone();
        let response = client
            .do_get(request)
            .await
            .transport_at(&self.location, "do_get")?
            .into_inner();
        Ok(decode_chunks(
            response.map_err(FlightError::from),
            self.location.clone(),
        ))
    }

    async fn do_exchange(
        &self,
        descriptor: FlightDescriptor,
        headers: &CallHeaders,
    ) -> Result<ExchangeChannel> {
        let location = self.location.with_descriptor(descriptor.clone());
        debug!(location = %location, trace_id = headers.trace_id(), "do_exchange");
        let (tx, rx) = mpsc::channel::<FlightData>(EXCHANGE_BUFFER);
        let request = self.request(rx, headers)?;
        let mut client = self.client.clone();

        // The call runs on its own task so request frames flow before any
        // response arrives.
        let call = tokio::spawn(async move { client.do_exchange(request).await });
        let guard = AbortOnDrop(call.abort_handle());
        let reader_location = location.clone();
        let response = stream::once(async move {
            let _guard = guard;
            let streaming = call
                .await
                .transport_at(&reader_location, "do_exchange task")?
                .transport_at(&reader_location, "do_exchange")?
                .into_inner();
            Ok::<_, AirportError>(decode_chunks(
                streaming.map_err(FlightError::from),
                reader_location,
            ))
        })
        .try_flatten()
        .boxed();

        Ok(ExchangeChannel {
            writer: Box::new(GrpcExchangeWriter {
                location,
                tx,
                descriptor: Some(descriptor),
                options: IpcWriteOptions::default(),
                dictionary_tracker: DictionaryTracker::new(false),
            }),
            reader: response,
        })
    }
}

/// Decode FlightData into chunks, dropping schema-only messages and empty
/// control messages.
fn decode_chunks<S>(input: S, location: LocationDescriptor) -> ChunkStream
where
    S: futures::Stream<Item = std::result::Result<FlightData, FlightError>> + Send + 'static,
{
    FlightDataDecoder::new(input)
        .map_err(move |e| AirportError::transport(&location, "decode flight data", e))
        .try_filter_map(|decoded| async move {
            let app_metadata = Some(decoded.inner.app_metadata.clone()).filter(|m| !m.is_empty());
            let chunk = match decoded.payload {
                DecodedPayload::RecordBatch(batch) => StreamChunk {
                    data: Some(batch),
                    app_metadata,
                },
                DecodedPayload::None if app_metadata.is_some() => StreamChunk {
                    data: None,
                    app_metadata,
                },
                DecodedPayload::None | DecodedPayload::Schema(_) => {
                    return Ok::<_, AirportError>(None)
                }
            };
            trace!(
                rows = ?chunk.data.as_ref().map(|b| b.num_rows()),
                metadata = chunk.app_metadata.is_some(),
                "flight chunk"
            );
            Ok(Some(chunk))
        })
        .boxed()
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

struct GrpcExchangeWriter {
    location: LocationDescriptor,
    tx: mpsc::Sender<FlightData>,
    /// Sent with the first frame only.
    descriptor: Option<FlightDescriptor>,
    options: IpcWriteOptions,
    dictionary_tracker: DictionaryTracker,
}

impl GrpcExchangeWriter {
    async fn send(&mut self, mut data: FlightData) -> Result<()> {
        if let Some(descriptor) = self.descriptor.take() {
            data.flight_descriptor = Some(descriptor);
        }
        self.tx
            .send(data)
            .await
            .transport_at(&self.location, "exchange send")
    }
}

#[async_trait]
impl ExchangeWriter for GrpcExchangeWriter {
    async fn write_metadata(&mut self, metadata: Bytes) -> Result<()> {
        self.send(FlightData::new().with_app_metadata(metadata)).await
    }

    async fn begin(&mut self, schema: &Schema) -> Result<()> {
        let data: FlightData = SchemaAsIpc::new(schema, &self.options).into();
        self.send(data).await
    }

    async fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let (dictionaries, encoded) = IpcDataGenerator::default()
            .encoded_batch(batch, &mut self.dictionary_tracker, &self.options)
            .map_err(|e| AirportError::arrow(&self.location, "encode exchange batch", e))?;
        for dictionary in dictionaries {
            self.send(dictionary.into()).await?;
        }
        self.send(encoded.into()).await
    }

    async fn done_writing(&mut self) -> Result<()> {
        self.tx.close_channel();
        Ok(())
    }
}

/// Opens plaintext gRPC transports on demand.
#[derive(Debug, Clone, Default)]
pub struct GrpcConnector;

impl Connector for GrpcConnector {
    fn connect(&self, location: &str) -> Result<Arc<dyn FlightTransport>> {
        Ok(Arc::new(GrpcTransport::connect_lazy(location)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uri() {
        assert_eq!(endpoint_uri("grpc://localhost:50312").unwrap(), "http://localhost:50312");
        assert_eq!(endpoint_uri("grpc+tcp://10.0.0.1:8815").unwrap(), "http://10.0.0.1:8815");
        assert_eq!(endpoint_uri("http://h:1").unwrap(), "http://h:1");
        assert!(endpoint_uri("grpc+tls://secure:443").is_err());
        assert!(endpoint_uri("ftp://nope").is_err());
    }

    #[tokio::test]
    async fn test_connect_lazy_does_not_dial() {
        let transport = GrpcTransport::connect_lazy("grpc://127.0.0.1:1").unwrap();
        assert_eq!(transport.location().server_location(), "grpc://127.0.0.1:1");
    }

    #[tokio::test]
    async fn test_decode_chunks_skips_schema_messages() {
        use arrow::array::Int32Array;
        use arrow::datatypes::{DataType, Field};
        use arrow_flight::encode::FlightDataEncoderBuilder;

        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int32, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2, 3]))]).unwrap();
        let encoded: Vec<FlightData> = FlightDataEncoderBuilder::new()
            .build(stream::iter(vec![Ok(batch.clone())]))
            .try_collect()
            .await
            .unwrap();
        let mut with_progress = encoded.clone();
        with_progress.push(FlightData::new().with_app_metadata(Bytes::from_static(b"\x81")));

        let chunks: Vec<StreamChunk> = decode_chunks(
            stream::iter(with_progress.into_iter().map(Ok)),
            LocationDescriptor::server("grpc://h:1"),
        )
        .try_collect()
        .await
        .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].data.as_ref().unwrap(), &batch);
        assert!(chunks[1].data.is_none());
        assert_eq!(chunks[1].app_metadata.as_deref(), Some(&b"\x81"[..]));
    }
}
