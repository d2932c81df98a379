//! Exchange driver against a scripted in-memory server

use std::sync::Arc;

use airport_flight::headers::{ACTION_NAME, OPERATION};
use airport_flight::mock::{ExchangeFrame, MockFlightTransport, RecordedCall};
use airport_flight::{CallHeaders, ExchangeSession, ExchangeState, FinalizeResult, StreamChunk};
use arrow::array::{AsArray, Int64Array};
use arrow::datatypes::{DataType, Field, Int64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow_flight::FlightDescriptor;
use bytes::Bytes;

fn schema(name: &str) -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new(name, DataType::Int64, true)]))
}

fn batch(name: &str, values: Vec<i64>) -> RecordBatch {
    RecordBatch::try_new(schema(name), vec![Arc::new(Int64Array::from(values))]).unwrap()
}

fn descriptor() -> FlightDescriptor {
    FlightDescriptor::new_cmd("repeat_rows")
}

async fn open(transport: &MockFlightTransport) -> ExchangeSession {
    let headers = CallHeaders::new()
        .with_action("repeat_rows")
        .with_header(OPERATION, "table_in_out_function");
    ExchangeSession::open(
        transport,
        descriptor(),
        &headers,
        Bytes::from_static(b"params"),
        schema("input"),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_more_more_finished() {
    let transport = MockFlightTransport::new("grpc://h:1");
    transport.on_exchange(vec![
        StreamChunk::metadata(Bytes::from_static(b"more")),
        StreamChunk::metadata(Bytes::from_static(b"more")),
        StreamChunk::metadata(Bytes::from_static(b"finished")),
        StreamChunk::end(),
    ]);
    let mut session = open(&transport).await;
    assert_eq!(session.state(), ExchangeState::SchemaSent);

    assert_eq!(session.finalize().await.unwrap(), FinalizeResult::HaveMoreOutput(None));
    assert_eq!(session.state(), ExchangeState::DoneWriting);
    assert_eq!(session.finalize().await.unwrap(), FinalizeResult::HaveMoreOutput(None));
    assert_eq!(session.finalize().await.unwrap(), FinalizeResult::Finished(None));
    assert_eq!(session.state(), ExchangeState::Finished);

    // Terminal: nothing more may be pulled.
    assert!(session.finalize().await.unwrap_err().is_protocol_violation());

    let frames = transport.exchange_frames();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], ExchangeFrame::Metadata(Bytes::from_static(b"params")));
    assert_eq!(frames[1], ExchangeFrame::Schema(schema("input")));
    assert_eq!(frames[2], ExchangeFrame::DoneWriting);
}

#[tokio::test]
async fn test_each_write_pairs_with_one_read() {
    let transport = MockFlightTransport::new("grpc://h:1");
    let mut last = StreamChunk::batch(batch("out", vec![30]));
    last.app_metadata = Some(Bytes::from_static(b"finished"));
    transport.on_exchange(vec![
        StreamChunk::batch(batch("out", vec![10])),
        StreamChunk::metadata(Bytes::from_static(b"more")),
        StreamChunk::batch(batch("out", vec![20])),
        last,
    ]);
    let mut session = open(&transport).await;

    // Field names differ from the negotiated schema; the batch is rebound.
    let first = session.process(&batch("x", vec![1, 2])).await.unwrap().unwrap();
    assert_eq!(first.column(0).as_primitive::<Int64Type>().value(0), 10);
    assert!(session.process(&batch("x", vec![3])).await.unwrap().is_none());
    assert_eq!(session.state(), ExchangeState::Streaming);

    let step = session.finalize().await.unwrap();
    assert!(!step.is_finished());
    assert_eq!(step.into_batch().unwrap().num_rows(), 1);

    match session.finalize().await.unwrap() {
        FinalizeResult::Finished(Some(batch)) => {
            assert_eq!(batch.column(0).as_primitive::<Int64Type>().value(0), 30)
        }
        other => panic!("unexpected {:?}", other),
    }

    let written: Vec<RecordBatch> = transport
        .exchange_frames()
        .into_iter()
        .filter_map(|f| match f {
            ExchangeFrame::Batch(b) => Some(b),
            _ => None,
        })
        .collect();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].schema(), schema("input"));
}

#[tokio::test]
async fn test_end_without_sentinel_aborts() {
    let transport = MockFlightTransport::new("grpc://h:1");
    transport.on_exchange(vec![StreamChunk::metadata(Bytes::from_static(b"more"))]);
    let mut session = open(&transport).await;

    assert_eq!(session.finalize().await.unwrap(), FinalizeResult::HaveMoreOutput(None));
    let err = session.finalize().await.unwrap_err();
    assert!(err.is_protocol_violation());
    assert_eq!(session.state(), ExchangeState::Aborted);
    assert!(session.process(&batch("x", vec![1])).await.is_err());
}

#[tokio::test]
async fn test_mismatched_input_aborts() {
    let transport = MockFlightTransport::new("grpc://h:1");
    transport.on_exchange(vec![]);
    let mut session = open(&transport).await;

    let wrong = RecordBatch::try_new(
        Arc::new(Schema::new(vec![Field::new("s", DataType::Utf8, true)])),
        vec![Arc::new(arrow::array::StringArray::from(vec!["a"]))],
    )
    .unwrap();
    assert!(session.process(&wrong).await.is_err());
    assert_eq!(session.state(), ExchangeState::Aborted);
}

#[tokio::test]
async fn test_exchange_headers() {
    let transport = MockFlightTransport::new("grpc://h:1");
    transport.on_exchange(vec![StreamChunk::metadata(Bytes::from_static(b"finished"))]);
    let mut session = open(&transport).await;
    assert!(session.finalize().await.unwrap().is_finished());

    match &transport.calls()[0] {
        RecordedCall::DoExchange { descriptor: d, headers } => {
            assert_eq!(d, &descriptor());
            let pairs = headers.pairs();
            assert!(pairs.contains(&(ACTION_NAME.to_string(), "repeat_rows".to_string())));
            assert!(pairs.contains(&(OPERATION.to_string(), "table_in_out_function".to_string())));
        }
        other => panic!("unexpected call {:?}", other),
    }
}
