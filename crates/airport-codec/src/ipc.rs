//! Arrow IPC helpers for schemas and small record-batch streams

use arrow::datatypes::{Schema, SchemaRef};
use arrow::ipc::convert::try_schema_from_ipc_buffer;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::{IpcWriteOptions, StreamWriter};
use arrow::record_batch::RecordBatch;
use arrow_flight::{IpcMessage, SchemaAsIpc};

use crate::CodecResult;

/// Encapsulated IPC schema message (continuation marker, length, flatbuffer).
pub fn serialize_schema(schema: &Schema) -> CodecResult<Vec<u8>> {
    let options = IpcWriteOptions::default();
    let message: IpcMessage = SchemaAsIpc::new(schema, &options).try_into()?;
    Ok(message.0.to_vec())
}

pub fn deserialize_schema(bytes: &[u8]) -> CodecResult<Schema> {
    Ok(try_schema_from_ipc_buffer(bytes)?)
}

/// Complete IPC stream: schema, batches, end-of-stream marker.
pub fn write_ipc_stream(schema: &Schema, batches: &[RecordBatch]) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buffer, schema)?;
        for batch in batches {
            writer.write(batch)?;
        }
        writer.finish()?;
    }
    Ok(buffer)
}

pub fn read_ipc_stream(bytes: &[u8]) -> CodecResult<(SchemaRef, Vec<RecordBatch>)> {
    let reader = StreamReader::try_new(std::io::Cursor::new(bytes), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use arrow::array::{Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field};

    fn sample_schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, true).with_metadata(HashMap::from([(
                "comment".to_string(),
                "display name".to_string(),
            )])),
        ])
    }

    #[test]
    fn test_schema_keeps_field_metadata() {
        let schema = sample_schema();
        let bytes = serialize_schema(&schema).unwrap();
        let decoded = deserialize_schema(&bytes).unwrap();
        assert_eq!(decoded, schema);
        assert_eq!(
            decoded.field(1).metadata().get("comment").map(String::as_str),
            Some("display name")
        );
    }

    #[test]
    fn test_stream_with_batches() {
        let schema = Arc::new(sample_schema());
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int32Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
            ],
        )
        .unwrap();
        let bytes = write_ipc_stream(&schema, &[batch.clone()]).unwrap();
        let (decoded_schema, batches) = read_ipc_stream(&bytes).unwrap();
        assert_eq!(decoded_schema, schema);
        assert_eq!(batches, vec![batch]);
    }

    #[test]
    fn test_invalid_schema_bytes() {
        assert!(deserialize_schema(&[1, 2, 3, 4]).is_err());
    }
}
