//! Word alignment of decoded batches
//!
//! IPC bodies received off the wire may place buffers at any byte offset.
//! Batches handed to consumers have every buffer (values, offsets, validity
//! and children) starting on an 8-byte boundary.

use arrow::array::{make_array, ArrayData, ArrayRef};
use arrow::buffer::{BooleanBuffer, Buffer, NullBuffer};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

pub const ALIGNMENT: usize = 8;

fn buffer_aligned(buffer: &Buffer) -> bool {
    buffer.as_ptr() as usize % ALIGNMENT == 0
}

pub fn is_aligned(data: &ArrayData) -> bool {
    data.buffers().iter().all(buffer_aligned)
        && data.nulls().map_or(true, |n| buffer_aligned(n.buffer()))
        && data.child_data().iter().all(is_aligned)
}

pub fn batch_is_aligned(batch: &RecordBatch) -> bool {
    batch.columns().iter().all(|c| is_aligned(&c.to_data()))
}

fn realign_buffer(buffer: &Buffer) -> Buffer {
    if buffer_aligned(buffer) {
        buffer.clone()
    } else {
        // Fresh allocations are 64-byte aligned.
        Buffer::from_slice_ref(buffer.as_slice())
    }
}

fn realign(data: ArrayData) -> Result<ArrayData, ArrowError> {
    if is_aligned(&data) {
        return Ok(data);
    }
    let buffers = data.buffers().iter().map(realign_buffer).collect::<Vec<_>>();
    let children = data
        .child_data()
        .iter()
        .cloned()
        .map(realign)
        .collect::<Result<Vec<_>, _>>()?;
    let nulls = data.nulls().map(|n| {
        let bits = n.inner();
        NullBuffer::new(BooleanBuffer::new(
            realign_buffer(bits.inner()),
            bits.offset(),
            bits.len(),
        ))
    });
    data.into_builder()
        .buffers(buffers)
        .child_data(children)
        .nulls(nulls)
        .build()
}

/// Copy any misaligned buffer of `batch`; aligned batches pass through untouched.
pub fn align_batch(batch: RecordBatch) -> Result<RecordBatch, ArrowError> {
    if batch_is_aligned(&batch) {
        return Ok(batch);
    }
    let columns = batch
        .columns()
        .iter()
        .map(|c| realign(c.to_data()).map(make_array))
        .collect::<Result<Vec<ArrayRef>, _>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    RecordBatch::try_new_with_options(batch.schema(), columns, &options)
}
