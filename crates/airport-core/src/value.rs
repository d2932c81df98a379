//! Caller-supplied argument values

use std::sync::Arc;

use arrow::array::{
    new_empty_array, new_null_array, Array, ArrayRef, BinaryArray, BooleanArray, Float64Array,
    Int64Array, ListArray, StringArray, UInt64Array,
};
use arrow::buffer::OffsetBuffer;
use arrow::compute::{cast, concat};
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    /// Materialize as a one-element array of `data_type`, casting as needed.
    pub fn to_array(&self, data_type: &DataType) -> Result<ArrayRef, ArrowError> {
        let source: ArrayRef = match self {
            Value::Null => return Ok(new_null_array(data_type, 1)),
            Value::Bool(v) => Arc::new(BooleanArray::from(vec![*v])),
            Value::Int(v) => Arc::new(Int64Array::from(vec![*v])),
            Value::UInt(v) => Arc::new(UInt64Array::from(vec![*v])),
            Value::Float(v) => Arc::new(Float64Array::from(vec![*v])),
            Value::String(v) => Arc::new(StringArray::from(vec![v.as_str()])),
            Value::Bytes(v) => Arc::new(BinaryArray::from(vec![v.as_slice()])),
            Value::List(items) => return list_array(items, data_type),
        };
        if source.data_type() == data_type {
            Ok(source)
        } else {
            cast(&source, data_type)
        }
    }
}

fn list_array(items: &[Value], data_type: &DataType) -> Result<ArrayRef, ArrowError> {
    let DataType::List(field) = data_type else {
        return Err(ArrowError::CastError(format!(
            "cannot convert a list value to {}",
            data_type
        )));
    };
    let children = items
        .iter()
        .map(|item| item.to_array(field.data_type()))
        .collect::<Result<Vec<_>, _>>()?;
    let values = if children.is_empty() {
        new_empty_array(field.data_type())
    } else {
        let refs: Vec<&dyn Array> = children.iter().map(|a| a.as_ref()).collect();
        concat(&refs)?
    };
    let offsets = OffsetBuffer::from_lengths([items.len()]);
    Ok(Arc::new(ListArray::try_new(field.clone(), offsets, values, None)?))
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::AsArray;
    use arrow::datatypes::{Field, Int32Type};

    #[test]
    fn test_int_casts_to_target() {
        let array = Value::Int(42).to_array(&DataType::Int32).unwrap();
        assert_eq!(array.data_type(), &DataType::Int32);
        assert_eq!(array.as_primitive::<Int32Type>().value(0), 42);
    }

    #[test]
    fn test_null_is_typed() {
        let array = Value::Null.to_array(&DataType::Utf8).unwrap();
        assert_eq!(array.len(), 1);
        assert!(array.is_null(0));
    }

    #[test]
    fn test_list_value() {
        let target = DataType::List(Arc::new(Field::new("item", DataType::Int32, true)));
        let array = Value::List(vec![Value::Int(1), Value::Int(2)])
            .to_array(&target)
            .unwrap();
        let list = array.as_list::<i32>();
        assert_eq!(list.len(), 1);
        let inner = list.value(0);
        assert_eq!(inner.as_primitive::<Int32Type>().values().to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_unparsable_string_casts_to_null() {
        let result = Value::from("abc").to_array(&DataType::Int32);
        // Default cast options turn unparsable strings into nulls.
        assert!(result.unwrap().is_null(0));
    }
}
