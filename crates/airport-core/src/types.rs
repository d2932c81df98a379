//! Engine-side logical type model

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, IntervalUnit, TimeUnit, DECIMAL128_MAX_PRECISION};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalType {
    // Primitives
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },

    // Text / binary
    Varchar,
    Blob,

    // Temporal
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,

    // Complex
    List(Box<LogicalType>),
    Struct(Vec<FieldType>),
    Map { key: Box<LogicalType>, value: Box<LogicalType> },

    // Special
    /// A table-valued parameter slot.
    Table,
    /// Matches any argument type during overload resolution.
    Any,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    pub name: String,
    pub data_type: LogicalType,
    pub nullable: bool,
}

impl LogicalType {
    /// Resolve an Arrow type. Dictionary and run-end encoded columns resolve
    /// through their value type.
    pub fn from_arrow(data_type: &DataType) -> Result<Self, String> {
        let logical = match data_type {
            DataType::Null => LogicalType::Null,
            DataType::Boolean => LogicalType::Boolean,
            DataType::Int8 => LogicalType::TinyInt,
            DataType::Int16 => LogicalType::SmallInt,
            DataType::Int32 => LogicalType::Integer,
            DataType::Int64 => LogicalType::BigInt,
            DataType::UInt8 => LogicalType::UTinyInt,
            DataType::UInt16 => LogicalType::USmallInt,
            DataType::UInt32 => LogicalType::UInteger,
            DataType::UInt64 => LogicalType::UBigInt,
            DataType::Float16 | DataType::Float32 => LogicalType::Float,
            DataType::Float64 => LogicalType::Double,
            DataType::Decimal128(precision, scale) | DataType::Decimal256(precision, scale) => {
                let scale = u8::try_from(*scale)
                    .map_err(|_| format!("negative decimal scale {} is not supported", scale))?;
                LogicalType::Decimal {
                    precision: *precision,
                    scale,
                }
            }
            DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => LogicalType::Varchar,
            DataType::Binary
            | DataType::LargeBinary
            | DataType::BinaryView
            | DataType::FixedSizeBinary(_) => LogicalType::Blob,
            DataType::Date32 | DataType::Date64 => LogicalType::Date,
            DataType::Time32(_) | DataType::Time64(_) => LogicalType::Time,
            DataType::Timestamp(_, None) => LogicalType::Timestamp,
            DataType::Timestamp(_, Some(_)) => LogicalType::TimestampTz,
            DataType::Interval(_) | DataType::Duration(_) => LogicalType::Interval,
            DataType::List(child)
            | DataType::LargeList(child)
            | DataType::ListView(child)
            | DataType::LargeListView(child)
            | DataType::FixedSizeList(child, _) => {
                LogicalType::List(Box::new(Self::from_arrow(child.data_type())?))
            }
            DataType::Struct(fields) => LogicalType::Struct(
                fields
                    .iter()
                    .map(|f| {
                        Ok(FieldType {
                            name: f.name().clone(),
                            data_type: Self::from_arrow(f.data_type())?,
                            nullable: f.is_nullable(),
                        })
                    })
                    .collect::<Result<Vec<_>, String>>()?,
            ),
            DataType::Map(entries, _) => match entries.data_type() {
                DataType::Struct(kv) if kv.len() == 2 => LogicalType::Map {
                    key: Box::new(Self::from_arrow(kv[0].data_type())?),
                    value: Box::new(Self::from_arrow(kv[1].data_type())?),
                },
                other => return Err(format!("malformed map entries type {}", other)),
            },
            DataType::Dictionary(_, value) => Self::from_arrow(value)?,
            DataType::RunEndEncoded(_, values) => Self::from_arrow(values.data_type())?,
            other => return Err(format!("unsupported arrow type {}", other)),
        };
        Ok(logical)
    }

    /// The Arrow type this logical type is materialized as.
    ///
    /// `Table` and `Any` are binding-time placeholders with no physical form.
    pub fn to_arrow(&self) -> Option<DataType> {
        let data_type = match self {
            LogicalType::Boolean => DataType::Boolean,
            LogicalType::TinyInt => DataType::Int8,
            LogicalType::SmallInt => DataType::Int16,
            LogicalType::Integer => DataType::Int32,
            LogicalType::BigInt => DataType::Int64,
            LogicalType::UTinyInt => DataType::UInt8,
            LogicalType::USmallInt => DataType::UInt16,
            LogicalType::UInteger => DataType::UInt32,
            LogicalType::UBigInt => DataType::UInt64,
            LogicalType::Float => DataType::Float32,
            LogicalType::Double => DataType::Float64,
            LogicalType::Decimal { precision, scale } if *precision > DECIMAL128_MAX_PRECISION => {
                DataType::Decimal256(*precision, *scale as i8)
            }
            LogicalType::Decimal { precision, scale } => {
                DataType::Decimal128(*precision, *scale as i8)
            }
            LogicalType::Varchar => DataType::Utf8,
            LogicalType::Blob => DataType::Binary,
            LogicalType::Date => DataType::Date32,
            LogicalType::Time => DataType::Time64(TimeUnit::Microsecond),
            LogicalType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
            LogicalType::TimestampTz => {
                DataType::Timestamp(TimeUnit::Microsecond, Some(Arc::from("UTC")))
            }
            LogicalType::Interval => DataType::Interval(IntervalUnit::MonthDayNano),
            LogicalType::List(child) => {
                DataType::List(Arc::new(Field::new("item", child.to_arrow()?, true)))
            }
            LogicalType::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|f| Some(Field::new(&f.name, f.data_type.to_arrow()?, f.nullable)))
                    .collect::<Option<Vec<_>>>()?;
                DataType::Struct(Fields::from(fields))
            }
            LogicalType::Map { key, value } => {
                let entries = Fields::from(vec![
                    Field::new("key", key.to_arrow()?, false),
                    Field::new("value", value.to_arrow()?, true),
                ]);
                DataType::Map(
                    Arc::new(Field::new("entries", DataType::Struct(entries), false)),
                    false,
                )
            }
            LogicalType::Null => DataType::Null,
            LogicalType::Table | LogicalType::Any => return None,
        };
        Some(data_type)
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Boolean => write!(f, "BOOLEAN"),
            LogicalType::TinyInt => write!(f, "TINYINT"),
            LogicalType::SmallInt => write!(f, "SMALLINT"),
            LogicalType::Integer => write!(f, "INTEGER"),
            LogicalType::BigInt => write!(f, "BIGINT"),
            LogicalType::UTinyInt => write!(f, "UTINYINT"),
            LogicalType::USmallInt => write!(f, "USMALLINT"),
            LogicalType::UInteger => write!(f, "UINTEGER"),
            LogicalType::UBigInt => write!(f, "UBIGINT"),
            LogicalType::Float => write!(f, "FLOAT"),
            LogicalType::Double => write!(f, "DOUBLE"),
            LogicalType::Decimal { precision, scale } => write!(f, "DECIMAL({}, {})", precision, scale),
            LogicalType::Varchar => write!(f, "VARCHAR"),
            LogicalType::Blob => write!(f, "BLOB"),
            LogicalType::Date => write!(f, "DATE"),
            LogicalType::Time => write!(f, "TIME"),
            LogicalType::Timestamp => write!(f, "TIMESTAMP"),
            LogicalType::TimestampTz => write!(f, "TIMESTAMP WITH TIME ZONE"),
            LogicalType::Interval => write!(f, "INTERVAL"),
            LogicalType::List(child) => write!(f, "{}[]", child),
            LogicalType::Struct(fields) => {
                write!(f, "STRUCT(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{}\" {}", field.name.replace('"', "\"\""), field.data_type)?;
                }
                write!(f, ")")
            }
            LogicalType::Map { key, value } => write!(f, "MAP({}, {})", key, value),
            LogicalType::Table => write!(f, "TABLE"),
            LogicalType::Any => write!(f, "ANY"),
            LogicalType::Null => write!(f, "NULL"),
        }
    }
}
