//! Wire records exchanged with an Airport server
//!
//! Every struct is `#[serde(default)]`: a field missing from the payload
//! reads as its default value. Most records travel as msgpack maps; the two
//! positional records (`CompressedContent`, `CatalogVersion`) travel as
//! arrays but also decode from map form.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::WireBytes;

/// Body of the `list_schemas` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSchemaRequest {
    pub catalog_name: String,
}

/// `[length, zstd bytes]` envelope; `length` is the uncompressed size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, into = "(u32, WireBytes)")]
pub struct CompressedContent {
    pub length: u32,
    pub data: WireBytes,
}

impl From<CompressedContent> for (u32, WireBytes) {
    fn from(c: CompressedContent) -> Self {
        (c.length, c.data)
    }
}

/// Content addressed by its sha256, available from a URL or inline.
///
/// Both sources may be absent when the peer expects the content to be
/// cached already.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentsWithHash {
    pub sha256: String,
    pub url: Option<String>,
    #[serde(rename = "serialized")]
    pub inline_bytes: Option<WireBytes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializedSchema {
    pub schema: String,
    pub description: String,
    pub tags: HashMap<String, String>,
    pub contents: ContentsWithHash,
}

/// Result of the `get_catalog_version` action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, into = "(u64, bool)")]
pub struct CatalogVersion {
    #[serde(rename = "catalog_version")]
    pub version: u64,
    pub is_fixed: bool,
}

impl From<CatalogVersion> for (u64, bool) {
    fn from(v: CatalogVersion) -> Self {
        (v.version, v.is_fixed)
    }
}

/// Decompressed payload of the `list_schemas` result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogRoot {
    /// Optional bundle pre-populating every schema's content at once.
    pub contents: ContentsWithHash,
    pub schemas: Vec<SerializedSchema>,
    pub version_info: CatalogVersion,
}

/// `FlightInfo.app_metadata` of a discovered remote object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightAppMetadata {
    /// `table`, `scalar_function` or `table_function`.
    #[serde(rename = "type")]
    pub object_type: String,
    pub schema: String,
    pub catalog: String,
    pub name: String,
    pub comment: String,
    /// IPC-serialized Arrow schema of a function's inputs.
    pub input_schema: Option<WireBytes>,
    pub action_name: Option<String>,
    pub description: Option<String>,
}

/// App metadata frame reporting scan progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressReport {
    pub progress: f64,
}

/// Schema-level `check_constraints` metadata value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCheckConstraints {
    pub constraints: Vec<String>,
}

/// Written as the lowercase name string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OnConflict {
    #[default]
    Error,
    Ignore,
    Replace,
}

impl OnConflict {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnConflict::Error => "error",
            OnConflict::Ignore => "ignore",
            OnConflict::Replace => "replace",
        }
    }
}

impl From<OnConflict> for String {
    fn from(v: OnConflict) -> Self {
        v.as_str().to_string()
    }
}

impl TryFrom<String> for OnConflict {
    type Error = String;

    fn try_from(v: String) -> Result<Self, String> {
        match v.as_str() {
            "error" => Ok(OnConflict::Error),
            "ignore" => Ok(OnConflict::Ignore),
            "replace" => Ok(OnConflict::Replace),
            other => Err(format!("unknown on_conflict value '{}'", other)),
        }
    }
}

/// Body of the `create_table` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateTableParameters {
    pub catalog_name: String,
    pub schema_name: String,
    pub table_name: String,
    /// IPC-serialized Arrow schema of the new table.
    pub arrow_schema: WireBytes,
    pub on_conflict: OnConflict,
    pub not_null_constraints: Vec<u64>,
    pub unique_constraints: Vec<u64>,
    pub check_constraints: Vec<String>,
}

/// Call parameters of a dynamic table function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFunctionParameters {
    pub schema_name: String,
    pub action_name: String,
    /// Single-row Arrow IPC stream of the marshalled arguments.
    pub parameters: WireBytes,
    /// IPC-serialized schema of the table input; empty without one.
    pub table_input_schema: WireBytes,
}

/// Body of the `get_flight_info_table_function` action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFunctionFlightInfoRequest {
    /// Protobuf-encoded `FlightDescriptor` of the function.
    pub descriptor: WireBytes,
    /// Encoded [`TableFunctionParameters`].
    pub parameters: WireBytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode, encode};

    #[test]
    fn test_catalog_version_is_positional() {
        let version = CatalogVersion { version: 7, is_fixed: true };
        let bytes = encode(&version).unwrap();
        // fixarray of 2, positive fixint 7, true
        assert_eq!(bytes, vec![0x92, 0x07, 0xc3]);
        assert_eq!(decode::<CatalogVersion>(&bytes).unwrap(), version);
    }

    #[test]
    fn test_catalog_version_from_map_form() {
        #[derive(Serialize)]
        struct MapForm {
            catalog_version: u64,
            is_fixed: bool,
        }
        let bytes = rmp_serde::to_vec_named(&MapForm { catalog_version: 3, is_fixed: false }).unwrap();
        let version: CatalogVersion = decode(&bytes).unwrap();
        assert_eq!(version, CatalogVersion { version: 3, is_fixed: false });
    }

    #[test]
    fn test_missing_fields_read_as_defaults() {
        #[derive(Serialize)]
        struct Partial {
            name: String,
            #[serde(rename = "type")]
            object_type: String,
        }
        let bytes = rmp_serde::to_vec_named(&Partial {
            name: "employees".to_string(),
            object_type: "table".to_string(),
        })
        .unwrap();
        let metadata: FlightAppMetadata = decode(&bytes).unwrap();
        assert_eq!(metadata.name, "employees");
        assert_eq!(metadata.object_type, "table");
        assert_eq!(metadata.comment, "");
        assert!(metadata.input_schema.is_none());
        assert!(metadata.action_name.is_none());
    }

    #[test]
    fn test_create_table_parameters_round_trip() {
        let params = CreateTableParameters {
            catalog_name: "demo".to_string(),
            schema_name: "main".to_string(),
            table_name: "t".to_string(),
            arrow_schema: WireBytes(vec![1, 2, 3]),
            on_conflict: OnConflict::Replace,
            not_null_constraints: vec![0, 2],
            unique_constraints: vec![1],
            check_constraints: vec!["a > 0".to_string()],
        };
        let bytes = encode(&params).unwrap();
        assert_eq!(decode::<CreateTableParameters>(&bytes).unwrap(), params);
    }

    #[test]
    fn test_on_conflict_wire_names() {
        let bytes = encode(&OnConflict::Ignore).unwrap();
        let name: String = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(name, "ignore");
    }

    #[test]
    fn test_check_constraints_round_trip() {
        let constraints = TableCheckConstraints {
            constraints: vec!["x > 1".to_string(), "length(y) < 10".to_string()],
        };
        let bytes = encode(&constraints).unwrap();
        assert_eq!(decode::<TableCheckConstraints>(&bytes).unwrap(), constraints);
    }

    #[test]
    fn test_catalog_root_with_nested_records() {
        let root = CatalogRoot {
            contents: ContentsWithHash::default(),
            schemas: vec![SerializedSchema {
                schema: "main".to_string(),
                description: "primary".to_string(),
                tags: HashMap::from([("owner".to_string(), "ops".to_string())]),
                contents: ContentsWithHash {
                    sha256: "ab".repeat(32),
                    url: Some("http://example.invalid/main".to_string()),
                    inline_bytes: None,
                },
            }],
            version_info: CatalogVersion { version: 1, is_fixed: true },
        };
        let bytes = encode(&root).unwrap();
        assert_eq!(decode::<CatalogRoot>(&bytes).unwrap(), root);
    }

    #[test]
    fn test_truncated_payload_is_an_error() {
        let bytes = encode(&CatalogSchemaRequest { catalog_name: "demo".to_string() }).unwrap();
        assert!(decode::<CatalogSchemaRequest>(&bytes[..bytes.len() - 2]).is_err());
    }
}
