//! Field and schema metadata keys recognized on wire schemas

use std::collections::HashMap;

pub const IS_ROWID: &str = "is_rowid";
pub const IS_ANY_TYPE: &str = "is_any_type";
pub const IS_TABLE_INPUT: &str = "is_table_input";
pub const IS_NAMED_PARAMETER: &str = "is_named_parameter";
pub const COMMENT: &str = "comment";
pub const DEFAULT: &str = "default";
/// Schema-level msgpack `{constraints: [string]}`.
pub const CHECK_CONSTRAINTS: &str = "check_constraints";

/// A flag is set when its key is present with a non-empty value.
pub fn has_flag(metadata: &HashMap<String, String>, key: &str) -> bool {
    metadata.get(key).is_some_and(|v| !v.is_empty())
}

/// Non-empty string value for `key`.
pub fn non_empty<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    metadata.get(key).map(String::as_str).filter(|v| !v.is_empty())
}
