//! Standard outbound call headers

use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};
use uuid::Uuid;

pub const TRACE_ID: &str = "airport-trace-id";
pub const CLIENT: &str = "airport-client";
pub const AUTHORIZATION: &str = "authorization";
pub const ACTION_NAME: &str = "airport-action-name";
pub const OPERATION: &str = "airport-operation";
pub const FILTERS: &str = "airport-filters";
pub const RETURN_CHUNKS: &str = "return-chunks";

pub const CLIENT_NAME: &str = concat!("airport-rs/", env!("CARGO_PKG_VERSION"));

/// Headers sent with every call of one top-level operation.
///
/// The trace id is generated once and shared by all calls derived through
/// the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHeaders {
    trace_id: String,
    auth_token: Option<String>,
    action_name: Option<String>,
    extra: Vec<(String, String)>,
}

impl Default for CallHeaders {
    fn default() -> Self {
        Self::new()
    }
}

impl CallHeaders {
    pub fn new() -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string(),
            auth_token: None,
            action_name: None,
            extra: Vec::new(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn action_name(&self) -> Option<&str> {
        self.action_name.as_deref()
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_action(&self, action_name: impl Into<String>) -> Self {
        let mut headers = self.clone();
        headers.action_name = Some(action_name.into());
        headers
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    /// Every header in send order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            (TRACE_ID.to_string(), self.trace_id.clone()),
            (CLIENT.to_string(), CLIENT_NAME.to_string()),
        ];
        if let Some(token) = &self.auth_token {
            pairs.push((AUTHORIZATION.to_string(), format!("Bearer {}", token)));
        }
        if let Some(action) = &self.action_name {
            pairs.push((ACTION_NAME.to_string(), action.clone()));
        }
        pairs.extend(self.extra.iter().cloned());
        pairs
    }

    pub fn apply(&self, metadata: &mut MetadataMap) -> Result<(), String> {
        for (name, value) in self.pairs() {
            let key = MetadataKey::<Ascii>::from_bytes(name.as_bytes())
                .map_err(|e| format!("invalid header name '{}': {}", name, e))?;
            let value = MetadataValue::<Ascii>::try_from(value.as_str())
                .map_err(|e| format!("invalid value for header '{}': {}", name, e))?;
            metadata.append(key, value);
        }
        Ok(())
    }
}
