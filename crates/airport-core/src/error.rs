//! Error taxonomy shared by every Airport crate

use std::fmt::Display;
use std::path::PathBuf;

use arrow::error::ArrowError;
use thiserror::Error;

use crate::LocationDescriptor;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = AirportError> = std::result::Result<T, E>;

/// Every failure is attributed to the remote it concerns.
///
/// Nothing in this layer retries or downgrades an error; all variants are
/// fatal to the operation in flight.
#[derive(Debug, Error)]
pub enum AirportError {
    #[error("Transport error at {location}: {context}: {source}")]
    Transport {
        location: LocationDescriptor,
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("Protocol violation at {location}: {message}")]
    ProtocolViolation {
        location: LocationDescriptor,
        message: String,
    },

    #[error("Decode error at {location}: {context}: {message}")]
    Decode {
        location: LocationDescriptor,
        context: String,
        message: String,
    },

    #[error("Hash mismatch at {location}: expected {expected}, got {actual}")]
    HashMismatch {
        location: LocationDescriptor,
        expected: String,
        actual: String,
    },

    #[error("Arrow error at {location}: {context}: {source}")]
    Arrow {
        location: LocationDescriptor,
        context: String,
        #[source]
        source: ArrowError,
    },

    #[error("Cache error at {location}: {}: {source}", .path.display())]
    Cache {
        location: LocationDescriptor,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AirportError {
    pub fn location(&self) -> &LocationDescriptor {
        match self {
            AirportError::Transport { location, .. }
            | AirportError::ProtocolViolation { location, .. }
            | AirportError::Decode { location, .. }
            | AirportError::HashMismatch { location, .. }
            | AirportError::Arrow { location, .. }
            | AirportError::Cache { location, .. } => location,
        }
    }

    pub fn transport(
        location: &LocationDescriptor,
        context: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        AirportError::Transport {
            location: location.clone(),
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn protocol(location: &LocationDescriptor, message: impl Into<String>) -> Self {
        AirportError::ProtocolViolation {
            location: location.clone(),
            message: message.into(),
        }
    }

    pub fn decode(
        location: &LocationDescriptor,
        context: impl Into<String>,
        message: impl Display,
    ) -> Self {
        AirportError::Decode {
            location: location.clone(),
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn arrow(location: &LocationDescriptor, context: impl Into<String>, source: ArrowError) -> Self {
        AirportError::Arrow {
            location: location.clone(),
            context: context.into(),
            source,
        }
    }

    pub fn cache(location: &LocationDescriptor, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AirportError::Cache {
            location: location.clone(),
            path: path.into(),
            source,
        }
    }

    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, AirportError::ProtocolViolation { .. })
    }
}

/// Attach a location and context to an Arrow result.
pub trait ArrowResultExt<T> {
    fn at(self, location: &LocationDescriptor, context: &str) -> Result<T>;
}

impl<T> ArrowResultExt<T> for std::result::Result<T, ArrowError> {
    fn at(self, location: &LocationDescriptor, context: &str) -> Result<T> {
        self.map_err(|e| AirportError::arrow(location, context, e))
    }
}

/// Attach a location and context to a transport-level result.
pub trait TransportResultExt<T> {
    fn transport_at(self, location: &LocationDescriptor, context: &str) -> Result<T>;
}

impl<T, E> TransportResultExt<T> for std::result::Result<T, E>
where
    E: Into<BoxError>,
{
    fn transport_at(self, location: &LocationDescriptor, context: &str) -> Result<T> {
        self.map_err(|e| AirportError::transport(location, context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_carry_location() {
        let location = LocationDescriptor::server("grpc://localhost:50312");
        let err = AirportError::protocol(&location, "missing schema");
        assert_eq!(err.location(), &location);
        assert!(err.is_protocol_violation());
        assert_eq!(
            err.to_string(),
            "Protocol violation at grpc://localhost:50312: missing schema"
        );
    }

    #[test]
    fn test_arrow_result_ext() {
        let location = LocationDescriptor::server("grpc://h:1");
        let result: std::result::Result<(), ArrowError> =
            Err(ArrowError::SchemaError("bad".to_string()));
        let err = result.at(&location, "reading schema").unwrap_err();
        assert!(matches!(err, AirportError::Arrow { .. }));
        assert!(err.to_string().contains("reading schema"));
    }

    #[test]
    fn test_transport_result_ext() {
        let location = LocationDescriptor::server("grpc://h:1");
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("connection refused"));
        let err = result.transport_at(&location, "connect").unwrap_err();
        assert!(matches!(err, AirportError::Transport { .. }));
        assert!(err.to_string().contains("connection refused"));
    }
}
