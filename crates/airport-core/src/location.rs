//! Location descriptors attached to every remote object and error

use std::fmt;
use std::sync::Arc;

use arrow_flight::flight_descriptor::DescriptorType;
use arrow_flight::FlightDescriptor;

/// Immutable pair of (server address, flight descriptor).
///
/// Cloning is cheap; the contents are shared. Operations that can fail take
/// a `&LocationDescriptor` so the resulting error names the remote it came
/// from.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationDescriptor {
    server_location: Arc<str>,
    descriptor: Option<Arc<FlightDescriptor>>,
}

impl LocationDescriptor {
    /// A location naming a specific remote object on a server.
    pub fn new(server_location: impl Into<String>, descriptor: FlightDescriptor) -> Self {
        Self {
            server_location: Arc::from(server_location.into()),
            descriptor: Some(Arc::new(descriptor)),
        }
    }

    /// A location naming only the server, used for catalog-level calls.
    pub fn server(server_location: impl Into<String>) -> Self {
        Self {
            server_location: Arc::from(server_location.into()),
            descriptor: None,
        }
    }

    /// Same server, different object.
    pub fn with_descriptor(&self, descriptor: FlightDescriptor) -> Self {
        Self {
            server_location: Arc::clone(&self.server_location),
            descriptor: Some(Arc::new(descriptor)),
        }
    }

    pub fn server_location(&self) -> &str {
        &self.server_location
    }

    pub fn descriptor(&self) -> Option<&FlightDescriptor> {
        self.descriptor.as_deref()
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.server_location)?;
        let Some(descriptor) = self.descriptor.as_deref() else {
            return Ok(());
        };
        if descriptor.r#type == DescriptorType::Path as i32 {
            write!(f, " [path: {}]", descriptor.path.join("/"))
        } else {
            let cmd = String::from_utf8_lossy(&descriptor.cmd);
            let shown: String = cmd.chars().take(64).collect();
            if shown.len() < cmd.len() {
                write!(f, " [cmd: {}...]", shown)
            } else {
                write!(f, " [cmd: {}]", shown)
            }
        }
    }
}
