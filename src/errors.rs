use std::fmt;

/// The kind of named entity a store operation referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Light,
    Room,
    Scene,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Light => write!(f, "light"),
            EntityKind::Room => write!(f, "room"),
            EntityKind::Scene => write!(f, "scene"),
        }
    }
}

/// All error types that can occur while running the hub.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced light/room/scene name is absent from the store.
    #[error("{kind} not found: {name}")]
    NotFound { kind: EntityKind, name: String },

    /// A create request used a name that is already taken.
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: EntityKind, name: String },

    /// A device HTTP call failed, timed out, or returned a non-success reply.
    #[error("device for light {light} at {ip} unreachable: {reason}")]
    DeviceUnreachable {
        light: String,
        ip: String,
        reason: String,
    },

    /// A request envelope was missing required fields or used an unknown
    /// packet/resource/action combination.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// Building or driving the HTTP client failed outside a device call.
    #[error("http error: {0:?}")]
    Http(reqwest::Error),

    /// Reading or writing the config file failed.
    #[error("config io error: {0:?}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new not-found error
    pub fn not_found(kind: EntityKind, name: &str) -> Self {
        Error::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Create a new already-exists error
    pub fn already_exists(kind: EntityKind, name: &str) -> Self {
        Error::AlreadyExists {
            kind,
            name: name.to_string(),
        }
    }

    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new device-unreachable error
    pub fn unreachable(light: &str, ip: &str, reason: impl fmt::Display) -> Self {
        Error::DeviceUnreachable {
            light: light.to_string(),
            ip: ip.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
