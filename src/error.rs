use thiserror::Error;

#[derive(Error, Debug)]
pub enum LapsecamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl LapsecamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Radio-level connect failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RadioError {
    #[error("Failed to join network '{ssid}': {details}")]
    ConnectFailed { ssid: String, details: String },

    #[error("Radio is disabled")]
    Disabled,
}

/// Link establishment failures surfaced by the connectivity monitor
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    #[error("Reconnect gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Feed send failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Feed '{feed}' rejected payload: {details}")]
    Rejected { feed: String, details: String },

    #[error("Transport failure: {details}")]
    Transport { details: String },

    #[error("Link unavailable")]
    LinkDown,
}

/// Sensor or encoder failures; a frame that fails here is unrecoverable
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("Sensor timed out")]
    Timeout,

    #[error("Encoder failure: {details}")]
    Hardware { details: String },
}

/// Removable storage failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage not mounted (state: {state:?})")]
    NotMounted { state: crate::storage::StorageState },

    #[error("Storage I/O failure: {0}")]
    IoFailure(#[source] std::io::Error),
}

/// GIF burst aborted part way; the partial file has already been closed
#[derive(Error, Debug)]
pub enum BurstError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Sensor failure during burst: {0}")]
    Sensor(#[from] EncodeError),
}

pub type Result<T> = std::result::Result<T, LapsecamError>;
