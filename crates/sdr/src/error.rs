//! Transport and device configuration errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type SdrResult<T> = Result<T, SdrError>;

#[derive(Error, Debug)]
pub enum SdrError {
    /// Transport could not be opened or armed. Fatal to the owning stream.
    #[error("device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    /// Coefficient/configuration file is unusable. Fatal to the one-shot operation.
    #[error("malformed configuration file {}: {reason}", path.display())]
    MalformedConfigFile { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SdrError {
    pub fn unavailable(device: impl Into<String>, reason: impl Into<String>) -> Self {
        SdrError::DeviceUnavailable {
            device: device.into(),
            reason: reason.into(),
        }
    }
}
