//! Error types shared by every stage of a supervisor run

use std::io;
use std::path::{Path, PathBuf};

/// Errors produced while reconciling the server fleet
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Reading or writing a file failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The runtime configuration file could not be parsed
    #[error("invalid configuration in {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The runtime configuration parsed but holds unusable values
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The process registry could not be read or written as JSON
    #[error("corrupt process registry {}: {source}", .path.display())]
    Registry {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The shell refused to launch a server's start command
    #[error("failed to launch `{command}` in {}: {source}", .working_dir.display())]
    Launch {
        command: String,
        working_dir: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A termination signal could not be delivered
    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: io::Error,
    },

    /// The port counter ran past the last valid port
    #[error("no ports left after {last}")]
    PortsExhausted { last: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
