use crate::memory::{Bank, Range};
use crate::net::Transport;

use thiserror::Error;

/// Access outside the address space of a bank.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{bank} range {range} exceeds the address space of {capacity} cells")]
pub struct OutOfRange {
    pub bank: Bank,
    pub range: Range,
    pub capacity: usize,
}

/// Malformed static values, schedules or listener settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),

    #[error("simulated sequence for {bank} {address} is empty")]
    EmptySequence { bank: Bank, address: usize },

    #[error("{bank} {address} already has a simulated sequence")]
    DuplicateSchedule { bank: Bank, address: usize },

    #[error("value does not fit the register width: {0}")]
    InvalidValue(String),

    #[error("invalid serial setting: {0}")]
    InvalidSerial(String),

    #[error("invalid listen address '{0}'")]
    InvalidSocketAddr(String),
}

/// Failures while bringing a listener up.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    TransportStart {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open serial device {path}: {source}")]
    DeviceOpen {
        path: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0} listener was already started")]
    AlreadyStarted(Transport),
}
