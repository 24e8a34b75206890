//! Unified error handling for the LM83 driver
//!
//! Transport failures, probe outcomes and the umbrella error used by the
//! driver registry and the command line all live here, so adapters and the
//! core agree on one taxonomy. Uses thiserror for the Display and Error impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using Lm83Error
pub type Result<T> = std::result::Result<T, Lm83Error>;

/// Errors raised by a byte-register bus transfer
#[derive(thiserror::Error, Debug)]
pub enum BusError {
    #[error("no acknowledge from 0x{address:02x} (register 0x{register:02x})")]
    Nack { address: u8, register: u8 },

    #[error("bus I/O error at 0x{address:02x}: {source}")]
    Io {
        address: u8,
        #[source]
        source: io::Error,
    },

    #[error("transfer to 0x{address:02x} timed out")]
    Timeout { address: u8 },

    #[error("transfer not supported by adapter: {0}")]
    Unsupported(String),
}

impl BusError {
    pub fn io(address: u8, source: io::Error) -> Self {
        Self::Io { address, source }
    }
}

/// Outcomes of probing one bus address
///
/// None of these are fatal to a bus scan; each is local to the address that
/// produced it.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("status/config signature does not match an LM83")]
    SignatureMismatch,

    #[error("unknown manufacturer id 0x{0:02x}")]
    UnknownManufacturer(u8),

    #[error("unsupported forced chip kind {0}")]
    UnsupportedKind(u8),

    #[error("adapter does not support SMBus byte-data reads")]
    UnsupportedTransport,

    #[error("address 0x{0:02x} is already attached")]
    AddressBusy(u8),

    #[error("could not allocate instance state")]
    AllocationFailed,

    #[error("registration failed: {0}")]
    RegistrationFailed(String),

    #[error("threshold initialisation failed: {0}")]
    InitFailed(#[source] BusError),
}

impl ProbeError {
    /// True for outcomes that only mean "this address is not an LM83".
    ///
    /// Scanners log these at debug level instead of reporting them.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::SignatureMismatch | Self::UnknownManufacturer(_))
    }
}

/// Umbrella error for driver, configuration and CLI operations
#[derive(thiserror::Error, Debug)]
pub enum Lm83Error {
    // ============================================================================
    // Hardware
    // ============================================================================
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("no LM83 attached at 0x{0:02x}")]
    NotAttached(u8),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),

    #[error("attribute registration failed: {0}")]
    Registration(String),

    // ============================================================================
    // Configuration
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Lm83Error {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
