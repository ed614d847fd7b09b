//! Error types for lodestore
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Taxonomy
//!
//! - `InvalidArgument`: malformed Key/Entity construction
//! - `BadRequest`: precondition violations (mixed projects, non-empty output
//!   slots, operating on a finished batch, ...)
//! - `IllegalState`: context-stack mismatch on pop, double-begin
//! - `Rpc`: backend/transport failures, propagated unchanged from the
//!   `Connection` implementation
//!
//! Local precondition failures are detected before any RPC is issued, so a
//! rejected call never has partial side effects.

use std::io;
use thiserror::Error;

/// Result type alias for lodestore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the datastore client
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed Key or Entity construction
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Precondition violation detected before any RPC
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Context stack or lifecycle misuse
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Backend or transport failure reported by the connection
    #[error("RPC error: {0}")]
    Rpc(String),

    /// I/O error (config file reads, transport-level failures)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Construct an `InvalidArgument` error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Construct a `BadRequest` error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }

    /// Construct an `IllegalState` error
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        Error::IllegalState(msg.into())
    }

    /// Construct an `Rpc` error
    pub fn rpc(msg: impl Into<String>) -> Self {
        Error::Rpc(msg.into())
    }

    /// Construct a `Config` error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Get the reason code for this error category
    pub fn reason_code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "invalid_argument",
            Error::BadRequest(_) => "bad_request",
            Error::IllegalState(_) => "illegal_state",
            Error::Rpc(_) => "rpc",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
        }
    }
}
