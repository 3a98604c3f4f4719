//! Error types shared across the store, auth and session modules.

use thiserror::Error;

/// Errors surfaced by the core. Nothing is retried internally; every failure
/// bubbles to the caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("record not found")]
    NotFound,

    #[error("invalid record")]
    InvalidRecord,

    #[error("invalid record version")]
    InvalidVersion,

    #[error("invalid field {0:?}")]
    InvalidField(String),

    #[error("record length {got} is less than schema length {want}")]
    ShortRecord { got: usize, want: usize },

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("invalid schema record: {0}")]
    InvalidSchemaRecord(String),

    #[error("collection {0:?} not found")]
    UnknownCollection(String),

    #[error("corrupted index")]
    CorruptedIndex,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("unauthorized")]
    Unauthorized,

    #[error("session secret already initialized")]
    SecretAlreadySet,

    #[error("session secret not initialized")]
    SecretNotSet,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Whether this error reports a rejected input rather than an internal
    /// failure. The HTTP adapter maps these to client-error statuses.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidRecord
                | Error::InvalidVersion
                | Error::InvalidField(_)
                | Error::ShortRecord { .. }
                | Error::InvalidNumber(_)
                | Error::InvalidSchemaRecord(_)
        )
    }
}
