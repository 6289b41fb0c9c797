//! Error types and result types for chain execution.
//!
//! Every terminal chain method returns a [`ChainResult<T>`]. Errors raised by the
//! database collaborator pass through unchanged; the core never retries them.

use bson::error::Error as BsonError;
use thiserror::Error;

use crate::executor::OperationKind;

/// Represents all possible errors that can occur while executing a chain.
#[derive(Error, Debug)]
pub enum ChainError {
    /// The collaborator could not establish a connection to the given address.
    #[error("Connection error: {0}")]
    Connection(String),
    /// The underlying find, insert, update or delete call failed.
    #[error("Operation error: {0}")]
    Operation(String),
    /// Conversion between typed values and BSON failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document did not have the expected structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The collaborator answered an operation with a result of another kind.
    #[error("Unexpected outcome for {0} operation")]
    UnexpectedOutcome(OperationKind),
}

/// A specialized `Result` type for chain execution.
pub type ChainResult<T> = Result<T, ChainError>;

impl From<BsonError> for ChainError {
    fn from(err: BsonError) -> Self {
        ChainError::Serialization(err.to_string())
    }
}
