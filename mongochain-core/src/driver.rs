//! Database collaborator abstraction.
//!
//! The chain never talks to a database directly. It drives an implementation of
//! the traits in this module, which provide the minimal capability set the
//! core needs: connect, resolve a collection, run one find/insert/update/delete,
//! and close.
//!
//! # Traits
//!
//! - [`Connector`]: opens connections to an address
//! - [`Connection`]: an open connection that hands out collections and can be closed
//! - [`RemoteCollection`]: a collection on an open connection
//!
//! Implementations must be thread-safe (`Send + Sync`). Several chains may be in
//! flight against the same connector at once; each one opens its own connection.

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::error::ChainResult;

/// Acknowledgement returned by an insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// The `_id` of the inserted document.
    pub inserted_id: Bson,
}

/// Acknowledgement returned by an update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Number of documents matched by the filter.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
}

/// Acknowledgement returned by a delete.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveOutcome {
    /// Number of documents deleted.
    pub deleted_count: u64,
}

/// Opens connections to a database address.
///
/// # Error Handling
///
/// A failure to connect must be returned as
/// [`ChainError::Connection`](crate::error::ChainError::Connection).
#[async_trait]
pub trait Connector: Send + Sync + Debug {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Connects to the database reachable at `address`.
    async fn connect(&self, address: &str) -> ChainResult<Self::Connection>;
}

/// An open connection.
#[async_trait]
pub trait Connection: Send + Sync + Sized {
    /// The collection type handed out by this connection.
    type Collection: RemoteCollection;

    /// Resolves the collection with the given name.
    fn collection(&self, name: &str) -> Self::Collection;

    /// Closes the connection, releasing its resources.
    async fn close(self) -> ChainResult<()>;
}

/// A collection reached through an open [`Connection`].
///
/// Each method performs exactly one database operation. Failures are returned
/// as [`ChainError::Operation`](crate::error::ChainError::Operation).
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Returns every document matching `filter`.
    async fn find(&self, filter: Document) -> ChainResult<Vec<Document>>;

    /// Deletes every document matching `filter`.
    async fn delete_many(&self, filter: Document) -> ChainResult<RemoveOutcome>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(&self, filter: Document, update: Document) -> ChainResult<UpdateOutcome>;

    /// Inserts a single document.
    async fn insert_one(&self, document: Document) -> ChainResult<InsertOutcome>;
}

/// Factory for configured [`Connector`] instances.
#[async_trait]
pub trait ConnectorBuilder {
    type Connector: Connector;

    async fn build(self) -> ChainResult<Self::Connector>;
}
