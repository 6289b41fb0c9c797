//! Entry points: servers and collection handles.
//!
//! A [`Server`] pairs a database address with a [`Connector`]. Asking it for a
//! collection yields a [`CollectionHandle`], from which any number of
//! independent chains can be started.
//!
//! # Example
//!
//! ```ignore
//! use mongochain::{prelude::*, memory::InMemoryConnector};
//!
//! let server = Server::new("mongodb://localhost/app", InMemoryConnector::new());
//! let adults = server
//!     .collection("users")
//!     .where_("age")
//!     .greater_than(18)
//!     .find()
//!     .await?;
//! ```

use bson::{Bson, Document};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    chain::{PredicateBuilder, QueryBuilder},
    driver::{Connector, InsertOutcome, RemoveOutcome, UpdateOutcome},
    error::ChainResult,
};

/// A database address together with the connector used to reach it.
#[derive(Debug)]
pub struct Server<C: Connector> {
    address: String,
    connector: Arc<C>,
}

impl<C: Connector> Server<C> {
    /// Creates a server for the given address.
    pub fn new(address: impl Into<String>, connector: C) -> Self {
        Self { address: address.into(), connector: Arc::new(connector) }
    }

    /// Returns the database address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the connector used to reach the database.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns a handle to the collection with the given name.
    pub fn collection(&self, name: &str) -> CollectionHandle<C> {
        CollectionHandle::new(self.address.clone(), name.to_string(), self.connector.clone())
    }
}

/// Identifies a collection within the database reachable at an address.
///
/// Handles are immutable and cheap to clone. Every chain started from a handle
/// owns its own state; nothing is shared between chains.
#[derive(Debug)]
pub struct CollectionHandle<C: Connector> {
    address: String,
    name: String,
    connector: Arc<C>,
}

impl<C: Connector> Clone for CollectionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            name: self.name.clone(),
            connector: self.connector.clone(),
        }
    }
}

impl<C: Connector> CollectionHandle<C> {
    pub(crate) fn new(address: String, name: String, connector: Arc<C>) -> Self {
        Self { address, name, connector }
    }

    /// Returns the database address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the connector used to reach the collection.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Starts a new, empty chain on this collection.
    pub fn query(&self) -> QueryBuilder<C> {
        QueryBuilder::new(self.clone())
    }

    /// Starts a new chain with a predicate on `field`.
    pub fn where_(&self, field: impl Into<String>) -> PredicateBuilder<C> {
        self.query().where_(field)
    }

    /// Starts a new chain that sets `field` to `value` on update.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Bson>) -> QueryBuilder<C> {
        self.query().set(field, value)
    }

    /// Returns every document in the collection.
    pub async fn find(&self) -> ChainResult<Vec<Document>> {
        self.query().find().await
    }

    /// Inserts a single document.
    pub async fn insert(&self, document: Document) -> ChainResult<InsertOutcome> {
        self.query().insert(document).await
    }

    /// Serializes `value` and inserts it as a single document.
    pub async fn insert_serialized<T: Serialize>(&self, value: &T) -> ChainResult<InsertOutcome> {
        self.query().insert_serialized(value).await
    }

    /// Runs an update with no filter and no set fields.
    ///
    /// No write is issued; see [`QueryBuilder::update`].
    pub async fn update(&self) -> ChainResult<UpdateOutcome> {
        self.query().update().await
    }

    /// Deletes every document in the collection.
    pub async fn remove(&self) -> ChainResult<RemoveOutcome> {
        self.query().remove().await
    }
}
