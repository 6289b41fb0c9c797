//! In-memory database collaborator.
//!
//! Documents live in insertion order per collection, behind an async-aware
//! read-write lock. Every connection opened by an [`InMemoryConnector`] shares
//! the same data, and the connector counts opened and closed connections.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, doc, oid::ObjectId};
use tracing::debug;

use mongochain_core::{
    driver::{
        Connection, Connector, ConnectorBuilder, InsertOutcome, RemoteCollection, RemoveOutcome,
        UpdateOutcome,
    },
    error::{ChainError, ChainResult},
};

use crate::evaluator::{FilterEvaluator, apply_update};

type StoreMap = HashMap<String, Vec<Document>>;


/// Thread-safe in-memory implementation of the [`Connector`] trait.
///
/// `InMemoryConnector` is cloneable; clones share the same documents and
/// connection counters.
///
/// # Example
///
/// ```ignore
/// use mongochain_memory::InMemoryConnector;
/// use mongochain_core::{collection::Server, driver::ConnectorBuilder};
/// use bson::doc;
///
/// let connector = InMemoryConnector::builder()
///     .seed("users", vec![doc! { "name": "A", "age": 30 }])
///     .build()
///     .await?;
/// let users = Server::new("memory://app", connector).collection("users");
///
/// assert_eq!(users.where_("age").greater_than(18).find().await?.len(), 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryConnector {
    store: Arc<RwLock<StoreMap>>,
    counters: Arc<ConnectionCounters>,
    refuse_connections: bool,
    fail_operations: bool,
}

#[derive(Default, Debug)]
struct ConnectionCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl InMemoryConnector {
    /// Creates a connector over an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for a connector with seeded data or injected failures.
    pub fn builder() -> InMemoryConnectorBuilder {
        InMemoryConnectorBuilder::default()
    }

    /// Returns the number of connections opened so far.
    pub fn opened_connections(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Returns the number of connections closed so far.
    pub fn closed_connections(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the documents stored in `collection`.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    type Connection = InMemoryConnection;

    async fn connect(&self, address: &str) -> ChainResult<Self::Connection> {
        if self.refuse_connections {
            return Err(ChainError::Connection(format!("connection to {address} refused")));
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        debug!(address, "opened in-memory connection");

        Ok(InMemoryConnection {
            store: self.store.clone(),
            counters: self.counters.clone(),
            fail_operations: self.fail_operations,
        })
    }
}

/// An open connection to an [`InMemoryConnector`].
#[derive(Debug)]
pub struct InMemoryConnection {
    store: Arc<RwLock<StoreMap>>,
    counters: Arc<ConnectionCounters>,
    fail_operations: bool,
}

#[async_trait]
impl Connection for InMemoryConnection {
    type Collection = InMemoryCollection;

    fn collection(&self, name: &str) -> Self::Collection {
        InMemoryCollection {
            name: name.to_string(),
            store: self.store.clone(),
            fail_operations: self.fail_operations,
        }
    }

    async fn close(self) -> ChainResult<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        debug!("closed in-memory connection");

        Ok(())
    }
}

/// A collection reached through an [`InMemoryConnection`].
#[derive(Debug)]
pub struct InMemoryCollection {
    name: String,
    store: Arc<RwLock<StoreMap>>,
    fail_operations: bool,
}

impl InMemoryCollection {
    fn check_available(&self) -> ChainResult<()> {
        if self.fail_operations {
            return Err(ChainError::Operation(format!("collection {} is unavailable", self.name)));
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteCollection for InMemoryCollection {
    async fn find(&self, filter: Document) -> ChainResult<Vec<Document>> {
        self.check_available()?;

        let store = self.store.read().await;
        let documents = match store.get(&self.name) {
            Some(documents) => documents,
            None => return Ok(vec![]),
        };

        let mut found = Vec::new();
        for document in documents {
            if FilterEvaluator::new(document).matches(&filter)? {
                found.push(document.clone());
            }
        }

        Ok(found)
    }

    async fn delete_many(&self, filter: Document) -> ChainResult<RemoveOutcome> {
        self.check_available()?;

        let mut store = self.store.write().await;
        let documents = match store.get_mut(&self.name) {
            Some(documents) => documents,
            None => return Ok(RemoveOutcome { deleted_count: 0 }),
        };

        let mut kept = Vec::with_capacity(documents.len());
        for document in documents.iter() {
            if !FilterEvaluator::new(document).matches(&filter)? {
                kept.push(document.clone());
            }
        }

        let deleted_count = (documents.len() - kept.len()) as u64;
        *documents = kept;

        Ok(RemoveOutcome { deleted_count })
    }

    async fn update_many(&self, filter: Document, update: Document) -> ChainResult<UpdateOutcome> {
        self.check_available()?;

        let mut store = self.store.write().await;
        let documents = match store.get_mut(&self.name) {
            Some(documents) => documents,
            None => return Ok(UpdateOutcome { matched_count: 0, modified_count: 0 }),
        };

        // Updated copies are committed only once every match has succeeded.
        let mut staged = Vec::new();
        let mut modified_count = 0;
        for (index, document) in documents.iter().enumerate() {
            if FilterEvaluator::new(document).matches(&filter)? {
                let mut updated = document.clone();
                if apply_update(&mut updated, &update)? {
                    modified_count += 1;
                }
                staged.push((index, updated));
            }
        }

        let matched_count = staged.len() as u64;
        for (index, updated) in staged {
            documents[index] = updated;
        }

        Ok(UpdateOutcome { matched_count, modified_count })
    }

    async fn insert_one(&self, document: Document) -> ChainResult<InsertOutcome> {
        self.check_available()?;

        let mut store = self.store.write().await;
        let documents = store.entry(self.name.clone()).or_default();

        let inserted_id = match document.get("_id") {
            Some(id) => id.clone(),
            None => Bson::ObjectId(ObjectId::new()),
        };

        if documents.iter().any(|existing| existing.get("_id") == Some(&inserted_id)) {
            return Err(ChainError::Operation(format!(
                "duplicate key {inserted_id} in collection {}",
                self.name
            )));
        }

        let mut stored = doc! { "_id": inserted_id.clone() };
        for (key, value) in document {
            if key != "_id" {
                stored.insert(key, value);
            }
        }
        documents.push(stored);

        Ok(InsertOutcome { inserted_id })
    }
}


/// Builder for [`InMemoryConnector`] instances.
///
/// # Example
///
/// ```ignore
/// use mongochain_memory::InMemoryConnector;
/// use mongochain_core::driver::ConnectorBuilder;
///
/// let offline = InMemoryConnector::builder().refuse_connections().build().await?;
/// ```
#[derive(Default)]
pub struct InMemoryConnectorBuilder {
    collections: StoreMap,
    refuse_connections: bool,
    fail_operations: bool,
}

impl InMemoryConnectorBuilder {
    /// Appends `documents` to `collection` before the connector is built.
    pub fn seed(mut self, collection: &str, documents: impl IntoIterator<Item = Document>) -> Self {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        self
    }

    /// Makes every `connect` call fail with a connection error.
    pub fn refuse_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Makes every collection operation fail with an operation error.
    pub fn fail_operations(mut self) -> Self {
        self.fail_operations = true;
        self
    }
}

#[async_trait]
impl ConnectorBuilder for InMemoryConnectorBuilder {
    type Connector = InMemoryConnector;

    async fn build(self) -> ChainResult<Self::Connector> {
        Ok(InMemoryConnector {
            store: Arc::new(RwLock::new(self.collections)),
            counters: Arc::default(),
            refuse_connections: self.refuse_connections,
            fail_operations: self.fail_operations,
        })
    }
}
