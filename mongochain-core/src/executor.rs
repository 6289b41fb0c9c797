//! Execution of rendered queries against a database collaborator.
//!
//! [`OperationExecutor`] performs one connect → operate → close sequence per
//! call. The connection is closed on every path out of the operate step, and
//! the outcome is delivered exactly once.

use bson::Document;
use std::fmt;
use tracing::{debug, error, warn};

use crate::{
    collection::CollectionHandle,
    driver::{Connection, Connector, InsertOutcome, RemoteCollection, RemoveOutcome, UpdateOutcome},
    error::{ChainError, ChainResult},
    render::RenderedQuery,
};

/// The kind of a terminal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Find,
    Insert,
    Update,
    Remove,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Find => "find",
            OperationKind::Insert => "insert",
            OperationKind::Update => "update",
            OperationKind::Remove => "remove",
        })
    }
}

/// A terminal operation together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Return every document matching the filter.
    Find,
    /// Insert the given document; the filter is ignored.
    Insert(Document),
    /// Apply the update document to every document matching the filter.
    Update,
    /// Delete every document matching the filter.
    Remove,
}

impl Operation {
    /// Returns the kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Find => OperationKind::Find,
            Operation::Insert(_) => OperationKind::Insert,
            Operation::Update => OperationKind::Update,
            Operation::Remove => OperationKind::Remove,
        }
    }
}

/// The result of a terminal operation, mirroring what the collaborator returns.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Found(Vec<Document>),
    Inserted(InsertOutcome),
    Updated(UpdateOutcome),
    Removed(RemoveOutcome),
}

impl OperationResult {
    pub fn into_documents(self) -> ChainResult<Vec<Document>> {
        match self {
            OperationResult::Found(documents) => Ok(documents),
            _ => Err(ChainError::UnexpectedOutcome(OperationKind::Find)),
        }
    }

    pub fn into_inserted(self) -> ChainResult<InsertOutcome> {
        match self {
            OperationResult::Inserted(outcome) => Ok(outcome),
            _ => Err(ChainError::UnexpectedOutcome(OperationKind::Insert)),
        }
    }

    pub fn into_updated(self) -> ChainResult<UpdateOutcome> {
        match self {
            OperationResult::Updated(outcome) => Ok(outcome),
            _ => Err(ChainError::UnexpectedOutcome(OperationKind::Update)),
        }
    }

    pub fn into_removed(self) -> ChainResult<RemoveOutcome> {
        match self {
            OperationResult::Removed(outcome) => Ok(outcome),
            _ => Err(ChainError::UnexpectedOutcome(OperationKind::Remove)),
        }
    }
}

/// Drives a collection handle's [`Connector`] through a single operation.
#[derive(Debug)]
pub struct OperationExecutor<'a, C: Connector> {
    handle: &'a CollectionHandle<C>,
}

impl<'a, C: Connector> OperationExecutor<'a, C> {
    /// Creates an executor for the given collection.
    pub fn new(handle: &'a CollectionHandle<C>) -> Self {
        Self { handle }
    }

    /// Connects, runs `operation` against the collection and closes.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Connection`] when no connection could be opened, in
    /// which case no operation is attempted. Errors from the operation itself are
    /// returned unchanged after the connection has been closed.
    pub async fn execute(&self, operation: Operation, rendered: RenderedQuery) -> ChainResult<OperationResult> {
        let handle = self.handle;
        let kind = operation.kind();

        debug!(
            address = handle.address(),
            collection = handle.name(),
            operation = %kind,
            filter = %rendered.filter,
            "executing chain"
        );

        let connection = handle
            .connector()
            .connect(handle.address())
            .await
            .inspect_err(|e| error!(address = handle.address(), error = %e, "failed to connect"))?;

        let result = {
            let collection = connection.collection(handle.name());
            Self::run(&collection, operation, rendered).await
        };

        if let Err(e) = connection.close().await {
            warn!(address = handle.address(), error = %e, "failed to close connection");
        }

        result
    }

    /// Like [`execute`](Self::execute), delivering the outcome to `callback`.
    ///
    /// The callback is invoked exactly once, after the round trip completes.
    pub async fn execute_with<F>(&self, operation: Operation, rendered: RenderedQuery, callback: F)
    where
        F: FnOnce(ChainResult<OperationResult>) + Send,
    {
        callback(self.execute(operation, rendered).await)
    }

    async fn run(
        collection: &<C::Connection as Connection>::Collection,
        operation: Operation,
        rendered: RenderedQuery,
    ) -> ChainResult<OperationResult> {
        match operation {
            Operation::Find => Ok(OperationResult::Found(collection.find(rendered.filter).await?)),
            Operation::Insert(document) => {
                Ok(OperationResult::Inserted(collection.insert_one(document).await?))
            }
            Operation::Remove => {
                Ok(OperationResult::Removed(collection.delete_many(rendered.filter).await?))
            }
            Operation::Update => match rendered.update {
                Some(update) => Ok(OperationResult::Updated(
                    collection.update_many(rendered.filter, update).await?,
                )),
                None => {
                    warn!("update without any set fields, matching only");
                    let matched = collection.find(rendered.filter).await?;

                    Ok(OperationResult::Updated(UpdateOutcome {
                        matched_count: matched.len() as u64,
                        modified_count: 0,
                    }))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Server;
    use async_trait::async_trait;
    use bson::{Bson, doc};
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, Default)]
    struct RecordingConnector {
        log: Log,
        refuse: bool,
        fail: bool,
    }

    struct RecordingConnection {
        log: Log,
        fail: bool,
    }

    struct RecordingCollection {
        log: Log,
        name: String,
        fail: bool,
    }

    impl RecordingCollection {
        fn record(&self, entry: String) -> ChainResult<()> {
            self.log.lock().unwrap().push(entry);
            if self.fail {
                Err(ChainError::Operation("duplicate key".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        type Connection = RecordingConnection;

        async fn connect(&self, address: &str) -> ChainResult<Self::Connection> {
            self.log.lock().unwrap().push(format!("connect {address}"));
            if self.refuse {
                return Err(ChainError::Connection("connection refused".into()));
            }
            Ok(RecordingConnection { log: self.log.clone(), fail: self.fail })
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        type Collection = RecordingCollection;

        fn collection(&self, name: &str) -> Self::Collection {
            RecordingCollection { log: self.log.clone(), name: name.to_string(), fail: self.fail }
        }

        async fn close(self) -> ChainResult<()> {
            self.log.lock().unwrap().push("close".into());
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteCollection for RecordingCollection {
        async fn find(&self, filter: Document) -> ChainResult<Vec<Document>> {
            self.record(format!("find {} {filter}", self.name))?;
            Ok(vec![doc! { "name": "A" }])
        }

        async fn delete_many(&self, filter: Document) -> ChainResult<RemoveOutcome> {
            self.record(format!("delete_many {} {filter}", self.name))?;
            Ok(RemoveOutcome { deleted_count: 2 })
        }

        async fn update_many(&self, filter: Document, update: Document) -> ChainResult<UpdateOutcome> {
            self.record(format!("update_many {} {filter} {update}", self.name))?;
            Ok(UpdateOutcome { matched_count: 3, modified_count: 3 })
        }

        async fn insert_one(&self, document: Document) -> ChainResult<InsertOutcome> {
            self.record(format!("insert_one {} {document}", self.name))?;
            Ok(InsertOutcome { inserted_id: Bson::Int32(1) })
        }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[rstest]
    #[tokio::test]
    async fn test_find_connects_operates_and_closes() {
        let connector = RecordingConnector::default();
        let log = connector.log.clone();
        let server = Server::new("mongodb://db/app", connector);
        let users = server.collection("users");
        let rendered = users.where_("age").greater_than(18).render();

        let result = OperationExecutor::new(&users)
            .execute(Operation::Find, rendered.clone())
            .await
            .unwrap();

        assert_eq!(result, OperationResult::Found(vec![doc! { "name": "A" }]));
        assert_eq!(
            entries(&log),
            vec![
                "connect mongodb://db/app".to_string(),
                format!("find users {}", rendered.filter),
                "close".to_string(),
            ]
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_executes_through_the_handles_own_connector() {
        let primary = RecordingConnector::default();
        let replica = RecordingConnector::default();
        let (primary_log, replica_log) = (primary.log.clone(), replica.log.clone());
        let _primary = Server::new("mongodb://primary/app", primary);
        let replica = Server::new("mongodb://replica/app", replica);

        OperationExecutor::new(&replica.collection("users"))
            .execute(Operation::Remove, RenderedQuery::default())
            .await
            .unwrap();

        assert!(entries(&primary_log).is_empty());
        assert_eq!(entries(&replica_log)[0], "connect mongodb://replica/app");
    }

    #[rstest]
    #[tokio::test]
    async fn test_connection_failure_skips_operation() {
        let connector = RecordingConnector { refuse: true, ..Default::default() };
        let log = connector.log.clone();
        let server = Server::new("mongodb://db/app", connector);
        let users = server.collection("users");

        let mut calls = 0;
        OperationExecutor::new(&users)
            .execute_with(Operation::Find, RenderedQuery::default(), |result| {
                calls += 1;
                assert!(matches!(result, Err(ChainError::Connection(_))));
            })
            .await;

        assert_eq!(calls, 1);
        assert_eq!(entries(&log), vec!["connect mongodb://db/app".to_string()]);
    }

    #[rstest]
    #[case(Operation::Find)]
    #[case(Operation::Insert(doc! { "name": "B" }))]
    #[case(Operation::Update)]
    #[case(Operation::Remove)]
    #[tokio::test]
    async fn test_operation_failure_still_closes(#[case] operation: Operation) {
        let connector = RecordingConnector { fail: true, ..Default::default() };
        let log = connector.log.clone();
        let server = Server::new("mongodb://db/app", connector);
        let users = server.collection("users");
        let rendered = users.set("status", "closed").render();

        let result = OperationExecutor::new(&users)
            .execute(operation, rendered)
            .await;

        assert!(matches!(result, Err(ChainError::Operation(_))));
        assert_eq!(entries(&log).last().map(String::as_str), Some("close"));
        assert_eq!(entries(&log).len(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn test_update_without_set_fields_only_matches() {
        let connector = RecordingConnector::default();
        let log = connector.log.clone();
        let server = Server::new("mongodb://db/app", connector);
        let users = server.collection("users");

        let result = OperationExecutor::new(&users)
            .execute(Operation::Update, RenderedQuery::default())
            .await
            .unwrap();

        assert_eq!(
            result,
            OperationResult::Updated(UpdateOutcome { matched_count: 1, modified_count: 0 })
        );
        assert_eq!(entries(&log)[1], format!("find users {}", doc! {}));
    }

    #[rstest]
    fn test_outcome_accessors_reject_other_kinds() {
        let removed = OperationResult::Removed(RemoveOutcome { deleted_count: 0 });

        assert!(matches!(
            removed.clone().into_documents(),
            Err(ChainError::UnexpectedOutcome(OperationKind::Find))
        ));
        assert_eq!(removed.into_removed().unwrap().deleted_count, 0);
    }
}
