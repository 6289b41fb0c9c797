//! The fluent chain: predicate cursors and the chain root.
//!
//! A chain starts at a [`QueryBuilder`] (the chain root). Calling
//! [`where_`](QueryBuilder::where_) yields a [`PredicateBuilder`] cursor over one
//! or more fields; a comparison method consumes the cursor, appends one
//! predicate per field and hands back the chain root. Terminal methods
//! (`find`, `insert`, `update`, `remove`) consume the root, render it and
//! execute it.
//!
//! All transitions take `self` by value, so a rendered chain can no longer be
//! changed.
//!
//! ```ignore
//! // {"$and": [{"status": {"$in": ["active", "pending"]}}]}, {"$set": {"status": "closed"}}
//! users
//!     .where_("status")
//!     .include(["active", "pending"])
//!     .set("status", "closed")
//!     .update()
//!     .await?;
//! ```

use bson::{
    Bson, Document,
    de::deserialize_from_bson,
    ser::serialize_to_bson,
};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    collection::CollectionHandle,
    driver::{Connector, InsertOutcome, RemoveOutcome, UpdateOutcome},
    error::{ChainError, ChainResult},
    executor::{Operation, OperationExecutor, OperationResult},
    query::{FieldOp, Predicate, QueryState},
    render::RenderedQuery,
};

/// The root of a chain: a collection handle plus the state accumulated so far.
#[derive(Debug, Clone)]
pub struct QueryBuilder<C: Connector> {
    handle: CollectionHandle<C>,
    state: QueryState,
}

impl<C: Connector> QueryBuilder<C> {
    /// Creates an empty chain on the given collection.
    pub fn new(handle: CollectionHandle<C>) -> Self {
        Self { handle, state: QueryState::new() }
    }

    /// Returns the collection this chain targets.
    pub fn handle(&self) -> &CollectionHandle<C> {
        &self.handle
    }

    /// Returns the state accumulated so far.
    pub fn state(&self) -> &QueryState {
        &self.state
    }

    /// Opens a predicate cursor on `field`.
    pub fn where_(self, field: impl Into<String>) -> PredicateBuilder<C> {
        PredicateBuilder { query: self, fields: vec![field.into()], negated: false }
    }

    /// Negates the predicates added by the most recent comparison.
    ///
    /// `where_("age").less_than(18).not()` filters on `age >= 18`. Calling it
    /// again restores the comparison; before any comparison it does nothing.
    pub fn not(mut self) -> Self {
        self.state.negate_last_group();
        self
    }

    /// Sets `field` to `value` when the chain is executed as an update.
    ///
    /// Passing no value (`None` or BSON null) leaves the update unchanged.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.state.set(field, value);
        self
    }

    /// Renders the filter and update documents without executing.
    pub fn render(&self) -> RenderedQuery {
        RenderedQuery::from_state(&self.state)
    }

    /// Returns every document matching the chain's predicates.
    pub async fn find(self) -> ChainResult<Vec<Document>> {
        self.dispatch(Operation::Find).await?.into_documents()
    }

    /// Returns every matching document, deserialized into `T`.
    pub async fn find_as<T: DeserializeOwned>(self) -> ChainResult<Vec<T>> {
        self.find()
            .await?
            .into_iter()
            .map(|doc| Ok(deserialize_from_bson(Bson::Document(doc))?))
            .collect()
    }

    /// Like [`find`](Self::find), delivering the outcome to `callback` exactly once.
    pub async fn find_with<F>(self, callback: F)
    where
        F: FnOnce(ChainResult<Vec<Document>>) + Send,
    {
        callback(self.find().await)
    }

    /// Inserts `document` into the collection. Predicates are ignored.
    pub async fn insert(self, document: Document) -> ChainResult<InsertOutcome> {
        self.dispatch(Operation::Insert(document)).await?.into_inserted()
    }

    /// Serializes `value` and inserts it as a single document.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::InvalidDocument`] when `value` does not serialize to
    /// a document (e.g. a bare string or number).
    pub async fn insert_serialized<T: Serialize>(self, value: &T) -> ChainResult<InsertOutcome> {
        match serialize_to_bson(value)? {
            Bson::Document(document) => self.insert(document).await,
            other => Err(ChainError::InvalidDocument(format!(
                "expected a document, got {:?}",
                other.element_type()
            ))),
        }
    }

    /// Like [`insert`](Self::insert), delivering the outcome to `callback` exactly once.
    pub async fn insert_with<F>(self, document: Document, callback: F)
    where
        F: FnOnce(ChainResult<InsertOutcome>) + Send,
    {
        callback(self.insert(document).await)
    }

    /// Applies the `$set` fields to every matching document.
    ///
    /// An update without any `set` field issues no write: matching documents are
    /// counted and reported with a modified count of zero.
    pub async fn update(self) -> ChainResult<UpdateOutcome> {
        self.dispatch(Operation::Update).await?.into_updated()
    }

    /// Like [`update`](Self::update), delivering the outcome to `callback` exactly once.
    pub async fn update_with<F>(self, callback: F)
    where
        F: FnOnce(ChainResult<UpdateOutcome>) + Send,
    {
        callback(self.update().await)
    }

    /// Deletes every matching document.
    pub async fn remove(self) -> ChainResult<RemoveOutcome> {
        self.dispatch(Operation::Remove).await?.into_removed()
    }

    /// Like [`remove`](Self::remove), delivering the outcome to `callback` exactly once.
    pub async fn remove_with<F>(self, callback: F)
    where
        F: FnOnce(ChainResult<RemoveOutcome>) + Send,
    {
        callback(self.remove().await)
    }

    async fn dispatch(self, operation: Operation) -> ChainResult<OperationResult> {
        let rendered = self.render();

        OperationExecutor::new(&self.handle)
            .execute(operation, rendered)
            .await
    }
}

/// A cursor over the field(s) the next comparison applies to.
///
/// Cursors are immutable values: every method returns a new cursor or, for the
/// comparison methods, the chain root.
#[derive(Debug, Clone)]
pub struct PredicateBuilder<C: Connector> {
    query: QueryBuilder<C>,
    fields: Vec<String>,
    negated: bool,
}

impl<C: Connector> PredicateBuilder<C> {
    /// Returns the fields the next comparison applies to.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns whether the next comparison is negated.
    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Adds `field` to the cursor, so the next comparison applies to it as well.
    ///
    /// A pending `not()` does not carry over to the extended cursor.
    pub fn where_(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self.negated = false;
        self
    }

    /// Negates the next comparison. Two calls cancel out.
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// `field == value`, or `field != value` when negated.
    pub fn equal(self, value: impl Into<Bson>) -> QueryBuilder<C> {
        self.compare(FieldOp::Eq, value.into())
    }

    /// `field < value`, or `field >= value` when negated.
    pub fn less_than(self, value: impl Into<Bson>) -> QueryBuilder<C> {
        self.compare(FieldOp::Lt, value.into())
    }

    /// `field > value`, or `field <= value` when negated.
    pub fn greater_than(self, value: impl Into<Bson>) -> QueryBuilder<C> {
        self.compare(FieldOp::Gt, value.into())
    }

    /// `field` is one of `values`, or none of them when negated.
    pub fn include<I, V>(self, values: I) -> QueryBuilder<C>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.compare(FieldOp::In, Bson::Array(values.into_iter().map(Into::into).collect()))
    }

    fn compare(self, op: FieldOp, value: Bson) -> QueryBuilder<C> {
        let PredicateBuilder { mut query, fields, negated } = self;
        let op = op.negated_if(negated);

        query
            .state
            .push_group(fields.into_iter().map(|field| Predicate::new(field, op, value.clone())));
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{collection::Server, driver::Connection};
    use async_trait::async_trait;
    use bson::doc;
    use rstest::{fixture, rstest};

    #[derive(Debug)]
    struct Unreachable;

    struct NoConnection;

    #[async_trait]
    impl Connector for Unreachable {
        type Connection = NoConnection;

        async fn connect(&self, address: &str) -> ChainResult<Self::Connection> {
            Err(ChainError::Connection(format!("{address} is unreachable")))
        }
    }

    #[async_trait]
    impl Connection for NoConnection {
        type Collection = NoCollection;

        fn collection(&self, _name: &str) -> Self::Collection {
            NoCollection
        }

        async fn close(self) -> ChainResult<()> {
            Ok(())
        }
    }

    struct NoCollection;

    #[async_trait]
    impl crate::driver::RemoteCollection for NoCollection {
        async fn find(&self, _filter: Document) -> ChainResult<Vec<Document>> {
            unreachable!()
        }

        async fn delete_many(&self, _filter: Document) -> ChainResult<RemoveOutcome> {
            unreachable!()
        }

        async fn update_many(&self, _filter: Document, _update: Document) -> ChainResult<UpdateOutcome> {
            unreachable!()
        }

        async fn insert_one(&self, _document: Document) -> ChainResult<InsertOutcome> {
            unreachable!()
        }
    }

    #[fixture]
    fn users() -> CollectionHandle<Unreachable> {
        Server::new("mongodb://localhost/app", Unreachable).collection("users")
    }

    #[rstest]
    fn test_where_equal_renders_bare_value(users: CollectionHandle<Unreachable>) {
        let rendered = users.where_("name").equal("A").render();

        assert_eq!(rendered.filter, doc! { "$and": [{ "name": "A" }] });
    }

    #[rstest]
    fn test_predicates_are_anded_in_call_order(users: CollectionHandle<Unreachable>) {
        let rendered = users
            .where_("name")
            .equal("A")
            .where_("age")
            .greater_than(18)
            .render();

        assert_eq!(
            rendered.filter,
            doc! { "$and": [{ "name": "A" }, { "age": { "$gt": 18 } }] }
        );
    }

    #[rstest]
    fn test_chained_where_applies_comparison_to_each_field(users: CollectionHandle<Unreachable>) {
        let rendered = users.where_("a").where_("b").equal(1).render();

        assert_eq!(rendered.filter, doc! { "$and": [{ "a": 1 }, { "b": 1 }] });
    }

    #[rstest]
    fn test_negated_comparisons(users: CollectionHandle<Unreachable>) {
        let rendered = users
            .where_("f")
            .not()
            .equal("v")
            .where_("n")
            .not()
            .less_than(3)
            .where_("m")
            .not()
            .greater_than(4)
            .where_("t")
            .not()
            .include(["a", "b"])
            .render();

        assert_eq!(
            rendered.filter,
            doc! { "$and": [
                { "f": { "$ne": "v" } },
                { "n": { "$gte": 3 } },
                { "m": { "$lte": 4 } },
                { "t": { "$nin": ["a", "b"] } },
            ] }
        );
    }

    #[rstest]
    fn test_double_not_restores_comparison(users: CollectionHandle<Unreachable>) {
        let rendered = users.where_("n").not().not().less_than(3).render();

        assert_eq!(rendered.filter, doc! { "$and": [{ "n": { "$lt": 3 } }] });
    }

    #[rstest]
    fn test_cursor_negation_is_one_shot(users: CollectionHandle<Unreachable>) {
        let rendered = users
            .where_("a")
            .not()
            .equal(1)
            .where_("b")
            .equal(2)
            .render();

        assert_eq!(rendered.filter, doc! { "$and": [{ "a": { "$ne": 1 } }, { "b": 2 }] });
    }

    #[rstest]
    fn test_extending_cursor_drops_pending_not(users: CollectionHandle<Unreachable>) {
        let cursor = users.where_("a").not().where_("b");

        assert!(!cursor.is_negated());
        assert_eq!(cursor.fields(), ["a".to_string(), "b".to_string()]);
    }

    #[rstest]
    fn test_trailing_not_negates_last_comparison(users: CollectionHandle<Unreachable>) {
        let rendered = users
            .where_("name")
            .equal("A")
            .where_("age")
            .less_than(18)
            .not()
            .render();

        assert_eq!(
            rendered.filter,
            doc! { "$and": [{ "name": "A" }, { "age": { "$gte": 18 } }] }
        );
    }

    #[rstest]
    fn test_set_last_write_wins(users: CollectionHandle<Unreachable>) {
        let rendered = users.set("f", 1).set("g", 2).set("f", 3).render();

        assert_eq!(rendered.update, Some(doc! { "$set": { "f": 3, "g": 2 } }));
    }

    #[rstest]
    fn test_set_without_value_leaves_update_unchanged(users: CollectionHandle<Unreachable>) {
        let rendered = users.set("f", 1).set("g", None::<i32>).render();

        assert_eq!(rendered.update, Some(doc! { "$set": { "f": 1 } }));
    }

    #[rstest]
    fn test_chains_do_not_share_state(users: CollectionHandle<Unreachable>) {
        let first = users.where_("a").equal(1);
        let second = users.query();

        assert_eq!(first.state().predicates().len(), 1);
        assert!(second.state().predicates().is_empty());
        assert_eq!(second.render().filter, doc! {});
    }

    #[rstest]
    #[tokio::test]
    async fn test_connection_error_reaches_callback_once(users: CollectionHandle<Unreachable>) {
        let mut outcomes = Vec::new();

        users
            .where_("age")
            .greater_than(18)
            .find_with(|result| outcomes.push(result))
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], Err(ChainError::Connection(_))));
    }

    #[rstest]
    #[tokio::test]
    async fn test_insert_serialized_rejects_non_documents(users: CollectionHandle<Unreachable>) {
        let result = users.insert_serialized(&42).await;

        assert!(matches!(result, Err(ChainError::InvalidDocument(_))));
    }
}
