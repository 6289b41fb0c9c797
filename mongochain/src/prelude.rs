//! Convenient re-exports of commonly used types from mongochain.
//!
//! ```ignore
//! use mongochain::prelude::*;
//! ```
//!
//! This provides access to:
//! - Servers and collection handles
//! - Chain builders and rendered queries
//! - Collaborator traits and operation outcomes
//! - Error types

pub use mongochain_core::{
    collection::{CollectionHandle, Server},
    chain::{PredicateBuilder, QueryBuilder},
    query::{FieldOp, Predicate, QueryState, QueryVisitor},
    render::RenderedQuery,
    driver::{Connection, Connector, ConnectorBuilder, InsertOutcome, RemoteCollection, RemoveOutcome, UpdateOutcome},
    executor::{Operation, OperationExecutor, OperationKind, OperationResult},
    error::{ChainError, ChainResult},
};
