//! In-memory database collaborator for mongochain.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `Connector` trait. It interprets the filter and update documents rendered
//! by a chain, so chains can be run end to end without a database server.
//!
//! # Features
//!
//! - **Shared storage** - Every connection sees the same documents behind an async-aware RwLock
//! - **Operator support** - `$and`, `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin` and `$set`
//! - **Connection accounting** - Opened and closed connections are counted
//! - **Failure injection** - Connections can be refused and operations failed on demand
//!
//! # Quick Start
//!
//! ```ignore
//! use mongochain_core::{collection::Server, driver::ConnectorBuilder};
//! use mongochain_memory::InMemoryConnector;
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connector = InMemoryConnector::builder()
//!         .seed("users", vec![doc! { "name": "A", "age": 30 }])
//!         .build()
//!         .await?;
//!     let users = Server::new("memory://app", connector).collection("users");
//!
//!     let adults = users.where_("age").greater_than(18).find().await?;
//!     assert_eq!(adults.len(), 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongochain_memory;

pub mod connector;
mod evaluator;

pub use connector::{InMemoryCollection, InMemoryConnection, InMemoryConnector, InMemoryConnectorBuilder};
