//! A fluent query builder over a MongoDB-style document database client.
//!
//! This crate is the core of the mongochain project and provides:
//!
//! - **Chain API** ([`chain`]) - `where_`, comparisons, `not`, `set` and the terminal operations
//! - **Chain state** ([`query`]) - Predicates and update fields accumulated by a chain
//! - **Rendering** ([`render`]) - Translation of chain state into filter and update documents
//! - **Collaborator traits** ([`driver`]) - The connect/collection/operate/close seam to a database
//! - **Execution** ([`executor`]) - One connect → operate → close sequence per terminal call
//! - **Entry points** ([`collection`]) - Servers and collection handles
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use mongochain_core::collection::Server;
//!
//! let users = Server::new("mongodb://localhost/app", connector).collection("users");
//!
//! let adults = users.where_("age").greater_than(18).find().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongochain_core;

pub mod chain;
pub mod collection;
pub mod driver;
pub mod error;
pub mod executor;
pub mod query;
pub mod render;
