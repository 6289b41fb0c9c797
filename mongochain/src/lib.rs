//! Main mongochain crate providing a fluent query builder over document databases.
//!
//! This crate is the primary entry point for users of mongochain. It re-exports
//! the core types from the sub-crates and provides access to the available
//! database collaborators.
//!
//! # Features
//!
//! - **Fluent chains** - Build filters with `where_`, `equal`, `less_than`, `greater_than`, `include` and `not`
//! - **Updates** - Accumulate `$set` fields with `set` and apply them with `update`
//! - **One round trip per call** - Every terminal call connects, runs one operation and closes
//! - **Swappable collaborators** - In-memory and MongoDB connectors behind a trait seam
//!
//! # Quick Start
//!
//! ```ignore
//! use mongochain::{prelude::*, memory::InMemoryConnector};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> ChainResult<()> {
//!     let connector = InMemoryConnector::builder()
//!         .seed("users", vec![
//!             doc! { "name": "A", "age": 30 },
//!             doc! { "name": "B", "age": 12 },
//!         ])
//!         .build()
//!         .await?;
//!     let users = Server::new("memory://app", connector).collection("users");
//!
//!     // {"$and": [{"age": {"$gt": 18}}]}
//!     let adults = users.where_("age").greater_than(18).find().await?;
//!     println!("adults: {:?}", adults);
//!
//!     // {"$and": [{"age": {"$gte": 18}}]}, the trailing not() flips the last comparison
//!     let also_adults = users.where_("age").less_than(18).not().find().await?;
//!     assert_eq!(adults, also_adults);
//!
//!     // {"$set": {"minor": true}}
//!     users
//!         .where_("age")
//!         .less_than(18)
//!         .set("minor", true)
//!         .update()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Callbacks
//!
//! Every terminal operation also has a `*_with` form that hands the outcome to
//! a callback exactly once, whether the round trip succeeded or not.
//!
//! ```ignore
//! users
//!     .where_("name")
//!     .not()
//!     .equal("A")
//!     .remove_with(|outcome| match outcome {
//!         Ok(removed) => println!("removed {}", removed.deleted_count),
//!         Err(e) => eprintln!("remove failed: {e}"),
//!     })
//!     .await;
//! ```
//!
//! # Collaborators
//!
//! - [`memory`] - In-memory connector for development and testing
//! - [`mongodb`] - MongoDB connector (requires `mongodb` feature)

pub mod prelude;

pub use mongochain_core::{chain, collection, driver, error, executor, query, render};

// Re-export BSON types for convenience
pub use bson;

/// In-memory collaborator implementations.
pub mod memory {
    pub use mongochain_memory::{InMemoryCollection, InMemoryConnection, InMemoryConnector, InMemoryConnectorBuilder};
}

/// MongoDB collaborator implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use mongochain_mongodb::{MongoCollection, MongoConnection, MongoConnector, MongoConnectorBuilder, server};
}
