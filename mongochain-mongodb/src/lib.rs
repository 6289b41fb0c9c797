//! MongoDB collaborator for mongochain.
//!
//! This crate implements the `Connector` trait on top of the official MongoDB
//! driver. Rendered filter and update documents are handed to the driver as is.
//!
//! To use this collaborator, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! mongochain = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Each terminal call opens its own client from the server address, pings the
//! database and shuts the client down afterwards. The database is taken from
//! the address path, or from the builder's `default_database` when the address
//! has none.
//!
//! # Example
//!
//! ```ignore
//! use mongochain::mongodb::server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = server("mongodb://localhost:27017/app").collection("users");
//!
//!     let outcome = users
//!         .where_("status")
//!         .include(["open", "pending"])
//!         .set("status", "closed")
//!         .update()
//!         .await?;
//!
//!     println!("modified {}", outcome.modified_count);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as mongochain_mongodb;

pub mod connector;

pub use connector::{MongoCollection, MongoConnection, MongoConnector, MongoConnectorBuilder, server};
