use std::time::Duration;
use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Document, doc};
use mongodb::{Client, Collection, Database, options::ClientOptions};
use tracing::{debug, warn};

use mongochain_core::{
    collection::Server,
    driver::{
        Connection, Connector, ConnectorBuilder, InsertOutcome, RemoteCollection, RemoveOutcome,
        UpdateOutcome,
    },
    error::{ChainError, ChainResult},
};


/// Connects to MongoDB deployments through the official driver.
///
/// Every `connect` call creates a fresh client, pings the target database and
/// hands back a [`MongoConnection`]. Closing the connection shuts the client
/// down.
#[derive(Debug, Clone, Default)]
pub struct MongoConnector {
    app_name: Option<String>,
    connect_timeout: Option<Duration>,
    server_selection_timeout: Option<Duration>,
    default_database: Option<String>,
}

impl MongoConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> MongoConnectorBuilder {
        MongoConnectorBuilder::default()
    }

    async fn client_options(&self, address: &str) -> ChainResult<ClientOptions> {
        let mut options = ClientOptions::parse(address)
            .await
            .map_err(|e| ChainError::Connection(e.to_string()))?;

        if let Some(app_name) = &self.app_name {
            options.app_name = Some(app_name.clone());
        }
        if let Some(timeout) = self.connect_timeout {
            options.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = self.server_selection_timeout {
            options.server_selection_timeout = Some(timeout);
        }

        Ok(options)
    }

    fn resolve_database(&self, client: &Client, address: &str) -> ChainResult<Database> {
        if let Some(database) = client.default_database() {
            return Ok(database);
        }

        match &self.default_database {
            Some(name) => Ok(client.database(name)),
            None => Err(ChainError::Connection(format!("no database named in {address}"))),
        }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    type Connection = MongoConnection;

    async fn connect(&self, address: &str) -> ChainResult<Self::Connection> {
        let client = Client::with_options(self.client_options(address).await?)
            .map_err(|e| ChainError::Connection(e.to_string()))?;

        let database = match self.resolve_database(&client, address) {
            Ok(database) => database,
            Err(e) => {
                client.shutdown().await;
                return Err(e);
            },
        };

        if let Err(e) = database.run_command(doc! { "ping": 1 }).await {
            client.shutdown().await;
            return Err(ChainError::Connection(e.to_string()));
        }

        debug!(address, database = database.name(), "opened mongodb connection");

        Ok(MongoConnection { client, database })
    }
}

/// Returns a [`Server`] that reaches `address` with a default [`MongoConnector`].
pub fn server(address: impl Into<String>) -> Server<MongoConnector> {
    Server::new(address, MongoConnector::new())
}

/// An open connection: a driver client bound to one database.
#[derive(Debug)]
pub struct MongoConnection {
    client: Client,
    database: Database,
}

#[async_trait]
impl Connection for MongoConnection {
    type Collection = MongoCollection;

    fn collection(&self, name: &str) -> Self::Collection {
        MongoCollection {
            inner: self.database.collection(name),
        }
    }

    async fn close(self) -> ChainResult<()> {
        debug!(database = self.database.name(), "closing mongodb connection");
        self.client.shutdown().await;

        Ok(())
    }
}

/// A driver collection of raw documents.
#[derive(Debug)]
pub struct MongoCollection {
    inner: Collection<Document>,
}

#[async_trait]
impl RemoteCollection for MongoCollection {
    async fn find(&self, filter: Document) -> ChainResult<Vec<Document>> {
        self.inner
            .find(filter)
            .await
            .map_err(|e| ChainError::Operation(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| ChainError::Operation(e.to_string()))
    }

    async fn delete_many(&self, filter: Document) -> ChainResult<RemoveOutcome> {
        let result = self.inner
            .delete_many(filter)
            .await
            .map_err(|e| ChainError::Operation(e.to_string()))?;

        Ok(RemoveOutcome { deleted_count: result.deleted_count })
    }

    async fn update_many(&self, filter: Document, update: Document) -> ChainResult<UpdateOutcome> {
        let result = self.inner
            .update_many(filter, update)
            .await
            .map_err(|e| ChainError::Operation(e.to_string()))?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn insert_one(&self, document: Document) -> ChainResult<InsertOutcome> {
        let result = self.inner
            .insert_one(document)
            .await
            .map_err(|e| ChainError::Operation(e.to_string()))?;

        Ok(InsertOutcome { inserted_id: result.inserted_id })
    }
}


/// Builder for [`MongoConnector`] instances.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use mongochain_core::driver::ConnectorBuilder;
/// use mongochain_mongodb::MongoConnector;
///
/// let connector = MongoConnector::builder()
///     .app_name("billing")
///     .server_selection_timeout(Duration::from_secs(2))
///     .default_database("billing")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct MongoConnectorBuilder {
    connector: MongoConnector,
}

impl MongoConnectorBuilder {
    /// Name reported to the server in the connection handshake.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.connector.app_name = Some(app_name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connector.connect_timeout = Some(timeout);
        self
    }

    pub fn server_selection_timeout(mut self, timeout: Duration) -> Self {
        self.connector.server_selection_timeout = Some(timeout);
        self
    }

    /// Database used when the address carries no database path.
    pub fn default_database(mut self, name: impl Into<String>) -> Self {
        self.connector.default_database = Some(name.into());
        self
    }
}

#[async_trait]
impl ConnectorBuilder for MongoConnectorBuilder {
    type Connector = MongoConnector;

    async fn build(self) -> ChainResult<Self::Connector> {
        if self.connector.default_database.as_deref() == Some("") {
            warn!("ignoring empty default database name");
            return Ok(MongoConnector { default_database: None, ..self.connector });
        }

        Ok(self.connector)
    }
}
