use async_trait::async_trait;
use mongodb::{
    bson::doc,
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection, Database,
};
use tracing::info;

use crate::database::Connector;
use crate::error::{AppError, Result};

/// Pooled low-level MongoDB client, for direct queries and admin commands.
pub struct NativeConnector {
    uri: String,
}

impl NativeConnector {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    async fn build_client(&self) -> Result<Client> {
        let mut client_options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to parse MongoDB URI: {}", e)))?;

        // Pin the Stable API so driver and server versions can move
        // independently.
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        Client::with_options(client_options)
            .map_err(|e| AppError::DatabaseError(format!("Failed to create MongoDB client: {}", e)))
    }
}

#[async_trait]
impl Connector for NativeConnector {
    type Handle = Client;

    async fn connect(&self) -> Result<Client> {
        info!("🔄 Connecting native MongoDB client...");
        let client = self.build_client().await?;

        // The client connects lazily; ping to confirm the server is
        // actually reachable before handing the client out.
        client
            .database("admin")
            .run_command(doc! {"ping": 1}, None)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to ping MongoDB: {}", e)))?;

        info!("✅ Native MongoDB client connected");
        Ok(client)
    }

    async fn ping(&self, handle: &Client) -> Result<()> {
        handle
            .database("admin")
            .run_command(doc! {"ping": 1}, None)
            .await
            .map_err(|e| AppError::DatabaseError(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    async fn close(&self, handle: Client) -> Result<()> {
        handle.shutdown().await;
        Ok(())
    }
}

/// Document-mapper session: a database-scoped handle that hands out typed
/// collection views. Its client is independent of the native one, so the
/// two lifecycles never interfere.
#[derive(Clone)]
pub struct OrmSession {
    client: Client,
    database: Database,
}

impl OrmSession {
    pub fn collection<T>(&self, name: &str) -> Collection<T> {
        self.database.collection::<T>(name)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

pub struct OrmConnector {
    uri: String,
    database_name: String,
}

impl OrmConnector {
    pub fn new(uri: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            database_name: database_name.into(),
        }
    }
}

#[async_trait]
impl Connector for OrmConnector {
    type Handle = OrmSession;

    async fn connect(&self) -> Result<OrmSession> {
        info!("🔄 Opening document-mapper session...");
        let mut client_options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to parse MongoDB URI: {}", e)))?;

        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        let client = Client::with_options(client_options)
            .map_err(|e| AppError::DatabaseError(format!("Failed to create MongoDB client: {}", e)))?;

        let database = client.database(&self.database_name);
        database
            .run_command(doc! {"ping": 1}, None)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to ping MongoDB: {}", e)))?;

        info!("✅ Document-mapper session opened ({})", self.database_name);
        Ok(OrmSession { client, database })
    }

    async fn ping(&self, handle: &OrmSession) -> Result<()> {
        handle
            .database
            .run_command(doc! {"ping": 1}, None)
            .await
            .map_err(|e| AppError::DatabaseError(format!("MongoDB ping failed: {}", e)))?;
        Ok(())
    }

    async fn close(&self, handle: OrmSession) -> Result<()> {
        handle.client.shutdown().await;
        Ok(())
    }
}
