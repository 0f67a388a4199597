//! Connection management for MongoDB
//!
//! This module provides connection management functionality including:
//! - Connection establishment with a retried initial ping
//! - Connection pool sizing and timeouts
//! - Handing out the database handle owned by the row source
//! - Orderly shutdown once the export has closed

use bson::doc;
use mongodb::{Client, Database, options::ClientOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// Application name reported to the server
const APP_NAME: &str = "tabledump";

/// Delay between ping attempts, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// MongoDB connection manager
///
/// Acquired before an export starts and released after it reaches its
/// closed state. The client is never shared through a global.
pub struct ConnectionManager {
    /// MongoDB client instance
    client: Option<Client>,

    /// Connection configuration
    config: ConnectionConfig,

    /// Current connection state
    state: ConnectionState,
}

/// Connection state information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,

    /// Connected and ready
    Connected,

    /// Connection failed
    Failed(String),
}

impl ConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `config` - Connection configuration (URI, database, timeouts)
    ///
    /// # Returns
    /// * `Self` - New connection manager instance
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            client: None,
            config,
            state: ConnectionState::Disconnected,
        }
    }

    /// Establish connection to MongoDB
    ///
    /// The driver connects lazily, so the connection is only proven once a
    /// ping succeeds. The ping is retried `retry_attempts` times.
    ///
    /// # Returns
    /// * `Result<()>` - Success or connection error
    pub async fn connect(&mut self) -> Result<()> {
        let options = self.client_options().await?;
        let client = Client::with_options(options)
            .map_err(|e| ConnectionError::ConnectionFailed(e.to_string()))?;

        match Self::ping_with_retry(&client, self.config.retry_attempts).await {
            Ok(()) => {
                info!("Connected to MongoDB");
                self.client = Some(client);
                self.state = ConnectionState::Connected;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Disconnect from MongoDB
    ///
    /// Waits for in-flight operations and closes every pooled connection.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            debug!("MongoDB client shut down");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Get a handle to the configured database
    ///
    /// # Returns
    /// * `Result<Database>` - Database handle or error
    pub fn database(&self) -> Result<Database> {
        Ok(self.get_client()?.database(&self.config.database))
    }

    /// Get the MongoDB client
    ///
    /// # Returns
    /// * `Result<&Client>` - Reference to client or error
    pub fn get_client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| ConnectionError::NotConnected.into())
    }

    /// Get current connection state
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected)
    }

    /// Server version from `buildInfo`
    ///
    /// # Returns
    /// * `Result<String>` - Version string, e.g. "7.0.5"
    pub async fn server_version(&self) -> Result<String> {
        let info = self
            .get_client()?
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await?;
        Ok(info.get_str("version").unwrap_or("unknown").to_string())
    }

    /// Parse connection URI and apply pool and timeout settings
    async fn client_options(&self) -> Result<ClientOptions> {
        self.config.validate_uri()?;

        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| ConnectionError::InvalidUri(e.to_string()))?;

        let timeout = Duration::from_secs(self.config.timeout);
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.max_pool_size = Some(self.config.max_pool_size);

        Ok(options)
    }

    /// Ping the server until it answers or the attempts run out
    async fn ping_with_retry(client: &Client, attempts: u32) -> Result<()> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match client.database("admin").run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        warn!(
                            "Ping attempt {}/{} failed: {}. Retrying...",
                            attempt, attempts, last_error
                        );
                        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    }
                }
            }
        }

        Err(ConnectionError::PingFailed(last_error).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_manager_is_disconnected() {
        let manager = ConnectionManager::new(ConnectionConfig::default());
        assert_eq!(manager.state(), &ConnectionState::Disconnected);
        assert!(!manager.is_connected());
        assert!(manager.get_client().is_err());
        assert!(manager.database().is_err());
    }

    #[tokio::test]
    async fn test_invalid_uri_rejected_before_connecting() {
        let config = ConnectionConfig {
            uri: "postgres://localhost".to_string(),
            ..ConnectionConfig::default()
        };
        let mut manager = ConnectionManager::new(config);
        assert!(manager.connect().await.is_err());
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_client_options_apply_config() {
        let config = ConnectionConfig {
            uri: "mongodb://localhost:27017".to_string(),
            timeout: 7,
            max_pool_size: 3,
            ..ConnectionConfig::default()
        };
        let manager = ConnectionManager::new(config);
        let options = manager.client_options().await.unwrap();

        assert_eq!(options.connect_timeout, Some(Duration::from_secs(7)));
        assert_eq!(options.max_pool_size, Some(3));
        assert_eq!(options.app_name.as_deref(), Some(APP_NAME));
    }

    #[tokio::test]
    async fn test_disconnect_without_client() {
        let mut manager = ConnectionManager::new(ConnectionConfig::default());
        manager.disconnect().await;
        assert_eq!(manager.state(), &ConnectionState::Disconnected);
    }
}
