//! NATS connection management.
//!
//! Provides a thin wrapper around `async-nats` for connecting to NATS with
//! game-specific defaults.

use tracing::info;

use crate::error::NetError;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct NetConfig {
    /// NATS server URL.
    pub url: String,
}

impl NetConfig {
    /// Read the URL from the `NATS_URL` environment variable, falling back to
    /// [`DEFAULT_NATS_URL`].
    #[must_use]
    pub fn from_env() -> Self {
        let url = std::env::var(NATS_URL_ENV).unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        Self { url }
    }

    /// Override the NATS URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_NATS_URL.to_string(),
        }
    }
}

/// A wrapper around an `async-nats` client.
#[derive(Debug, Clone)]
pub struct NatsConnection {
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect using the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be established.
    pub async fn connect(config: &NetConfig) -> Result<Self, NetError> {
        info!(url = %config.url, "connecting to NATS");
        let client = async_nats::connect(config.url.as_str()).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Returns a reference to the underlying `async-nats` client.
    #[must_use]
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    /// Publish pre-encoded bytes to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Publish`] if publishing fails.
    pub async fn publish_bytes(&self, subject: String, payload: Vec<u8>) -> Result<(), NetError> {
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }

    /// Subscribe to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, NetError> {
        let sub = self.client.subscribe(subject.to_string()).await?;
        Ok(sub)
    }
}
