//! Client configuration.

use crate::error::{ClientError, Result};
use crate::types::EndpointUri;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default bound on the startup wait.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(60);

/// Subscription client configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the subscription service lives. Required before `start`.
    pub subscription_service_uri: Option<EndpointUri>,

    /// How long `start` waits for the first refresh.
    /// Default: 60s
    #[serde(rename = "start_timeout_ms", with = "duration_ms")]
    pub start_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            subscription_service_uri: None,
            start_timeout: DEFAULT_START_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Config pointing at the given service with the default timeout.
    pub fn new(subscription_service_uri: EndpointUri) -> Self {
        Self {
            subscription_service_uri: Some(subscription_service_uri),
            ..Default::default()
        }
    }

    /// Set the subscription service uri.
    pub fn with_service_uri(mut self, uri: EndpointUri) -> Self {
        self.subscription_service_uri = Some(uri);
        self
    }

    /// Set the bound on the startup wait.
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    /// Parse a JSON document, e.g.
    /// `{"subscription_service_uri": "queue://broker/subscriptions", "start_timeout_ms": 5000}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check the config is usable for `start`.
    pub fn validate(&self) -> Result<()> {
        if self.subscription_service_uri.is_none() {
            return Err(ClientError::Configuration(
                "subscription service uri is not set".to_string(),
            ));
        }
        if self.start_timeout.is_zero() {
            return Err(ClientError::Configuration(
                "start timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The service uri, or a configuration error if it is missing.
    pub fn service_uri(&self) -> Result<&EndpointUri> {
        self.subscription_service_uri.as_ref().ok_or_else(|| {
            ClientError::Configuration("subscription service uri is not set".to_string())
        })
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
