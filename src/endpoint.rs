//! Endpoint collaborators and the collocation check.

use crate::error::{ClientError, Result};
use crate::types::EndpointUri;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A resolved, addressable transport destination.
pub trait Endpoint: Send + Sync + fmt::Debug {
    /// Address this endpoint was resolved for.
    fn uri(&self) -> &EndpointUri;
}

/// Resolves logical uris to live endpoints.
pub trait EndpointResolver: Send + Sync {
    /// Look up a live endpoint for `uri`.
    fn resolve(&self, uri: &EndpointUri) -> Result<Arc<dyn Endpoint>>;
}

/// The host that starts and stops bus services.
pub trait ServiceBus: Send + Sync {
    /// Inbound endpoint of the bus itself.
    fn endpoint_uri(&self) -> &EndpointUri;

    /// Endpoint of the bus's control plane. Subscription traffic flows here.
    fn control_endpoint_uri(&self) -> &EndpointUri;
}

/// Fail if the control bus and the subscription service share an endpoint.
///
/// Subscription requests would land in the queue the client itself reads
/// replies from, so `start` would never see a response.
pub fn verify_not_same_endpoint(
    control_endpoint: &EndpointUri,
    service_endpoint: &dyn Endpoint,
) -> Result<()> {
    if control_endpoint != service_endpoint.uri() {
        return Ok(());
    }

    debug!(uri = %control_endpoint, "control bus and subscription service collide");
    Err(ClientError::EndpointConflict {
        uri: control_endpoint.clone(),
    })
}

/// Endpoint that is nothing but its address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticEndpoint {
    uri: EndpointUri,
}

impl StaticEndpoint {
    /// Endpoint for `uri`.
    pub fn new(uri: EndpointUri) -> Self {
        Self { uri }
    }
}

impl Endpoint for StaticEndpoint {
    fn uri(&self) -> &EndpointUri {
        &self.uri
    }
}

/// In-memory resolver over a fixed table of endpoints.
#[derive(Default)]
pub struct EndpointTable {
    endpoints: RwLock<HashMap<EndpointUri, Arc<dyn Endpoint>>>,
}

impl EndpointTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint under its own uri, replacing any previous one.
    pub fn register(&self, endpoint: Arc<dyn Endpoint>) {
        let uri = endpoint.uri().clone();
        self.endpoints.write().insert(uri, endpoint);
    }

    /// Register a `StaticEndpoint` for `uri`.
    pub fn register_uri(&self, uri: EndpointUri) {
        self.register(Arc::new(StaticEndpoint::new(uri)));
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Whether no endpoint is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }
}

impl EndpointResolver for EndpointTable {
    fn resolve(&self, uri: &EndpointUri) -> Result<Arc<dyn Endpoint>> {
        self.endpoints
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| ClientError::Resolve {
                uri: uri.clone(),
                reason: "no endpoint registered".to_string(),
            })
    }
}
