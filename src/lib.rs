//! # Subscription Client
//!
//! A bus service that announces a consumer's subscriptions to a remote
//! subscription service and holds up bus startup until that service has
//! delivered its first snapshot.
//!
//! ## Core Concepts
//!
//! - **Coordinator**: speaks the subscription protocol; one per start cycle
//! - **Readiness gate**: bounded wait released by the coordinator's refresh
//! - **Lifecycle**: start → wait → stop → dispose, with guarded misuse
//! - **Endpoint check**: the control bus must not share the service's endpoint
//!
//! ## Example
//!
//! ```ignore
//! use subscription_client::{BusService, ClientConfig, EndpointUri, SubscriptionClient};
//!
//! let client = SubscriptionClient::new(resolver, |ctx| make_coordinator(ctx))
//!     .with_config(ClientConfig::new(EndpointUri::parse("queue://broker/subscriptions")?));
//!
//! // Blocks until the first refresh or the start timeout (60s by default)
//! client.start(&bus)?;
//!
//! client.stop()?;
//! client.dispose();
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod gate;
pub mod types;

// Re-exports
pub use client::{BusService, SubscriptionClient};
pub use config::{ClientConfig, DEFAULT_START_TIMEOUT};
pub use coordinator::{
    CoordinatorContext, CoordinatorFactory, RefreshListener, SubscriptionCoordinator,
};
pub use endpoint::{
    verify_not_same_endpoint, Endpoint, EndpointResolver, EndpointTable, ServiceBus,
    StaticEndpoint,
};
pub use error::{ClientError, Result};
pub use events::{EventFeed, EventHandle, LifecycleEvent, ObserverId};
pub use gate::ReadinessGate;
pub use types::{ClientState, EndpointUri};
