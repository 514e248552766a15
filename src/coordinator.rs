//! The coordinator seam: how the client creates, wires and tears down the
//! component that speaks the subscription protocol.

use crate::endpoint::{Endpoint, EndpointResolver, ServiceBus};
use crate::error::Result;
use crate::gate::ReadinessGate;
use crate::types::EndpointUri;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback handed to a coordinator; call `notify` when a subscription
/// snapshot has been received.
///
/// Clones share registration: once the client revokes the listener every
/// clone becomes a no-op. A listener is also bound to the start cycle it was
/// created for, so a notification that races past revocation still cannot
/// release a later cycle's wait.
#[derive(Clone)]
pub struct RefreshListener {
    gate: Arc<ReadinessGate>,
    generation: u64,
    active: Arc<AtomicBool>,
}

impl RefreshListener {
    pub(crate) fn new(gate: Arc<ReadinessGate>, generation: u64) -> Self {
        Self {
            gate,
            generation,
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Report a refresh. Returns whether the client observed it.
    pub fn notify(&self) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        self.gate.signal_generation(self.generation)
    }

    /// False once the client has unregistered this listener.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn revoke(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl fmt::Debug for RefreshListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshListener")
            .field("generation", &self.generation)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Performs the subscribe/unsubscribe exchange with the subscription service.
///
/// A coordinator lives for a single start cycle. It may invoke its refresh
/// listener from any thread, including from inside `start`.
pub trait SubscriptionCoordinator: Send {
    /// Register the listener to call on every refresh. Replaces any previous one.
    fn subscribe_refresh(&mut self, listener: RefreshListener);

    /// Drop the registered listener.
    fn unsubscribe_refresh(&mut self);

    /// Announce subscriptions to the service. May be slow.
    fn start(&mut self, bus: &dyn ServiceBus) -> Result<()>;

    /// Withdraw subscriptions and stop processing.
    fn stop(&mut self) -> Result<()>;

    /// Release everything the coordinator holds. Called exactly once, last.
    fn dispose(&mut self);
}

/// What a coordinator is built from.
#[derive(Clone)]
pub struct CoordinatorContext {
    /// Control plane of the bus being started.
    pub control_endpoint: EndpointUri,
    /// The resolved subscription service.
    pub service_endpoint: Arc<dyn Endpoint>,
    /// For resolving endpoints named in snapshots.
    pub resolver: Arc<dyn EndpointResolver>,
}

impl fmt::Debug for CoordinatorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorContext")
            .field("control_endpoint", &self.control_endpoint)
            .field("service_endpoint", self.service_endpoint.uri())
            .finish()
    }
}

/// Creates one coordinator per start cycle.
pub trait CoordinatorFactory: Send + Sync {
    /// Build the coordinator for one start cycle.
    fn create(&self, context: CoordinatorContext) -> Box<dyn SubscriptionCoordinator>;
}

impl<F> CoordinatorFactory for F
where
    F: Fn(CoordinatorContext) -> Box<dyn SubscriptionCoordinator> + Send + Sync,
{
    fn create(&self, context: CoordinatorContext) -> Box<dyn SubscriptionCoordinator> {
        self(context)
    }
}
