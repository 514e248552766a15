//! The subscription client: a bus service that blocks bus startup until the
//! subscription service has delivered its first snapshot.

use crate::config::ClientConfig;
use crate::coordinator::{
    CoordinatorContext, CoordinatorFactory, RefreshListener, SubscriptionCoordinator,
};
use crate::endpoint::{verify_not_same_endpoint, Endpoint, EndpointResolver, ServiceBus};
use crate::error::{ClientError, Result};
use crate::events::{EventFeed, LifecycleEvent};
use crate::gate::ReadinessGate;
use crate::types::{ClientState, EndpointUri};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A service the bus starts on startup and stops on shutdown.
///
/// The bus calls `stop` and `dispose` on every exit path, including when
/// `start` failed.
pub trait BusService: Send + Sync {
    /// Bring the service up against `bus`. May block.
    fn start(&self, bus: &dyn ServiceBus) -> Result<()>;

    /// Shut the service down. Safe to call when it is not running.
    fn stop(&self) -> Result<()>;

    /// Release held resources. Safe to call more than once.
    fn dispose(&self);
}

/// One start cycle's coordinator and the listener registered with it.
struct Cycle {
    coordinator: Box<dyn SubscriptionCoordinator>,
    listener: RefreshListener,
    generation: u64,
}

impl Cycle {
    /// Unregister, stop and dispose. Dispose runs even if stop fails.
    fn teardown(self) -> Result<()> {
        let Cycle {
            mut coordinator,
            listener,
            ..
        } = self;

        listener.revoke();
        coordinator.unsubscribe_refresh();
        let stopped = coordinator.stop();
        coordinator.dispose();
        stopped
    }
}

struct Lifecycle {
    state: ClientState,
    cycle: Option<Cycle>,
}

/// Announces subscriptions through a per-cycle coordinator and gates `start`
/// on the first refresh.
pub struct SubscriptionClient {
    config: RwLock<ClientConfig>,
    /// Released on dispose.
    resolver: Mutex<Option<Arc<dyn EndpointResolver>>>,
    factory: Arc<dyn CoordinatorFactory>,
    gate: Arc<ReadinessGate>,
    lifecycle: Mutex<Lifecycle>,
    disposed: AtomicBool,
    events: EventFeed,
}

impl SubscriptionClient {
    /// Create a client with the default config. The service uri must be set
    /// before `start`.
    pub fn new<F>(resolver: Arc<dyn EndpointResolver>, factory: F) -> Self
    where
        F: CoordinatorFactory + 'static,
    {
        Self {
            config: RwLock::new(ClientConfig::default()),
            resolver: Mutex::new(Some(resolver)),
            factory: Arc::new(factory),
            gate: Arc::new(ReadinessGate::new()),
            lifecycle: Mutex::new(Lifecycle {
                state: ClientState::Created,
                cycle: None,
            }),
            disposed: AtomicBool::new(false),
            events: EventFeed::new(),
        }
    }

    /// Replace the whole config.
    pub fn with_config(self, config: ClientConfig) -> Self {
        *self.config.write() = config;
        self
    }

    // --- Configuration ---

    /// Snapshot of the current config.
    pub fn config(&self) -> ClientConfig {
        self.config.read().clone()
    }

    /// Configured subscription service uri, if any.
    pub fn service_uri(&self) -> Option<EndpointUri> {
        self.config.read().subscription_service_uri.clone()
    }

    /// Applies from the next `start`.
    pub fn set_service_uri(&self, uri: EndpointUri) {
        self.config.write().subscription_service_uri = Some(uri);
    }

    /// Bound on the startup wait.
    pub fn start_timeout(&self) -> Duration {
        self.config.read().start_timeout
    }

    /// Applies from the next `start`.
    pub fn set_start_timeout(&self, timeout: Duration) {
        self.config.write().start_timeout = timeout;
    }

    // --- Introspection ---

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.lifecycle.lock().state
    }

    /// Whether `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Whether the client still holds its endpoint resolver.
    pub fn has_resolver(&self) -> bool {
        self.resolver.lock().is_some()
    }

    /// Lifecycle events for observers.
    pub fn events(&self) -> &EventFeed {
        &self.events
    }

    // --- Start ---

    /// Claim the lifecycle for a new cycle. Returns the resolver to use and
    /// the state to restore if the cycle never gets a coordinator.
    fn claim_start(&self) -> Result<(Arc<dyn EndpointResolver>, ClientState)> {
        let mut lifecycle = self.lifecycle.lock();

        if self.is_disposed() || lifecycle.state == ClientState::Disposed {
            return Err(ClientError::Disposed);
        }
        if lifecycle.state.is_live() {
            return Err(ClientError::InvalidState(lifecycle.state));
        }

        let resolver = self.resolver.lock().clone().ok_or(ClientError::Disposed)?;
        let previous = lifecycle.state;
        lifecycle.state = ClientState::Starting;

        Ok((resolver, previous))
    }

    /// Give up a claimed start, unless stop or dispose already moved the
    /// state on.
    fn release_start(&self, state: ClientState) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state == ClientState::Starting && lifecycle.cycle.is_none() {
            lifecycle.state = state;
        }
    }

    /// Create, subscribe and start a coordinator. Runs without the lifecycle
    /// lock so a slow subscribe exchange does not block stop or dispose.
    fn launch(
        &self,
        bus: &dyn ServiceBus,
        service_endpoint: Arc<dyn Endpoint>,
        resolver: Arc<dyn EndpointResolver>,
    ) -> Result<Cycle> {
        let generation = self.gate.arm();
        let listener = RefreshListener::new(Arc::clone(&self.gate), generation);

        let mut coordinator = self.factory.create(CoordinatorContext {
            control_endpoint: bus.control_endpoint_uri().clone(),
            service_endpoint,
            resolver,
        });
        coordinator.subscribe_refresh(listener.clone());

        if let Err(e) = coordinator.start(bus) {
            warn!(error = %e, "Subscription coordinator failed to start");
            listener.revoke();
            coordinator.unsubscribe_refresh();
            coordinator.dispose();
            return Err(e);
        }

        Ok(Cycle {
            coordinator,
            listener,
            generation,
        })
    }

    /// Resolve, validate and start a fresh coordinator, then install it.
    /// Returns the gate generation armed for this cycle.
    fn begin_cycle(&self, bus: &dyn ServiceBus, service_uri: &EndpointUri) -> Result<u64> {
        let (resolver, previous) = self.claim_start()?;

        debug!(uri = %service_uri, "Getting endpoint for subscription service");
        let service_endpoint = match resolver.resolve(service_uri).and_then(|endpoint| {
            verify_not_same_endpoint(bus.control_endpoint_uri(), endpoint.as_ref())?;
            Ok(endpoint)
        }) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                self.release_start(previous);
                return Err(e);
            }
        };

        let cycle = match self.launch(bus, service_endpoint, resolver) {
            Ok(cycle) => cycle,
            Err(e) => {
                self.release_start(ClientState::Stopped);
                return Err(e);
            }
        };

        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state != ClientState::Starting {
            // Stopped or disposed while the coordinator was starting.
            let state = lifecycle.state;
            if let Err(e) = cycle.teardown() {
                warn!(error = %e, "Failed to stop coordinator after an interrupted start");
            }
            return Err(match state {
                ClientState::Disposed => ClientError::Disposed,
                state => ClientError::InvalidState(state),
            });
        }

        let generation = cycle.generation;
        lifecycle.cycle = Some(cycle);
        self.events.publish(LifecycleEvent::Starting {
            service_uri: service_uri.to_string(),
        });

        Ok(generation)
    }

    fn start_inner(&self, bus: &dyn ServiceBus) -> Result<()> {
        if self.is_disposed() {
            return Err(ClientError::Disposed);
        }

        let config = self.config();
        let service_uri = config.service_uri()?.clone();

        debug!(bus = %bus.endpoint_uri(), "Starting SubscriptionClient");

        let generation = self.begin_cycle(bus, &service_uri)?;

        debug!("Waiting for response from the subscription service");
        let started = Instant::now();
        let received = self.gate.wait(config.start_timeout);
        let elapsed = started.elapsed();

        let mut lifecycle = self.lifecycle.lock();

        let ours = lifecycle.state == ClientState::Starting
            && lifecycle
                .cycle
                .as_ref()
                .is_some_and(|cycle| cycle.generation == generation);
        if !ours {
            // Stopped or disposed from another thread while we waited.
            return Err(match lifecycle.state {
                ClientState::Disposed => ClientError::Disposed,
                state => ClientError::InvalidState(state),
            });
        }

        // Events are published under the lifecycle lock so observers see
        // them in transition order.
        if received {
            lifecycle.state = ClientState::Started;
            self.events.publish(LifecycleEvent::Ready {
                elapsed_ms: elapsed.as_millis() as u64,
            });
            drop(lifecycle);

            info!(
                uri = %service_uri,
                elapsed_ms = elapsed.as_millis() as u64,
                "Subscription service responded"
            );
            return Ok(());
        }

        // Roll back so no coordinator outlives a start the caller saw fail.
        lifecycle.state = ClientState::Stopped;
        if let Some(cycle) = lifecycle.cycle.take() {
            if let Err(e) = cycle.teardown() {
                warn!(error = %e, "Failed to stop coordinator after start timeout");
            }
        }
        self.events.publish(LifecycleEvent::TimedOut {
            timeout_ms: config.start_timeout.as_millis() as u64,
        });
        drop(lifecycle);

        warn!(
            uri = %service_uri,
            timeout_ms = config.start_timeout.as_millis() as u64,
            "Timeout waiting for subscription service to respond"
        );

        Err(ClientError::Timeout(config.start_timeout))
    }

    // --- Stop / Dispose ---

    fn stop_inner(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();

        if !lifecycle.state.is_live() {
            debug!(state = ?lifecycle.state, "Stop ignored, subscription client not running");
            return Ok(());
        }

        lifecycle.state = ClientState::Stopped;
        let result = match lifecycle.cycle.take() {
            Some(cycle) => cycle.teardown(),
            None => Ok(()),
        };
        self.events.publish(LifecycleEvent::Stopped);
        drop(lifecycle);

        debug!("Subscription client stopped");

        result
    }

    fn dispose_inner(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.resolver.lock().take();

        let mut lifecycle = self.lifecycle.lock();
        lifecycle.state = ClientState::Disposed;
        if let Some(cycle) = lifecycle.cycle.take() {
            debug!("Disposing subscription client with a live coordinator");
            if let Err(e) = cycle.teardown() {
                warn!(error = %e, "Failed to stop coordinator during dispose");
            }
        }
        self.events.publish(LifecycleEvent::Disposed);
    }
}

impl BusService for SubscriptionClient {
    /// Start a cycle and block until the first refresh or the start timeout.
    fn start(&self, bus: &dyn ServiceBus) -> Result<()> {
        self.start_inner(bus)
    }

    /// Tear down the current cycle. A no-op if nothing is running.
    fn stop(&self) -> Result<()> {
        self.stop_inner()
    }

    /// Release the resolver and any live coordinator. Later calls do nothing.
    fn dispose(&self) {
        self.dispose_inner()
    }
}

impl Drop for SubscriptionClient {
    fn drop(&mut self) {
        self.dispose_inner();
    }
}
