//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use subscription_client::{
    ClientConfig, ClientError, CoordinatorContext, EndpointTable, EndpointUri, RefreshListener,
    Result, ServiceBus, SubscriptionClient, SubscriptionCoordinator,
};

pub const SERVICE_URI: &str = "queue://broker/subscriptions";

/// Route client logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn uri(s: &str) -> EndpointUri {
    EndpointUri::parse(s).unwrap()
}

pub struct TestBus {
    pub endpoint: EndpointUri,
    pub control: EndpointUri,
}

impl TestBus {
    pub fn new() -> Self {
        Self::with_control("queue://localhost/app_control")
    }

    pub fn with_control(control: &str) -> Self {
        Self {
            endpoint: uri("queue://localhost/app"),
            control: uri(control),
        }
    }
}

impl ServiceBus for TestBus {
    fn endpoint_uri(&self) -> &EndpointUri {
        &self.endpoint
    }

    fn control_endpoint_uri(&self) -> &EndpointUri {
        &self.control
    }
}

/// How a scripted coordinator reacts to `start`.
#[derive(Clone, Copy, Debug)]
pub enum Refresh {
    /// Notify from a background thread after the delay.
    After(Duration),
    /// Notify synchronously inside `start`.
    DuringStart,
    /// Notify twice from a background thread.
    Twice(Duration),
    /// Block inside `start` for the delay, then notify.
    SlowStart(Duration),
    /// Never notify.
    Never,
    /// `start` returns an error.
    FailStart,
}

/// Everything the coordinators built by one factory did.
#[derive(Clone, Default)]
pub struct Recorder {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub listeners: Arc<Mutex<Vec<RefreshListener>>>,
    pub contexts: Arc<Mutex<Vec<CoordinatorContext>>>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn created(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Listener registered with the `n`th coordinator.
    pub fn listener(&self, n: usize) -> RefreshListener {
        self.listeners.lock()[n].clone()
    }
}

pub struct ScriptedCoordinator {
    script: Refresh,
    listener: Option<RefreshListener>,
    recorder: Recorder,
}

impl ScriptedCoordinator {
    fn log(&self, call: &str) {
        self.recorder.calls.lock().push(call.to_string());
    }
}

impl SubscriptionCoordinator for ScriptedCoordinator {
    fn subscribe_refresh(&mut self, listener: RefreshListener) {
        self.log("subscribe_refresh");
        self.recorder.listeners.lock().push(listener.clone());
        self.listener = Some(listener);
    }

    fn unsubscribe_refresh(&mut self) {
        self.log("unsubscribe_refresh");
        self.listener = None;
    }

    fn start(&mut self, _bus: &dyn ServiceBus) -> Result<()> {
        self.log("start");
        let listener = self.listener.clone();

        match self.script {
            Refresh::After(delay) => {
                if let Some(listener) = listener {
                    thread::spawn(move || {
                        thread::sleep(delay);
                        listener.notify();
                    });
                }
            }
            Refresh::Twice(delay) => {
                if let Some(listener) = listener {
                    thread::spawn(move || {
                        thread::sleep(delay);
                        listener.notify();
                        listener.notify();
                    });
                }
            }
            Refresh::DuringStart => {
                if let Some(listener) = listener {
                    listener.notify();
                }
            }
            Refresh::SlowStart(delay) => {
                thread::sleep(delay);
                if let Some(listener) = listener {
                    listener.notify();
                }
            }
            Refresh::Never => {}
            Refresh::FailStart => {
                return Err(ClientError::Coordinator("service unreachable".to_string()));
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log("stop");
        Ok(())
    }

    fn dispose(&mut self) {
        self.log("dispose");
    }
}

/// A client whose coordinators follow `script`, with the service endpoint
/// registered and the given start timeout.
pub fn scripted_client(script: Refresh, timeout: Duration) -> (SubscriptionClient, Recorder) {
    let recorder = Recorder::default();
    let table = Arc::new(EndpointTable::new());
    table.register_uri(uri(SERVICE_URI));

    let factory_recorder = recorder.clone();
    let factory = move |ctx: CoordinatorContext| -> Box<dyn SubscriptionCoordinator> {
        factory_recorder.contexts.lock().push(ctx);
        Box::new(ScriptedCoordinator {
            script,
            listener: None,
            recorder: factory_recorder.clone(),
        })
    };

    let client = SubscriptionClient::new(table, factory).with_config(
        ClientConfig::new(uri(SERVICE_URI)).with_start_timeout(timeout),
    );

    (client, recorder)
}
