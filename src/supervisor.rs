use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::actuation::Actuator;
use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::modbus::ModbusTcpClient;
use crate::monitor::{MonitorLoop, MonitorTiming, SnapshotHub, SnapshotReceiver, SubscriberId};
use crate::registry::{AddressSpan, PointRegistry, EMERGENCY_BUTTON, START_BUTTON};
use crate::scenario::Scenario;
use crate::state::{self, StateSnapshot};
use crate::transport::{ProtocolClient, TransportSerializer};

const DEFAULT_ADJUST_STEPS: u32 = 1;

fn default_steps() -> u32 {
    DEFAULT_ADJUST_STEPS
}

/// Operator command as received from the outer request layer.
///
/// Parameter, direction and scenario stay strings here so unknown values
/// surface as the matching `Unknown*` error instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    Start,
    EmergencyStop,
    Reset,
    AdjustParameter {
        parameter: String,
        direction: String,
        #[serde(default = "default_steps")]
        steps: u32,
    },
    Scenario {
        scenario: String,
    },
}

/// One engine bound to one controller session.
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    registry: Arc<PointRegistry>,
    transport: Arc<TransportSerializer>,
    actuator: Actuator,
    monitor: MonitorLoop,
    hub: Arc<SnapshotHub>,
}

impl Supervisor {
    /// Open a Modbus TCP session to `config.host:config.port`.
    pub async fn connect(config: SupervisorConfig, hub: Arc<SnapshotHub>) -> Result<Self> {
        config.validate()?;

        let client = ModbusTcpClient::connect(
            &config.host,
            config.port,
            config.unit_id,
            config.connect_timeout(),
            config.request_timeout(),
        )
        .await?;

        let supervisor = Self::with_client(config, Box::new(client), hub);
        supervisor.probe().await;
        Ok(supervisor)
    }

    /// Build around an already connected client.
    pub fn with_client(
        config: SupervisorConfig,
        client: Box<dyn ProtocolClient>,
        hub: Arc<SnapshotHub>,
    ) -> Self {
        let registry = Arc::new(PointRegistry::new(config.thresholds));
        let transport = Arc::new(TransportSerializer::new(config.endpoint(), client));
        let actuator = Actuator::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
            config.pulse_dwell(),
            config.step_delay(),
        );
        let monitor = MonitorLoop::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
            Arc::clone(&hub),
            MonitorTiming {
                poll_interval: config.poll_interval(),
                error_backoff: config.error_backoff(),
                stop_timeout: config.stop_timeout(),
            },
        );

        Self {
            config,
            registry,
            transport,
            actuator,
            monitor,
            hub,
        }
    }

    // The controller may still be booting; an unanswered probe is not fatal
    async fn probe(&self) {
        match self
            .transport
            .read_discrete(AddressSpan { start: 0, count: 1 })
            .await
        {
            Ok(_) => info!("Controller at {} is responding", self.endpoint()),
            Err(e) => warn!("Controller at {} not responding yet: {}", self.endpoint(), e),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn registry(&self) -> &PointRegistry {
        &self.registry
    }

    pub fn transport(&self) -> &TransportSerializer {
        &self.transport
    }

    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }

    pub fn monitor(&self) -> &MonitorLoop {
        &self.monitor
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn start_monitoring(&self) -> bool {
        self.monitor.start().await
    }

    pub async fn stop_monitoring(&self) {
        self.monitor.stop().await;
    }

    /// On-demand read, independent of the monitor loop.
    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        if !self.is_connected() {
            return Err(SupervisorError::NotConnected);
        }
        Ok(state::read_state(&self.transport, &self.registry).await)
    }

    pub fn last_snapshot(&self) -> Option<Arc<StateSnapshot>> {
        self.hub.last()
    }

    pub fn subscribe(&self) -> (SubscriberId, SnapshotReceiver) {
        self.hub.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.hub.unsubscribe(id)
    }

    pub async fn write_discrete(&self, name: &str, value: bool) -> Result<()> {
        self.actuator.write_discrete(name, value).await
    }

    pub async fn pulse(&self, name: &str) -> Result<()> {
        self.actuator.pulse(name, self.actuator.pulse_dwell()).await
    }

    pub async fn adjust_parameter(&self, parameter: &str, direction: &str, steps: u32) -> Result<()> {
        self.actuator.adjust_parameter(parameter, direction, steps).await
    }

    pub async fn run_scenario(&self, name: &str) -> Result<()> {
        let scenario: Scenario = name.parse()?;
        scenario.run(&self.actuator).await
    }

    pub async fn control(&self, action: &ControlAction) -> Result<()> {
        info!("Control action: {:?}", action);
        let result = match action {
            ControlAction::Start => self.pulse(START_BUTTON).await,
            ControlAction::EmergencyStop => self.write_discrete(EMERGENCY_BUTTON, true).await,
            ControlAction::Reset => self.write_discrete(EMERGENCY_BUTTON, false).await,
            ControlAction::AdjustParameter {
                parameter,
                direction,
                steps,
            } => self.adjust_parameter(parameter, direction, *steps).await,
            ControlAction::Scenario { scenario } => self.run_scenario(scenario).await,
        };

        if let Err(e) = &result {
            error!("Control action {:?} failed: {}", action, e);
        }
        result
    }

    /// Stop monitoring after its current cycle, then close the session.
    pub async fn disconnect(&self) {
        self.monitor.stop_after_cycle().await;
        self.transport.close().await;
        info!("Disconnected from {}", self.endpoint());
    }
}

/// Surface handed to the outer request layer.
///
/// Holds at most one [`Supervisor`]. Reconnecting shuts the old instance
/// down and installs a fresh one; subscriptions live on a hub that outlasts
/// both.
#[derive(Debug)]
pub struct SupervisorHandle {
    config: SupervisorConfig,
    hub: Arc<SnapshotHub>,
    current: RwLock<Option<Arc<Supervisor>>>,
}

impl SupervisorHandle {
    pub fn new(config: SupervisorConfig) -> Self {
        let hub = Arc::new(SnapshotHub::new(config.subscriber_buffer));
        Self {
            config,
            hub,
            current: RwLock::new(None),
        }
    }

    pub async fn connect(&self, host: &str, port: u16) -> Result<()> {
        let mut current = self.current.write().await;
        if let Some(previous) = current.take() {
            previous.disconnect().await;
        }

        let config = SupervisorConfig {
            host: host.to_string(),
            port,
            ..self.config.clone()
        };
        let supervisor = Supervisor::connect(config, Arc::clone(&self.hub)).await?;
        supervisor.start_monitoring().await;
        *current = Some(Arc::new(supervisor));
        Ok(())
    }

    /// Same as [`connect`](Self::connect) over a caller-supplied client.
    pub async fn connect_with_client(&self, client: Box<dyn ProtocolClient>) -> Arc<Supervisor> {
        let mut current = self.current.write().await;
        if let Some(previous) = current.take() {
            previous.disconnect().await;
        }

        let supervisor = Arc::new(Supervisor::with_client(
            self.config.clone(),
            client,
            Arc::clone(&self.hub),
        ));
        supervisor.start_monitoring().await;
        *current = Some(Arc::clone(&supervisor));
        supervisor
    }

    pub async fn disconnect(&self) {
        let previous = self.current.write().await.take();
        if let Some(previous) = previous {
            previous.disconnect().await;
        }
    }

    pub async fn current(&self) -> Result<Arc<Supervisor>> {
        self.current
            .read()
            .await
            .clone()
            .ok_or(SupervisorError::NotConnected)
    }

    pub async fn is_connected(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.is_connected())
    }

    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        self.current().await?.snapshot().await
    }

    pub async fn control(&self, action: ControlAction) -> Result<()> {
        self.current().await?.control(&action).await
    }

    pub fn subscribe(&self) -> (SubscriberId, SnapshotReceiver) {
        self.hub.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.hub.unsubscribe(id)
    }

    pub fn last_snapshot(&self) -> Option<Arc<StateSnapshot>> {
        self.hub.last()
    }
}
