use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{Result, SupervisorError};
use crate::registry::PointRegistry;
use crate::transport::TransportSerializer;

/// Analog parameter driven through its pair of simulation coils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Pressure,
    Flow,
    Turbidity,
    Level,
}

impl Parameter {
    /// (increment point, decrement point)
    pub fn points(self) -> (&'static str, &'static str) {
        match self {
            Parameter::Pressure => ("pt_inc_sim", "pt_dec_sim"),
            Parameter::Flow => ("ft_inc_sim", "ft_dec_sim"),
            Parameter::Turbidity => ("turb_inc_sim", "turb_dec_sim"),
            Parameter::Level => ("level_inc_sim", "level_dec_sim"),
        }
    }

    pub fn point(self, direction: Direction) -> &'static str {
        let (inc, dec) = self.points();
        match direction {
            Direction::Up => inc,
            Direction::Down => dec,
        }
    }
}

impl FromStr for Parameter {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pressure" => Ok(Parameter::Pressure),
            "flow" => Ok(Parameter::Flow),
            "turbidity" => Ok(Parameter::Turbidity),
            "level" => Ok(Parameter::Level),
            other => Err(SupervisorError::UnknownParameter(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(SupervisorError::UnknownDirection(other.to_string())),
        }
    }
}

/// Outcome of a best-effort pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseTally {
    pub attempted: usize,
    pub failed: usize,
}

impl PulseTally {
    pub fn merge(&mut self, other: PulseTally) {
        self.attempted += other.attempted;
        self.failed += other.failed;
    }

    pub fn into_result(self, operation: &str) -> Result<()> {
        if self.failed == 0 {
            Ok(())
        } else {
            Err(SupervisorError::Incomplete {
                operation: operation.to_string(),
                failed: self.failed,
                attempted: self.attempted,
            })
        }
    }
}

/// Writes and pulses routed through the shared transport.
///
/// Only the writes hold the transport; dwell and inter-pulse delays are
/// plain sleeps so a monitor cycle can read in between.
#[derive(Debug, Clone)]
pub struct Actuator {
    transport: Arc<TransportSerializer>,
    registry: Arc<PointRegistry>,
    pulse_dwell: Duration,
    step_delay: Duration,
}

impl Actuator {
    pub fn new(
        transport: Arc<TransportSerializer>,
        registry: Arc<PointRegistry>,
        pulse_dwell: Duration,
        step_delay: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            pulse_dwell,
            step_delay,
        }
    }

    pub fn pulse_dwell(&self) -> Duration {
        self.pulse_dwell
    }

    pub async fn write_discrete(&self, name: &str, value: bool) -> Result<()> {
        let address = self.registry.resolve_discrete(name)?;
        self.transport.write_discrete(address, value).await?;
        debug!("{} = {}", name, value);
        Ok(())
    }

    /// Set the point, hold it for `dwell`, then clear it.
    ///
    /// A failed clear leaves the point asserted and is reported as
    /// [`SupervisorError::StuckActuator`]; nothing retries it.
    pub async fn pulse(&self, name: &str, dwell: Duration) -> Result<()> {
        let address = self.registry.resolve_discrete(name)?;

        self.transport.write_discrete(address, true).await?;
        sleep(dwell).await;

        if let Err(source) = self.transport.write_discrete(address, false).await {
            error!("{} left asserted, clear failed: {}", name, source);
            return Err(SupervisorError::StuckActuator {
                point: name.to_string(),
                source,
            });
        }
        Ok(())
    }

    /// Pulse `name` `count` times, sleeping `interval` after each pulse.
    /// Failures are logged and counted, never short-circuit the train.
    pub async fn pulse_train(&self, name: &str, count: u32, interval: Duration) -> Result<PulseTally> {
        self.registry.resolve_discrete(name)?;

        let mut tally = PulseTally::default();
        for n in 0..count {
            tally.attempted += 1;
            if let Err(e) = self.pulse(name, self.pulse_dwell).await {
                warn!("Pulse {}/{} of {} failed: {}", n + 1, count, name, e);
                tally.failed += 1;
            }
            sleep(interval).await;
        }
        Ok(tally)
    }

    pub async fn adjust_parameter(&self, parameter: &str, direction: &str, steps: u32) -> Result<()> {
        let parameter: Parameter = parameter.parse()?;
        let direction: Direction = direction.parse()?;
        let point = parameter.point(direction);

        let tally = self.pulse_train(point, steps, self.step_delay).await?;
        tally.into_result(&format!("adjust {parameter:?} {direction:?}").to_lowercase())
    }
}
