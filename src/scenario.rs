use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::actuation::{Actuator, PulseTally};
use crate::error::{Result, SupervisorError};
use crate::registry::{EMERGENCY_BUTTON, START_BUTTON};

const STARTUP_SETTLE_MS: u64 = 500;
const SINGLE_FAULT_INTERVAL_MS: u64 = 100;
const MULTI_FAULT_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioStep {
    Write { point: &'static str, value: bool },
    Wait(Duration),
    Pulses {
        point: &'static str,
        count: u32,
        interval: Duration,
    },
}

/// Built-in open-loop scenarios.
///
/// None of them read state back; confirming the target condition is up to
/// whoever polls the snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    NormalStartup,
    LowPressure,
    HighTurbidity,
    MultipleFaults,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::NormalStartup,
        Scenario::LowPressure,
        Scenario::HighTurbidity,
        Scenario::MultipleFaults,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::NormalStartup => "normal_startup",
            Scenario::LowPressure => "low_pressure",
            Scenario::HighTurbidity => "high_turbidity",
            Scenario::MultipleFaults => "multiple_faults",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::NormalStartup => "Release emergency stop and press start",
            Scenario::LowPressure => "Drive pressure below its low threshold",
            Scenario::HighTurbidity => "Drive turbidity above its high threshold",
            Scenario::MultipleFaults => "Low pressure, low flow and high turbidity together",
        }
    }

    pub fn steps(self) -> Vec<ScenarioStep> {
        let pulses = |point: &'static str, count: u32, interval_ms: u64| ScenarioStep::Pulses {
            point,
            count,
            interval: Duration::from_millis(interval_ms),
        };

        match self {
            Scenario::NormalStartup => vec![
                ScenarioStep::Write {
                    point: EMERGENCY_BUTTON,
                    value: false,
                },
                ScenarioStep::Wait(Duration::from_millis(STARTUP_SETTLE_MS)),
                pulses(START_BUTTON, 1, 0),
            ],
            // ~50 down to ~10
            Scenario::LowPressure => vec![pulses("pt_dec_sim", 8, SINGLE_FAULT_INTERVAL_MS)],
            Scenario::HighTurbidity => vec![pulses("turb_inc_sim", 8, SINGLE_FAULT_INTERVAL_MS)],
            Scenario::MultipleFaults => vec![
                pulses("pt_dec_sim", 8, MULTI_FAULT_INTERVAL_MS),
                pulses("ft_dec_sim", 6, MULTI_FAULT_INTERVAL_MS),
                pulses("turb_inc_sim", 10, MULTI_FAULT_INTERVAL_MS),
            ],
        }
    }

    /// Run every step in order. A failed step does not stop the rest; the
    /// result is an error if any write or pulse failed.
    pub async fn run(self, actuator: &Actuator) -> Result<()> {
        info!("Running scenario {}", self.name());

        let mut tally = PulseTally::default();
        for step in self.steps() {
            match step {
                ScenarioStep::Write { point, value } => {
                    tally.attempted += 1;
                    if let Err(e) = actuator.write_discrete(point, value).await {
                        warn!("Scenario {}: write {} failed: {}", self.name(), point, e);
                        tally.failed += 1;
                    }
                }
                ScenarioStep::Wait(delay) => tokio::time::sleep(delay).await,
                ScenarioStep::Pulses {
                    point,
                    count,
                    interval,
                } => {
                    tally.merge(actuator.pulse_train(point, count, interval).await?);
                }
            }
        }

        info!(
            "Scenario {} finished: {}/{} actions failed",
            self.name(),
            tally.failed,
            tally.attempted
        );
        tally.into_result(&format!("scenario {}", self.name()))
    }
}

impl FromStr for Scenario {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| SupervisorError::UnknownScenario(s.to_string()))
    }
}

impl core::fmt::Display for Scenario {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
