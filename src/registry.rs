use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::collections::BTreeMap;

use crate::error::{Result, SupervisorError};

pub const DISCRETE_POINT_COUNT: usize = 21;
pub const ANALOG_POINT_COUNT: usize = 4;

// Phase 1 direct I/O coils, phase 2 simulation control coils (%QX2.0 onward)
const DEFAULT_DISCRETE_POINTS: [(&str, u16); DISCRETE_POINT_COUNT] = [
    ("pump", 0),
    ("filter", 1),
    ("uv_reactor", 2),
    ("start_button", 3),
    ("emergency_button", 4),
    ("low_level_sensor", 5),
    ("green_light", 6),
    ("orange_light", 7),
    ("red_light", 8),
    ("fault_light", 9),
    ("pt_alert", 10),
    ("ft_alert", 11),
    ("turbidity_alert", 12),
    ("pt_inc_sim", 16),
    ("pt_dec_sim", 17),
    ("ft_inc_sim", 18),
    ("ft_dec_sim", 19),
    ("turb_inc_sim", 20),
    ("turb_dec_sim", 21),
    ("level_inc_sim", 22),
    ("level_dec_sim", 23),
];

// Memory words %MW0..%MW3
const DEFAULT_ANALOG_POINTS: [(&str, u16); ANALOG_POINT_COUNT] = [
    ("pressure_value", 0),
    ("flow_value", 1),
    ("turbidity_value", 2),
    ("water_level", 3),
];

pub const START_BUTTON: &str = "start_button";
pub const EMERGENCY_BUTTON: &str = "emergency_button";

pub const PRESSURE_VALUE: &str = "pressure_value";
pub const FLOW_VALUE: &str = "flow_value";
pub const TURBIDITY_VALUE: &str = "turbidity_value";
pub const WATER_LEVEL: &str = "water_level";

const DEFAULT_PRESSURE_LOW: u16 = 20;
const DEFAULT_PRESSURE_HIGH: u16 = 80;
const DEFAULT_FLOW_LOW: u16 = 10;
const DEFAULT_TURBIDITY_HIGH: u16 = 15;
const DEFAULT_LEVEL_LOW: u16 = 20;

// Protocol addresses are u16, keep the tables well inside a single read
const_assert!(DISCRETE_POINT_COUNT <= 2000);
const_assert!(ANALOG_POINT_COUNT <= 125);

/// Alert bounds applied to the analog points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub pressure_low: u16,
    pub pressure_high: u16,
    pub flow_low: u16,
    pub turbidity_high: u16,
    pub level_low: u16,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pressure_low: DEFAULT_PRESSURE_LOW,
            pressure_high: DEFAULT_PRESSURE_HIGH,
            flow_low: DEFAULT_FLOW_LOW,
            turbidity_high: DEFAULT_TURBIDITY_HIGH,
            level_low: DEFAULT_LEVEL_LOW,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        if self.pressure_low > self.pressure_high {
            return Err(SupervisorError::Config(format!(
                "pressure_low {} above pressure_high {}",
                self.pressure_low, self.pressure_high
            )));
        }
        Ok(())
    }
}

/// Contiguous address window covering every point of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpan {
    pub start: u16,
    pub count: u16,
}

/// Immutable name/address tables for one controller program.
///
/// Built once at startup and shared behind an `Arc`; there is no API to
/// mutate a registry after construction.
#[derive(Debug, Clone)]
pub struct PointRegistry {
    discrete: BTreeMap<&'static str, u16>,
    analog: BTreeMap<&'static str, u16>,
    thresholds: Thresholds,
}

impl PointRegistry {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            discrete: DEFAULT_DISCRETE_POINTS.iter().copied().collect(),
            analog: DEFAULT_ANALOG_POINTS.iter().copied().collect(),
            thresholds,
        }
    }

    pub fn discrete_address(&self, name: &str) -> Option<u16> {
        self.discrete.get(name).copied()
    }

    pub fn analog_address(&self, name: &str) -> Option<u16> {
        self.analog.get(name).copied()
    }

    /// Resolve a discrete point, rejecting unknown names before any I/O.
    pub fn resolve_discrete(&self, name: &str) -> Result<u16> {
        self.discrete_address(name)
            .ok_or_else(|| SupervisorError::UnknownPoint(name.to_string()))
    }

    pub fn discrete_points(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        self.discrete.iter().map(|(name, addr)| (*name, *addr))
    }

    pub fn analog_points(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        self.analog.iter().map(|(name, addr)| (*name, *addr))
    }

    pub fn discrete_span(&self) -> AddressSpan {
        span_of(self.discrete.values().copied())
    }

    pub fn analog_span(&self) -> AddressSpan {
        span_of(self.analog.values().copied())
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }
}

impl Default for PointRegistry {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

// Reads always start at address 0 so response indices equal addresses
fn span_of(addresses: impl Iterator<Item = u16>) -> AddressSpan {
    let count = addresses.max().map_or(0, |max| max + 1);
    AddressSpan { start: 0, count }
}
