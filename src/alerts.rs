use heapless::Vec;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use std::collections::BTreeMap;

use crate::registry::{Thresholds, FLOW_VALUE, PRESSURE_VALUE, TURBIDITY_VALUE, WATER_LEVEL};

pub const MAX_ALERTS: usize = 4;

// Nominal readings used when a register is missing from a partial read
const NOMINAL_PRESSURE: u16 = 50;
const NOMINAL_FLOW: u16 = 25;
const NOMINAL_TURBIDITY: u16 = 5;
const NOMINAL_LEVEL: u16 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alert {
    #[serde(rename = "Pressure Alert")]
    Pressure,
    #[serde(rename = "Flow Alert")]
    Flow,
    #[serde(rename = "Turbidity Alert")]
    Turbidity,
    #[serde(rename = "Low Level Alert")]
    LowLevel,
}

impl Alert {
    /// Evaluation order.
    pub const ALL: [Alert; 4] = [Alert::Pressure, Alert::Flow, Alert::Turbidity, Alert::LowLevel];

    pub fn name(self) -> &'static str {
        match self {
            Alert::Pressure => "Pressure Alert",
            Alert::Flow => "Flow Alert",
            Alert::Turbidity => "Turbidity Alert",
            Alert::LowLevel => "Low Level Alert",
        }
    }
}

const_assert!(Alert::ALL.len() <= MAX_ALERTS);

impl core::fmt::Display for Alert {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

pub type AlertList = Vec<Alert, MAX_ALERTS>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AlertReport {
    pub alerts: AlertList,
    pub fault: bool,
}

impl AlertReport {
    pub fn is_clear(&self) -> bool {
        self.alerts.is_empty()
    }
}

/// Evaluate analog readings against the thresholds.
///
/// Each rule is checked independently in [`Alert::ALL`] order, so several
/// alerts may be active together. A missing register reads as its nominal
/// value, which is then checked like any other reading.
pub fn evaluate(analog: &BTreeMap<&'static str, u16>, thresholds: &Thresholds) -> AlertReport {
    let reading = |name: &str, nominal: u16| analog.get(name).copied().unwrap_or(nominal);

    let pressure = reading(PRESSURE_VALUE, NOMINAL_PRESSURE);
    let flow = reading(FLOW_VALUE, NOMINAL_FLOW);
    let turbidity = reading(TURBIDITY_VALUE, NOMINAL_TURBIDITY);
    let level = reading(WATER_LEVEL, NOMINAL_LEVEL);

    let mut alerts = AlertList::new();
    for alert in Alert::ALL {
        let triggered = match alert {
            Alert::Pressure => {
                pressure < thresholds.pressure_low || pressure > thresholds.pressure_high
            }
            Alert::Flow => flow < thresholds.flow_low,
            Alert::Turbidity => turbidity > thresholds.turbidity_high,
            Alert::LowLevel => level < thresholds.level_low,
        };
        if triggered {
            // Capacity equals the rule count
            let _ = alerts.push(alert);
        }
    }

    let fault = !alerts.is_empty();
    AlertReport { alerts, fault }
}
