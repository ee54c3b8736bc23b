use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::alerts::{self, AlertList};
use crate::error::TransportError;
use crate::registry::PointRegistry;
use crate::transport::TransportSerializer;

/// One consistent read of every monitored point plus derived alerts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub timestamp: DateTime<Utc>,
    pub connected: bool,
    pub coils: BTreeMap<&'static str, bool>,
    pub registers: BTreeMap<&'static str, u16>,
    pub alerts: AlertList,
    pub system_fault: bool,
}

impl StateSnapshot {
    /// Snapshot of a controller that could not be observed.
    pub fn disconnected() -> Self {
        Self {
            timestamp: Utc::now(),
            connected: false,
            coils: BTreeMap::new(),
            registers: BTreeMap::new(),
            alerts: AlertList::new(),
            system_fault: false,
        }
    }

    pub fn coil(&self, name: &str) -> Option<bool> {
        self.coils.get(name).copied()
    }

    pub fn register(&self, name: &str) -> Option<u16> {
        self.registers.get(name).copied()
    }
}

/// Read the full coil and register ranges (two exchanges) and evaluate alerts.
///
/// A failed exchange yields [`StateSnapshot::disconnected`]; the error is
/// logged, not returned.
pub async fn read_state(transport: &TransportSerializer, registry: &PointRegistry) -> StateSnapshot {
    match try_read_state(transport, registry).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("State read from {} failed: {}", transport.endpoint(), e);
            StateSnapshot::disconnected()
        }
    }
}

/// Same as [`read_state`] but hands the transport error to the caller.
pub async fn try_read_state(
    transport: &TransportSerializer,
    registry: &PointRegistry,
) -> Result<StateSnapshot, TransportError> {
    let bits = transport.read_discrete(registry.discrete_span()).await?;
    let words = transport.read_analog(registry.analog_span()).await?;
    Ok(project(registry, &bits, &words))
}

/// Map raw range reads back onto point names. Points past the end of a short
/// response are left out.
pub fn project(registry: &PointRegistry, bits: &[bool], words: &[u16]) -> StateSnapshot {
    let discrete_start = registry.discrete_span().start;
    let analog_start = registry.analog_span().start;

    let coils: BTreeMap<&'static str, bool> = registry
        .discrete_points()
        .filter_map(|(name, addr)| {
            bits.get(usize::from(addr - discrete_start))
                .map(|value| (name, *value))
        })
        .collect();

    let registers: BTreeMap<&'static str, u16> = registry
        .analog_points()
        .filter_map(|(name, addr)| {
            words
                .get(usize::from(addr - analog_start))
                .map(|value| (name, *value))
        })
        .collect();

    let report = alerts::evaluate(&registers, registry.thresholds());

    StateSnapshot {
        timestamp: Utc::now(),
        connected: true,
        coils,
        registers,
        alerts: report.alerts,
        system_fault: report.fault,
    }
}
