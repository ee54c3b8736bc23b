#![allow(dead_code)]

use aquavisor::error::TransportError;
use aquavisor::monitor::SnapshotHub;
use aquavisor::{ProtocolClient, Supervisor, SupervisorConfig};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COIL_COUNT: usize = 24;
pub const STEP: u16 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    ReadCoils { start: u16, count: u16 },
    ReadRegisters { start: u16, count: u16 },
    WriteCoil { address: u16, value: bool },
}

/// Simulated water treatment PLC.
///
/// Rising edges on the simulation coils (16..=23) move the matching
/// register by `STEP`. Every exchange takes `exchange_delay` and is checked
/// for overlap with any other exchange.
#[derive(Debug)]
pub struct MockPlc {
    pub coils: Mutex<Vec<bool>>,
    pub registers: Mutex<Vec<u16>>,
    pub log: Mutex<Vec<Exchange>>,
    pub fail_reads: AtomicBool,
    pub failing_writes: Mutex<HashSet<(u16, bool)>>,
    pub closed: AtomicBool,
    pub overlaps: AtomicUsize,
    in_flight: AtomicBool,
    exchange_delay: Duration,
}

impl MockPlc {
    fn new(exchange_delay: Duration) -> Self {
        Self {
            coils: Mutex::new(vec![false; COIL_COUNT]),
            registers: Mutex::new(vec![50, 25, 5, 75]),
            log: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            failing_writes: Mutex::new(HashSet::new()),
            closed: AtomicBool::new(false),
            overlaps: AtomicUsize::new(0),
            in_flight: AtomicBool::new(false),
            exchange_delay,
        }
    }

    async fn exchange<T>(
        &self,
        exchange: Exchange,
        apply: impl FnOnce(&Self) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        self.log.lock().unwrap().push(exchange);

        tokio::time::sleep(self.exchange_delay).await;
        let result = apply(self);

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn apply_write(&self, address: u16, value: bool) -> Result<(), TransportError> {
        if self.failing_writes.lock().unwrap().contains(&(address, value)) {
            return Err(TransportError::Io("connection reset".to_string()));
        }

        let mut coils = self.coils.lock().unwrap();
        let index = usize::from(address);
        let rising = value && !coils[index];
        coils[index] = value;

        if rising && (16..=23).contains(&address) {
            let register = usize::from((address - 16) / 2);
            let mut registers = self.registers.lock().unwrap();
            registers[register] = if address % 2 == 0 {
                registers[register].saturating_add(STEP)
            } else {
                registers[register].saturating_sub(STEP)
            };
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockClient {
    pub plc: Arc<MockPlc>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(1))
    }

    pub fn with_delay(exchange_delay: Duration) -> Self {
        Self {
            plc: Arc::new(MockPlc::new(exchange_delay)),
        }
    }

    pub fn boxed(&self) -> Box<dyn ProtocolClient> {
        Box::new(self.clone())
    }

    pub fn log(&self) -> Vec<Exchange> {
        self.plc.log.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<(u16, bool)> {
        self.log()
            .into_iter()
            .filter_map(|e| match e {
                Exchange::WriteCoil { address, value } => Some((address, value)),
                _ => None,
            })
            .collect()
    }

    pub fn writes_to(&self, address: u16) -> Vec<bool> {
        self.writes()
            .into_iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn coil(&self, address: u16) -> bool {
        self.plc.coils.lock().unwrap()[usize::from(address)]
    }

    pub fn register(&self, index: usize) -> u16 {
        self.plc.registers.lock().unwrap()[index]
    }

    pub fn set_register(&self, index: usize, value: u16) {
        self.plc.registers.lock().unwrap()[index] = value;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.plc.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_write(&self, address: u16, value: bool) {
        self.plc.failing_writes.lock().unwrap().insert((address, value));
    }

    pub fn overlaps(&self) -> usize {
        self.plc.overlaps.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.plc.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolClient for MockClient {
    async fn read_discrete_range(
        &mut self,
        start: u16,
        count: u16,
    ) -> Result<Vec<bool>, TransportError> {
        self.plc
            .exchange(Exchange::ReadCoils { start, count }, |plc| {
                if plc.fail_reads.load(Ordering::SeqCst) {
                    return Err(TransportError::Timeout(1000));
                }
                let coils = plc.coils.lock().unwrap();
                let end = (usize::from(start) + usize::from(count)).min(coils.len());
                Ok(coils[usize::from(start)..end].to_vec())
            })
            .await
    }

    async fn read_analog_range(
        &mut self,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        self.plc
            .exchange(Exchange::ReadRegisters { start, count }, |plc| {
                if plc.fail_reads.load(Ordering::SeqCst) {
                    return Err(TransportError::Timeout(1000));
                }
                let registers = plc.registers.lock().unwrap();
                let end = (usize::from(start) + usize::from(count)).min(registers.len());
                Ok(registers[usize::from(start)..end].to_vec())
            })
            .await
    }

    async fn write_discrete(&mut self, address: u16, value: bool) -> Result<(), TransportError> {
        self.plc
            .exchange(Exchange::WriteCoil { address, value }, |plc| {
                plc.apply_write(address, value)
            })
            .await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.plc.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_config() -> SupervisorConfig {
    SupervisorConfig::default()
}

pub fn supervisor(mock: &MockClient) -> Supervisor {
    supervisor_with(mock, test_config())
}

pub fn supervisor_with(mock: &MockClient, config: SupervisorConfig) -> Supervisor {
    let hub = Arc::new(SnapshotHub::new(config.subscriber_buffer));
    Supervisor::with_client(config, mock.boxed(), hub)
}
