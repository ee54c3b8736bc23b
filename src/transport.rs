//! Protocol client contract and the gate that serializes access to it.
//!
//! The controller session is a single stateful duplex channel: two requests
//! in flight at once corrupt response matching. Every exchange therefore goes
//! through [`TransportSerializer`], which holds the session behind an async
//! mutex for exactly one request/response and releases it before returning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::registry::AddressSpan;

/// Minimal read/write contract consumed from a protocol client.
#[async_trait]
pub trait ProtocolClient: Send {
    async fn read_discrete_range(&mut self, start: u16, count: u16)
        -> Result<Vec<bool>, TransportError>;

    async fn read_analog_range(&mut self, start: u16, count: u16)
        -> Result<Vec<u16>, TransportError>;

    async fn write_discrete(&mut self, address: u16, value: bool) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Sole owner of one controller session.
pub struct TransportSerializer {
    endpoint: String,
    session: Mutex<Option<Box<dyn ProtocolClient>>>,
    open: AtomicBool,
    exchanges: AtomicU64,
}

impl TransportSerializer {
    pub fn new(endpoint: impl Into<String>, client: Box<dyn ProtocolClient>) -> Self {
        Self {
            endpoint: endpoint.into(),
            session: Mutex::new(Some(client)),
            open: AtomicBool::new(true),
            exchanges: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        if self.open.load(Ordering::Acquire) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of exchanges attempted on this session.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::Relaxed)
    }

    pub async fn read_discrete(&self, span: AddressSpan) -> Result<Vec<bool>, TransportError> {
        let mut session = self.session.lock().await;
        let client = session.as_mut().ok_or(TransportError::NotConnected)?;
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        client.read_discrete_range(span.start, span.count).await
    }

    pub async fn read_analog(&self, span: AddressSpan) -> Result<Vec<u16>, TransportError> {
        let mut session = self.session.lock().await;
        let client = session.as_mut().ok_or(TransportError::NotConnected)?;
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        client.read_analog_range(span.start, span.count).await
    }

    pub async fn write_discrete(&self, address: u16, value: bool) -> Result<(), TransportError> {
        let mut session = self.session.lock().await;
        let client = session.as_mut().ok_or(TransportError::NotConnected)?;
        self.exchanges.fetch_add(1, Ordering::Relaxed);
        debug!("write coil {} = {}", address, value);
        client.write_discrete(address, value).await
    }

    /// Tear down the session. Waits for any in-flight exchange to finish first.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        self.open.store(false, Ordering::Release);

        if let Some(mut client) = session.take() {
            match client.close().await {
                Ok(()) => info!("Closed session with {}", self.endpoint),
                Err(e) => warn!("Error closing session with {}: {}", self.endpoint, e),
            }
        }
    }
}

impl std::fmt::Debug for TransportSerializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSerializer")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("exchanges", &self.exchange_count())
            .finish_non_exhaustive()
    }
}
