//! Modbus TCP implementation of [`ProtocolClient`].
//!
//! Coils are read with FC1, holding registers with FC3 and a single coil is
//! written with FC5. Each request is bounded by the configured timeout.

use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context};
use tokio_modbus::prelude::*;
use tracing::info;

use crate::error::{SupervisorError, TransportError};
use crate::transport::ProtocolClient;

pub struct ModbusTcpClient {
    ctx: Context,
    peer: SocketAddr,
    request_timeout: Duration,
}

impl ModbusTcpClient {
    pub async fn connect(
        host: &str,
        port: u16,
        unit_id: u8,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SupervisorError> {
        let endpoint = format!("{host}:{port}");
        let connect_error = |reason: String| SupervisorError::Connect {
            endpoint: endpoint.clone(),
            reason,
        };

        let peer = lookup_host((host, port))
            .await
            .map_err(|e| connect_error(e.to_string()))?
            .next()
            .ok_or_else(|| connect_error("host did not resolve".to_string()))?;

        let ctx = timeout(connect_timeout, tcp::connect_slave(peer, Slave(unit_id)))
            .await
            .map_err(|_| connect_error(format!("timed out after {} ms", connect_timeout.as_millis())))?
            .map_err(|e| connect_error(e.to_string()))?;

        info!("Modbus TCP session open with {} (unit {})", peer, unit_id);
        Ok(Self {
            ctx,
            peer,
            request_timeout,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

// Flattens timeout, transport and exception layers into one error
async fn exchange<T, E, X>(
    limit: Duration,
    request: impl Future<Output = Result<Result<T, X>, E>>,
) -> Result<T, TransportError>
where
    E: std::fmt::Display,
    X: std::fmt::Display,
{
    match timeout(limit, request).await {
        Err(_) => Err(TransportError::Timeout(limit.as_millis() as u64)),
        Ok(Err(e)) => Err(TransportError::Io(e.to_string())),
        Ok(Ok(Err(exception))) => Err(TransportError::Exception(exception.to_string())),
        Ok(Ok(Ok(value))) => Ok(value),
    }
}

#[async_trait]
impl ProtocolClient for ModbusTcpClient {
    async fn read_discrete_range(
        &mut self,
        start: u16,
        count: u16,
    ) -> Result<Vec<bool>, TransportError> {
        exchange(self.request_timeout, self.ctx.read_coils(start, count)).await
    }

    async fn read_analog_range(
        &mut self,
        start: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        exchange(
            self.request_timeout,
            self.ctx.read_holding_registers(start, count),
        )
        .await
    }

    async fn write_discrete(&mut self, address: u16, value: bool) -> Result<(), TransportError> {
        exchange(
            self.request_timeout,
            self.ctx.write_single_coil(address, value),
        )
        .await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        timeout(self.request_timeout, self.ctx.disconnect())
            .await
            .map_err(|_| TransportError::Timeout(self.request_timeout.as_millis() as u64))?
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
