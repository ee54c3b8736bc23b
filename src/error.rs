use thiserror::Error;

/// Failure of a single protocol exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("no session with the controller")]
    NotConnected,

    #[error("i/o error: {0}")]
    Io(String),

    #[error("controller exception: {0}")]
    Exception(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("unknown point: {0}")]
    UnknownPoint(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("unknown direction: {0} (expected up or down)")]
    UnknownDirection(String),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// The set-write of a pulse succeeded but the clear-write did not.
    /// The point is left asserted on the controller.
    #[error("actuator {point} stuck asserted: {source}")]
    StuckActuator {
        point: String,
        #[source]
        source: TransportError,
    },

    #[error("{operation}: {failed} of {attempted} pulses failed")]
    Incomplete {
        operation: String,
        failed: usize,
        attempted: usize,
    },

    #[error("not connected to a controller")]
    NotConnected,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = core::result::Result<T, SupervisorError>;
