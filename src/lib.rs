//! # Water Treatment Supervisor
//!
//! Supervisory control and monitoring engine for a water treatment process
//! running on a Modbus-attached PLC.
//!
//! ## Features
//!
//! - **Point registry**: semantic coil/register names mapped to protocol addresses
//! - **Serialized transport**: one protocol exchange in flight at a time, whoever the caller
//! - **Monitoring**: 1 Hz polling with alert evaluation and snapshot fan-out
//! - **Actuation**: single writes, timed pulses and parameter adjustment
//! - **Scenarios**: open-loop pulse sequences that drive the process into known conditions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aquavisor::{ControlAction, SupervisorConfig, SupervisorHandle};
//!
//! # async fn run() -> Result<(), aquavisor::SupervisorError> {
//! let handle = SupervisorHandle::new(SupervisorConfig::default());
//! handle.connect("192.168.1.50", 502).await?;
//!
//! let (_id, mut snapshots) = handle.subscribe();
//! handle.control(ControlAction::Start).await?;
//!
//! if let Some(snapshot) = snapshots.recv().await {
//!     println!("alerts: {:?}", snapshot.alerts);
//! }
//! handle.disconnect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`registry`] - Point tables and alert thresholds
//! - [`transport`] - Protocol client contract and the serializing gate around it
//! - [`state`] - Snapshot type and the state reader
//! - [`alerts`] - Threshold evaluation
//! - [`actuation`] - Writes, pulses and parameter adjustment
//! - [`scenario`] - Built-in open-loop scenarios
//! - [`monitor`] - Background polling loop and subscriber hub
//! - [`supervisor`] - Engine instance and the handle exposed to outer layers

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_errors_doc)]

pub mod actuation;
pub mod alerts;
pub mod config;
pub mod error;
pub mod modbus;
pub mod monitor;
pub mod registry;
pub mod scenario;
pub mod state;
pub mod supervisor;
pub mod transport;

// Re-export main public types for convenience
pub use alerts::{Alert, AlertReport};
pub use config::SupervisorConfig;
pub use error::{SupervisorError, TransportError};
pub use registry::{PointRegistry, Thresholds};
pub use scenario::Scenario;
pub use state::StateSnapshot;
pub use supervisor::{ControlAction, Supervisor, SupervisorHandle};
pub use transport::{ProtocolClient, TransportSerializer};
