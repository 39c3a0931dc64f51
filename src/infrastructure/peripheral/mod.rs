//! Peripheral Module
//!
//! Emulates a BLE peripheral exposing the Enroll and Auth GATT services.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  commands   ┌──────────────────────────────────┐
//! │ Peripheral   │────────────▶│          PeripheralQueue         │
//! │ Handle (UI)  │             │  (single sequential mpsc queue)  │
//! └──────────────┘             └───────┬──────────────────▲───────┘
//!                                      │                  │ driver events,
//!                                      ▼                  │ scheduled tasks
//!                              ┌───────────────┐   ┌──────┴─────┐
//!                              │ StateMachine  │──▶│   Driver   │
//!                              │ (one owner)   │   │            │
//!                              └───────────────┘   └────────────┘
//! ```
//!
//! Every entry point reaches the state machine as a message on the queue, so
//! the state machine never runs concurrently with itself and needs no locks.
//!
//! ## Modules
//!
//! - [`driver`] - Driver seam: calls into the radio stack and the events it reports
//! - [`queue`] - The serial queue all messages travel on
//! - [`state_machine`] - Activation state, advertising and the request/response exchange
//! - [`simulated`] - In-process driver used by the console and the tests
//! - [`service`] - Task that drains the queue into the state machine

pub mod driver;
pub mod queue;
pub mod service;
pub mod simulated;
pub mod state_machine;

pub use service::{PeripheralHandle, PeripheralService};

use crate::domain::models::ServiceKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeripheralError {
    #[error("Radio is not powered on")]
    NotPowered,

    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] std::str::Utf8Error),

    #[error("Registering the {service} service failed: {reason}")]
    ServiceRegistrationFailed { service: ServiceKind, reason: String },

    #[error("No pending response")]
    NoPendingData,

    #[error("Peripheral queue is closed")]
    QueueClosed,
}
