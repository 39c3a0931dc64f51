//! Peripheral Driver Seam
//!
//! The radio stack in the peripheral role. Every call returns immediately;
//! completions come back later as [`DriverEvent`]s on the peripheral queue.

use crate::domain::models::RadioState;
use crate::domain::registry::ServiceDescriptor;
use uuid::Uuid;

/// An attribute read or write request from the remote central
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttRequest {
    /// Driver-assigned id used to answer the request
    pub id: u64,
    pub service: Uuid,
    pub characteristic: Uuid,
    /// Written bytes (empty for reads)
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttResult {
    Success,
    RequestNotSupported,
}

/// Notifications the driver delivers onto the peripheral queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    PowerStateChanged(RadioState),
    /// Completion of an earlier `add_service`
    ServiceAdded {
        service: Uuid,
        error: Option<String>,
    },
    AdvertisingStarted {
        error: Option<String>,
    },
    WriteRequests(Vec<AttRequest>),
    ReadRequest(AttRequest),
}

pub trait PeripheralDriver: Send {
    /// Register a service; answered by [`DriverEvent::ServiceAdded`]
    fn add_service(&mut self, service: &ServiceDescriptor);

    fn remove_service(&mut self, service: &ServiceDescriptor);

    /// Answered by [`DriverEvent::AdvertisingStarted`]
    fn start_advertising(&mut self, local_name: Option<&str>, services: &[Uuid]);

    fn stop_advertising(&mut self);

    fn respond_to_request(&mut self, request: &AttRequest, result: AttResult, value: Option<Vec<u8>>);
}
