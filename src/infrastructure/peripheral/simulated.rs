//! In-process peripheral driver
//!
//! [`SimulatedDriver`] stands in for the radio stack: it records every call,
//! tracks which services are registered and advertised, and answers through
//! the peripheral queue like a real stack would. The paired
//! [`SimulatedRadio`] is the other side of the air: it flips the power switch
//! and plays the remote central issuing reads and writes.

use crate::domain::models::{RadioState, ServiceKind};
use crate::domain::registry::{self, ServiceDescriptor};
use crate::infrastructure::peripheral::driver::{AttRequest, AttResult, DriverEvent, PeripheralDriver};
use crate::infrastructure::peripheral::queue::PeripheralQueue;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

/// A call the state machine made into the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    AddService(Uuid),
    RemoveService(Uuid),
    StartAdvertising(Vec<Uuid>),
    StopAdvertising,
    Respond { request_id: u64, result: AttResult },
}

/// Answer the central received for a read or write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttResponse {
    pub request_id: u64,
    pub result: AttResult,
    pub value: Option<Vec<u8>>,
}

impl AttResponse {
    pub fn text(&self) -> Option<String> {
        self.value
            .as_ref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

#[derive(Debug, Default)]
struct SimState {
    radio: RadioState,
    calls: Vec<DriverCall>,
    registered: Vec<Uuid>,
    advertising: Option<Vec<Uuid>>,
    failing: HashSet<Uuid>,
    next_request_id: u64,
}

type Shared = Arc<Mutex<SimState>>;

fn lock(state: &Shared) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct SimulatedDriver {
    state: Shared,
    queue: PeripheralQueue,
    responses: mpsc::UnboundedSender<AttResponse>,
}

impl SimulatedDriver {
    /// Create a driver reporting into `queue`, and its radio-side handle
    pub fn new(queue: PeripheralQueue) -> (SimulatedDriver, SimulatedRadio) {
        let state: Shared = Arc::new(Mutex::new(SimState::default()));
        let (responses_tx, responses_rx) = mpsc::unbounded_channel();
        let driver = SimulatedDriver {
            state: state.clone(),
            queue: queue.clone(),
            responses: responses_tx,
        };
        let radio = SimulatedRadio {
            state,
            queue,
            responses: responses_rx,
        };
        (driver, radio)
    }
}

impl PeripheralDriver for SimulatedDriver {
    fn add_service(&mut self, service: &ServiceDescriptor) {
        let error = {
            let mut state = lock(&self.state);
            state.calls.push(DriverCall::AddService(service.uuid));
            if !state.radio.is_powered_on() {
                Some("Radio is not powered on".to_string())
            } else if state.failing.contains(&service.uuid) {
                Some(format!("Simulated failure adding {}", service.name))
            } else {
                if !state.registered.contains(&service.uuid) {
                    state.registered.push(service.uuid);
                }
                None
            }
        };
        debug!(
            "Simulated add_service {} {:?} -> {:?}",
            service.name,
            service.characteristics(),
            error
        );
        self.queue.driver_event(DriverEvent::ServiceAdded {
            service: service.uuid,
            error,
        });
    }

    fn remove_service(&mut self, service: &ServiceDescriptor) {
        let mut state = lock(&self.state);
        state.calls.push(DriverCall::RemoveService(service.uuid));
        state.registered.retain(|uuid| *uuid != service.uuid);
    }

    fn start_advertising(&mut self, local_name: Option<&str>, services: &[Uuid]) {
        let error = {
            let mut state = lock(&self.state);
            state.calls.push(DriverCall::StartAdvertising(services.to_vec()));
            if state.radio.is_powered_on() {
                state.advertising = Some(services.to_vec());
                None
            } else {
                Some("Radio is not powered on".to_string())
            }
        };
        debug!(
            "Simulated start_advertising {:?} name={:?}",
            services, local_name
        );
        self.queue
            .driver_event(DriverEvent::AdvertisingStarted { error });
    }

    fn stop_advertising(&mut self) {
        let mut state = lock(&self.state);
        state.calls.push(DriverCall::StopAdvertising);
        state.advertising = None;
    }

    fn respond_to_request(&mut self, request: &AttRequest, result: AttResult, value: Option<Vec<u8>>) {
        lock(&self.state).calls.push(DriverCall::Respond {
            request_id: request.id,
            result,
        });
        trace!("Simulated response to request {}: {:?}", request.id, result);
        let _ = self.responses.send(AttResponse {
            request_id: request.id,
            result,
            value,
        });
    }
}

/// Radio-side handle of a [`SimulatedDriver`]
pub struct SimulatedRadio {
    state: Shared,
    queue: PeripheralQueue,
    responses: mpsc::UnboundedReceiver<AttResponse>,
}

impl SimulatedRadio {
    /// Change the radio state; losing power drops every service and advertisement
    pub fn set_power(&self, radio: RadioState) {
        {
            let mut state = lock(&self.state);
            state.radio = radio;
            if !radio.is_powered_on() {
                state.registered.clear();
                state.advertising = None;
            }
        }
        self.queue.driver_event(DriverEvent::PowerStateChanged(radio));
    }

    /// Central writes `value` to the input characteristic of `kind`
    pub fn write(&self, kind: ServiceKind, value: &[u8]) -> u64 {
        let descriptor = registry::descriptor(kind);
        let request = self.request(descriptor.uuid, descriptor.input_characteristic, value.to_vec());
        let id = request.id;
        self.queue
            .driver_event(DriverEvent::WriteRequests(vec![request]));
        id
    }

    /// Central writes several values in one prepared batch
    pub fn write_batch(&self, kind: ServiceKind, values: &[&[u8]]) -> Vec<u64> {
        let descriptor = registry::descriptor(kind);
        let requests: Vec<AttRequest> = values
            .iter()
            .map(|value| {
                self.request(descriptor.uuid, descriptor.input_characteristic, value.to_vec())
            })
            .collect();
        let ids = requests.iter().map(|r| r.id).collect();
        self.queue.driver_event(DriverEvent::WriteRequests(requests));
        ids
    }

    /// Central reads the output characteristic of `kind`
    pub fn read(&self, kind: ServiceKind) -> u64 {
        let descriptor = registry::descriptor(kind);
        let request = self.request(descriptor.uuid, descriptor.output_characteristic, Vec::new());
        let id = request.id;
        self.queue.driver_event(DriverEvent::ReadRequest(request));
        id
    }

    /// Make adding `service` fail from now on
    pub fn fail_service(&self, service: Uuid) {
        lock(&self.state).failing.insert(service);
    }

    pub fn try_response(&mut self) -> Option<AttResponse> {
        self.responses.try_recv().ok()
    }

    pub async fn next_response(&mut self) -> Option<AttResponse> {
        self.responses.recv().await
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.state).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    pub fn registered_services(&self) -> Vec<Uuid> {
        lock(&self.state).registered.clone()
    }

    /// Services in the current advertisement, `None` when not advertising
    pub fn advertised_services(&self) -> Option<Vec<Uuid>> {
        lock(&self.state).advertising.clone()
    }

    pub fn radio_state(&self) -> RadioState {
        lock(&self.state).radio
    }

    fn request(&self, service: Uuid, characteristic: Uuid, value: Vec<u8>) -> AttRequest {
        let mut state = lock(&self.state);
        state.next_request_id += 1;
        AttRequest {
            id: state.next_request_id,
            service,
            characteristic,
            value,
        }
    }
}
