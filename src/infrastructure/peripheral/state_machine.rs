//! Peripheral State Machine
//!
//! Owns which services are active, sequences service registration against the
//! driver's confirmations, keeps the advertisement in line with the active
//! services, and runs the write -> buffer -> read exchange.
//!
//! All methods take `&mut self` and must only be called from the task that
//! drains the [`PeripheralQueue`]; anything else reaches the state machine by
//! sending a message onto that queue.

use crate::domain::exchange::ExchangeRules;
use crate::domain::models::{
    ActivationState, AppEvent, MessageSeverity, RadioState, ServiceKind, StatusMessage,
};
use crate::domain::registry;
use crate::domain::settings::PeripheralSettings;
use crate::infrastructure::peripheral::driver::{AttRequest, AttResult, DriverEvent, PeripheralDriver};
use crate::infrastructure::peripheral::queue::{
    PeripheralCommand, PeripheralMessage, PeripheralQueue, ScheduledTask,
};
use crate::infrastructure::peripheral::PeripheralError;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct PeripheralStateMachine {
    driver: Box<dyn PeripheralDriver>,
    queue: PeripheralQueue,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    settings: PeripheralSettings,
    rules: ExchangeRules,
    powered: bool,
    state: ActivationState,
    /// Services whose registration the driver has not confirmed yet
    pending_registrations: Vec<ServiceKind>,
    pending_response: Option<String>,
}

impl PeripheralStateMachine {
    pub fn new(
        driver: Box<dyn PeripheralDriver>,
        queue: PeripheralQueue,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        settings: PeripheralSettings,
        rules: ExchangeRules,
    ) -> Self {
        Self {
            driver,
            queue,
            event_sender,
            settings,
            rules,
            powered: false,
            state: ActivationState::Idle,
            pending_registrations: Vec::new(),
            pending_response: None,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn pending_response(&self) -> Option<&str> {
        self.pending_response.as_deref()
    }

    /// Handle one message from the queue
    pub fn dispatch(&mut self, message: PeripheralMessage) -> ControlFlow<()> {
        let result = match message {
            PeripheralMessage::Command(PeripheralCommand::StartEnroll) => {
                self.request_enroll();
                Ok(())
            }
            PeripheralMessage::Command(PeripheralCommand::StartAuth) => {
                self.request_auth();
                Ok(())
            }
            PeripheralMessage::Command(PeripheralCommand::Shutdown) => {
                info!("Peripheral shutting down");
                return ControlFlow::Break(());
            }
            PeripheralMessage::Scheduled(task) => {
                self.run_scheduled(task);
                Ok(())
            }
            PeripheralMessage::Driver(event) => self.on_driver_event(event),
        };

        if let Err(e) = result {
            self.report(e);
        }
        ControlFlow::Continue(())
    }

    fn on_driver_event(&mut self, event: DriverEvent) -> Result<(), PeripheralError> {
        match event {
            DriverEvent::PowerStateChanged(radio) => {
                self.on_power_changed(radio);
                Ok(())
            }
            DriverEvent::ServiceAdded { service, error } => self.on_service_added(service, error),
            DriverEvent::AdvertisingStarted { error } => {
                self.on_advertising_started(error);
                Ok(())
            }
            DriverEvent::WriteRequests(requests) => self.on_write_requests(requests),
            DriverEvent::ReadRequest(request) => self.on_read_request(request),
        }
    }

    pub fn request_enroll(&mut self) {
        info!("startEnroll");
        self.request(ServiceKind::Enroll);
    }

    pub fn request_auth(&mut self) {
        info!("startAuth");
        self.request(ServiceKind::Auth);
    }

    fn request(&mut self, kind: ServiceKind) {
        if !self.powered {
            info!("Radio is not powered on, ignoring start of {}", kind);
            return;
        }
        if let Err(e) = self.activate(kind) {
            self.report(e);
        }
    }

    pub fn on_power_changed(&mut self, radio: RadioState) {
        info!("Radio state changed: {}", radio);
        self.notify(MessageSeverity::Info, format!("Radio {}", radio));
        let was_powered = self.powered;
        self.powered = radio.is_powered_on();

        if self.powered && !was_powered {
            self.restore_services();
            self.request_enroll();
        } else if !self.powered && was_powered {
            // The driver drops registrations together with the radio
            self.pending_registrations.clear();
            if self.settings.reset_on_power_off {
                self.set_state(ActivationState::Idle);
            }
        }
    }

    /// Register again every service the retained state still names; the
    /// radio dropped them when it lost power
    fn restore_services(&mut self) {
        for kind in self.state.services() {
            if self.pending_registrations.contains(&kind) {
                continue;
            }
            info!("Restoring {} service", kind);
            self.pending_registrations.push(kind);
            self.driver.add_service(registry::descriptor(kind));
        }
    }

    fn activate(&mut self, kind: ServiceKind) -> Result<(), PeripheralError> {
        if !self.powered {
            return Err(PeripheralError::NotPowered);
        }
        if self.state.contains(kind) || self.pending_registrations.contains(&kind) {
            debug!("{} service already active", kind);
            return Ok(());
        }

        info!("Activating {} service", kind);
        self.pending_registrations.push(kind);
        self.driver.add_service(registry::descriptor(kind));
        Ok(())
    }

    fn deactivate(&mut self, kind: ServiceKind) -> Result<(), PeripheralError> {
        if !self.powered {
            return Err(PeripheralError::NotPowered);
        }
        if let Some(index) = self.pending_registrations.iter().position(|k| *k == kind) {
            info!("Cancelling pending registration of {} service", kind);
            self.pending_registrations.remove(index);
            // A restored service is still part of the state until confirmed
            if let Some(next) = self.state.deactivated(kind) {
                self.set_state(next);
                self.restart_advertising();
            }
            return Ok(());
        }
        let Some(next) = self.state.deactivated(kind) else {
            debug!("{} service already inactive", kind);
            return Ok(());
        };

        info!("Deactivating {} service", kind);
        self.driver.remove_service(registry::descriptor(kind));
        self.set_state(next);
        self.restart_advertising();
        Ok(())
    }

    fn restart_advertising(&mut self) {
        if !self.powered {
            return;
        }
        self.driver.stop_advertising();

        let services: Vec<Uuid> = self
            .state
            .services()
            .into_iter()
            .map(|kind| registry::descriptor(kind).uuid)
            .collect();
        if services.is_empty() {
            info!("No active services, advertising stopped");
            return;
        }

        info!("Advertising {} services", self.state);
        self.driver
            .start_advertising(self.settings.local_name.as_deref(), &services);
    }

    pub fn on_service_added(
        &mut self,
        service: Uuid,
        error: Option<String>,
    ) -> Result<(), PeripheralError> {
        let Some(kind) = registry::kind_of(&service) else {
            warn!("Driver confirmed unknown service {}", service);
            return Ok(());
        };
        let was_pending = match self.pending_registrations.iter().position(|k| *k == kind) {
            Some(index) => {
                self.pending_registrations.remove(index);
                true
            }
            None => false,
        };

        if let Some(reason) = error {
            if was_pending {
                if let Some(next) = self.state.deactivated(kind) {
                    // Restoring after power loss failed
                    self.set_state(next);
                    self.restart_advertising();
                }
            }
            return Err(PeripheralError::ServiceRegistrationFailed {
                service: kind,
                reason,
            });
        }

        if !was_pending {
            warn!("Driver added {} service that is no longer wanted", kind);
            if !self.state.contains(kind) && self.powered {
                self.driver.remove_service(registry::descriptor(kind));
            }
            return Ok(());
        }

        info!("didAddService {} ok", registry::name_for(&service));
        match self.state.activated(kind) {
            Some(next) => self.set_state(next),
            None => debug!("{} service restored", kind),
        }
        self.restart_advertising();
        Ok(())
    }

    pub fn on_advertising_started(&mut self, error: Option<String>) {
        match error {
            None => info!("didStartAdvertising ok"),
            Some(reason) => error!("didStartAdvertising error {}", reason),
        }
    }

    /// Process a batch of writes; only the first request is used and answered
    pub fn on_write_requests(&mut self, requests: Vec<AttRequest>) -> Result<(), PeripheralError> {
        info!("didReceiveWriteRequests {}", requests.len());
        let Some(request) = requests.into_iter().next() else {
            return Ok(());
        };

        let decoded = std::str::from_utf8(&request.value).map(|text| {
            info!(
                "Request received on {} {}: {}",
                registry::name_for(&request.service),
                registry::name_for(&request.characteristic),
                text
            );
            self.rules.respond(text, &chrono::Local::now())
        });
        self.driver
            .respond_to_request(&request, AttResult::Success, None);

        let response = decoded?;
        info!("Pending response: {}", response);
        if let Some(previous) = self.pending_response.replace(response) {
            debug!("Dropping unread response: {}", previous);
        }
        Ok(())
    }

    pub fn on_read_request(&mut self, request: AttRequest) -> Result<(), PeripheralError> {
        info!(
            "didReceiveReadRequest {} {}",
            registry::name_for(&request.service),
            registry::name_for(&request.characteristic)
        );

        let Some(response) = self.pending_response.take() else {
            self.driver
                .respond_to_request(&request, AttResult::RequestNotSupported, None);
            return Err(PeripheralError::NoPendingData);
        };

        self.driver.respond_to_request(
            &request,
            AttResult::Success,
            Some(response.clone().into_bytes()),
        );
        if self.rules.is_enrollment_complete(&response) {
            info!("Enrollment complete, handing off to Auth");
            self.notify(MessageSeverity::Success, "Enrollment complete".to_string());
            self.queue.schedule(ScheduledTask::EnrollmentHandoff);
        }
        Ok(())
    }

    fn run_scheduled(&mut self, task: ScheduledTask) {
        match task {
            ScheduledTask::EnrollmentHandoff => {
                for result in [
                    self.deactivate(ServiceKind::Enroll),
                    self.activate(ServiceKind::Auth),
                ] {
                    if let Err(e) = result {
                        self.report(e);
                    }
                }
            }
        }
    }

    fn set_state(&mut self, next: ActivationState) {
        if next == self.state {
            return;
        }
        info!("Activation state {} -> {}", self.state, next);
        self.state = next;
        if self.event_sender.send(AppEvent::ActivationChanged(next)).is_err() {
            debug!("No UI listening for activation changes");
        }
    }

    fn report(&self, error: PeripheralError) {
        let severity = match &error {
            PeripheralError::NoPendingData => {
                info!("No pending responses");
                return;
            }
            PeripheralError::NotPowered => {
                info!("{}", error);
                return;
            }
            PeripheralError::MalformedRequest(_) | PeripheralError::QueueClosed => {
                warn!("{}", error);
                MessageSeverity::Warning
            }
            PeripheralError::ServiceRegistrationFailed { .. } => {
                error!("{}", error);
                MessageSeverity::Error
            }
        };
        self.notify(severity, error.to_string());
    }

    fn notify(&self, severity: MessageSeverity, message: String) {
        if let Err(e) = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage { message, severity }))
        {
            debug!("No UI listening, dropped message: {:?}", e.0);
        }
    }
}
