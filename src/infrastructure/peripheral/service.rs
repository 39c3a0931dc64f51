//! Peripheral Service Module
//!
//! Runs the state machine on its own task, draining the peripheral queue one
//! message at a time, and hands out [`PeripheralHandle`]s for the UI.

use crate::domain::models::AppEvent;
use crate::domain::settings::Settings;
use crate::infrastructure::peripheral::driver::PeripheralDriver;
use crate::infrastructure::peripheral::queue::{
    PeripheralCommand, PeripheralMessage, PeripheralQueue,
};
use crate::infrastructure::peripheral::state_machine::PeripheralStateMachine;
use crate::infrastructure::peripheral::PeripheralError;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::info;

/// Cloneable entry point for the UI; every call is queued, never run in place
#[derive(Debug, Clone)]
pub struct PeripheralHandle {
    queue: PeripheralQueue,
}

impl PeripheralHandle {
    pub fn start_enroll(&self) -> Result<(), PeripheralError> {
        self.queue.command(PeripheralCommand::StartEnroll)
    }

    pub fn start_auth(&self) -> Result<(), PeripheralError> {
        self.queue.command(PeripheralCommand::StartAuth)
    }

    pub fn shutdown(&self) -> Result<(), PeripheralError> {
        self.queue.command(PeripheralCommand::Shutdown)
    }
}

pub struct PeripheralService {
    machine: PeripheralStateMachine,
    queue: PeripheralQueue,
    receiver: mpsc::UnboundedReceiver<PeripheralMessage>,
}

impl PeripheralService {
    /// Create the service around `driver`, which must report into `queue`
    pub fn new(
        driver: Box<dyn PeripheralDriver>,
        queue: PeripheralQueue,
        receiver: mpsc::UnboundedReceiver<PeripheralMessage>,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        settings: &Settings,
    ) -> Self {
        let machine = PeripheralStateMachine::new(
            driver,
            queue.clone(),
            event_sender,
            settings.peripheral.clone(),
            settings.exchange.clone(),
        );
        Self {
            machine,
            queue,
            receiver,
        }
    }

    pub fn handle(&self) -> PeripheralHandle {
        PeripheralHandle {
            queue: self.queue.clone(),
        }
    }

    /// Process messages until a shutdown command arrives
    pub async fn run(mut self) {
        info!("Peripheral service started");
        while let Some(message) = self.receiver.recv().await {
            if let ControlFlow::Break(()) = self.machine.dispatch(message) {
                break;
            }
        }
        info!("Peripheral service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ActivationState, RadioState, ServiceKind};
    use crate::infrastructure::peripheral::driver::AttResult;
    use crate::infrastructure::peripheral::simulated::SimulatedDriver;

    fn spawn_service() -> (
        PeripheralHandle,
        crate::infrastructure::peripheral::simulated::SimulatedRadio,
        mpsc::UnboundedReceiver<AppEvent>,
        tokio::task::JoinHandle<()>,
    ) {
        let (queue, receiver) = PeripheralQueue::new();
        let (driver, radio) = SimulatedDriver::new(queue.clone());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let service = PeripheralService::new(
            Box::new(driver),
            queue,
            receiver,
            event_tx,
            &Settings::default(),
        );
        let handle = service.handle();
        let task = tokio::spawn(service.run());
        (handle, radio, event_rx, task)
    }

    async fn next_state(events: &mut mpsc::UnboundedReceiver<AppEvent>) -> ActivationState {
        loop {
            match events.recv().await {
                Some(AppEvent::ActivationChanged(state)) => return state,
                Some(AppEvent::LogMessage(_)) => continue,
                None => panic!("event channel closed"),
            }
        }
    }

    #[tokio::test]
    async fn test_enroll_then_auth_session() {
        let (handle, mut radio, mut events, task) = spawn_service();

        radio.set_power(RadioState::PoweredOn);
        assert_eq!(next_state(&mut events).await, ActivationState::EnrollOnly);

        radio.write(ServiceKind::Enroll, b"Enroll request 3");
        let ack = radio.next_response().await.unwrap();
        assert_eq!(ack.result, AttResult::Success);

        radio.read(ServiceKind::Enroll);
        let response = radio.next_response().await.unwrap();
        let text = response.text().unwrap();
        assert!(text.starts_with("Enroll response 3 ["));

        assert_eq!(next_state(&mut events).await, ActivationState::Idle);
        assert_eq!(next_state(&mut events).await, ActivationState::AuthOnly);

        handle.start_enroll().unwrap();
        assert_eq!(next_state(&mut events).await, ActivationState::Both);

        handle.shutdown().unwrap();
        task.await.unwrap();
        assert!(matches!(
            handle.start_auth(),
            Err(PeripheralError::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_handle_from_another_thread() {
        let (handle, radio, mut events, task) = spawn_service();
        radio.set_power(RadioState::PoweredOn);
        assert_eq!(next_state(&mut events).await, ActivationState::EnrollOnly);

        let remote = handle.clone();
        std::thread::spawn(move || remote.start_auth().unwrap())
            .join()
            .unwrap();
        assert_eq!(next_state(&mut events).await, ActivationState::Both);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }
}
