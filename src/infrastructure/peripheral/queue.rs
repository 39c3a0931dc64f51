//! Peripheral Queue
//!
//! The one sequential execution context of the peripheral. Driver events, UI
//! commands and tasks the state machine schedules for itself all travel on the
//! same unbounded channel and are handled strictly in arrival order.

use crate::infrastructure::peripheral::driver::DriverEvent;
use crate::infrastructure::peripheral::PeripheralError;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralCommand {
    StartEnroll,
    StartAuth,
    Shutdown,
}

/// Work the state machine re-submits to itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Remove Enroll, then add Auth
    EnrollmentHandoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralMessage {
    Driver(DriverEvent),
    Command(PeripheralCommand),
    Scheduled(ScheduledTask),
}

#[derive(Debug, Clone)]
pub struct PeripheralQueue {
    sender: mpsc::UnboundedSender<PeripheralMessage>,
}

impl PeripheralQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PeripheralMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Deliver a driver event
    pub fn driver_event(&self, event: DriverEvent) {
        if self.sender.send(PeripheralMessage::Driver(event)).is_err() {
            warn!("Peripheral queue closed, dropping driver event");
        }
    }

    pub fn command(&self, command: PeripheralCommand) -> Result<(), PeripheralError> {
        self.sender
            .send(PeripheralMessage::Command(command))
            .map_err(|_| PeripheralError::QueueClosed)
    }

    /// Run `task` after every message already queued
    pub fn schedule(&self, task: ScheduledTask) {
        if self.sender.send(PeripheralMessage::Scheduled(task)).is_err() {
            warn!("Peripheral queue closed, dropping {:?}", task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::RadioState;

    #[test]
    fn test_messages_keep_arrival_order() {
        let (queue, mut rx) = PeripheralQueue::new();
        queue.command(PeripheralCommand::StartAuth).unwrap();
        queue.driver_event(DriverEvent::PowerStateChanged(RadioState::PoweredOn));
        queue.schedule(ScheduledTask::EnrollmentHandoff);

        assert_eq!(
            rx.try_recv().unwrap(),
            PeripheralMessage::Command(PeripheralCommand::StartAuth)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PeripheralMessage::Driver(DriverEvent::PowerStateChanged(RadioState::PoweredOn))
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PeripheralMessage::Scheduled(ScheduledTask::EnrollmentHandoff)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_command_on_closed_queue() {
        let (queue, rx) = PeripheralQueue::new();
        drop(rx);
        assert!(matches!(
            queue.command(PeripheralCommand::StartEnroll),
            Err(PeripheralError::QueueClosed)
        ));
    }
}
