use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two GATT services the peripheral can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Enroll,
    Auth,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 2] = [ServiceKind::Enroll, ServiceKind::Auth];
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enroll => write!(f, "Enroll"),
            Self::Auth => write!(f, "Auth"),
        }
    }
}

/// Which services are currently registered with the driver and advertised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationState {
    #[default]
    Idle,
    EnrollOnly,
    AuthOnly,
    Both,
}

impl ActivationState {
    /// Whether `kind` is part of this state
    pub fn contains(self, kind: ServiceKind) -> bool {
        matches!(
            (self, kind),
            (Self::EnrollOnly | Self::Both, ServiceKind::Enroll)
                | (Self::AuthOnly | Self::Both, ServiceKind::Auth)
        )
    }

    /// State after activating `kind`, or `None` if it is already active
    pub fn activated(self, kind: ServiceKind) -> Option<Self> {
        match (self, kind) {
            (Self::Idle, ServiceKind::Enroll) => Some(Self::EnrollOnly),
            (Self::Idle, ServiceKind::Auth) => Some(Self::AuthOnly),
            (Self::EnrollOnly, ServiceKind::Auth) => Some(Self::Both),
            (Self::AuthOnly, ServiceKind::Enroll) => Some(Self::Both),
            _ => None,
        }
    }

    /// State after deactivating `kind`, or `None` if it is not active
    pub fn deactivated(self, kind: ServiceKind) -> Option<Self> {
        match (self, kind) {
            (Self::EnrollOnly, ServiceKind::Enroll) => Some(Self::Idle),
            (Self::AuthOnly, ServiceKind::Auth) => Some(Self::Idle),
            (Self::Both, ServiceKind::Enroll) => Some(Self::AuthOnly),
            (Self::Both, ServiceKind::Auth) => Some(Self::EnrollOnly),
            _ => None,
        }
    }

    /// Services to advertise, in registry order
    pub fn services(self) -> Vec<ServiceKind> {
        ServiceKind::ALL
            .into_iter()
            .filter(|kind| self.contains(*kind))
            .collect()
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "Idle",
            Self::EnrollOnly => "Enroll",
            Self::AuthOnly => "Auth",
            Self::Both => "Both",
        };
        f.write_str(label)
    }
}

/// Radio state as reported by the peripheral driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadioState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl RadioState {
    pub fn is_powered_on(self) -> bool {
        self == Self::PoweredOn
    }
}

impl fmt::Display for RadioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    ActivationChanged(ActivationState),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
