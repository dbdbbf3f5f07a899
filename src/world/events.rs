//! Events delivered by the domain collaborator to the scene

use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

use super::Domain;

/// Domain connection state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Refused,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Refused => write!(f, "REFUSED"),
            ConnectionState::Error => write!(f, "ERROR"),
        }
    }
}

/// Connection state transition of the active domain
#[derive(Clone)]
pub struct DomainStateChange {
    pub domain: Rc<dyn Domain>,
    pub state: ConnectionState,
    pub info: String,
}

impl DomainStateChange {
    pub fn new(domain: Rc<dyn Domain>, state: ConnectionState, info: impl Into<String>) -> Self {
        Self {
            domain,
            state,
            info: info.into(),
        }
    }
}

impl fmt::Debug for DomainStateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainStateChange")
            .field("domain", &self.domain.url())
            .field("state", &self.state)
            .field("info", &self.info)
            .finish()
    }
}

/// Notifications queued for the scene coordinator, drained once per frame
#[derive(Debug, Clone)]
pub enum SceneEvent {
    DomainStateChanged(DomainStateChange),
    AvatarAdded(Uuid),
    AvatarRemoved(Uuid),
    SkeletonModelChanged(Uuid),
}
