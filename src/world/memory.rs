//! In-process domain
//!
//! A domain that lives entirely in memory. It backs the demo binary and the
//! tests, and behaves like the SDK from the scene's point of view: every
//! setter fires the matching change signal on the calling thread.

use super::{
    AvatarList, ConnectionState, Domain, DomainStateChange, MyAvatar, RemoteAvatar, SessionId,
    Signal,
};
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;
use uuid::Uuid;

/// Remote avatar whose attributes are driven by the caller
pub struct LocalAvatar {
    display_name: RefCell<String>,
    session_display_name: RefCell<String>,
    skeleton_model_url: RefCell<String>,
    position: RefCell<Vec3>,
    orientation: RefCell<Quat>,
    display_name_changed: Signal<()>,
    session_display_name_changed: Signal<()>,
    skeleton_model_url_changed: Signal<()>,
}

impl LocalAvatar {
    pub fn new(display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            session_display_name: RefCell::new(display_name.clone()),
            display_name: RefCell::new(display_name),
            skeleton_model_url: RefCell::new(String::new()),
            position: RefCell::new(Vec3::ZERO),
            orientation: RefCell::new(Quat::IDENTITY),
            display_name_changed: Signal::new(),
            session_display_name_changed: Signal::new(),
            skeleton_model_url_changed: Signal::new(),
        }
    }

    /// Builder-style model assignment without firing the change signal
    pub fn with_skeleton_model_url(self, url: impl Into<String>) -> Self {
        *self.skeleton_model_url.borrow_mut() = url.into();
        self
    }

    pub fn with_transform(self, position: Vec3, orientation: Quat) -> Self {
        *self.position.borrow_mut() = position;
        *self.orientation.borrow_mut() = orientation;
        self
    }

    pub fn set_display_name(&self, name: impl Into<String>) {
        *self.display_name.borrow_mut() = name.into();
        self.display_name_changed.emit(&());
    }

    pub fn set_session_display_name(&self, name: impl Into<String>) {
        *self.session_display_name.borrow_mut() = name.into();
        self.session_display_name_changed.emit(&());
    }

    pub fn set_skeleton_model_url(&self, url: impl Into<String>) {
        *self.skeleton_model_url.borrow_mut() = url.into();
        self.skeleton_model_url_changed.emit(&());
    }

    pub fn set_position(&self, position: Vec3) {
        *self.position.borrow_mut() = position;
    }

    pub fn set_orientation(&self, orientation: Quat) {
        *self.orientation.borrow_mut() = orientation;
    }
}

impl RemoteAvatar for LocalAvatar {
    fn display_name(&self) -> String {
        self.display_name.borrow().clone()
    }

    fn session_display_name(&self) -> String {
        self.session_display_name.borrow().clone()
    }

    fn skeleton_model_url(&self) -> String {
        self.skeleton_model_url.borrow().clone()
    }

    fn position(&self) -> Vec3 {
        *self.position.borrow()
    }

    fn orientation(&self) -> Quat {
        *self.orientation.borrow()
    }

    fn display_name_changed(&self) -> &Signal<()> {
        &self.display_name_changed
    }

    fn session_display_name_changed(&self) -> &Signal<()> {
        &self.session_display_name_changed
    }

    fn skeleton_model_url_changed(&self) -> &Signal<()> {
        &self.skeleton_model_url_changed
    }
}

/// Avatar directory; keeps arrival order so enumeration is stable
#[derive(Default)]
pub struct LocalAvatarList {
    avatars: RefCell<HashMap<SessionId, Rc<LocalAvatar>>>,
    order: RefCell<Vec<SessionId>>,
    avatar_added: Signal<SessionId>,
    avatar_removed: Signal<SessionId>,
}

impl LocalAvatarList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert without notifying, for avatars already present before connect
    pub fn insert_silent(&self, id: SessionId, avatar: Rc<LocalAvatar>) {
        if self.avatars.borrow_mut().insert(id, avatar).is_none() {
            self.order.borrow_mut().push(id);
        }
    }

    pub fn add(&self, id: SessionId, avatar: Rc<LocalAvatar>) {
        self.insert_silent(id, avatar);
        debug!(session_id = %id, "avatar joined local domain");
        self.avatar_added.emit(&id);
    }

    pub fn remove(&self, id: &SessionId) -> Option<Rc<LocalAvatar>> {
        let removed = self.avatars.borrow_mut().remove(id);
        if removed.is_some() {
            self.order.borrow_mut().retain(|known| known != id);
            debug!(session_id = %id, "avatar left local domain");
            self.avatar_removed.emit(id);
        }
        removed
    }

    pub fn get(&self, id: &SessionId) -> Option<Rc<LocalAvatar>> {
        self.avatars.borrow().get(id).cloned()
    }
}

impl AvatarList for LocalAvatarList {
    fn avatar_ids(&self) -> Vec<SessionId> {
        self.order.borrow().clone()
    }

    fn avatar(&self, id: &SessionId) -> Option<Rc<dyn RemoteAvatar>> {
        self.get(id).map(|avatar| avatar as Rc<dyn RemoteAvatar>)
    }

    fn avatar_added(&self) -> &Signal<SessionId> {
        &self.avatar_added
    }

    fn avatar_removed(&self) -> &Signal<SessionId> {
        &self.avatar_removed
    }
}

/// Local user's avatar, recording what the scene pushes to it
#[derive(Debug, Default)]
pub struct LocalMyAvatar {
    skeleton_model_url: RefCell<String>,
    position: RefCell<Vec3>,
    orientation: RefCell<Quat>,
    transform_writes: RefCell<u32>,
}

impl LocalMyAvatar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Vec3 {
        *self.position.borrow()
    }

    pub fn orientation(&self) -> Quat {
        *self.orientation.borrow()
    }

    pub fn transform_writes(&self) -> u32 {
        *self.transform_writes.borrow()
    }
}

impl MyAvatar for LocalMyAvatar {
    fn skeleton_model_url(&self) -> String {
        self.skeleton_model_url.borrow().clone()
    }

    fn set_skeleton_model_url(&self, url: &str) {
        *self.skeleton_model_url.borrow_mut() = url.to_string();
    }

    fn set_position(&self, position: Vec3) {
        *self.position.borrow_mut() = position;
        *self.transform_writes.borrow_mut() += 1;
    }

    fn set_orientation(&self, orientation: Quat) {
        *self.orientation.borrow_mut() = orientation;
        *self.transform_writes.borrow_mut() += 1;
    }
}

pub struct LocalDomain {
    url: String,
    session_id: SessionId,
    avatars: Rc<LocalAvatarList>,
    my_avatar: Rc<LocalMyAvatar>,
}

impl LocalDomain {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: Uuid::new_v4(),
            avatars: Rc::new(LocalAvatarList::new()),
            my_avatar: Rc::new(LocalMyAvatar::new()),
        }
    }

    pub fn avatars(&self) -> &Rc<LocalAvatarList> {
        &self.avatars
    }

    pub fn local_my_avatar(&self) -> &Rc<LocalMyAvatar> {
        &self.my_avatar
    }
}

impl Domain for LocalDomain {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn session_id(&self) -> Option<SessionId> {
        Some(self.session_id)
    }

    fn avatar_list(&self) -> Option<Rc<dyn AvatarList>> {
        Some(self.avatars.clone() as Rc<dyn AvatarList>)
    }

    fn my_avatar(&self) -> Option<Rc<dyn MyAvatar>> {
        Some(self.my_avatar.clone() as Rc<dyn MyAvatar>)
    }
}

/// Connection-event source for a [`LocalDomain`]
pub struct DomainConnection {
    domain: Rc<LocalDomain>,
    state: RefCell<ConnectionState>,
    state_changed: Signal<DomainStateChange>,
}

impl DomainConnection {
    pub fn new(domain: Rc<LocalDomain>) -> Self {
        Self {
            domain,
            state: RefCell::new(ConnectionState::Disconnected),
            state_changed: Signal::new(),
        }
    }

    pub fn domain(&self) -> &Rc<LocalDomain> {
        &self.domain
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_changed(&self) -> &Signal<DomainStateChange> {
        &self.state_changed
    }

    pub fn set_state(&self, state: ConnectionState, info: &str) {
        *self.state.borrow_mut() = state;
        let domain: Rc<dyn Domain> = self.domain.clone();
        self.state_changed.emit(&DomainStateChange::new(domain, state, info));
    }

    pub fn connect(&self) {
        self.set_state(ConnectionState::Connecting, "");
        self.set_state(ConnectionState::Connected, "");
    }

    pub fn disconnect(&self, info: &str) {
        self.set_state(ConnectionState::Disconnected, info);
    }
}
