//! Domain-side collaborators
//!
//! The network SDK that connects to a domain and relays the avatar mixer is
//! external to this crate. These traits are the surface the scene consumes:
//! live read-only avatar views, the avatar directory, the local user's avatar,
//! and the domain itself. Everything is observed on the render thread.

pub mod events;
pub mod memory;
pub mod signal;

pub use events::*;
pub use signal::{Signal, Subscription};

use glam::{Quat, Vec3};
use std::rc::Rc;
use uuid::Uuid;

/// Opaque per-avatar session key
pub type SessionId = Uuid;

/// The sentinel "empty" session id; it stands for the local user
pub fn empty_session_id() -> SessionId {
    Uuid::nil()
}

/// Live view of a remote avatar relayed by the avatar mixer
pub trait RemoteAvatar {
    fn display_name(&self) -> String;
    fn session_display_name(&self) -> String;
    /// Empty string means no model assigned yet
    fn skeleton_model_url(&self) -> String;
    fn position(&self) -> Vec3;
    fn orientation(&self) -> Quat;

    fn display_name_changed(&self) -> &Signal<()>;
    fn session_display_name_changed(&self) -> &Signal<()>;
    fn skeleton_model_url_changed(&self) -> &Signal<()>;
}

/// Directory of the remote avatars currently known to the mixer
pub trait AvatarList {
    fn avatar_ids(&self) -> Vec<SessionId>;
    fn avatar(&self, id: &SessionId) -> Option<Rc<dyn RemoteAvatar>>;
    fn avatar_added(&self) -> &Signal<SessionId>;
    fn avatar_removed(&self) -> &Signal<SessionId>;
}

/// The local user's avatar as seen by the domain
pub trait MyAvatar {
    fn skeleton_model_url(&self) -> String;
    fn set_skeleton_model_url(&self, url: &str);
    fn set_position(&self, position: Vec3);
    fn set_orientation(&self, orientation: Quat);
}

/// A connected (or connecting) domain
pub trait Domain {
    fn url(&self) -> String;
    fn session_id(&self) -> Option<SessionId>;
    fn avatar_list(&self) -> Option<Rc<dyn AvatarList>>;
    fn my_avatar(&self) -> Option<Rc<dyn MyAvatar>>;
}
