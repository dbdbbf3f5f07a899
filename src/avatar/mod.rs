//! Avatar synchronization: remote mirrors, their animation, their lifecycle,
//! and the local user's controller

pub mod animation;
pub mod controller;
pub mod mirror;
pub mod registry;

pub use animation::AnimationDriver;
pub use controller::MyAvatarController;
pub use mirror::{RemoteAvatarMirror, RemoteTransformMirror, SyncOutcome};
pub use registry::{AvatarLifecycleRegistry, LoadCompletion};
