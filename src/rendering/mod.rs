pub mod frame;
pub mod scene;

pub use frame::{FrameListener, FrameLoop, ListenerId};
pub use scene::SceneCoordinator;
