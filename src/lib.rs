// vworld-rust: avatar sync and scene lifecycle for a shared 3D world viewer

pub mod utils;
pub mod config;
pub mod world;
pub mod assets;
pub mod avatar;
pub mod rendering;
pub mod app;

// Re-export commonly used types for convenience
pub use app::ViewerApp;
pub use config::{ViewerSettings, load_viewer_settings};
pub use rendering::SceneCoordinator;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
