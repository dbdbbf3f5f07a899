pub mod settings;

// Re-export commonly used types
pub use settings::{
    AvatarSettings, ConfigError, EnvironmentPreset, RenderingSettings, SceneSettings, ViewerSettings,
    load_viewer_settings, save_viewer_settings, save_viewer_settings_to,
};
