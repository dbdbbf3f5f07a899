use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

const CONFIG_FILE: &str = "viewer.toml";
const ENV_PREFIX: &str = "VWORLD";

pub const DEFAULT_AVATAR_URL: &str = "https://staging.vircadia.com/O12OR634/UA92/sara.glb";
pub const AVATAR_ANIMATION_URL: &str = "https://staging.vircadia.com/O12OR634/UA92/AnimationsBasic.glb";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("No configuration directory available")]
    NoConfigDir,
}

// =============================================================================
// Viewer Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarSettings {
    /// Model assigned to the local user when the domain has none
    pub default_avatar_url: String,
    pub animation_url: String,
    /// State every remote avatar is asked to play
    pub idle_state: String,
    /// Blend weight added per frame when switching clips
    pub blend_speed: f32,
}

impl Default for AvatarSettings {
    fn default() -> Self {
        Self {
            default_avatar_url: DEFAULT_AVATAR_URL.to_string(),
            animation_url: AVATAR_ANIMATION_URL.to_string(),
            idle_state: "idle02".to_string(),
            blend_speed: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingSettings {
    pub target_fps: f32,
    /// Stop after this many frames; 0 runs until interrupted
    pub max_frames: u64,
}

impl Default for RenderingSettings {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            max_frames: 0,
        }
    }
}

/// A set of environment models under a common root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentPreset {
    pub name: String,
    pub root_url: String,
    /// Loaded before the scene is shown
    pub meshes: Vec<String>,
    /// Streamed in once the scene is up
    #[serde(default)]
    pub incremental_meshes: Vec<String>,
    #[serde(default)]
    pub avatar_position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub active_preset: String,
    pub presets: Vec<EnvironmentPreset>,
}

impl SceneSettings {
    pub fn preset(&self, name: &str) -> Option<&EnvironmentPreset> {
        self.presets.iter().find(|preset| preset.name == name)
    }
}

impl Default for SceneSettings {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            active_preset: "ua92-campus".to_string(),
            presets: vec![
                EnvironmentPreset {
                    name: "ua92-campus".to_string(),
                    root_url: "https://staging.vircadia.com/O12OR634/UA92/".to_string(),
                    meshes: names(&["FirstFloor.glb", "Outdoors.glb", "Collisions.glb"]),
                    incremental_meshes: names(&[
                        "Exterior.glb",
                        "Atirum.glb",
                        "Elevator.glb",
                        "Furniture.glb",
                        "Support.glb",
                        "UpperFloors.glb",
                    ]),
                    avatar_position: [25.0, 0.0, 30.0],
                },
                EnvironmentPreset {
                    name: "space-station".to_string(),
                    root_url: "https://staging.vircadia.com/O12OR634/SpaceStation/".to_string(),
                    meshes: names(&["SpaceStation_Inside_Floor.glb", "Collision_Station_Inside.glb"]),
                    incremental_meshes: names(&[
                        "SpaceStation_HDRI.glb",
                        "SpaceStation_Inside_Desk.glb",
                        "SpaceStation_Inside_Furniture.glb",
                        "SpaceStation_Inside_Light.glb",
                        "SpaceStation_Inside_Tableware.glb",
                        "SpaceStation_Light.glb",
                        "SpaceStation_Planet_A.glb",
                        "SpaceStation_Planet_B.glb",
                        "SpaceStation_Station_Body_01.glb",
                        "SpaceStation_Station_Body_02.glb",
                        "SpaceStation_Station_Station_Part.glb",
                        "SpaceStation_Stone.glb",
                        "SpaceStation_Ship.glb",
                    ]),
                    avatar_position: [0.0, 49.6, 0.0],
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    pub avatar: AvatarSettings,
    pub rendering: RenderingSettings,
    pub scene: SceneSettings,
}

impl ViewerSettings {
    /// Layer an optional TOML file and `VWORLD__*` environment overrides
    /// over the defaults
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize::<ViewerSettings>()?;
        Ok(settings)
    }
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "vworld", "vworld-rust").map(|proj| proj.config_dir().join(CONFIG_FILE))
}

/// Settings from the user's config dir; defaults when absent or unreadable
pub fn load_viewer_settings() -> ViewerSettings {
    match ViewerSettings::load_from(config_path().as_deref()) {
        Ok(settings) => {
            info!("Loaded viewer settings");
            settings
        }
        Err(e) => {
            warn!("Falling back to default viewer settings: {}", e);
            ViewerSettings::default()
        }
    }
}

pub fn save_viewer_settings_to(settings: &ViewerSettings, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml = toml::to_string_pretty(settings)?;
    fs::write(path, toml)?;
    Ok(())
}

pub fn save_viewer_settings(settings: &ViewerSettings) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_viewer_settings_to(settings, &path)
}
