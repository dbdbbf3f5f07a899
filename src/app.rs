use crate::assets::{MeshLoader, ShapeFactory};
use crate::config::ViewerSettings;
use crate::rendering::SceneCoordinator;
use crate::world::memory::DomainConnection;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

const DEFAULT_FPS: f32 = 60.0;
const MAX_FPS: f32 = 240.0;

/// Usable frame rate for `requested`: non-finite or non-positive values fall
/// back to the default, anything else is clamped to 1..=240
fn frame_rate(requested: f32) -> f32 {
    if !requested.is_finite() || requested <= 0.0 {
        warn!(requested, "target_fps must be a positive finite number, using {}", DEFAULT_FPS);
        return DEFAULT_FPS;
    }
    let clamped = requested.clamp(1.0, MAX_FPS);
    if clamped != requested {
        warn!(requested, clamped, "target_fps out of range");
    }
    clamped
}

/// Drives one scene against one domain connection at a fixed frame rate
pub struct ViewerApp {
    connection: DomainConnection,
    scene: SceneCoordinator,
    frame_interval: Duration,
    max_frames: u64,
}

impl ViewerApp {
    pub fn new(
        settings: ViewerSettings,
        connection: DomainConnection,
        loader: Arc<dyn MeshLoader>,
        shapes: Rc<dyn ShapeFactory>,
    ) -> Self {
        let target_fps = frame_rate(settings.rendering.target_fps);
        let max_frames = settings.rendering.max_frames;
        let scene = SceneCoordinator::new(1, settings, connection.state_changed(), loader, shapes);

        Self {
            connection,
            scene,
            frame_interval: Duration::from_secs_f32(1.0 / target_fps),
            max_frames,
        }
    }

    pub fn connection(&self) -> &DomainConnection {
        &self.connection
    }

    pub fn scene(&self) -> &SceneCoordinator {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneCoordinator {
        &mut self.scene
    }

    /// Load the configured environment and connect to the domain
    pub async fn start(&mut self) -> anyhow::Result<()> {
        let preset = self.scene.settings().scene.active_preset.clone();
        if !self.scene.load_environment(&preset).await {
            anyhow::bail!("environment preset '{}' is not configured", preset);
        }
        self.connection.connect();
        self.scene.render_frame();
        Ok(())
    }

    /// Render frames until `max_frames` is reached or Ctrl-C. `on_frame`
    /// runs before each frame with the frame number. Returns the number of
    /// frames rendered.
    pub async fn run<F>(&mut self, mut on_frame: F) -> anyhow::Result<u64>
    where
        F: FnMut(u64, &DomainConnection),
    {
        let mut ticker = time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut rendered = 0u64;
        loop {
            if self.max_frames > 0 && rendered >= self.max_frames {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    on_frame(rendered, &self.connection);
                    self.scene.render_frame();
                    rendered += 1;
                }
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!("failed to listen for Ctrl-C: {}", e);
                    }
                    info!("interrupted");
                    break;
                }
            }
        }
        Ok(rendered)
    }

    /// Disconnect and release the scene
    pub fn shutdown(&mut self) {
        self.connection.disconnect("viewer shutting down");
        self.scene.pump_events();
        self.scene.dispose();
        info!("viewer shut down");
    }
}
