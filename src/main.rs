use glam::{Quat, Vec3};
use std::rc::Rc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use vworld_rust::assets::memory::{MemoryAssetLoader, MemoryShapeFactory};
use vworld_rust::config::load_viewer_settings;
use vworld_rust::utils::logging::{init_logging, log_system_info};
use vworld_rust::world::memory::{DomainConnection, LocalAvatar, LocalDomain};
use vworld_rust::{ViewerApp, APP_NAME, VERSION};

const DEMO_DOMAIN: &str = "wss://domain.example.com:40102";
const VISITOR_MODEL: &str = "https://staging.vircadia.com/O12OR634/UA92/mark.glb";

/// Catalog every model the demo scene asks for
fn demo_loader(settings: &vworld_rust::ViewerSettings) -> Arc<MemoryAssetLoader> {
    let loader = Arc::new(MemoryAssetLoader::new());
    let clips = [(settings.avatar.idle_state.as_str(), true), ("walk_fwd", true)];
    loader.add_model(&settings.avatar.default_avatar_url, &clips);
    loader.add_model(VISITOR_MODEL, &clips);
    for preset in &settings.scene.presets {
        for file in preset.meshes.iter().chain(&preset.incremental_meshes) {
            loader.add_model(&format!("{}{}", preset.root_url, file), &[]);
        }
    }
    loader
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    log_system_info();
    info!("{} {}", APP_NAME, VERSION);

    let mut settings = load_viewer_settings();
    if settings.rendering.max_frames == 0 {
        settings.rendering.max_frames = 300;
    }

    let loader = demo_loader(&settings);
    let domain = Rc::new(LocalDomain::new(DEMO_DOMAIN));

    let visitor = Rc::new(
        LocalAvatar::new("visitor")
            .with_skeleton_model_url(VISITOR_MODEL)
            .with_transform(Vec3::new(20.0, 0.0, 28.0), Quat::IDENTITY),
    );
    domain.avatars().insert_silent(Uuid::new_v4(), visitor.clone());

    let mut app = ViewerApp::new(
        settings.clone(),
        DomainConnection::new(domain.clone()),
        loader,
        Rc::new(MemoryShapeFactory::new()),
    );
    app.start().await?;

    let latecomer_id = Uuid::new_v4();
    let latecomer = Rc::new(LocalAvatar::new("latecomer"));
    let default_avatar_url = settings.avatar.default_avatar_url.clone();

    let frames = app
        .run(|frame, connection| {
            // The visitor walks a circle around the courtyard
            let angle = frame as f32 * 0.02;
            visitor.set_position(Vec3::new(20.0 + angle.cos() * 3.0, 0.0, 28.0 + angle.sin() * 3.0));
            visitor.set_orientation(Quat::from_rotation_y(-angle));

            match frame {
                60 => connection.domain().avatars().add(latecomer_id, latecomer.clone()),
                90 => latecomer.set_skeleton_model_url(default_avatar_url.as_str()),
                120 => visitor.set_display_name("visitor (away)"),
                240 => {
                    connection.domain().avatars().remove(&latecomer_id);
                }
                _ => {}
            }
        })
        .await?;

    info!(
        frames,
        mirrors = app.scene().avatars().mirror_count(),
        environment_meshes = app.scene().environment().mesh_count(),
        "demo finished"
    );
    app.shutdown();
    Ok(())
}
