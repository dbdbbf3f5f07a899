use glam::{Quat, Vec3};
use std::rc::Rc;
use std::sync::Arc;
use uuid::Uuid;
use vworld_rust::assets::memory::{MemoryAssetLoader, MemoryShapeFactory};
use vworld_rust::config::ViewerSettings;
use vworld_rust::rendering::scene::EntityProps;
use vworld_rust::world::memory::{DomainConnection, LocalAvatar, LocalDomain};
use vworld_rust::world::{AvatarList, ConnectionState, MyAvatar};
use vworld_rust::SceneCoordinator;

const ALICE_MODEL: &str = "https://assets.example.com/avatars/alice.glb";
const ROBOT_MODEL: &str = "https://assets.example.com/avatars/robot.glb";

struct Harness {
    loader: Arc<MemoryAssetLoader>,
    domain: Rc<LocalDomain>,
    connection: DomainConnection,
    scene: SceneCoordinator,
}

impl Harness {
    fn new() -> Self {
        let settings = ViewerSettings::default();
        let loader = Arc::new(MemoryAssetLoader::new());
        for url in [ALICE_MODEL, ROBOT_MODEL, settings.avatar.default_avatar_url.as_str()] {
            loader.add_model(url, &[("idle02", true), ("walk_fwd", true)]);
        }

        let domain = Rc::new(LocalDomain::new("wss://domain.example.com:40102"));
        let connection = DomainConnection::new(domain.clone());
        let scene = SceneCoordinator::new(
            1,
            settings,
            connection.state_changed(),
            loader.clone(),
            Rc::new(MemoryShapeFactory::new()),
        );

        Self {
            loader,
            domain,
            connection,
            scene,
        }
    }

    fn add_avatar(&self, avatar: LocalAvatar) -> (Uuid, Rc<LocalAvatar>) {
        let id = Uuid::new_v4();
        let avatar = Rc::new(avatar);
        self.domain.avatars().add(id, avatar.clone());
        (id, avatar)
    }

    fn mesh_name(id: &Uuid) -> String {
        format!("ScriptAvatar_{}", id)
    }
}

#[tokio::test]
async fn test_connect_mirrors_existing_avatars() {
    let mut h = Harness::new();
    let alice_id = Uuid::new_v4();
    let alice = Rc::new(
        LocalAvatar::new("alice")
            .with_skeleton_model_url(ALICE_MODEL)
            .with_transform(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.5)),
    );
    h.domain.avatars().insert_silent(alice_id, alice.clone());

    h.connection.connect();
    h.scene.wait_for_pending_loads().await;

    assert!(h.scene.is_connected());
    assert_eq!(h.scene.connected_domain().as_deref(), Some("wss://domain.example.com:40102"));
    assert!(h.scene.avatars().has_mirror(&alice_id));

    // Seeded from the remote at construction
    let probe = h.loader.probe_named(&Harness::mesh_name(&alice_id)).unwrap();
    assert_eq!(probe.position(), Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(probe.rotation_quaternion(), Some(Quat::from_rotation_y(0.5)));
    assert_eq!(probe.position_writes(), 1);
    assert_eq!(probe.rotation_writes(), 1);
}

#[tokio::test]
async fn test_unchanged_transform_is_not_rewritten() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (id, _alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.scene.wait_for_pending_loads().await;

    let probe = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();
    for _ in 0..5 {
        h.scene.render_frame();
    }

    assert_eq!(probe.position_writes(), 1);
    assert_eq!(probe.rotation_writes(), 1);
}

#[tokio::test]
async fn test_only_changed_components_are_written() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (id, alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.scene.wait_for_pending_loads().await;
    let probe = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();

    alice.set_position(Vec3::new(0.5, 0.0, 0.0));
    h.scene.render_frame();
    h.scene.render_frame();

    assert_eq!(probe.position(), Vec3::new(0.5, 0.0, 0.0));
    assert_eq!(probe.position_writes(), 2);
    assert_eq!(probe.rotation_writes(), 1);

    alice.set_orientation(Quat::from_rotation_z(1.0));
    h.scene.render_frame();

    assert_eq!(probe.position_writes(), 2);
    assert_eq!(probe.rotation_writes(), 2);
    assert_eq!(
        h.scene.avatars().mirror_transform(&id),
        Some((Vec3::new(0.5, 0.0, 0.0), Quat::from_rotation_z(1.0)))
    );
}

#[tokio::test]
async fn test_model_assigned_after_join() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (id, bob) = h.add_avatar(LocalAvatar::new("bob"));
    h.scene.render_frame();

    assert!(h.scene.avatars().is_tracked(&id));
    assert!(!h.scene.avatars().has_mirror(&id));
    assert!(h.loader.probes().is_empty());

    bob.set_skeleton_model_url(ROBOT_MODEL);
    h.scene.wait_for_pending_loads().await;

    assert!(h.scene.avatars().has_mirror(&id));
    assert_eq!(h.loader.load_count(ROBOT_MODEL), 1);
}

#[tokio::test]
async fn test_model_change_keeps_one_mirror() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (id, alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.scene.wait_for_pending_loads().await;
    let first = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();

    alice.set_skeleton_model_url(ROBOT_MODEL);
    h.scene.wait_for_pending_loads().await;

    assert!(first.is_disposed());
    assert_eq!(h.scene.avatars().mirror_count(), 1);

    let name = Harness::mesh_name(&id);
    let live: Vec<_> = h
        .loader
        .probes()
        .into_iter()
        .filter(|probe| probe.snapshot().name == name && !probe.is_disposed())
        .collect();
    assert_eq!(live.len(), 1);
}

#[tokio::test]
async fn test_failed_load_leaves_no_mirror() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (id, _ghost) = h.add_avatar(
        LocalAvatar::new("ghost").with_skeleton_model_url("https://assets.example.com/avatars/missing.glb"),
    );
    h.scene.wait_for_pending_loads().await;

    assert!(h.scene.avatars().is_tracked(&id));
    assert!(!h.scene.avatars().has_mirror(&id));
    assert_eq!(h.scene.avatars().in_flight(), 0);
}

#[tokio::test]
async fn test_removed_before_load_completes() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    h.loader.gate(ALICE_MODEL);
    let (id, _alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.scene.render_frame();
    tokio::task::yield_now().await;
    assert_eq!(h.scene.avatars().in_flight(), 1);

    h.domain.avatars().remove(&id);
    h.scene.render_frame();
    assert!(!h.scene.avatars().is_tracked(&id));

    h.loader.release(ALICE_MODEL);
    h.scene.wait_for_pending_loads().await;

    assert!(!h.scene.avatars().has_mirror(&id));
    assert_eq!(h.scene.avatars().mirror_count(), 0);
    let orphan = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();
    assert!(orphan.is_disposed());
}

#[tokio::test]
async fn test_remove_unknown_session_is_harmless() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (id, _alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.scene.wait_for_pending_loads().await;

    h.domain.avatars().avatar_removed().emit(&Uuid::new_v4());
    h.scene.render_frame();

    assert!(h.scene.avatars().has_mirror(&id));
}

#[tokio::test]
async fn test_local_user_is_never_mirrored() {
    let mut h = Harness::new();
    h.domain
        .avatars()
        .insert_silent(Uuid::nil(), Rc::new(LocalAvatar::new("me").with_skeleton_model_url(ALICE_MODEL)));

    h.connection.connect();
    h.scene.wait_for_pending_loads().await;

    h.domain
        .avatars()
        .add(Uuid::nil(), Rc::new(LocalAvatar::new("me again").with_skeleton_model_url(ALICE_MODEL)));
    h.scene.wait_for_pending_loads().await;

    assert_eq!(h.scene.avatars().tracked_count(), 0);
    assert_eq!(h.loader.load_count(ALICE_MODEL), 0);
}

#[tokio::test]
async fn test_disconnect_clears_every_mirror() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (alice_id, _alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    let (robot_id, _robot) = h.add_avatar(LocalAvatar::new("robot").with_skeleton_model_url(ROBOT_MODEL));
    h.scene.wait_for_pending_loads().await;
    assert_eq!(h.scene.avatars().mirror_count(), 2);

    h.connection.disconnect("server closed");
    h.scene.render_frame();

    assert!(!h.scene.is_connected());
    assert_eq!(h.scene.avatars().tracked_count(), 0);
    assert!(!h.scene.my_avatar().is_bound());
    for id in [alice_id, robot_id] {
        assert!(h.loader.probe_named(&Harness::mesh_name(&id)).unwrap().is_disposed());
    }

    // Directory notifications after disconnect reach no one
    let (late_id, _late) = h.add_avatar(LocalAvatar::new("late").with_skeleton_model_url(ALICE_MODEL));
    h.scene.render_frame();
    assert!(!h.scene.avatars().is_tracked(&late_id));
}

#[tokio::test]
async fn test_reconnect_tracks_again() {
    let mut h = Harness::new();
    let (id, _alice) = {
        let id = Uuid::new_v4();
        let alice = Rc::new(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
        h.domain.avatars().insert_silent(id, alice.clone());
        (id, alice)
    };

    h.connection.connect();
    h.scene.wait_for_pending_loads().await;
    h.connection.disconnect("");
    h.scene.render_frame();
    assert!(!h.scene.avatars().has_mirror(&id));

    h.connection.connect();
    h.scene.wait_for_pending_loads().await;
    assert!(h.scene.avatars().has_mirror(&id));
    assert_eq!(h.connection.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_local_avatar_gets_default_model_and_publishes_once() {
    let mut h = Harness::new();
    let default_url = h.scene.settings().avatar.default_avatar_url.clone();

    h.connection.connect();
    h.scene.render_frame();

    let my_avatar = h.domain.local_my_avatar().clone();
    assert_eq!(my_avatar.skeleton_model_url(), default_url);
    assert_eq!(my_avatar.transform_writes(), 2);

    h.scene.render_frame();
    assert_eq!(my_avatar.transform_writes(), 2);

    h.scene.set_local_transform(Vec3::new(4.0, 0.0, 4.0), Quat::IDENTITY);
    h.scene.render_frame();
    assert_eq!(my_avatar.position(), Vec3::new(4.0, 0.0, 4.0));
    assert_eq!(my_avatar.transform_writes(), 4);
}

#[tokio::test]
async fn test_environment_and_entities() {
    let mut h = Harness::new();
    let preset = h.scene.settings().scene.preset("space-station").unwrap().clone();
    for file in preset.meshes.iter().chain(&preset.incremental_meshes) {
        h.loader.add_model(&format!("{}{}", preset.root_url, file), &[]);
    }

    assert!(h.scene.load_environment("space-station").await);
    assert!(!h.scene.load_environment("atlantis").await);
    assert_eq!(h.scene.environment().mesh_count(), preset.meshes.len());
    assert_eq!(h.scene.my_avatar().local_transform().0, Vec3::new(0.0, 49.6, 0.0));

    let id = h.scene.add_entity(EntityProps::shape("marker", "sphere")).await.unwrap();
    assert!(h.scene.entities().contains(&id));
    assert!(h.scene.delete_entity_by_name("marker"));

    h.scene.dispose();
    assert_eq!(h.scene.environment().mesh_count(), 0);
    assert!(h.scene.entities().is_empty());
}

#[tokio::test]
async fn test_removed_while_model_change_is_loading() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    let (id, alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.scene.wait_for_pending_loads().await;
    assert!(h.scene.avatars().has_mirror(&id));
    let first = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();

    h.loader.gate(ROBOT_MODEL);
    alice.set_skeleton_model_url(ROBOT_MODEL);
    h.scene.render_frame();
    tokio::task::yield_now().await;

    assert!(first.is_disposed());
    assert!(!h.scene.avatars().has_mirror(&id));
    assert_eq!(h.scene.avatars().in_flight(), 1);

    h.domain.avatars().remove(&id);
    h.scene.render_frame();

    h.loader.release(ROBOT_MODEL);
    h.scene.wait_for_pending_loads().await;

    assert!(!h.scene.avatars().is_tracked(&id));
    assert!(!h.scene.avatars().has_mirror(&id));
    assert_eq!(h.scene.avatars().mirror_count(), 0);
    let robot = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();
    assert!(robot.is_disposed());
}

#[tokio::test]
async fn test_readded_session_is_not_given_an_old_load() {
    let mut h = Harness::new();
    h.connection.connect();
    h.scene.render_frame();

    h.loader.gate(ALICE_MODEL);
    let (id, _alice) = h.add_avatar(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.scene.render_frame();
    tokio::task::yield_now().await;

    h.domain.avatars().remove(&id);
    h.scene.render_frame();

    let missing = "https://assets.example.com/avatars/missing.glb";
    h.domain
        .avatars()
        .add(id, Rc::new(LocalAvatar::new("alice").with_skeleton_model_url(missing)));
    h.scene.render_frame();

    h.loader.release(ALICE_MODEL);
    h.scene.wait_for_pending_loads().await;
    h.scene.render_frame();

    assert!(h.scene.avatars().is_tracked(&id));
    assert!(!h.scene.avatars().has_mirror(&id));
    assert_eq!(h.scene.avatars().mirror_count(), 0);
    assert!(h.loader.probe_named(&Harness::mesh_name(&id)).unwrap().is_disposed());
}

#[tokio::test]
async fn test_reconnect_ignores_load_from_previous_connection() {
    let mut h = Harness::new();
    let id = Uuid::new_v4();
    let alice = Rc::new(LocalAvatar::new("alice").with_skeleton_model_url(ALICE_MODEL));
    h.domain.avatars().insert_silent(id, alice.clone());

    h.loader.gate(ALICE_MODEL);
    h.connection.connect();
    h.scene.render_frame();
    tokio::task::yield_now().await;

    h.connection.disconnect("");
    h.scene.render_frame();

    alice.set_skeleton_model_url(ROBOT_MODEL);
    h.connection.connect();
    while !h.scene.avatars().has_mirror(&id) {
        tokio::task::yield_now().await;
        h.scene.render_frame();
    }
    let robot = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();

    // The load started on the previous connection arrives last
    h.loader.release(ALICE_MODEL);
    h.scene.wait_for_pending_loads().await;
    h.scene.render_frame();

    let late = h.loader.probe_named(&Harness::mesh_name(&id)).unwrap();
    assert!(late.is_disposed());
    assert!(!robot.is_disposed());
    assert_eq!(h.scene.avatars().mirror_count(), 1);
    assert_eq!(h.loader.load_count(ROBOT_MODEL), 1);
}
