use super::animation::AnimationDriver;
use crate::assets::{LoadedModel, Mesh};
use crate::rendering::frame::FrameListener;
use crate::world::{RemoteAvatar, SessionId, Subscription};
use glam::{Quat, Vec3};
use std::rc::Rc;
use tracing::debug;

/// What a single `sync()` wrote to the mesh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub position_written: bool,
    pub orientation_written: bool,
}

impl SyncOutcome {
    pub fn wrote_anything(&self) -> bool {
        self.position_written || self.orientation_written
    }
}

/// Dirty-checked copy of a remote avatar's transform onto a mesh.
///
/// The cache starts at the remote values, which are written to the mesh on
/// construction. After that a component only reaches the mesh when it differs
/// from the last value written. Comparison is exact; NaN and infinities are
/// passed through as-is.
pub struct RemoteTransformMirror {
    remote: Rc<dyn RemoteAvatar>,
    last_position: Vec3,
    last_orientation: Quat,
}

impl RemoteTransformMirror {
    pub fn new(remote: Rc<dyn RemoteAvatar>, mesh: &mut dyn Mesh) -> Self {
        let last_position = remote.position();
        let last_orientation = remote.orientation();

        mesh.set_position(last_position);
        mesh.set_rotation_quaternion(last_orientation);

        Self {
            remote,
            last_position,
            last_orientation,
        }
    }

    pub fn sync(&mut self, mesh: &mut dyn Mesh) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        let position = self.remote.position();
        if position.x != self.last_position.x
            || position.y != self.last_position.y
            || position.z != self.last_position.z
        {
            mesh.set_position(position);
            self.last_position = position;
            outcome.position_written = true;
        }

        let orientation = self.remote.orientation();
        if orientation.x != self.last_orientation.x
            || orientation.y != self.last_orientation.y
            || orientation.z != self.last_orientation.z
            || orientation.w != self.last_orientation.w
        {
            debug!(
                x = orientation.x,
                y = orientation.y,
                z = orientation.z,
                w = orientation.w,
                "remote orientation changed"
            );
            mesh.set_rotation_quaternion(orientation);
            self.last_orientation = orientation;
            outcome.orientation_written = true;
        }

        outcome
    }

    pub fn last_position(&self) -> Vec3 {
        self.last_position
    }

    pub fn last_orientation(&self) -> Quat {
        self.last_orientation
    }
}

/// Local renderable projection of one remote avatar
pub struct RemoteAvatarMirror {
    session_id: SessionId,
    mesh: Box<dyn Mesh>,
    transform: RemoteTransformMirror,
    animation: AnimationDriver,
    idle_state: String,
    disposed: bool,
    subscriptions: Vec<Subscription>,
}

impl RemoteAvatarMirror {
    pub fn new(
        session_id: SessionId,
        remote: Rc<dyn RemoteAvatar>,
        model: LoadedModel,
        idle_state: &str,
        blend_speed: f32,
    ) -> Self {
        let LoadedModel {
            mut mesh,
            animation_groups,
        } = model;

        debug!(
            session_id = %session_id,
            display_name = %remote.display_name(),
            session_display_name = %remote.session_display_name(),
            skeleton_model_url = %remote.skeleton_model_url(),
            "avatar created"
        );
        let position = remote.position();
        let orientation = remote.orientation();
        debug!(
            session_id = %session_id,
            ?position,
            ?orientation,
            "avatar initial transform"
        );

        let subscriptions = Self::watch_names(session_id, &remote);
        let transform = RemoteTransformMirror::new(remote, mesh.as_mut());

        Self {
            session_id,
            mesh,
            transform,
            animation: AnimationDriver::new(animation_groups, blend_speed),
            idle_state: idle_state.to_string(),
            disposed: false,
            subscriptions,
        }
    }

    fn watch_names(session_id: SessionId, remote: &Rc<dyn RemoteAvatar>) -> Vec<Subscription> {
        let display = Rc::downgrade(remote);
        let session_display = Rc::downgrade(remote);

        vec![
            remote.display_name_changed().connect(move |_| {
                if let Some(remote) = display.upgrade() {
                    debug!(session_id = %session_id, display_name = %remote.display_name(), "display name changed");
                }
            }),
            remote.session_display_name_changed().connect(move |_| {
                if let Some(remote) = session_display.upgrade() {
                    debug!(
                        session_id = %session_id,
                        session_display_name = %remote.session_display_name(),
                        "session display name changed"
                    );
                }
            }),
        ]
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn mesh_name(&self) -> &str {
        self.mesh.name()
    }

    pub fn transform(&self) -> &RemoteTransformMirror {
        &self.transform
    }

    pub fn animation(&self) -> &AnimationDriver {
        &self.animation
    }

    pub fn sync(&mut self) -> SyncOutcome {
        self.transform.sync(self.mesh.as_mut())
    }

    /// Per-frame work: transform sync, then the idle clip
    pub fn update(&mut self) -> SyncOutcome {
        if self.disposed {
            return SyncOutcome::default();
        }
        let outcome = self.sync();
        self.animation.play(&self.idle_state);
        self.animation.update();
        outcome
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.subscriptions.clear();
        self.mesh.dispose();
        debug!(session_id = %self.session_id, "avatar mirror disposed");
    }
}

impl FrameListener for RemoteAvatarMirror {
    fn before_render(&mut self) {
        self.update();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::memory::{MemoryAnimationGroup, MemoryMesh};
    use crate::world::memory::LocalAvatar;

    fn remote_at(position: Vec3, orientation: Quat) -> Rc<LocalAvatar> {
        Rc::new(
            LocalAvatar::new("Sara")
                .with_skeleton_model_url("https://assets.example.com/sara.glb")
                .with_transform(position, orientation),
        )
    }

    #[test]
    fn test_construction_seeds_mesh() {
        let p0 = Vec3::new(25.0, 0.0, 30.0);
        let q0 = Quat::from_xyzw(0.0, 1.0, 0.0, 0.0);
        let remote = remote_at(p0, q0);
        let mut mesh = MemoryMesh::new("m");
        let probe = mesh.probe();

        let mirror = RemoteTransformMirror::new(remote, &mut mesh);

        assert_eq!(probe.position(), p0);
        assert_eq!(probe.rotation_quaternion(), Some(q0));
        assert_eq!(mirror.last_position(), p0);
        assert_eq!(mirror.last_orientation(), q0);
    }

    #[test]
    fn test_unchanged_sync_writes_nothing() {
        let remote = remote_at(Vec3::ONE, Quat::IDENTITY);
        let mut mesh = MemoryMesh::new("m");
        let probe = mesh.probe();
        let mut mirror = RemoteTransformMirror::new(remote, &mut mesh);

        assert!(!mirror.sync(&mut mesh).wrote_anything());
        assert!(!mirror.sync(&mut mesh).wrote_anything());
        assert_eq!(probe.position_writes(), 1);
        assert_eq!(probe.rotation_writes(), 1);
    }

    #[test]
    fn test_change_written_once() {
        let remote = remote_at(Vec3::ZERO, Quat::IDENTITY);
        let mut mesh = MemoryMesh::new("m");
        let probe = mesh.probe();
        let mut mirror = RemoteTransformMirror::new(remote.clone(), &mut mesh);

        remote.set_position(Vec3::new(1.0, 0.0, 0.0));
        let first = mirror.sync(&mut mesh);
        let second = mirror.sync(&mut mesh);

        assert!(first.position_written);
        assert!(!first.orientation_written);
        assert!(!second.wrote_anything());
        assert_eq!(probe.position_writes(), 2);
        assert_eq!(probe.rotation_writes(), 1);
        assert_eq!(probe.position(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_orientation_component_change() {
        let remote = remote_at(Vec3::ZERO, Quat::from_xyzw(0.0, 0.0, 0.0, 1.0));
        let mut mesh = MemoryMesh::new("m");
        let mut mirror = RemoteTransformMirror::new(remote.clone(), &mut mesh);

        remote.set_orientation(Quat::from_xyzw(0.0, 0.0, 0.0, -1.0));
        let outcome = mirror.sync(&mut mesh);

        assert!(outcome.orientation_written);
        assert!(!outcome.position_written);
    }

    #[test]
    fn test_non_finite_values_pass_through() {
        let remote = remote_at(Vec3::ZERO, Quat::IDENTITY);
        let mut mesh = MemoryMesh::new("m");
        let probe = mesh.probe();
        let mut mirror = RemoteTransformMirror::new(remote.clone(), &mut mesh);

        remote.set_position(Vec3::new(f32::INFINITY, 0.0, 0.0));
        assert!(mirror.sync(&mut mesh).position_written);
        assert_eq!(probe.position().x, f32::INFINITY);
    }

    #[test]
    fn test_avatar_mirror_plays_idle_and_disposes() {
        let remote = remote_at(Vec3::ZERO, Quat::IDENTITY);
        let mesh = MemoryMesh::new("ScriptAvatar_test");
        let probe = mesh.probe();
        let idle = MemoryAnimationGroup::new("idle02", true);
        let idle_state = idle.state_handle();
        let model = LoadedModel::new(Box::new(mesh)).with_animation_groups(vec![Box::new(idle)]);

        let mut mirror = RemoteAvatarMirror::new(SessionId::new_v4(), remote.clone(), model, "idle02", 0.1);
        assert_eq!(remote.display_name_changed().handler_count(), 1);

        mirror.before_render();
        assert_eq!(mirror.animation().current_state(), Some("idle02"));
        assert!(idle_state.lock().unwrap().playing);

        mirror.dispose();
        assert!(probe.is_disposed());
        assert_eq!(remote.display_name_changed().handler_count(), 0);

        remote.set_position(Vec3::ONE);
        assert!(!mirror.update().wrote_anything());
    }
}
