//! In-memory engine stand-ins
//!
//! `MemoryAssetLoader` serves models from a catalog instead of the network,
//! and every mesh it (or `MemoryShapeFactory`) builds reports what was written
//! to it through a [`MeshProbe`]. Used by the demo binary and the tests.

use super::{
    AnimationGroup, AssetError, AssetResult, Color3, LoadedModel, Mesh, MeshLoader,
    ModelReference, Shape, ShapeFactory,
};
use async_trait::async_trait;
use glam::{Quat, Vec3};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

/// Everything the engine would know about one mesh
#[derive(Debug, Clone, Default)]
pub struct MeshState {
    pub name: String,
    pub id: String,
    pub shape: Option<Shape>,
    pub position: Vec3,
    pub rotation_quaternion: Option<Quat>,
    pub rotation_euler: Vec3,
    pub scaling: Vec3,
    pub emissive_color: Option<Color3>,
    pub position_writes: u32,
    pub rotation_writes: u32,
    pub disposed: bool,
}

/// Shared read handle onto a [`MemoryMesh`]
#[derive(Debug, Clone)]
pub struct MeshProbe {
    state: Arc<Mutex<MeshState>>,
}

impl MeshProbe {
    fn lock(&self) -> MutexGuard<'_, MeshState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> MeshState {
        self.lock().clone()
    }

    pub fn position(&self) -> Vec3 {
        self.lock().position
    }

    pub fn rotation_quaternion(&self) -> Option<Quat> {
        self.lock().rotation_quaternion
    }

    pub fn position_writes(&self) -> u32 {
        self.lock().position_writes
    }

    pub fn rotation_writes(&self) -> u32 {
        self.lock().rotation_writes
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

pub struct MemoryMesh {
    name: String,
    probe: MeshProbe,
}

impl MemoryMesh {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let state = MeshState {
            name: name.clone(),
            scaling: Vec3::ONE,
            ..MeshState::default()
        };
        Self {
            name,
            probe: MeshProbe {
                state: Arc::new(Mutex::new(state)),
            },
        }
    }

    pub fn probe(&self) -> MeshProbe {
        self.probe.clone()
    }
}

impl Mesh for MemoryMesh {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_id(&mut self, id: &str) {
        self.probe.lock().id = id.to_string();
    }

    fn set_position(&mut self, position: Vec3) {
        let mut state = self.probe.lock();
        state.position = position;
        state.position_writes += 1;
    }

    fn set_rotation_quaternion(&mut self, rotation: Quat) {
        let mut state = self.probe.lock();
        state.rotation_quaternion = Some(rotation);
        state.rotation_writes += 1;
    }

    fn set_rotation_euler(&mut self, rotation: Vec3) {
        self.probe.lock().rotation_euler = rotation;
    }

    fn set_scaling(&mut self, scaling: Vec3) {
        self.probe.lock().scaling = scaling;
    }

    fn set_emissive_color(&mut self, color: Color3) {
        self.probe.lock().emissive_color = Some(color);
    }

    fn dispose(&mut self) {
        self.probe.lock().disposed = true;
    }
}

/// Playback state of a [`MemoryAnimationGroup`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipState {
    pub playing: bool,
    pub looping: bool,
    pub weight: f32,
    pub starts: u32,
}

pub struct MemoryAnimationGroup {
    name: String,
    looping: bool,
    state: Arc<Mutex<ClipState>>,
}

impl MemoryAnimationGroup {
    pub fn new(name: impl Into<String>, looping: bool) -> Self {
        Self {
            name: name.into(),
            looping,
            state: Arc::new(Mutex::new(ClipState::default())),
        }
    }

    /// Shared view of the clip's playback state
    pub fn state_handle(&self) -> Arc<Mutex<ClipState>> {
        self.state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ClipState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AnimationGroup for MemoryAnimationGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn looping(&self) -> bool {
        self.looping
    }

    fn start(&mut self, looping: bool) {
        let mut state = self.lock();
        state.playing = true;
        state.looping = looping;
        state.starts += 1;
    }

    fn stop(&mut self) {
        let mut state = self.lock();
        state.playing = false;
        state.weight = 0.0;
    }

    fn set_weight(&mut self, weight: f32) {
        self.lock().weight = weight;
    }
}

#[derive(Debug, Clone, Default)]
struct CatalogEntry {
    clips: Vec<(String, bool)>,
}

#[derive(Default)]
struct LoaderState {
    catalog: HashMap<String, CatalogEntry>,
    gates: HashMap<String, watch::Sender<bool>>,
    probes: Vec<MeshProbe>,
    load_counts: HashMap<String, u32>,
}

/// Catalog-backed [`MeshLoader`]
#[derive(Default)]
pub struct MemoryAssetLoader {
    state: Mutex<LoaderState>,
}

impl MemoryAssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `reference` loadable, with the given animation clips (name, looping)
    pub fn add_model(&self, reference: &str, clips: &[(&str, bool)]) {
        let entry = CatalogEntry {
            clips: clips.iter().map(|(name, looping)| (name.to_string(), *looping)).collect(),
        };
        self.lock().catalog.insert(reference.to_string(), entry);
    }

    /// Hold every load of `reference` until [`release`](Self::release) is called
    pub fn gate(&self, reference: &str) {
        let (tx, _rx) = watch::channel(false);
        self.lock().gates.insert(reference.to_string(), tx);
    }

    pub fn release(&self, reference: &str) {
        if let Some(gate) = self.lock().gates.remove(reference) {
            let _ = gate.send(true);
        }
    }

    /// Probes of every mesh built so far, oldest first
    pub fn probes(&self) -> Vec<MeshProbe> {
        self.lock().probes.clone()
    }

    /// Most recently built mesh carrying `name`
    pub fn probe_named(&self, name: &str) -> Option<MeshProbe> {
        self.lock()
            .probes
            .iter()
            .rev()
            .find(|probe| probe.lock().name == name)
            .cloned()
    }

    pub fn load_count(&self, reference: &str) -> u32 {
        self.lock().load_counts.get(reference).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MeshLoader for MemoryAssetLoader {
    async fn load_model(&self, name: &str, reference: &ModelReference) -> AssetResult<LoadedModel> {
        let key = reference.as_str().to_string();
        let gate = {
            let mut state = self.lock();
            *state.load_counts.entry(key.clone()).or_insert(0) += 1;
            state.gates.get(&key).map(|tx| tx.subscribe())
        };

        if let Some(mut gate) = gate {
            debug!(model_url = %key, "load held at gate");
            // A dropped sender means the gate was released
            let _ = gate.wait_for(|open| *open).await;
        }

        let entry = self.lock().catalog.get(&key).cloned();
        let entry = entry.ok_or_else(|| AssetError::NotFound { reference: key.clone() })?;

        let mesh = MemoryMesh::new(name);
        self.lock().probes.push(mesh.probe());

        let groups = entry
            .clips
            .iter()
            .map(|(clip, looping)| {
                Box::new(MemoryAnimationGroup::new(clip.clone(), *looping)) as Box<dyn AnimationGroup>
            })
            .collect();

        Ok(LoadedModel::new(Box::new(mesh)).with_animation_groups(groups))
    }
}

/// [`ShapeFactory`] building [`MemoryMesh`]es
#[derive(Default)]
pub struct MemoryShapeFactory {
    probes: Mutex<Vec<MeshProbe>>,
}

impl MemoryShapeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probes(&self) -> Vec<MeshProbe> {
        self.probes.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

impl ShapeFactory for MemoryShapeFactory {
    fn create_shape(&self, name: &str, shape: Shape) -> Box<dyn Mesh> {
        let mesh = MemoryMesh::new(name);
        mesh.probe.lock().shape = Some(shape);
        self.probes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(mesh.probe());
        Box::new(mesh)
    }
}
