use crate::assets::{Mesh, MeshLoader, ModelReference};
use crate::config::EnvironmentPreset;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

type Arrival = (u64, Box<dyn Mesh>);

/// Static environment models of the active scene.
///
/// A preset's `meshes` are loaded before the scene is shown; its
/// `incremental_meshes` are streamed in after the first frame. Meshes that
/// arrive for a preset that has since been replaced are disposed.
pub struct Environment {
    generation: u64,
    preset: Option<String>,
    root_url: String,
    meshes: Vec<Box<dyn Mesh>>,
    pending_incremental: Vec<String>,
    streaming: usize,
    arrivals_rx: UnboundedReceiver<Option<Arrival>>,
    done_tx: UnboundedSender<Option<Arrival>>,
}

impl Environment {
    pub fn new() -> Self {
        let (done_tx, arrivals_rx) = mpsc::unbounded_channel();
        Self {
            generation: 0,
            preset: None,
            root_url: String::new(),
            meshes: Vec::new(),
            pending_incremental: Vec::new(),
            streaming: 0,
            arrivals_rx,
            done_tx,
        }
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn streaming(&self) -> usize {
        self.streaming
    }

    pub fn has_pending_incremental(&self) -> bool {
        !self.pending_incremental.is_empty()
    }

    /// Replace the current environment with `preset`. Returns how many of
    /// its up-front meshes loaded.
    pub async fn load(&mut self, preset: &EnvironmentPreset, loader: Arc<dyn MeshLoader>) -> usize {
        self.clear();
        self.generation += 1;
        self.preset = Some(preset.name.clone());
        self.root_url = preset.root_url.clone();

        info!(preset = %preset.name, meshes = preset.meshes.len(), "loading environment");

        let handles: Vec<_> = preset
            .meshes
            .iter()
            .filter_map(|file| Self::spawn_load(&loader, &self.root_url, file))
            .collect();

        let mut loaded = 0;
        for handle in handles {
            match handle.await {
                Ok(Some(mesh)) => {
                    self.meshes.push(mesh);
                    loaded += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("environment load task failed: {}", e),
            }
        }

        self.pending_incremental = preset.incremental_meshes.clone();
        info!(preset = %preset.name, loaded, "environment loaded");
        loaded
    }

    fn spawn_load(
        loader: &Arc<dyn MeshLoader>,
        root_url: &str,
        file: &str,
    ) -> Option<tokio::task::JoinHandle<Option<Box<dyn Mesh>>>> {
        let full = format!("{}{}", root_url, file);
        let reference = match ModelReference::parse(&full) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(model_url = %full, "skipping environment mesh: {}", e);
                return None;
            }
        };

        let loader = loader.clone();
        let name = file.to_string();
        Some(tokio::spawn(async move {
            match loader.load_model(&name, &reference).await {
                Ok(model) => Some(model.mesh),
                Err(e) => {
                    warn!(model_url = %reference, "environment mesh failed to load: {}", e);
                    None
                }
            }
        }))
    }

    /// Kick off the deferred meshes; their results are picked up by `collect`
    pub fn start_incremental(&mut self, loader: Arc<dyn MeshLoader>) {
        let files = std::mem::take(&mut self.pending_incremental);
        if files.is_empty() {
            return;
        }
        debug!(count = files.len(), "streaming incremental environment meshes");

        for file in files {
            let Some(handle) = Self::spawn_load(&loader, &self.root_url, &file) else {
                continue;
            };
            let generation = self.generation;
            let done = self.done_tx.clone();
            self.streaming += 1;
            tokio::spawn(async move {
                let arrival = handle.await.ok().flatten().map(|mesh| (generation, mesh));
                let _ = done.send(arrival);
            });
        }
    }

    /// Take in streamed meshes that have arrived. Returns how many were kept.
    pub fn collect(&mut self) -> usize {
        let mut kept = 0;
        while let Ok(arrival) = self.arrivals_rx.try_recv() {
            kept += self.accept(arrival);
        }
        kept
    }

    /// Wait for every streamed mesh to arrive
    pub async fn wait_for_streaming(&mut self) -> usize {
        let mut kept = 0;
        while self.streaming > 0 {
            match self.arrivals_rx.recv().await {
                Some(arrival) => kept += self.accept(arrival),
                None => break,
            }
        }
        kept
    }

    fn accept(&mut self, arrival: Option<Arrival>) -> usize {
        self.streaming = self.streaming.saturating_sub(1);
        match arrival {
            Some((generation, mesh)) if generation == self.generation => {
                self.meshes.push(mesh);
                1
            }
            Some((_, mut stale)) => {
                stale.dispose();
                0
            }
            None => 0,
        }
    }

    /// Dispose every environment mesh
    pub fn clear(&mut self) {
        for mut mesh in self.meshes.drain(..) {
            mesh.dispose();
        }
        self.pending_incremental.clear();
        self.preset = None;
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
