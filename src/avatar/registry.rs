//! Remote avatar lifecycle
//!
//! Maps session ids to their local mirrors. A session is *tracked* from the
//! moment the directory reports it until it is removed or the domain
//! disconnects; a tracked session is *mirrored* once its skeleton model has
//! loaded.
//!
//! Model loads run on the tokio runtime and report back over a channel. Each
//! load carries a generation drawn from a registry-wide counter that only
//! grows. A change or removal replaces or drops the session's generation, so
//! a completion whose generation is no longer current is discarded instead
//! of inserted, even if the same session id has been tracked again since.

use super::mirror::RemoteAvatarMirror;
use crate::assets::{AssetResult, LoadedModel, MeshLoader, ModelReference};
use crate::config::AvatarSettings;
use crate::rendering::frame::{FrameLoop, ListenerId};
use crate::world::{RemoteAvatar, SceneEvent, SessionId, Subscription};
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

/// Outcome of one spawned model load
pub struct LoadCompletion {
    pub session_id: SessionId,
    pub generation: u64,
    pub model_url: String,
    pub result: AssetResult<LoadedModel>,
}

impl fmt::Debug for LoadCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCompletion")
            .field("session_id", &self.session_id)
            .field("generation", &self.generation)
            .field("model_url", &self.model_url)
            .field("ok", &self.result.is_ok())
            .finish()
    }
}

struct MirrorSlot {
    mirror: Rc<RefCell<RemoteAvatarMirror>>,
    listener: ListenerId,
}

impl MirrorSlot {
    fn dispose(self, frames: &mut FrameLoop) {
        frames.unregister_before_render(self.listener);
        self.mirror.borrow_mut().dispose();
    }
}

struct TrackedSession {
    avatar: Rc<dyn RemoteAvatar>,
    generation: u64,
    mirror: Option<MirrorSlot>,
    _model_changed: Subscription,
}

pub struct AvatarLifecycleRegistry {
    sessions: HashMap<SessionId, TrackedSession>,
    loader: Arc<dyn MeshLoader>,
    events: UnboundedSender<SceneEvent>,
    completions_tx: UnboundedSender<LoadCompletion>,
    completions_rx: UnboundedReceiver<LoadCompletion>,
    in_flight: usize,
    next_generation: u64,
    idle_state: String,
    blend_speed: f32,
}

impl AvatarLifecycleRegistry {
    /// `events` receives the skeleton-model-changed notifications of every
    /// tracked session
    pub fn new(loader: Arc<dyn MeshLoader>, events: UnboundedSender<SceneEvent>, settings: &AvatarSettings) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            sessions: HashMap::new(),
            loader,
            events,
            completions_tx,
            completions_rx,
            in_flight: 0,
            next_generation: 0,
            idle_state: settings.idle_state.clone(),
            blend_speed: settings.blend_speed,
        }
    }

    /// Start following a session. The nil id (local user) and ids already
    /// tracked are ignored. If the session already names a model it is
    /// loaded right away, otherwise the mirror waits for the first change.
    pub fn track(&mut self, session_id: SessionId, avatar: Rc<dyn RemoteAvatar>) -> bool {
        if session_id.is_nil() {
            debug!("skipping local user session");
            return false;
        }
        if self.sessions.contains_key(&session_id) {
            debug!(session_id = %session_id, "session already tracked");
            return false;
        }

        let events = self.events.clone();
        let model_changed = avatar.skeleton_model_url_changed().connect(move |_| {
            let _ = events.send(SceneEvent::SkeletonModelChanged(session_id));
        });

        let model_url = avatar.skeleton_model_url();
        self.sessions.insert(
            session_id,
            TrackedSession {
                avatar,
                generation: 0,
                mirror: None,
                _model_changed: model_changed,
            },
        );
        info!(session_id = %session_id, "tracking remote avatar");

        if !model_url.is_empty() {
            if let Some(session) = self.sessions.get_mut(&session_id) {
                self.next_generation += 1;
                session.generation = self.next_generation;
                let generation = session.generation;
                self.start_load(session_id, generation, model_url);
            }
        }
        true
    }

    /// The session's skeleton model changed: drop the current mirror and load
    /// the new model. The session has no mirror until that load lands.
    pub fn skeleton_model_changed(&mut self, session_id: SessionId, frames: &mut FrameLoop) {
        let Some(session) = self.sessions.get_mut(&session_id) else {
            warn!(session_id = %session_id, "skeleton model change for untracked session");
            return;
        };

        let model_url = session.avatar.skeleton_model_url();
        debug!(session_id = %session_id, model_url = %model_url, "skeleton model changed");

        if let Some(slot) = session.mirror.take() {
            slot.dispose(frames);
        }
        self.next_generation += 1;
        session.generation = self.next_generation;
        let generation = session.generation;

        if !model_url.is_empty() {
            self.start_load(session_id, generation, model_url);
        }
    }

    /// Forget a session; any load still in flight for it is discarded on arrival
    pub fn remove(&mut self, session_id: SessionId, frames: &mut FrameLoop) -> bool {
        match self.sessions.remove(&session_id) {
            Some(session) => {
                if let Some(slot) = session.mirror {
                    slot.dispose(frames);
                }
                info!(session_id = %session_id, "remote avatar removed");
                true
            }
            None => {
                error!(session_id = %session_id, "Failed to remove avatar: unknown session");
                false
            }
        }
    }

    /// Drop every session. Returns how many were tracked.
    pub fn clear(&mut self, frames: &mut FrameLoop) -> usize {
        let count = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            if let Some(slot) = session.mirror {
                slot.dispose(frames);
            }
        }
        if count > 0 {
            info!(count, "cleared remote avatars");
        }
        count
    }

    fn start_load(&mut self, session_id: SessionId, generation: u64, model_url: String) {
        let reference = match ModelReference::parse(&model_url) {
            Ok(reference) => reference,
            Err(e) => {
                error!(session_id = %session_id, model_url = %model_url, error = %e, "fail to load mesh");
                return;
            }
        };

        self.in_flight += 1;
        let loader = self.loader.clone();
        let tx = self.completions_tx.clone();
        let name = format!("ScriptAvatar_{}", session_id);

        debug!(session_id = %session_id, model_url = %model_url, generation, "loading avatar model");
        tokio::spawn(async move {
            let result = loader.load_model(&name, &reference).await;
            let _ = tx.send(LoadCompletion {
                session_id,
                generation,
                model_url,
                result,
            });
        });
    }

    /// Apply a finished load. Inserts a mirror only when the session is still
    /// tracked and no newer change superseded this load.
    pub fn complete_load(&mut self, completion: LoadCompletion, frames: &mut FrameLoop) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);
        let LoadCompletion {
            session_id,
            generation,
            model_url,
            result,
        } = completion;

        let current = self
            .sessions
            .get(&session_id)
            .map(|session| session.generation == generation)
            .unwrap_or(false);

        if !current {
            debug!(session_id = %session_id, model_url = %model_url, generation, "discarding stale avatar load");
            if let Ok(mut model) = result {
                model.mesh.dispose();
            }
            return false;
        }

        let Some(session) = self.sessions.get_mut(&session_id) else {
            return false;
        };

        // The current load decides the mirror, whether it succeeded or not
        if let Some(stale) = session.mirror.take() {
            stale.dispose(frames);
        }

        let model = match result {
            Ok(model) => model,
            Err(e) => {
                error!(session_id = %session_id, model_url = %model_url, error = %e, "fail to load mesh");
                return false;
            }
        };

        let mirror = Rc::new(RefCell::new(RemoteAvatarMirror::new(
            session_id,
            session.avatar.clone(),
            model,
            &self.idle_state,
            self.blend_speed,
        )));
        let listener = frames.register_before_render(mirror.clone());
        session.mirror = Some(MirrorSlot { mirror, listener });

        info!(session_id = %session_id, model_url = %model_url, "avatar mirror created");
        true
    }

    /// Apply every load that has already finished, without waiting
    pub fn apply_completions(&mut self, frames: &mut FrameLoop) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.complete_load(completion, frames);
            applied += 1;
        }
        applied
    }

    /// Wait for every in-flight load and apply it
    pub async fn wait_for_pending_loads(&mut self, frames: &mut FrameLoop) {
        while self.in_flight > 0 {
            match self.completions_rx.recv().await {
                Some(completion) => {
                    self.complete_load(completion, frames);
                }
                None => break,
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_tracked(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn tracked_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_mirror(&self, session_id: &SessionId) -> bool {
        self.sessions
            .get(session_id)
            .map(|session| session.mirror.is_some())
            .unwrap_or(false)
    }

    pub fn mirror_count(&self) -> usize {
        self.sessions.values().filter(|session| session.mirror.is_some()).count()
    }

    /// Last transform written to the session's mesh
    pub fn mirror_transform(&self, session_id: &SessionId) -> Option<(Vec3, Quat)> {
        let slot = self.sessions.get(session_id)?.mirror.as_ref()?;
        let mirror = slot.mirror.borrow();
        Some((mirror.transform().last_position(), mirror.transform().last_orientation()))
    }

    pub fn mirrored_sessions(&self) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, session)| session.mirror.is_some())
            .map(|(id, _)| *id)
            .collect()
    }
}
