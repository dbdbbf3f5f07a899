//! The active scene
//!
//! `SceneCoordinator` owns everything that lives in one scene: the frame
//! loop, the remote avatar registry, the local user's controller, entities,
//! and the environment. It reacts to connection-state changes of the domain
//! it was handed at construction.

pub mod environment;
pub mod graph;

pub use environment::Environment;
pub use graph::{EntityError, EntityProps, SceneGraph};

use crate::assets::{MeshLoader, ShapeFactory};
use crate::avatar::{AvatarLifecycleRegistry, MyAvatarController};
use crate::config::ViewerSettings;
use crate::rendering::frame::{FrameLoop, ListenerId};
use crate::world::{
    AvatarList, ConnectionState, Domain, DomainStateChange, SceneEvent, SessionId, Signal, Subscription,
};
use glam::{Quat, Vec3};
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Per-connection state, dropped (with its subscriptions) on disconnect
struct DomainSession {
    domain: Rc<dyn Domain>,
    avatar_list: Option<Rc<dyn AvatarList>>,
    _subscriptions: Vec<Subscription>,
}

pub struct SceneCoordinator {
    scene_id: u32,
    settings: ViewerSettings,
    loader: Arc<dyn MeshLoader>,
    shapes: Rc<dyn ShapeFactory>,
    frames: FrameLoop,
    avatars: AvatarLifecycleRegistry,
    my_avatar: Rc<RefCell<MyAvatarController>>,
    my_avatar_listener: ListenerId,
    entities: SceneGraph,
    environment: Environment,
    events_tx: UnboundedSender<SceneEvent>,
    events_rx: UnboundedReceiver<SceneEvent>,
    session: Option<DomainSession>,
    _connection: Subscription,
}

impl SceneCoordinator {
    pub fn new(
        scene_id: u32,
        settings: ViewerSettings,
        connection_events: &Signal<DomainStateChange>,
        loader: Arc<dyn MeshLoader>,
        shapes: Rc<dyn ShapeFactory>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let forward = events_tx.clone();
        let connection = connection_events.connect(move |change: &DomainStateChange| {
            let _ = forward.send(SceneEvent::DomainStateChanged(change.clone()));
        });

        let mut frames = FrameLoop::new();
        let my_avatar = Rc::new(RefCell::new(MyAvatarController::new(Vec3::ZERO, Quat::IDENTITY)));
        let my_avatar_listener = frames.register_before_render(my_avatar.clone());

        let avatars = AvatarLifecycleRegistry::new(loader.clone(), events_tx.clone(), &settings.avatar);

        Self {
            scene_id,
            settings,
            loader,
            shapes,
            frames,
            avatars,
            my_avatar,
            my_avatar_listener,
            entities: SceneGraph::new(),
            environment: Environment::new(),
            events_tx,
            events_rx,
            session: None,
            _connection: connection,
        }
    }

    pub fn scene_id(&self) -> u32 {
        self.scene_id
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn avatars(&self) -> &AvatarLifecycleRegistry {
        &self.avatars
    }

    pub fn my_avatar(&self) -> Ref<'_, MyAvatarController> {
        self.my_avatar.borrow()
    }

    pub fn set_local_transform(&mut self, position: Vec3, orientation: Quat) {
        self.my_avatar.borrow_mut().set_local_transform(position, orientation);
    }

    pub fn entities(&self) -> &SceneGraph {
        &self.entities
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn connected_domain(&self) -> Option<String> {
        self.session.as_ref().map(|session| session.domain.url())
    }

    /// One rendered frame: apply queued notifications and finished loads,
    /// then run every before-render listener
    pub fn render_frame(&mut self) {
        self.pump_events();
        self.avatars.apply_completions(&mut self.frames);

        if self.environment.has_pending_incremental() {
            self.environment.start_incremental(self.loader.clone());
        }
        self.environment.collect();

        self.frames.render_frame();
    }

    /// Apply queued notifications, then wait for every in-flight avatar load
    pub async fn wait_for_pending_loads(&mut self) {
        self.pump_events();
        self.avatars.wait_for_pending_loads(&mut self.frames).await;
    }

    pub fn pump_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    fn handle_event(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::DomainStateChanged(change) => self.handle_domain_state_change(change),
            SceneEvent::AvatarAdded(session_id) => self.handle_avatar_added(session_id),
            SceneEvent::AvatarRemoved(session_id) => {
                debug!(session_id = %session_id, "avatar removed");
                self.avatars.remove(session_id, &mut self.frames);
            }
            SceneEvent::SkeletonModelChanged(session_id) => {
                self.avatars.skeleton_model_changed(session_id, &mut self.frames);
            }
        }
    }

    fn handle_domain_state_change(&mut self, change: DomainStateChange) {
        match change.state {
            ConnectionState::Connected => {
                debug!(domain = %change.domain.url(), "domain state change: CONNECTED");
                self.handle_connected(change.domain);
            }
            ConnectionState::Disconnected => {
                debug!(domain = %change.domain.url(), info = %change.info, "domain state change: {}", change.state);
                self.handle_disconnected();
            }
            other => {
                debug!(domain = %change.domain.url(), info = %change.info, "domain state change: {}", other);
            }
        }
    }

    fn handle_connected(&mut self, domain: Rc<dyn Domain>) {
        if self.session.is_some() {
            warn!("connected while a previous domain session is still active; tearing it down");
            self.handle_disconnected();
        }

        if let Some(session_id) = domain.session_id() {
            debug!(session_id = %session_id, "local session");
        }

        if let Some(my_avatar) = domain.my_avatar() {
            self.my_avatar
                .borrow_mut()
                .bind(my_avatar, &self.settings.avatar.default_avatar_url);
        }

        let avatar_list = domain.avatar_list();
        let mut subscriptions = Vec::new();
        if let Some(list) = avatar_list.as_ref() {
            let added = self.events_tx.clone();
            subscriptions.push(list.avatar_added().connect(move |id: &SessionId| {
                let _ = added.send(SceneEvent::AvatarAdded(*id));
            }));
            let removed = self.events_tx.clone();
            subscriptions.push(list.avatar_removed().connect(move |id: &SessionId| {
                let _ = removed.send(SceneEvent::AvatarRemoved(*id));
            }));
        }

        self.session = Some(DomainSession {
            domain,
            avatar_list: avatar_list.clone(),
            _subscriptions: subscriptions,
        });

        if let Some(list) = avatar_list {
            for session_id in list.avatar_ids() {
                // The nil id is the local user
                if !session_id.is_nil() {
                    self.handle_avatar_added(session_id);
                }
            }
        }
        info!(scene = self.scene_id, "domain connected");
    }

    fn handle_disconnected(&mut self) {
        let cleared = self.avatars.clear(&mut self.frames);
        self.session = None;
        self.my_avatar.borrow_mut().unbind();
        info!(scene = self.scene_id, cleared, "domain disconnected");
    }

    fn handle_avatar_added(&mut self, session_id: SessionId) {
        let Some(list) = self.session.as_ref().and_then(|session| session.avatar_list.clone()) else {
            warn!(session_id = %session_id, "avatar added without a connected avatar list");
            return;
        };

        debug!(session_id = %session_id, "avatar added");
        match list.avatar(&session_id) {
            Some(avatar) => {
                self.avatars.track(session_id, avatar);
            }
            None => warn!(session_id = %session_id, "avatar added but missing from the avatar list"),
        }
    }

    /// Swap in the named environment preset and place the local avatar
    pub async fn load_environment(&mut self, preset_name: &str) -> bool {
        let Some(preset) = self.settings.scene.preset(preset_name).cloned() else {
            warn!(preset = preset_name, "unknown environment preset");
            return false;
        };

        self.environment.load(&preset, self.loader.clone()).await;
        self.my_avatar
            .borrow_mut()
            .set_local_transform(Vec3::from_array(preset.avatar_position), Quat::IDENTITY);
        true
    }

    pub async fn add_entity(&mut self, props: EntityProps) -> Option<String> {
        self.entities
            .add_entity(props, self.shapes.as_ref(), self.loader.as_ref())
            .await
    }

    pub fn delete_entity_by_id(&mut self, id: &str) -> bool {
        self.entities.delete_entity_by_id(id)
    }

    pub fn delete_entity_by_name(&mut self, name: &str) -> bool {
        self.entities.delete_entity_by_name(name)
    }

    /// Release everything the scene holds
    pub fn dispose(&mut self) {
        self.handle_disconnected();
        self.entities.clear();
        self.environment.clear();
        self.frames.unregister_before_render(self.my_avatar_listener);
        info!(scene = self.scene_id, "scene disposed");
    }
}
