use crate::rendering::frame::FrameListener;
use crate::world::MyAvatar;
use glam::{Quat, Vec3};
use std::rc::Rc;
use tracing::{debug, info};

/// Binds the local user's scene avatar to its domain-side representation
/// and publishes the local transform to it.
pub struct MyAvatarController {
    my_avatar: Option<Rc<dyn MyAvatar>>,
    position: Vec3,
    orientation: Quat,
    published: Option<(Vec3, Quat)>,
}

impl MyAvatarController {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            my_avatar: None,
            position,
            orientation,
            published: None,
        }
    }

    /// Attach to the domain's avatar, giving it `default_avatar_url` when it
    /// has no skeleton model yet
    pub fn bind(&mut self, my_avatar: Rc<dyn MyAvatar>, default_avatar_url: &str) {
        if my_avatar.skeleton_model_url().is_empty() {
            info!(default_avatar_url, "assigning default avatar model");
            my_avatar.set_skeleton_model_url(default_avatar_url);
        }
        self.my_avatar = Some(my_avatar);
        self.published = None;
        debug!("local avatar bound to domain");
    }

    pub fn unbind(&mut self) {
        if self.my_avatar.take().is_some() {
            debug!("local avatar unbound from domain");
        }
        self.published = None;
    }

    pub fn is_bound(&self) -> bool {
        self.my_avatar.is_some()
    }

    pub fn set_local_transform(&mut self, position: Vec3, orientation: Quat) {
        self.position = position;
        self.orientation = orientation;
    }

    pub fn local_transform(&self) -> (Vec3, Quat) {
        (self.position, self.orientation)
    }

    /// Push the local transform to the domain if it changed since the last push
    pub fn publish(&mut self) -> bool {
        let Some(my_avatar) = self.my_avatar.as_ref() else {
            return false;
        };

        let current = (self.position, self.orientation);
        if self.published == Some(current) {
            return false;
        }

        my_avatar.set_position(self.position);
        my_avatar.set_orientation(self.orientation);
        self.published = Some(current);
        true
    }
}

impl FrameListener for MyAvatarController {
    fn before_render(&mut self) {
        self.publish();
    }
}
