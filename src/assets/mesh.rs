use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a renderable mesh owned by the rendering engine.
///
/// Writes go straight to the engine's transform; every write invalidates the
/// engine's world-matrix cache for that node, so callers avoid redundant ones.
pub trait Mesh: Send {
    fn name(&self) -> &str;
    fn set_id(&mut self, id: &str);
    fn set_position(&mut self, position: Vec3);
    fn set_rotation_quaternion(&mut self, rotation: Quat);
    fn set_rotation_euler(&mut self, rotation: Vec3);
    fn set_scaling(&mut self, scaling: Vec3);
    fn set_emissive_color(&mut self, color: Color3);
    /// Release the engine resources behind this mesh
    fn dispose(&mut self);
}

/// Animation clip group imported alongside a model
pub trait AnimationGroup: Send {
    fn name(&self) -> &str;
    /// Whether the clip is configured to loop
    fn looping(&self) -> bool;
    fn start(&mut self, looping: bool);
    fn stop(&mut self);
    fn set_weight(&mut self, weight: f32);
}

/// Result of a model import
pub struct LoadedModel {
    pub mesh: Box<dyn Mesh>,
    pub animation_groups: Vec<Box<dyn AnimationGroup>>,
}

impl LoadedModel {
    pub fn new(mesh: Box<dyn Mesh>) -> Self {
        Self {
            mesh,
            animation_groups: Vec::new(),
        }
    }

    pub fn with_animation_groups(mut self, groups: Vec<Box<dyn AnimationGroup>>) -> Self {
        self.animation_groups = groups;
        self
    }
}

impl fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModel")
            .field("mesh", &self.mesh.name())
            .field(
                "animation_groups",
                &self.animation_groups.iter().map(|g| g.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// Primitive shapes the engine can build without an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Box,
    Sphere,
    Cylinder,
    Cone,
    Triangle,
}

impl Shape {
    /// Case-insensitive lookup; `None` for unsupported shapes
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "box" => Some(Shape::Box),
            "sphere" => Some(Shape::Sphere),
            "cylinder" => Some(Shape::Cylinder),
            "cone" => Some(Shape::Cone),
            "triangle" => Some(Shape::Triangle),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Box => "box",
            Shape::Sphere => "sphere",
            Shape::Cylinder => "cylinder",
            Shape::Cone => "cone",
            Shape::Triangle => "triangle",
        };
        f.write_str(name)
    }
}
