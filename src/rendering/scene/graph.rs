//! Scene entities
//!
//! Entities are standalone meshes added by scripts or the host page: either
//! an engine primitive or a model imported from a URL. They are keyed by id.

use crate::assets::{AssetError, Color3, Mesh, MeshLoader, ModelReference, Shape, ShapeFactory};
use crate::utils::math::{Rgba, Rotation, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Parameters accepted by [`SceneGraph::add_entity`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityProps {
    /// Generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub model_url: Option<String>,
    pub position: Vector3,
    pub rotation: Rotation,
    /// Scaling
    pub dimensions: Vector3,
    #[serde(default)]
    pub color: Option<Rgba>,
}

impl EntityProps {
    pub fn shape(name: impl Into<String>, shape: &str) -> Self {
        Self {
            id: None,
            name: name.into(),
            entity_type: Some("Shape".to_string()),
            shape: Some(shape.to_string()),
            model_url: None,
            position: Vector3::zero(),
            rotation: Rotation::default(),
            dimensions: Vector3::one(),
            color: None,
        }
    }

    pub fn model(name: impl Into<String>, model_url: &str) -> Self {
        Self {
            entity_type: Some("Model".to_string()),
            shape: None,
            model_url: Some(model_url.to_string()),
            ..Self::shape(name, "box")
        }
    }
}

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Failed to specify entity type")]
    MissingType,

    #[error("Attempted to create type Shape with no shape specified")]
    MissingShape,

    #[error("Unknown/unsupported shape type: {0}")]
    UnsupportedShape(String),

    #[error("Attempted to create type Model with no modelUrl specified")]
    MissingModelUrl,

    #[error(transparent)]
    Asset(#[from] AssetError),
}

pub struct SceneGraph {
    entities: HashMap<String, Box<dyn Mesh>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        SceneGraph {
            entities: HashMap::new(),
        }
    }

    /// Create an entity and add it to the scene. Returns its id, or `None`
    /// (after logging why) when it could not be built.
    pub async fn add_entity(
        &mut self,
        mut props: EntityProps,
        shapes: &dyn ShapeFactory,
        loader: &dyn MeshLoader,
    ) -> Option<String> {
        let id = props.id.take().unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut entity = match Self::build(&props, shapes, loader).await {
            Ok(entity) => entity,
            Err(e) => {
                error!(name = %props.name, "Failed to create entity: {}", e);
                return None;
            }
        };

        entity.set_id(&id);
        entity.set_position(props.position.into());
        entity.set_rotation_euler(props.rotation.to_euler());
        entity.set_scaling(props.dimensions.into());
        if let Some(color) = props.color {
            entity.set_emissive_color(Color3::new(color.r, color.g, color.b));
        }

        info!("Successfully created entity: {}", id);
        if let Some(mut replaced) = self.entities.insert(id.clone(), entity) {
            warn!("Entity {} replaced an existing entity with the same id", id);
            replaced.dispose();
        }
        Some(id)
    }

    async fn build(
        props: &EntityProps,
        shapes: &dyn ShapeFactory,
        loader: &dyn MeshLoader,
    ) -> Result<Box<dyn Mesh>, EntityError> {
        match props.entity_type.as_deref() {
            None | Some("") => Err(EntityError::MissingType),
            Some("Shape") => {
                let name = props.shape.as_deref().ok_or(EntityError::MissingShape)?;
                let shape = Shape::from_name(name).ok_or_else(|| EntityError::UnsupportedShape(name.to_string()))?;
                Ok(shapes.create_shape(&props.name, shape))
            }
            Some("Model") => {
                let url = props.model_url.as_deref().ok_or(EntityError::MissingModelUrl)?;
                let reference = ModelReference::parse(url)?;
                let model = loader.load_model(&props.name, &reference).await?;
                Ok(model.mesh)
            }
            Some(other) => {
                error!("Unspecified entity type {}, creating a box. props={:?}", other, props);
                Ok(shapes.create_shape(&props.name, Shape::Box))
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn delete_entity_by_id(&mut self, id: &str) -> bool {
        match self.entities.remove(id) {
            Some(mut entity) => {
                entity.dispose();
                true
            }
            None => {
                error!("Failed to delete entity by ID: {}", id);
                false
            }
        }
    }

    pub fn delete_entity_by_name(&mut self, name: &str) -> bool {
        let id = self
            .entities
            .iter()
            .find(|(_, entity)| entity.name() == name)
            .map(|(id, _)| id.clone());

        match id {
            Some(id) => self.delete_entity_by_id(&id),
            None => {
                error!("Failed to delete entity by name: {}", name);
                false
            }
        }
    }

    /// Dispose every entity
    pub fn clear(&mut self) {
        for (_, mut entity) in self.entities.drain() {
            entity.dispose();
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
