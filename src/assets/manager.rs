use super::{AssetResult, LoadedModel, Mesh, ModelReference, Shape};
use async_trait::async_trait;

/// Asynchronous model import.
///
/// Called from spawned tasks, possibly for several sessions at once.
#[async_trait]
pub trait MeshLoader: Send + Sync {
    async fn load_model(&self, name: &str, reference: &ModelReference) -> AssetResult<LoadedModel>;
}

/// Synchronous primitive construction
pub trait ShapeFactory {
    fn create_shape(&self, name: &str, shape: Shape) -> Box<dyn Mesh>;
}
