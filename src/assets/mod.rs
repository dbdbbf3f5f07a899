pub mod http;
pub mod manager;
pub mod memory;
pub mod mesh;

pub use manager::{MeshLoader, ShapeFactory};
pub use mesh::{AnimationGroup, Color3, LoadedModel, Mesh, Shape};

use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum AssetError {
    #[error("Invalid model reference {reference}: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("Asset not found: {reference}")]
    NotFound { reference: String },

    #[error("Asset server returned {status} for {reference}")]
    Status { reference: String, status: u16 },

    #[error("Transport error for {reference}: {reason}")]
    Transport { reference: String, reason: String },

    #[error("Failed to decode {reference}: {reason}")]
    Decode { reference: String, reason: String },
}

pub type AssetResult<T> = Result<T, AssetError>;

/// Parsed model URL, split the way scene loaders want it: a root to resolve
/// sibling resources against plus the file to import
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelReference {
    url: Url,
}

impl ModelReference {
    pub fn parse(reference: &str) -> AssetResult<Self> {
        let url = Url::parse(reference).map_err(|e| AssetError::InvalidReference {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(AssetError::InvalidReference {
                reference: reference.to_string(),
                reason: "not a hierarchical URL".to_string(),
            });
        }

        Ok(Self { url })
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Everything up to and including the last `/`
    pub fn root_url(&self) -> &str {
        let full = self.url.as_str();
        match full.rfind('/') {
            Some(idx) => &full[..=idx],
            None => full,
        }
    }

    pub fn file_name(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
    }
}

impl fmt::Display for ModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
