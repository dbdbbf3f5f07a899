//! HTTP model fetching
//!
//! Fetches model bytes from the asset server and hands them to the engine's
//! importer. Decoding glTF and friends stays on the engine side of
//! [`ModelDecoder`].

use super::{AssetError, AssetResult, LoadedModel, MeshLoader, ModelReference};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

/// Engine-side import of fetched model bytes
pub trait ModelDecoder: Send + Sync {
    fn decode(&self, name: &str, reference: &ModelReference, data: Bytes) -> AssetResult<LoadedModel>;
}

pub struct HttpMeshLoader<D> {
    client: reqwest::Client,
    decoder: D,
}

impl<D: ModelDecoder> HttpMeshLoader<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            client: reqwest::Client::new(),
            decoder,
        }
    }

    /// Use a preconfigured client (proxy, TLS roots)
    pub fn with_client(client: reqwest::Client, decoder: D) -> Self {
        Self { client, decoder }
    }

    async fn fetch(&self, reference: &ModelReference) -> AssetResult<Bytes> {
        let transport = |e: reqwest::Error| AssetError::Transport {
            reference: reference.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(reference.url().clone())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                reference: reference.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(transport)
    }
}

#[async_trait]
impl<D: ModelDecoder> MeshLoader for HttpMeshLoader<D> {
    async fn load_model(&self, name: &str, reference: &ModelReference) -> AssetResult<LoadedModel> {
        debug!(model_url = %reference, root = reference.root_url(), file = reference.file_name(), "fetching model");

        let data = self.fetch(reference).await?;
        info!(model_url = %reference, bytes = data.len(), "model fetched");

        self.decoder.decode(name, reference, data)
    }
}
