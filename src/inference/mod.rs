/// Remote inference client
///
/// This module handles:
/// - The request/response contract with the try-on model (mod.rs)
/// - Gradio wire format helpers (protocol.rs)
/// - The HTTP implementation of the contract (gradio.rs)

pub mod gradio;
pub mod protocol;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{InferenceError, Result};
use crate::state::data::ImagePayload;

/// Reported when no connection could be established for a call
pub const CONNECT_FAILURE: &str = "Could not connect to Gradio client";

/// Fixed inference parameters sent with every try-on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryOnParams {
    /// Free-text garment description (`garment_des`)
    pub garment_description: String,
    /// Let the model compute the mask automatically (`is_checked`)
    pub auto_mask: bool,
    /// Crop and resize the person image (`is_checked_crop`)
    pub auto_crop: bool,
    pub denoise_steps: u32,
    /// -1 asks the service for a random seed
    pub seed: i64,
}

impl Default for TryOnParams {
    fn default() -> Self {
        Self {
            garment_description: "Hello!!".to_string(),
            auto_mask: true,
            auto_crop: true,
            denoise_steps: 20,
            seed: -1,
        }
    }
}

/// Named inputs of one try-on call
#[derive(Debug, Clone)]
pub struct TryOnInputs {
    pub garment: ImagePayload,
    /// Person/model image the garment is applied to
    pub background: ImagePayload,
    pub params: TryOnParams,
}

/// Outcome of a call that reached the service
#[derive(Debug, Clone, PartialEq)]
pub enum PredictReply {
    /// Output components, in the order the endpoint declares them
    Data(Vec<Value>),
    /// The service (or the client) refused the call with a message
    Failure(String),
}

impl PredictReply {
    /// URL of the first output element, if it carries one
    pub fn first_url(data: &[Value]) -> Option<&str> {
        data.first()?.get("url")?.as_str()
    }
}

/// Opens connections to an inference endpoint
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn InferenceConnection>>;
}

/// An established connection to an inference endpoint
#[async_trait]
pub trait InferenceConnection: Send + Sync {
    async fn predict(&self, operation: &str, inputs: &TryOnInputs) -> Result<PredictReply>;

    /// Fetch the bytes behind an output URL
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}

/// Process-wide handle to the inference service.
///
/// The connection is created lazily on first use (or eagerly through
/// [`RemoteClient::connect`]) and kept for the lifetime of the client.
pub struct RemoteClient {
    backend: Arc<dyn InferenceBackend>,
    endpoint: String,
    connection: Mutex<Option<Arc<dyn InferenceConnection>>>,
}

impl RemoteClient {
    pub fn new(backend: Arc<dyn InferenceBackend>, endpoint: impl Into<String>) -> Self {
        Self {
            backend,
            endpoint: endpoint.into(),
            connection: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Connect now, replacing any previous connection
    pub async fn connect(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        match self.backend.connect(&self.endpoint).await {
            Ok(conn) => {
                info!("🔌 Connected to inference endpoint {}", self.endpoint);
                *slot = Some(conn);
                Ok(())
            }
            Err(e) => {
                error!("Failed to connect to {}: {}", self.endpoint, e);
                Err(e)
            }
        }
    }

    /// Current connection, or exactly one attempt to create it
    async fn connection(&self) -> Option<Arc<dyn InferenceConnection>> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Some(Arc::clone(conn));
        }

        warn!("Inference client not initialized, reconnecting to {}", self.endpoint);
        match self.backend.connect(&self.endpoint).await {
            Ok(conn) => {
                info!("🔌 Connected to inference endpoint {}", self.endpoint);
                *slot = Some(Arc::clone(&conn));
                Some(conn)
            }
            Err(e) => {
                error!("Reconnect to {} failed: {}", self.endpoint, e);
                None
            }
        }
    }

    pub async fn predict(&self, operation: &str, inputs: &TryOnInputs) -> Result<PredictReply> {
        match self.connection().await {
            Some(conn) => conn.predict(operation, inputs).await,
            None => Ok(PredictReply::Failure(CONNECT_FAILURE.to_string())),
        }
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let conn = self
            .connection()
            .await
            .ok_or_else(|| InferenceError::Connect(CONNECT_FAILURE.to_string()))?;
        conn.download(url).await
    }
}
