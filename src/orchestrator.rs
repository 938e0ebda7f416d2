/// Sequential try-on runs
///
/// One run submits the garment against every selected model image, one
/// call at a time, and reports progress through a [`RunObserver`]. Calls
/// never overlap, so results arrive in the order the models were given and
/// a failure for one model does not stop the others.
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::inference::{PredictReply, RemoteClient, TryOnInputs, TryOnParams};
use crate::state::data::{ImagePayload, ResultEntry};
use crate::state::view::{RunEvent, RunObserver};

/// Reported when a run is requested without a garment
pub const NO_GARMENT: &str = "Please select a garment image first.";

/// Background shipped inside the binary
const BUNDLED_BACKGROUND: &[u8] = include_bytes!("../assets/default_background.png");
const BUNDLED_BACKGROUND_NAME: &str = "default_background.png";

pub struct Orchestrator {
    client: Arc<RemoteClient>,
    operation: String,
    params: TryOnParams,
    /// Override for the bundled background used when no model is selected
    default_background: Option<PathBuf>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<RemoteClient>,
        operation: impl Into<String>,
        params: TryOnParams,
        default_background: Option<PathBuf>,
    ) -> Self {
        Self {
            client,
            operation: operation.into(),
            params,
            default_background,
        }
    }

    /// Run the garment against every model, or against the default
    /// background when `models` is empty
    pub async fn run<O: RunObserver>(
        &self,
        garment: Option<&ImagePayload>,
        models: &[ImagePayload],
        observer: &mut O,
    ) {
        let Some(garment) = garment else {
            observer.notify(RunEvent::Failed(NO_GARMENT.to_string()));
            return;
        };

        observer.notify(RunEvent::Started);
        info!("▶️  Try-on run for {} against {} model(s)", garment.name, models.len());

        if models.is_empty() {
            self.run_default(garment, observer).await;
        } else {
            for model in models {
                self.run_model(garment, model, observer).await;
            }
        }

        observer.notify(RunEvent::Finished);
        info!("✅ Try-on run finished");
    }

    async fn run_model<O: RunObserver>(
        &self,
        garment: &ImagePayload,
        model: &ImagePayload,
        observer: &mut O,
    ) {
        let inputs = self.inputs(garment, model.clone());

        match self.client.predict(&self.operation, &inputs).await {
            Ok(PredictReply::Data(data)) => match PredictReply::first_url(&data) {
                Some(url) => observer.notify(RunEvent::ResultReady(ResultEntry {
                    name: model.name.clone(),
                    url: url.to_string(),
                })),
                None => {
                    warn!("Unexpected result structure for {}: {:?}", model.name, data);
                    observer.notify(RunEvent::Failed(invalid_structure(&data)));
                }
            },
            Ok(PredictReply::Failure(message)) => {
                warn!("Error for model {}: {}", model.name, message);
                observer.notify(RunEvent::Failed(message));
            }
            Err(e) => {
                error!("Prediction failed for model {}: {}", model.name, e);
                observer.notify(RunEvent::Failed(format!(
                    "Prediction failed for model {}: {}",
                    model.name, e
                )));
            }
        }
    }

    async fn run_default<O: RunObserver>(&self, garment: &ImagePayload, observer: &mut O) {
        let background = match self.load_default_background().await {
            Ok(background) => background,
            Err(e) => {
                error!("Default background unavailable: {}", e);
                observer.notify(RunEvent::Failed(format!("Prediction failed: {}", e)));
                return;
            }
        };

        let inputs = self.inputs(garment, background);
        match self.client.predict(&self.operation, &inputs).await {
            Ok(PredictReply::Data(data)) => match PredictReply::first_url(&data) {
                Some(url) => observer.notify(RunEvent::SingleResult(url.to_string())),
                None => {
                    warn!("Unexpected result structure: {:?}", data);
                    observer.notify(RunEvent::Failed(invalid_structure(&data)));
                }
            },
            Ok(PredictReply::Failure(message)) => observer.notify(RunEvent::Failed(message)),
            Err(e) => {
                error!("Prediction failed: {}", e);
                observer.notify(RunEvent::Failed(format!("Prediction failed: {}", e)));
            }
        }
    }

    async fn load_default_background(&self) -> Result<ImagePayload, String> {
        match &self.default_background {
            Some(path) => ImagePayload::load(path.clone()).await,
            None => ImagePayload::from_bytes(BUNDLED_BACKGROUND_NAME, BUNDLED_BACKGROUND.to_vec()),
        }
    }

    fn inputs(&self, garment: &ImagePayload, background: ImagePayload) -> TryOnInputs {
        TryOnInputs {
            garment: garment.clone(),
            background,
            params: self.params.clone(),
        }
    }
}

fn invalid_structure(data: &[serde_json::Value]) -> String {
    format!(
        "Invalid response structure from Gradio API: {}",
        serde_json::Value::Array(data.to_vec())
    )
}
