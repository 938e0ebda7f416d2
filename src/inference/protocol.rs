/// Gradio wire format
///
/// Request payload construction, app config decoding and parsing of the
/// server-sent event stream returned by `/call/{api_name}/{event_id}`.
/// Nothing in here performs I/O.
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::TryOnParams;
use crate::error::{InferenceError, Result};

/// Message used when the service signals an error without details
pub const GENERIC_FAILURE: &str = "Prediction failed";

/// Subset of the app's `/config` document that the client relies on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradioConfig {
    pub version: Option<String>,
    pub protocol: Option<String>,
    /// Public root when the app is served behind a proxy
    #[serde(default)]
    pub root: Option<String>,
    /// `/gradio_api` on Gradio 5, absent on Gradio 4
    #[serde(default)]
    pub api_prefix: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dependency {
    /// Named endpoints carry a string; hidden ones carry `false` or null
    #[serde(default)]
    pub api_name: Value,
}

impl GradioConfig {
    /// Base URL for API calls: root (or the endpoint itself) plus prefix
    pub fn api_base(&self, endpoint: &str) -> String {
        let root = self
            .root
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(endpoint)
            .trim_end_matches('/');
        let prefix = self.api_prefix.as_deref().unwrap_or("").trim_end_matches('/');
        format!("{}{}", root, prefix)
    }

    /// Names of every endpoint exposed through the API, without leading slash
    pub fn api_names(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .filter_map(|d| d.api_name.as_str())
            .map(|name| name.trim_start_matches('/').to_string())
            .collect()
    }
}

/// Reference to a file already uploaded to the app
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileData {
    pub path: String,
    pub orig_name: String,
    pub mime_type: String,
    pub size: usize,
    pub meta: Value,
}

impl FileData {
    pub fn uploaded(path: String, orig_name: &str, mime_type: &str, size: usize) -> Self {
        Self {
            path,
            orig_name: orig_name.to_string(),
            mime_type: mime_type.to_string(),
            size,
            meta: json!({ "_type": "gradio.FileData" }),
        }
    }
}

/// Positional inputs of the `/tryon` endpoint
pub fn tryon_payload(garment: &FileData, background: &FileData, params: &TryOnParams) -> Value {
    json!({
        "data": [
            {
                "background": background,
                "layers": [],
                "composite": null,
            },
            garment,
            params.garment_description,
            params.auto_mask,
            params.auto_crop,
            params.denoise_steps,
            params.seed,
        ]
    })
}

#[derive(Debug, Deserialize)]
pub struct CallStarted {
    pub event_id: String,
}

/// Terminal event of a call stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Complete(Vec<Value>),
    Error(String),
}

/// Find the terminal event in a server-sent event body.
///
/// `generating` and `heartbeat` events are skipped; the first `complete`
/// or `error` event wins.
pub fn parse_event_stream(body: &str) -> Result<StreamOutcome> {
    for block in body.replace("\r\n", "\n").split("\n\n") {
        let mut event = "message";
        let mut data = String::new();

        for line in block.lines() {
            if let Some(rest) = line.strip_prefix("event:") {
                event = rest.trim();
            } else if let Some(rest) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(rest.trim_start());
            }
        }

        match event {
            "complete" => {
                let output: Vec<Value> = serde_json::from_str(&data)?;
                return Ok(StreamOutcome::Complete(output));
            }
            "error" => return Ok(StreamOutcome::Error(error_message(&data))),
            _ => continue,
        }
    }

    Err(InferenceError::Protocol(
        "event stream ended without a result".to_string(),
    ))
}

fn error_message(data: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(msg)) if !msg.is_empty() => msg,
        Ok(Value::Object(obj)) => obj
            .get("message")
            .or_else(|| obj.get("error"))
            .and_then(Value::as_str)
            .unwrap_or(GENERIC_FAILURE)
            .to_string(),
        Ok(_) => GENERIC_FAILURE.to_string(),
        Err(_) if !data.trim().is_empty() => data.trim().to_string(),
        Err(_) => GENERIC_FAILURE.to_string(),
    }
}

/// Give every output file a fetchable `url`
pub fn resolve_urls(data: &mut [Value], base: &str) {
    for item in data.iter_mut() {
        let Some(obj) = item.as_object_mut() else {
            continue;
        };
        if obj.get("url").and_then(Value::as_str).is_some() {
            continue;
        }
        if let Some(path) = obj.get("path").and_then(Value::as_str) {
            let url = format!("{}/file={}", base, path);
            obj.insert("url".to_string(), Value::String(url));
        }
    }
}
