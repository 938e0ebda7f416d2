/// Application configuration
///
/// Sources, later ones winning:
/// 1. built-in defaults (`config/default.toml`)
/// 2. user file in the platform config dir:
///    - Linux: ~/.config/tryon-studio/config.toml
///    - macOS: ~/Library/Application Support/tryon-studio/config.toml
///    - Windows: %APPDATA%\tryon-studio\config.toml
/// 3. environment variables, e.g. `TRYON__INFERENCE__ENDPOINT`
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::inference::TryOnParams;

const DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub inference: InferenceSettings,
    pub tryon: TryOnParams,
    #[serde(default)]
    pub assets: AssetSettings,
}

/// Where and how to reach the model
#[derive(Debug, Clone, Deserialize)]
pub struct InferenceSettings {
    /// Base URL of the Gradio app
    pub endpoint: String,
    /// Named endpoint invoked for every try-on
    pub operation: String,
    pub request_timeout_secs: u64,
    /// Sent as a bearer token, needed for private Spaces
    #[serde(default)]
    pub hf_token: Option<String>,
}

impl InferenceSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetSettings {
    /// Background used when no model image is selected. The bundled image
    /// is used when unset.
    #[serde(default)]
    pub default_background: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, ::config::ConfigError> {
        Self::load_from(Self::user_config_path().as_deref())
    }

    /// Load with an explicit user file (missing files are skipped)
    pub fn load_from(user_file: Option<&Path>) -> Result<Self, ::config::ConfigError> {
        let mut builder = ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml));

        if let Some(path) = user_file {
            builder = builder.add_source(::config::File::from(path).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("TRYON")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Built-in defaults only
    pub fn defaults() -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn user_config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("tryon-studio");
        path.push("config.toml");
        Some(path)
    }
}
