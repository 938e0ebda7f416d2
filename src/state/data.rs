/// Shared data structures for the application state
///
/// These structs represent the data model that flows between
/// the file pickers, the orchestrator and the UI layer.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageFormat;

/// An in-memory image selected by the user (garment or model)
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    /// Display name, the file name of the source (e.g., "model_01.png")
    pub name: String,
    /// MIME type sniffed from the content
    pub mime: &'static str,
    /// Raw encoded bytes, shared between previews and upload tasks
    pub bytes: Arc<[u8]>,
}

impl ImagePayload {
    /// Build a payload from encoded bytes, rejecting anything that is not
    /// a recognizable image
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, String> {
        let name = name.into();
        let format = image::guess_format(&bytes)
            .map_err(|_| format!("{} is not a supported image", name))?;

        Ok(ImagePayload {
            name,
            mime: format.to_mime_type(),
            bytes: bytes.into(),
        })
    }

    /// Read an image file from disk
    pub async fn load(path: PathBuf) -> Result<Self, String> {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

        Self::from_bytes(display_name(&path), bytes)
    }

    /// Read several image files, preserving input order
    ///
    /// Fails on the first unreadable file so the selection is never partial.
    pub async fn load_all(paths: Vec<PathBuf>) -> Result<Vec<Self>, String> {
        let mut payloads = Vec::with_capacity(paths.len());
        for path in paths {
            payloads.push(Self::load(path).await?);
        }
        Ok(payloads)
    }

    /// File extension matching the sniffed format, used for uploads
    pub fn extension(&self) -> &'static str {
        ImageFormat::from_mime_type(self.mime)
            .and_then(|f| f.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// One successful try-on, in the order the models were submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    /// Display name of the model image used as background
    pub name: String,
    /// Renderable reference to the generated image
    pub url: String,
}
