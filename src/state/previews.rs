/// Preview resource bookkeeping
///
/// Every preview shown in the UI is an ephemeral handle issued by a
/// [`PreviewHost`]. The [`PreviewManager`] is the only component allowed to
/// create or release those handles, and it guarantees each one is released
/// exactly once: on replace, clear, remove, or final disposal.
use super::data::ImagePayload;
use tracing::debug;

/// Opaque id of a live preview issued by a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewId(pub u64);

/// Host-side facility that turns an in-memory image into something
/// renderable, and frees it again
pub trait PreviewHost {
    fn create(&mut self, payload: &ImagePayload) -> PreviewId;
    fn release(&mut self, id: PreviewId);
}

/// Garment + model selections with their preview handles.
///
/// The model selection is kept as three index-aligned lists (payloads,
/// previews, names) that always have the same length.
pub struct PreviewManager<H: PreviewHost> {
    host: H,
    garment: Option<ImagePayload>,
    garment_preview: Option<PreviewId>,
    models: Vec<ImagePayload>,
    model_previews: Vec<PreviewId>,
    model_names: Vec<String>,
}

impl<H: PreviewHost> PreviewManager<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            garment: None,
            garment_preview: None,
            models: Vec::new(),
            model_previews: Vec::new(),
            model_names: Vec::new(),
        }
    }

    /// Replace the garment, releasing the previous preview first
    pub fn set_garment(&mut self, image: ImagePayload) {
        if let Some(old) = self.garment_preview.take() {
            self.host.release(old);
        }

        let id = self.host.create(&image);
        debug!("garment preview {:?} for {}", id, image.name);
        self.garment_preview = Some(id);
        self.garment = Some(image);
    }

    pub fn clear_garment(&mut self) {
        if let Some(old) = self.garment_preview.take() {
            self.host.release(old);
        }
        self.garment = None;
    }

    /// Replace the whole model selection, keeping input order
    pub fn set_models(&mut self, images: Vec<ImagePayload>) {
        self.release_models();

        for image in images {
            let id = self.host.create(&image);
            self.model_previews.push(id);
            self.model_names.push(image.name.clone());
            self.models.push(image);
        }

        debug!("{} model previews created", self.models.len());
        self.check_aligned();
    }

    /// Remove one model; out-of-range indices are ignored
    pub fn remove_model_at(&mut self, index: usize) {
        if index >= self.model_previews.len() {
            return;
        }

        let id = self.model_previews.remove(index);
        self.host.release(id);
        self.models.remove(index);
        self.model_names.remove(index);

        self.check_aligned();
    }

    /// Release every outstanding preview. Safe to call more than once.
    pub fn dispose_all(&mut self) {
        self.clear_garment();
        self.release_models();
    }

    fn release_models(&mut self) {
        for id in self.model_previews.drain(..) {
            self.host.release(id);
        }
        self.models.clear();
        self.model_names.clear();
    }

    fn check_aligned(&self) {
        debug_assert_eq!(self.models.len(), self.model_previews.len());
        debug_assert_eq!(self.models.len(), self.model_names.len());
    }

    pub fn garment(&self) -> Option<&ImagePayload> {
        self.garment.as_ref()
    }

    pub fn garment_preview(&self) -> Option<PreviewId> {
        self.garment_preview
    }

    pub fn models(&self) -> &[ImagePayload] {
        &self.models
    }

    pub fn model_previews(&self) -> &[PreviewId] {
        &self.model_previews
    }

    pub fn model_names(&self) -> &[String] {
        &self.model_names
    }

    /// Number of previews currently held (garment + models)
    pub fn live_previews(&self) -> usize {
        self.garment_preview.iter().count() + self.model_previews.len()
    }

    pub fn host(&self) -> &H {
        &self.host
    }
}
