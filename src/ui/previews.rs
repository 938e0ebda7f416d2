/// Preview host backed by iced image handles
///
/// A live handle keeps the decoded image in the renderer's cache; dropping
/// it on release lets iced evict the texture on the next frame.
use std::collections::HashMap;

use iced::widget::image::Handle;
use tracing::warn;

use crate::state::data::ImagePayload;
use crate::state::previews::{PreviewHost, PreviewId};

#[derive(Default)]
pub struct ImageHandleHost {
    next_id: u64,
    live: HashMap<PreviewId, Handle>,
}

impl ImageHandleHost {
    pub fn handle(&self, id: PreviewId) -> Option<&Handle> {
        self.live.get(&id)
    }
}

impl PreviewHost for ImageHandleHost {
    fn create(&mut self, payload: &ImagePayload) -> PreviewId {
        self.next_id += 1;
        let id = PreviewId(self.next_id);
        self.live
            .insert(id, Handle::from_bytes(payload.bytes.to_vec()));
        id
    }

    fn release(&mut self, id: PreviewId) {
        if self.live.remove(&id).is_none() {
            warn!("Preview {:?} released twice or never created", id);
        }
    }
}
