/// Presentation helpers
///
/// - Tiles and grids for previews and results (gallery.rs)
/// - Preview host backed by iced image handles (previews.rs)
/// - Run-tagged cache of downloaded results (results.rs)

pub mod gallery;
pub mod previews;
pub mod results;

use iced::futures::channel::mpsc::Sender;
use tracing::warn;

use crate::state::view::{RunEvent, RunObserver};

/// Forward run events into an iced stream
impl RunObserver for Sender<RunEvent> {
    fn notify(&mut self, event: RunEvent) {
        if let Err(e) = self.try_send(event) {
            warn!("Dropped run event: {}", e);
        }
    }
}
