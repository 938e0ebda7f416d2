/// Downloaded result images of the current run
///
/// Downloads finish in any order, so each one carries the run it was
/// started for. Bytes from an earlier run are dropped instead of showing
/// up next to the new run's results.
use std::collections::HashMap;

use iced::widget::image::Handle;
use tracing::debug;

#[derive(Default)]
pub struct ResultImages {
    run: u64,
    images: HashMap<String, Handle>,
}

impl ResultImages {
    /// Start a new run, forgetting every image of the previous one
    pub fn begin_run(&mut self) -> u64 {
        self.run += 1;
        self.images.clear();
        self.run
    }

    pub fn current_run(&self) -> u64 {
        self.run
    }

    /// Store a download. Returns false if it belongs to an older run.
    pub fn insert(&mut self, run: u64, url: String, bytes: Vec<u8>) -> bool {
        if run != self.run {
            debug!("Discarding {} from run {} (current run {})", url, run, self.run);
            return false;
        }
        self.images.insert(url, Handle::from_bytes(bytes));
        true
    }

    pub fn get(&self, url: &str) -> Option<&Handle> {
        self.images.get(url)
    }
}
