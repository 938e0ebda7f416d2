/// Presentation-facing run state
///
/// The orchestrator never touches this struct directly: it emits
/// [`RunEvent`]s and whoever observes them decides how to apply them.
/// `ViewState` is the canonical observer.
use super::data::ResultEntry;

/// Progress notifications of one orchestration run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// A run began: loading is set, previous outcome is cleared
    Started,
    /// One model finished successfully (Case A)
    ResultReady(ResultEntry),
    /// The default-background call finished successfully (Case B)
    SingleResult(String),
    /// A call failed; replaces any previous error message
    Failed(String),
    /// The run is over, whatever happened
    Finished,
}

/// Receives run events as they happen
pub trait RunObserver {
    fn notify(&mut self, event: RunEvent);
}

/// Fields read by the presentation layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub loading: bool,
    pub error: Option<String>,
    /// Result of a run without model images
    pub result: Option<String>,
    /// Results of a run with model images, in submission order
    pub results: Vec<ResultEntry>,
}

impl ViewState {
    pub fn apply(&mut self, event: RunEvent) {
        match event {
            RunEvent::Started => {
                self.loading = true;
                self.result = None;
                self.results.clear();
                self.error = None;
            }
            RunEvent::ResultReady(entry) => self.results.push(entry),
            RunEvent::SingleResult(url) => self.result = Some(url),
            RunEvent::Failed(message) => self.error = Some(message),
            RunEvent::Finished => self.loading = false,
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

impl RunObserver for ViewState {
    fn notify(&mut self, event: RunEvent) {
        self.apply(event);
    }
}
