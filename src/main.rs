use iced::widget::{button, column, container, row, scrollable, text, Column};
use iced::{Alignment, Color, Element, Length, Task, Theme};
use rfd::FileDialog;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod inference;
mod orchestrator;
mod state;
mod ui;

use crate::config::AppConfig;
use crate::inference::gradio::GradioBackend;
use crate::inference::RemoteClient;
use crate::orchestrator::Orchestrator;
use crate::state::data::ImagePayload;
use crate::state::previews::PreviewManager;
use crate::state::view::{RunEvent, ViewState};
use crate::ui::gallery;
use crate::ui::previews::ImageHandleHost;
use crate::ui::results::ResultImages;

/// Extensions offered by the file pickers
const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "bmp"];

/// Main application state
struct TryOnStudio {
    /// Shared handle to the inference service
    client: Arc<RemoteClient>,
    orchestrator: Arc<Orchestrator>,
    /// Garment and model selections with their previews
    previews: PreviewManager<ImageHandleHost>,
    /// Loading flag, error and results of the last run
    view: ViewState,
    /// Downloaded result images of the current run, keyed by result URL
    result_images: ResultImages,
    /// Connection status line
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    /// User clicked "Select Garment"
    PickGarment,
    GarmentLoaded(Result<ImagePayload, String>),
    RemoveGarment,
    /// User clicked "Select Models"
    PickModels,
    ModelsLoaded(Result<Vec<ImagePayload>, String>),
    RemoveModel(usize),
    /// User clicked "Try On"
    StartPrediction,
    /// Progress of the running orchestration
    Run(RunEvent),
    /// A result download finished; tagged with the run that started it
    ResultFetched(u64, String, Result<Vec<u8>, String>),
    /// Startup connection attempt finished
    Connected(Result<(), String>),
}

impl TryOnStudio {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = AppConfig::load().unwrap_or_else(|e| {
            warn!("Invalid configuration ({}), falling back to defaults", e);
            AppConfig::defaults().expect("Built-in configuration must parse")
        });

        // The app cannot do anything useful without an HTTP client
        let backend = GradioBackend::new(
            config.inference.request_timeout(),
            config.inference.hf_token.clone(),
        )
        .expect("Failed to initialize HTTP client");

        let client = Arc::new(RemoteClient::new(
            Arc::new(backend),
            config.inference.endpoint.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&client),
            config.inference.operation.clone(),
            config.tryon.clone(),
            config.assets.default_background.clone(),
        ));

        info!("👕 Try-On Studio initialized for {}", client.endpoint());
        let status = format!("Connecting to {}...", client.endpoint());

        let connect = {
            let client = Arc::clone(&client);
            Task::perform(
                async move { client.connect().await.map_err(|e| e.to_string()) },
                Message::Connected,
            )
        };

        (
            TryOnStudio {
                client,
                orchestrator,
                previews: PreviewManager::new(ImageHandleHost::default()),
                view: ViewState::default(),
                result_images: ResultImages::default(),
                status,
            },
            connect,
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::PickGarment => {
                let file = FileDialog::new()
                    .set_title("Select Garment Image")
                    .add_filter("Images", &IMAGE_EXTENSIONS)
                    .pick_file();

                match file {
                    Some(path) => Task::perform(ImagePayload::load(path), Message::GarmentLoaded),
                    None => Task::none(),
                }
            }
            Message::GarmentLoaded(Ok(garment)) => {
                self.previews.set_garment(garment);
                self.view.clear_error();
                Task::none()
            }
            Message::RemoveGarment => {
                self.previews.clear_garment();
                Task::none()
            }
            Message::PickModels => {
                let files = FileDialog::new()
                    .set_title("Select Model Images")
                    .add_filter("Images", &IMAGE_EXTENSIONS)
                    .pick_files();

                match files {
                    Some(paths) if !paths.is_empty() => {
                        Task::perform(ImagePayload::load_all(paths), Message::ModelsLoaded)
                    }
                    // An empty selection clears the list, like a file input
                    _ => {
                        self.previews.set_models(Vec::new());
                        Task::none()
                    }
                }
            }
            Message::ModelsLoaded(Ok(models)) => {
                self.previews.set_models(models);
                self.view.clear_error();
                Task::none()
            }
            Message::GarmentLoaded(Err(e)) | Message::ModelsLoaded(Err(e)) => {
                warn!("{}", e);
                self.view.error = Some(e);
                Task::none()
            }
            Message::RemoveModel(index) => {
                self.previews.remove_model_at(index);
                Task::none()
            }
            Message::StartPrediction => self.start_prediction(),
            Message::Run(event) => self.on_run_event(event),
            Message::ResultFetched(run, url, Ok(bytes)) => {
                self.result_images.insert(run, url, bytes);
                Task::none()
            }
            Message::ResultFetched(_, url, Err(e)) => {
                warn!("Could not download {}: {}", url, e);
                Task::none()
            }
            Message::Connected(Ok(())) => {
                self.status = format!("Connected to {}", self.client.endpoint());
                Task::none()
            }
            Message::Connected(Err(e)) => {
                self.status = format!("Not connected ({}). Will retry on the next run.", e);
                Task::none()
            }
        }
    }

    fn start_prediction(&mut self) -> Task<Message> {
        // Re-invocation while a run is in flight is ignored
        if self.view.loading {
            return Task::none();
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let garment = self.previews.garment().cloned();
        let models = self.previews.models().to_vec();
        // Started + one per model + Finished fits without ever blocking
        let capacity = models.len() + 4;

        Task::run(
            iced::stream::channel(capacity, move |mut events| async move {
                orchestrator.run(garment.as_ref(), &models, &mut events).await;
            }),
            Message::Run,
        )
    }

    fn on_run_event(&mut self, event: RunEvent) -> Task<Message> {
        let download = match &event {
            RunEvent::Started => {
                self.result_images.begin_run();
                None
            }
            RunEvent::ResultReady(entry) => Some(entry.url.clone()),
            RunEvent::SingleResult(url) => Some(url.clone()),
            RunEvent::Failed(_) | RunEvent::Finished => None,
        };
        self.view.apply(event);

        match download {
            Some(url) => {
                let client = Arc::clone(&self.client);
                let run = self.result_images.current_run();
                Task::perform(
                    async move {
                        let bytes = client.download(&url).await.map_err(|e| e.to_string());
                        (url, bytes)
                    },
                    move |(url, bytes)| Message::ResultFetched(run, url, bytes),
                )
            }
            None => Task::none(),
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let host = self.previews.host();

        let garment_tile: Element<Message> = match (self.previews.garment(), self.previews.garment_preview()) {
            (Some(garment), Some(id)) => {
                gallery::preview_tile(host.handle(id), &garment.name, Message::RemoveGarment)
            }
            _ => text("No garment selected").size(14).into(),
        };

        let model_tiles: Vec<Element<Message>> = self
            .previews
            .model_previews()
            .iter()
            .zip(self.previews.model_names())
            .enumerate()
            .map(|(index, (id, name))| {
                gallery::preview_tile(host.handle(*id), name, Message::RemoveModel(index))
            })
            .collect();

        let run_label = if self.view.loading { "Generating..." } else { "Try On" };
        let run_button = button(text(run_label).size(18))
            .on_press_maybe((!self.view.loading).then_some(Message::StartPrediction))
            .padding(12);

        let mut content: Column<Message> = column![
            text("Virtual Try-On").size(40),
            text(&self.status).size(14),
            row![
                button("Select Garment").on_press(Message::PickGarment).padding(10),
                button("Select Models").on_press(Message::PickModels).padding(10),
            ]
            .spacing(12),
            text("Garment").size(20),
            garment_tile,
            text(format!("Models ({})", model_tiles.len())).size(20),
            gallery::grid(model_tiles),
            run_button,
        ]
        .spacing(16)
        .padding(32)
        .align_x(Alignment::Start);

        if let Some(error) = &self.view.error {
            content = content.push(text(error).size(14).color(Color::from_rgb(0.9, 0.35, 0.35)));
        }

        if let Some(url) = &self.view.result {
            content = content
                .push(text("Result").size(20))
                .push(gallery::result_tile(self.result_images.get(url), "Default background"));
        }

        if !self.view.results.is_empty() {
            let tiles = self
                .view
                .results
                .iter()
                .map(|entry| gallery::result_tile(self.result_images.get(&entry.url), &entry.name))
                .collect();
            content = content
                .push(text("Results").size(20))
                .push(gallery::grid(tiles));
        }

        container(scrollable(content))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

impl Drop for TryOnStudio {
    fn drop(&mut self) {
        debug!("Releasing {} previews", self.previews.live_previews());
        self.previews.dispose_all();
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tryon_studio=info")),
        )
        .with_target(false)
        .init();
}

fn main() -> iced::Result {
    init_logging();

    iced::application("Try-On Studio", TryOnStudio::update, TryOnStudio::view)
        .theme(TryOnStudio::theme)
        .centered()
        .run_with(TryOnStudio::new)
}
