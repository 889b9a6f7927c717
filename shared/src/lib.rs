// lib.rs - upload workflow core for the salient object detection client

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod capabilities;
pub mod config;
pub mod event;
pub mod image_processing;
pub mod model;
pub mod multipart;
pub mod session;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{BackendUrl, Config, ConfigError, ConfigRequest, ResponseOrdering};
pub use crux_core::App as CruxApp;
pub use event::{Event, ProcessOutcome, ProcessedImage};
pub use image_processing::ImageError;
pub use model::Model;
pub use session::{Generation, ImageRef, Session};

pub const APP_TITLE: &str = "Salient Object Detection Using Binary Neural Network";
pub const FILE_FIELD: &str = "file";
pub const DOWNLOAD_FILE_NAME: &str = "sod_output.png";
pub const PROCESSING_LABEL: &str = "Processing...";
pub const PROCESSING_FAILED_MESSAGE: &str = "Something went wrong while processing the image.";
pub const INVALID_INPUT_MESSAGE: &str = "Please choose an image file.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ProcessingFailed,
    InvalidInput,
    Configuration,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ProcessingFailed => "PROCESSING_FAILED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::Configuration => "CONFIGURATION_ERROR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Text shown in the alert. Every processing failure reads the same.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::ProcessingFailed => PROCESSING_FAILED_MESSAGE.into(),
            ErrorKind::InvalidInput => INVALID_INPUT_MESSAGE.into(),
            ErrorKind::Configuration => format!("Invalid configuration: {}", self.message),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// Why a `/process-image` round trip produced no output image.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}")]
    Status { status: u16 },

    #[error("response body was empty")]
    EmptyBody,

    #[error("response body is not an image: {0}")]
    Undecodable(#[from] ImageError),
}

impl From<ProcessingError> for AppError {
    fn from(e: ProcessingError) -> Self {
        AppError::new(ErrorKind::ProcessingFailed, "image processing failed")
            .with_internal(e.to_string())
    }
}

impl From<ImageError> for AppError {
    fn from(e: ImageError) -> Self {
        AppError::new(ErrorKind::InvalidInput, "selected file is not a usable image")
            .with_internal(e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageView {
    pub handle: String,
    pub alt: String,
}

impl ImageView {
    fn new(handle: &ImageRef, alt: impl Into<String>) -> Self {
        Self {
            handle: handle.as_str().to_string(),
            alt: alt.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadView {
    pub handle: String,
    pub file_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputCard {
    pub image: ImageView,
    pub download: DownloadView,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryView {
    pub inputs: Vec<ImageView>,
    pub outputs: Vec<ImageView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub title: String,
    pub input: Option<ImageView>,
    /// Label of the processing card; `None` hides the card.
    pub processing: Option<String>,
    pub output: Option<OutputCard>,
    /// `None` until an input has been superseded.
    pub history: Option<HistoryView>,
    pub backend_url: String,
}

pub mod app {
    use tracing::{debug, info, warn};

    use crate::capabilities::Capabilities;
    use crate::config::{Config, ConfigRequest, ResponseOrdering};
    use crate::event::{Event, ProcessOutcome, ProcessedImage};
    use crate::image_processing::{self, MAX_RESPONSE_BYTES};
    use crate::model::Model;
    use crate::multipart::MultipartForm;
    use crate::session::{Generation, ImageRef, Session};
    use crate::{
        AppError, DownloadView, HistoryView, ImageView, OutputCard, ProcessingError, ViewModel,
        APP_TITLE, DOWNLOAD_FILE_NAME, FILE_FIELD, PROCESSING_LABEL,
    };

    #[derive(Default)]
    pub struct App;

    impl App {
        fn alert(error: &AppError, caps: &Capabilities) {
            caps.alert.show(error.user_facing_message());
        }

        fn release_all(handles: &[ImageRef], caps: &Capabilities) {
            for handle in handles {
                debug!(%handle, "releasing image handle");
                caps.images.release(handle);
            }
        }

        fn configure(request: ConfigRequest, model: &mut Model, caps: &Capabilities) {
            match Config::try_from(request) {
                Ok(config) => {
                    info!(
                        backend_url = %config.backend_url,
                        history_limit = ?config.history_limit,
                        ordering = %config.response_ordering,
                        "configuration applied"
                    );
                    model.config = config;
                }
                Err(e) => {
                    warn!(error = %e, "rejected configuration");
                    Self::alert(&AppError::from(e), caps);
                }
            }
        }

        fn start_upload(file_name: &str, bytes: Vec<u8>, model: &mut Model, caps: &Capabilities) {
            let mime = match image_processing::sniff_upload(&bytes, model.config.max_upload_bytes) {
                Ok(mime) => mime,
                Err(e) => {
                    warn!(file_name, error = %e, "rejected selected file");
                    Self::alert(&AppError::from(e), caps);
                    return;
                }
            };

            let input = ImageRef::mint();
            let evicted = model
                .session
                .begin_upload(input.clone(), model.config.history_limit);
            Self::release_all(&evicted, caps);

            let generation = model.next_generation();
            let form = MultipartForm::new().file(FILE_FIELD, file_name, &mime, &bytes);
            caps.images.register(&input, mime, bytes);
            Self::send_process_request(form, generation, model, caps);
        }

        fn send_process_request(
            form: MultipartForm,
            generation: Generation,
            model: &Model,
            caps: &Capabilities,
        ) {
            let url = model.config.backend_url.process_image_url();
            let content_type = form.content_type();
            let body = form.finish();

            info!(%generation, %url, body_bytes = body.len(), "uploading image");

            // Content-Type goes after the body, which sets its own.
            caps.http
                .post(&url)
                .body_bytes(body)
                .header("Content-Type", content_type.as_str())
                .send(move |result| Event::ProcessImageResponse {
                    generation,
                    outcome: outcome_from_http(result),
                });
        }

        fn finish_upload(
            generation: Generation,
            outcome: ProcessOutcome,
            model: &mut Model,
            caps: &Capabilities,
        ) -> bool {
            if !model.is_latest(generation)
                && model.config.response_ordering == ResponseOrdering::LatestWins
            {
                info!(
                    %generation,
                    latest = %model.generation,
                    "discarding response to superseded upload"
                );
                return false;
            }

            match outcome {
                // Nothing to show it next to once the session has been cleared.
                Ok(_) if model.session.current_input().is_none() => {
                    info!(%generation, "discarding output that arrived after the session ended");
                }
                Ok(ProcessedImage { mime, bytes }) => {
                    let output = ImageRef::mint();
                    info!(%generation, %output, body_bytes = bytes.len(), "image processed");
                    caps.images.register(&output, mime, bytes);
                    if let Some(replaced) = model.session.complete(output) {
                        Self::release_all(&[replaced], caps);
                    }
                }
                Err(e) => {
                    warn!(%generation, error = %e, "image processing failed");
                    Self::alert(&AppError::from(e), caps);
                }
            }

            model.session.finish();
            true
        }

        fn build_history(session: &Session) -> Option<HistoryView> {
            if session.input_history().is_empty() {
                return None;
            }

            let inputs = session
                .input_history()
                .iter()
                .enumerate()
                .map(|(idx, handle)| ImageView::new(handle, format!("prev-input-{idx}")))
                .collect();
            let outputs = session
                .output_history()
                .iter()
                .enumerate()
                .map(|(idx, handle)| ImageView::new(handle, format!("prev-output-{idx}")))
                .collect();

            Some(HistoryView { inputs, outputs })
        }
    }

    pub(crate) fn outcome_from_http(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> ProcessOutcome {
        match result {
            Ok(mut response) => {
                let status = u16::from(response.status());
                outcome_from_parts(status, response.take_body())
            }
            // Error statuses arrive here, not as a response.
            Err(crux_http::Error::Http(e)) => Err(ProcessingError::Status {
                status: u16::from(e.code),
            }),
            Err(e) => Err(ProcessingError::Transport(e.to_string())),
        }
    }

    pub(crate) fn outcome_from_parts(status: u16, body: Option<Vec<u8>>) -> ProcessOutcome {
        if !(200..300).contains(&status) {
            return Err(ProcessingError::Status { status });
        }

        let bytes = body
            .filter(|b| !b.is_empty())
            .ok_or(ProcessingError::EmptyBody)?;
        let info = image_processing::inspect(&bytes, MAX_RESPONSE_BYTES)?;
        debug!(
            status,
            mime = %info.mime,
            width = info.width,
            height = info.height,
            "backend returned an image"
        );

        Ok(ProcessedImage {
            mime: info.mime,
            bytes,
        })
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(event = event.name(), user = event.is_user_initiated(), "update");

            match event {
                Event::Noop => {}

                Event::Configure(request) => {
                    Self::configure(request, model, caps);
                    caps.render.render();
                }

                Event::FileSelected { file_name, bytes } => {
                    Self::start_upload(&file_name, bytes, model, caps);
                    caps.render.render();
                }

                Event::ProcessImageResponse {
                    generation,
                    outcome,
                } => {
                    if Self::finish_upload(generation, outcome, model, caps) {
                        caps.render.render();
                    }
                }

                Event::SessionEnded => {
                    // Responses still in flight belong to the old session.
                    model.next_generation();
                    let handles = model.session.drain();
                    Self::release_all(&handles, caps);
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let session = &model.session;

            let input = session
                .current_input()
                .map(|handle| ImageView::new(handle, "input"));

            let output = session
                .current_input()
                .and(session.current_output())
                .map(|handle| OutputCard {
                    image: ImageView::new(handle, "output"),
                    download: DownloadView {
                        handle: handle.as_str().to_string(),
                        file_name: DOWNLOAD_FILE_NAME.to_string(),
                    },
                });

            ViewModel {
                title: APP_TITLE.to_string(),
                input,
                processing: session
                    .is_processing()
                    .then(|| PROCESSING_LABEL.to_string()),
                output,
                history: Self::build_history(session),
                backend_url: model.config.backend_url.as_str().to_string(),
            }
        }
    }
}
