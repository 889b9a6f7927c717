use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crux_core::Core;
use serde::Serialize;
use shared::capabilities::{AlertOperation, ImageOperation};
use shared::{App, Capabilities, ConfigRequest, Effect, Event, ViewModel, DOWNLOAD_FILE_NAME};
use tracing::{debug, info, warn};

use crate::http::ReqwestExecutor;
use crate::{Result, ShellError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// What happened to one selected file.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UploadReport {
    pub file: PathBuf,
    pub saved_to: Option<PathBuf>,
    pub alerts: Vec<String>,
}

/// Drives the core from the terminal: executes its effects and keeps the
/// bytes behind every image handle it has registered.
pub struct Shell {
    core: Core<Effect, App>,
    http: ReqwestExecutor,
    images: HashMap<String, StoredImage>,
}

impl Shell {
    pub fn new(http: ReqwestExecutor) -> Self {
        Self {
            core: Core::new::<Capabilities>(),
            http,
            images: HashMap::new(),
        }
    }

    pub async fn configure(&mut self, request: ConfigRequest) -> Result<()> {
        let alerts = self.dispatch(Event::Configure(request)).await;
        match alerts.into_iter().next() {
            Some(message) => Err(ShellError::Config(message)),
            None => Ok(()),
        }
    }

    /// Selects `path` as the new input and waits for the backend's answer.
    /// A processed image is written to `output_dir` as
    /// `<stem>-sod_output.png`.
    pub async fn upload(&mut self, path: &Path, output_dir: &Path) -> Result<UploadReport> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ShellError::ReadInput {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "upload".to_string(), |n| n.to_string_lossy().into_owned());

        let previous = self.current_output_handle();
        info!(file = %path.display(), bytes = bytes.len(), "selecting file");
        let alerts = self.dispatch(Event::FileSelected { file_name, bytes }).await;

        let saved_to = match self.current_output_handle() {
            Some(handle) if Some(&handle) != previous.as_ref() => {
                Some(self.save_output(&handle, path, output_dir).await?)
            }
            _ => None,
        };

        Ok(UploadReport {
            file: path.to_path_buf(),
            saved_to,
            alerts,
        })
    }

    pub async fn end_session(&mut self) {
        self.dispatch(Event::SessionEnded).await;
    }

    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    pub fn image(&self, handle: &str) -> Option<&StoredImage> {
        self.images.get(handle)
    }

    /// Number of handles registered and not yet released.
    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    fn current_output_handle(&self) -> Option<String> {
        self.view().output.map(|card| card.download.handle)
    }

    async fn save_output(&self, handle: &str, input: &Path, output_dir: &Path) -> Result<PathBuf> {
        let image = self.image(handle).ok_or_else(|| ShellError::MissingImage {
            handle: handle.to_string(),
        })?;

        let stem = input
            .file_stem()
            .map_or_else(|| "upload".into(), |s| s.to_string_lossy());
        let target = output_dir.join(format!("{stem}-{DOWNLOAD_FILE_NAME}"));
        tokio::fs::write(&target, &image.bytes).await?;

        info!(path = %target.display(), bytes = image.bytes.len(), "saved processed image");
        Ok(target)
    }

    /// Runs `event` and every effect it leads to. Returns the alerts raised
    /// along the way.
    async fn dispatch(&mut self, event: Event) -> Vec<String> {
        let mut alerts = Vec::new();
        let mut queue: VecDeque<Effect> = self.core.process_event(event).into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Render(_) => debug!("render"),
                Effect::Http(mut request) => {
                    let result = self.http.execute(&request.operation).await;
                    queue.extend(self.core.resolve(&mut request, result));
                }
                Effect::Images(request) => self.apply_image_operation(&request.operation),
                Effect::Alert(request) => {
                    let AlertOperation::Show { message } = &request.operation;
                    warn!(%message, "alert");
                    alerts.push(message.clone());
                }
            }
        }

        alerts
    }

    fn apply_image_operation(&mut self, operation: &ImageOperation) {
        match operation {
            ImageOperation::Register {
                handle,
                mime,
                bytes,
            } => {
                debug!(%handle, %mime, bytes = bytes.len(), "register image");
                self.images.insert(
                    handle.as_str().to_string(),
                    StoredImage {
                        mime: mime.clone(),
                        bytes: bytes.clone(),
                    },
                );
            }
            ImageOperation::Release { handle } => {
                debug!(%handle, "release image");
                self.images.remove(handle.as_str());
            }
        }
    }
}

/// Plain-text rendering of the view for the terminal.
pub fn render_text(view: &ViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    let _ = writeln!(out, "backend: {}", view.backend_url);

    match &view.input {
        Some(input) => {
            let _ = writeln!(out, "input:   {}", input.handle);
        }
        None => {
            let _ = writeln!(out, "input:   (none)");
        }
    }
    if let Some(label) = &view.processing {
        let _ = writeln!(out, "{label}");
    }
    if let Some(output) = &view.output {
        let _ = writeln!(
            out,
            "output:  {} (download as {})",
            output.image.handle, output.download.file_name
        );
    }
    if let Some(history) = &view.history {
        let _ = writeln!(out, "history:");
        for input in &history.inputs {
            let _ = writeln!(out, "  {}: {}", input.alt, input.handle);
        }
        for output in &history.outputs {
            let _ = writeln!(out, "  {}: {}", output.alt, output.handle);
        }
    }
    out
}
