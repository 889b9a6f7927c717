use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use shared::config::DEFAULT_BACKEND_URL;
use shared::{ConfigRequest, ResponseOrdering};

use crate::{Result, ShellError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Upload images to a salient object detection backend and save the results.
#[derive(Debug, Parser)]
#[command(name = "sod-cli", version)]
pub struct Args {
    /// Images to upload, one request each, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Base URL of the inference backend
    #[arg(long, env = "SOD_BACKEND_URL", default_value = DEFAULT_BACKEND_URL)]
    pub backend_url: String,

    /// Keep at most this many superseded images per history list
    #[arg(long, env = "SOD_HISTORY_LIMIT")]
    pub history_limit: Option<usize>,

    /// Which completions may update the view: arrival-order or latest-wins
    #[arg(long, env = "SOD_RESPONSE_ORDERING", default_value = "arrival-order")]
    pub response_ordering: ResponseOrdering,

    /// Refuse to upload files larger than this many bytes
    #[arg(long, env = "SOD_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Request timeout in seconds
    #[arg(long = "timeout", env = "SOD_REQUEST_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Directory processed images are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Print the final view as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Log level, overridden by RUST_LOG
    #[arg(long, env = "SOD_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    pub fn config_request(&self) -> ConfigRequest {
        ConfigRequest {
            backend_url: self.backend_url.clone(),
            history_limit: self.history_limit,
            response_ordering: self.response_ordering,
            max_upload_bytes: self.max_upload_bytes,
        }
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        if self.timeout_secs == 0 {
            return Err(ShellError::config("request timeout must be at least 1 second"));
        }
        Ok(Duration::from_secs(self.timeout_secs))
    }
}
