use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigRequest;
use crate::session::Generation;
use crate::ProcessingError;

/// Body of a successful `/process-image` response.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedImage {
    pub mime: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ProcessedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedImage")
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

pub type ProcessOutcome = Result<ProcessedImage, ProcessingError>;

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub enum Event {
    #[default]
    Noop,

    Configure(ConfigRequest),

    /// The user picked a file.
    FileSelected {
        file_name: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
    },

    ProcessImageResponse {
        generation: Generation,
        outcome: ProcessOutcome,
    },

    /// The view is going away; every handle can be released.
    SessionEnded,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure(_) => "configure",
            Self::FileSelected { .. } => "file_selected",
            Self::ProcessImageResponse { .. } => "process_image_response",
            Self::SessionEnded => "session_ended",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(self, Self::FileSelected { .. })
    }
}

// Image payloads are summarised so logs never carry raw bytes.
impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Noop => f.write_str("Noop"),
            Self::Configure(request) => f.debug_tuple("Configure").field(request).finish(),
            Self::FileSelected { file_name, bytes } => f
                .debug_struct("FileSelected")
                .field("file_name", file_name)
                .field("bytes", &bytes.len())
                .finish(),
            Self::ProcessImageResponse {
                generation,
                outcome,
            } => f
                .debug_struct("ProcessImageResponse")
                .field("generation", generation)
                .field("outcome", outcome)
                .finish(),
            Self::SessionEnded => f.write_str("SessionEnded"),
        }
    }
}
