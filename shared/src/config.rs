use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const PROCESS_IMAGE_PATH: &str = "/process-image";
pub const MAX_URL_LENGTH: usize = 2048;

/// Backend base URL baked in at build time, if any.
const BUILD_BACKEND_URL: Option<&str> = option_env!("SOD_BACKEND_URL");

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("history limit must be at least 1")]
    ZeroHistoryLimit,

    #[error("upload size limit must be at least 1 byte")]
    ZeroUploadLimit,

    #[error("unknown response ordering '{0}', expected 'latest-wins' or 'arrival-order'")]
    UnknownOrdering(String),
}

/// Base URL of the inference backend, without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendUrl {
    base: String,
}

impl BackendUrl {
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidUrl {
            url: truncate_url(url),
            reason: reason.to_string(),
        };

        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(invalid("URL cannot be empty"));
        }
        if trimmed.len() > MAX_URL_LENGTH {
            return Err(invalid("URL exceeds maximum length"));
        }

        let parsed = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
            url: truncate_url(url),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("only 'http' and 'https' are allowed"));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("URL must have a host"));
        }
        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(invalid("credentials in URL are not allowed"));
        }
        // The endpoint path is appended verbatim.
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed in a base URL"));
        }

        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    #[must_use]
    pub fn process_image_url(&self) -> String {
        self.endpoint(PROCESS_IMAGE_PATH)
    }
}

impl Default for BackendUrl {
    fn default() -> Self {
        BUILD_BACKEND_URL
            .and_then(|url| Self::parse(url).ok())
            .unwrap_or_else(|| Self {
                base: DEFAULT_BACKEND_URL.to_string(),
            })
    }
}

impl fmt::Display for BackendUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

fn truncate_url(url: &str) -> String {
    if url.chars().count() <= 100 {
        url.to_string()
    } else {
        format!("{}...", url.chars().take(100).collect::<String>())
    }
}

/// Which completions may update the session when uploads overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseOrdering {
    /// Only the response to the most recent upload is applied.
    LatestWins,
    /// Every response is applied in the order it resolves, stale ones included.
    #[default]
    ArrivalOrder,
}

impl ResponseOrdering {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LatestWins => "latest-wins",
            Self::ArrivalOrder => "arrival-order",
        }
    }
}

impl FromStr for ResponseOrdering {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "latest-wins" | "latest" => Ok(Self::LatestWins),
            "arrival-order" | "arrival" => Ok(Self::ArrivalOrder),
            _ => Err(ConfigError::UnknownOrdering(s.to_string())),
        }
    }
}

impl fmt::Display for ResponseOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated configuration as sent by a shell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub backend_url: String,
    pub history_limit: Option<usize>,
    pub response_ordering: ResponseOrdering,
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    pub backend_url: BackendUrl,
    /// `None` keeps every superseded image for the lifetime of the session.
    pub history_limit: Option<usize>,
    pub response_ordering: ResponseOrdering,
    /// `None` uploads files of any size.
    pub max_upload_bytes: Option<usize>,
}

impl TryFrom<ConfigRequest> for Config {
    type Error = ConfigError;

    fn try_from(request: ConfigRequest) -> Result<Self, Self::Error> {
        if request.history_limit == Some(0) {
            return Err(ConfigError::ZeroHistoryLimit);
        }
        if request.max_upload_bytes == Some(0) {
            return Err(ConfigError::ZeroUploadLimit);
        }

        Ok(Self {
            backend_url: BackendUrl::parse(&request.backend_url)?,
            history_limit: request.history_limit,
            response_ordering: request.response_ordering,
            max_upload_bytes: request.max_upload_bytes,
        })
    }
}
