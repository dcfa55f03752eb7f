//! Crate-level error types.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::anchor::DatasetRole;
use crate::store::lock;

/// Failure of a single request against the anchor/model service.
///
/// Cloneable so one failed fetch can be handed to every caller that joined
/// the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The service answered with a non-2xx status.
    Service {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response headers as `(name, value)` pairs.
        headers: Vec<(String, String)>,
    },
    /// Connection-level failure before a response was received.
    Transport {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Transport error description.
        message: String,
    },
    /// The request exceeded its client-side timeout.
    Timeout {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Timeout that elapsed.
        timeout: Duration,
    },
    /// The response body was not the expected JSON.
    Decode {
        /// Endpoint the request was sent to.
        endpoint: String,
        /// Decoder error description.
        message: String,
    },
}

impl FetchError {
    /// Endpoint the failed request was sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Service { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }

    /// Whether this failure is a timeout rather than a network/service error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service {
                endpoint, status, ..
            } => write!(f, "request to {endpoint} failed with status {status}"),
            Self::Transport { endpoint, message } => {
                write!(f, "request to {endpoint} failed: {message}")
            }
            Self::Timeout { endpoint, timeout } => write!(
                f,
                "the request for {endpoint} timed out after {}s",
                timeout.as_secs()
            ),
            Self::Decode { endpoint, message } => {
                write!(f, "invalid response from {endpoint}: {message}")
            }
        }
    }
}

impl std::error::Error for FetchError {}

/// Errors produced by the polyphony crate.
#[derive(Debug, Clone)]
pub enum PolyphonyError {
    /// Anchor or model service request failure.
    Fetch(FetchError),
    /// No column source is configured for the requested dataset role.
    LoaderNotFound {
        /// Dataset role that was requested.
        dataset: DatasetRole,
        /// Kind of data that was requested (e.g. `"cells"`).
        data_type: String,
        /// Column path, when the request named one.
        path: Option<String>,
    },
    /// A column source returned data of the wrong shape or type.
    Column(String),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
    /// Generic I/O failure.
    Io(Arc<std::io::Error>),
}

impl fmt::Display for PolyphonyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "fetch error: {e}"),
            Self::LoaderNotFound {
                dataset,
                data_type,
                path,
            } => {
                write!(f, "no {data_type} loader for the {dataset} dataset")?;
                if let Some(path) = path {
                    write!(f, " (path {path})")?;
                }
                Ok(())
            }
            Self::Column(msg) => write!(f, "column error: {msg}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for PolyphonyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fetch(e) => Some(e),
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<FetchError> for PolyphonyError {
    fn from(e: FetchError) -> Self {
        Self::Fetch(e)
    }
}

impl From<std::io::Error> for PolyphonyError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory channel for failures the user should see but that do not stop
/// anything.
pub trait WarningSink: Send + Sync {
    /// Report one warning.
    fn warn(&self, message: &str);
}

/// Writes warnings to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWarnings;

impl WarningSink for LogWarnings {
    fn warn(&self, message: &str) {
        log::warn!("{message}");
    }
}

/// Collects warnings for display, and logs them too.
#[derive(Debug, Default)]
pub struct WarningLog {
    messages: Mutex<Vec<String>>,
}

impl WarningLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every warning received so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }

    /// Remove and return every collected warning.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.messages))
    }

    /// Whether no warning was received.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.messages).is_empty()
    }
}

impl WarningSink for WarningLog {
    fn warn(&self, message: &str) {
        log::warn!("{message}");
        lock(&self.messages).push(message.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_distinct_from_service_failure() {
        let timeout = FetchError::Timeout {
            endpoint: "http://localhost/api/model_update".into(),
            timeout: Duration::from_secs(600),
        };
        let service = FetchError::Service {
            endpoint: "http://localhost/api/anchor".into(),
            status: 500,
            headers: vec![("content-type".into(), "text/plain".into())],
        };
        assert!(timeout.is_timeout());
        assert!(!service.is_timeout());
        assert_eq!(service.endpoint(), "http://localhost/api/anchor");
        assert!(timeout.to_string().contains("600s"));
    }

    #[test]
    fn loader_not_found_names_dataset_and_path() {
        let err = PolyphonyError::LoaderNotFound {
            dataset: DatasetRole::Reference,
            data_type: "cells".into(),
            path: Some("obs/cell_type".into()),
        };
        assert_eq!(
            err.to_string(),
            "no cells loader for the reference dataset (path obs/cell_type)"
        );
    }

    #[test]
    fn warning_log_collects_and_drains() {
        let log = WarningLog::new();
        assert!(log.is_empty());
        log.warn("confirm of qry-1 failed");
        log.warn("delete of user-0 failed");
        assert_eq!(log.messages().len(), 2);
        assert_eq!(log.drain()[0], "confirm of qry-1 failed");
        assert!(log.is_empty());
    }
}
