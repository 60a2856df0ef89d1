use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::lookup::LookupRow;
use crate::sequencer::Stage;

/// Failures raised while talking to the remote application or the desktop.
#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: '{id}' (gave up after {elapsed:?})")]
    ElementNotFound { id: String, elapsed: Duration },

    #[error("Window not found: {window} (after {attempts} attempt(s))")]
    WindowNotFound { window: String, attempts: u32 },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Remote application reported: {0}")]
    Status(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("UI Automation API error: {message}")]
    UIAutomationAPIError {
        message: String,
        com_error: Option<i32>,
        operation: String,
        is_retryable: bool,
    },
}

impl AutomationError {
    /// Whether the failure describes a remote tree that is not ready yet
    /// rather than a genuine fault.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AutomationError::UIAutomationAPIError {
                is_retryable: true,
                ..
            }
        )
    }

    /// Taxonomy name written into a failed request's `message`.
    pub fn kind(&self) -> &'static str {
        match self {
            AutomationError::ElementNotFound { .. } => "ElementNotFoundError",
            AutomationError::WindowNotFound { .. } => "WindowNotFoundError",
            AutomationError::Timeout(_) => "TimeoutError",
            AutomationError::Status(_) => "StatusError",
            AutomationError::UnsupportedOperation(_) => "UnsupportedOperationError",
            AutomationError::InvalidArgument(_) => "ValidationError",
            AutomationError::PlatformError(_)
            | AutomationError::UnsupportedPlatform(_)
            | AutomationError::UIAutomationAPIError { .. } => "PlatformError",
        }
    }
}

/// Failures scoped to one request. Caught by the batch driver and written
/// back onto the request record.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Malformed request: {0}")]
    Parse(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{} lookup rows match {keys}; check the lookup table", .rows.len())]
    AmbiguousMatch { keys: String, rows: Vec<LookupRow> },

    #[error(transparent)]
    Automation(#[from] AutomationError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<TaskError>,
    },
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            already @ TaskError::Stage { .. } => already,
            other => TaskError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Parse(_) => "ParseError",
            TaskError::Validation(_) => "ValidationError",
            TaskError::NotFound(_) => "NotFoundError",
            TaskError::AmbiguousMatch { .. } => "AmbiguousMatchError",
            TaskError::Automation(e) => e.kind(),
            TaskError::Io { .. } => "IoError",
            TaskError::Stage { source, .. } => source.kind(),
        }
    }

    /// Stage the sequencer was entering when the failure happened, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TaskError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Text persisted into the request's `message` field.
    pub fn classified_message(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }
}

/// Failures during global start-up. These abort the whole batch before any
/// request file is touched.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Failed to prepare folder layout at {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load configuration {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Failed to load lookup table {path}: {reason}")]
    Lookup { path: PathBuf, reason: String },

    #[error("Failed to start the remote application: {0}")]
    Launch(#[source] AutomationError),

    #[error("Automation engine unavailable: {0}")]
    Platform(#[source] AutomationError),
}
