// ABOUTME: Failure taxonomy for loaders: FailureKind, Severity, LoadError and BlockingError.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;
use std::time::Duration;

use crate::compose::AttemptRecord;

/// The closed set of ways a loader call can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NotApplicable,
    Timeout,
    ContentError,
    ConfigurationError,
    MissingDependency,
    Unexpected,
    Exhausted,
}

impl FailureKind {
    /// How loudly a failure of this kind should be reported.
    pub fn severity(&self) -> Severity {
        match self {
            FailureKind::NotApplicable => Severity::Low,
            FailureKind::Timeout
            | FailureKind::ContentError
            | FailureKind::ConfigurationError
            | FailureKind::MissingDependency
            | FailureKind::Unexpected => Severity::Medium,
            FailureKind::Exhausted => Severity::High,
        }
    }

    /// Returns true for failures caused by the environment rather than the URL.
    pub fn is_environmental(&self) -> bool {
        match self {
            FailureKind::ConfigurationError | FailureKind::MissingDependency => true,
            FailureKind::NotApplicable
            | FailureKind::Timeout
            | FailureKind::ContentError
            | FailureKind::Unexpected
            | FailureKind::Exhausted => false,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::NotApplicable => "not applicable",
            FailureKind::Timeout => "timeout",
            FailureKind::ContentError => "content error",
            FailureKind::ConfigurationError => "configuration error",
            FailureKind::MissingDependency => "missing dependency",
            FailureKind::Unexpected => "unexpected error",
            FailureKind::Exhausted => "exhausted",
        };
        write!(f, "{}", s)
    }
}

/// Reporting level for diagnostic events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// The error type returned by every loader, chains included.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The URL does not have the shape or host this loader handles.
    #[error("{url} is not applicable: {reason}")]
    NotApplicable { url: String, reason: String },

    /// The underlying network, browser or subprocess operation ran past its deadline.
    #[error(
        "timed out after {}s loading {url}. Suggestion: {}",
        .timeout.as_secs_f64(),
        .suggestion.as_deref().unwrap_or("increase the timeout or try again later")
    )]
    Timeout {
        url: String,
        timeout: Duration,
        suggestion: Option<String>,
    },

    /// The fetch worked but nothing usable could be extracted.
    #[error("{}", content_message(.url, .reason, .suggestion.as_deref()))]
    Content {
        url: String,
        reason: String,
        suggestion: Option<String>,
    },

    /// Required setup such as a credential is absent.
    #[error("{message}")]
    Configuration { message: String },

    /// An optional runtime component is not installed.
    #[error("{package} not installed. Please install it with `{install_command}`.")]
    MissingDependency {
        package: String,
        install_command: String,
    },

    /// Anything the loader could not classify.
    #[error("{0}")]
    Unexpected(#[source] anyhow::Error),

    /// Every loader in a chain failed.
    #[error("{}", exhausted_message(.url, .attempts, .halted))]
    Exhausted {
        url: String,
        attempts: Vec<AttemptRecord>,
        halted: bool,
    },
}

fn content_message(url: &str, reason: &str, suggestion: Option<&str>) -> String {
    let mut msg = format!("failed to extract content from {}: {}", url, reason);
    if let Some(s) = suggestion {
        msg.push_str(". Suggestion: ");
        msg.push_str(s);
    }
    msg
}

fn exhausted_message(url: &str, attempts: &[AttemptRecord], halted: &bool) -> String {
    let mut msg = format!("failed to load {}", url);
    if *halted {
        msg.push_str(" (chain stopped early)");
    }
    if attempts.is_empty() {
        msg.push_str("\n\nno loaders were attempted");
        return msg;
    }
    msg.push_str("\n\nattempted loaders:");
    for attempt in attempts {
        msg.push_str("\n  - ");
        msg.push_str(&attempt.to_string());
    }
    msg
}

impl LoadError {
    /// Create a NotApplicable error.
    pub fn not_applicable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::NotApplicable {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a Timeout error.
    pub fn timeout(url: impl Into<String>, timeout: Duration, suggestion: Option<String>) -> Self {
        LoadError::Timeout {
            url: url.into(),
            timeout,
            suggestion,
        }
    }

    /// Create a ContentError.
    pub fn content(
        url: impl Into<String>,
        reason: impl Into<String>,
        suggestion: Option<String>,
    ) -> Self {
        LoadError::Content {
            url: url.into(),
            reason: reason.into(),
            suggestion,
        }
    }

    /// Create a ConfigurationError.
    pub fn configuration(message: impl Into<String>) -> Self {
        LoadError::Configuration {
            message: message.into(),
        }
    }

    /// Create a MissingDependency error.
    pub fn missing_dependency(
        package: impl Into<String>,
        install_command: impl Into<String>,
    ) -> Self {
        LoadError::MissingDependency {
            package: package.into(),
            install_command: install_command.into(),
        }
    }

    /// Wrap an unclassified failure.
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        LoadError::Unexpected(err.into())
    }

    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> FailureKind {
        match self {
            LoadError::NotApplicable { .. } => FailureKind::NotApplicable,
            LoadError::Timeout { .. } => FailureKind::Timeout,
            LoadError::Content { .. } => FailureKind::ContentError,
            LoadError::Configuration { .. } => FailureKind::ConfigurationError,
            LoadError::MissingDependency { .. } => FailureKind::MissingDependency,
            LoadError::Unexpected(_) => FailureKind::Unexpected,
            LoadError::Exhausted { .. } => FailureKind::Exhausted,
        }
    }

    /// Short detail used in attempt records, without the URL repeated.
    pub fn detail(&self) -> String {
        match self {
            LoadError::NotApplicable { reason, .. } => reason.clone(),
            LoadError::Timeout {
                timeout,
                suggestion,
                ..
            } => match suggestion {
                Some(s) => format!("after {}s ({})", timeout.as_secs_f64(), s),
                None => format!("after {}s", timeout.as_secs_f64()),
            },
            LoadError::Content {
                reason, suggestion, ..
            } => match suggestion {
                Some(s) => format!("{} ({})", reason, s),
                None => reason.clone(),
            },
            LoadError::Configuration { message } => message.clone(),
            LoadError::MissingDependency { .. } => self.to_string(),
            LoadError::Unexpected(err) => format!("{:#}", err),
            LoadError::Exhausted { attempts, .. } => {
                let inner: Vec<String> = attempts.iter().map(|a| a.to_string()).collect();
                format!("nested chain failed [{}]", inner.join("; "))
            }
        }
    }

    /// Returns the attempt records if this is an Exhausted error.
    pub fn attempts(&self) -> Option<&[AttemptRecord]> {
        match self {
            LoadError::Exhausted { attempts, .. } => Some(attempts),
            _ => None,
        }
    }

    /// Returns true if this is a NotApplicable error.
    pub fn is_not_applicable(&self) -> bool {
        self.kind() == FailureKind::NotApplicable
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.kind() == FailureKind::Timeout
    }

    /// Returns true if this is a ContentError.
    pub fn is_content(&self) -> bool {
        self.kind() == FailureKind::ContentError
    }

    /// Returns true if this is an Exhausted error.
    pub fn is_exhausted(&self) -> bool {
        self.kind() == FailureKind::Exhausted
    }
}

/// Errors from the blocking entry point.
#[derive(Debug, thiserror::Error)]
pub enum BlockingError {
    /// `load_sync` was called from a thread already driving a tokio runtime.
    #[error("load_sync called from inside an async runtime; await `load` instead")]
    NestedRuntime,

    /// The private runtime could not be started.
    #[error("failed to create runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Load(#[from] LoadError),
}

impl BlockingError {
    /// Returns the loader failure, if the error came from the chain itself.
    pub fn as_load_error(&self) -> Option<&LoadError> {
        match self {
            BlockingError::Load(err) => Some(err),
            _ => None,
        }
    }
}
