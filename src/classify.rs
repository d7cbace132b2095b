//! Error classification for retry decisions.
//!
//! Operations report failures as structured values: an [`ErrorCategory`] (a
//! domain tag plus a code) and a human-readable message. Classification looks
//! only at the category, never at the message, and maps it to an
//! [`ErrorClass`]:
//!
//! | domain        | retryable codes                                                 | everything else |
//! |---------------|-----------------------------------------------------------------|-----------------|
//! | connectivity  | timed out, host lookup/connect failures, connection lost, DNS, resource unavailable, secure connection failed | non-retryable (includes "not connected") |
//! | service       | unavailable, deadline exceeded, aborted, internal, unknown      | non-retryable (includes "retry limit exceeded") |
//! | transport     | timed out, host unreachable, connection lost                    | unknown         |
//! | custom        | none                                                            | unknown         |
//!
//! `Unknown` is never retried: an unfamiliar error fails fast instead of being
//! retried blindly.
//!
//! New (domain, code) pairs are added with [`StandardClassifier::with_rule`]
//! or by implementing [`Classify`] directly; the coordinator only sees the
//! trait.
//!
//! ```rust
//! use secondwind::classify::{Classify, ConnectivityCode, ErrorCategory, ErrorClass, OperationError, StandardClassifier};
//!
//! let classifier = StandardClassifier::new();
//! let timed_out = OperationError::new(ErrorCategory::Connectivity(ConnectivityCode::TimedOut), "request timed out");
//! assert_eq!(classifier.classify(&timed_out), ErrorClass::TransientRetryable);
//!
//! let offline = OperationError::new(ErrorCategory::Connectivity(ConnectivityCode::NotConnected), "offline");
//! assert_eq!(classifier.classify(&offline), ErrorClass::NonRetryable);
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io;

/// Retry eligibility of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Expected to clear up on its own; worth another attempt.
    TransientRetryable,
    /// Retrying cannot help.
    NonRetryable,
    /// Not recognized; handled like `NonRetryable`.
    Unknown,
}

impl ErrorClass {
    /// Whether the coordinator may schedule another attempt for this class.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::TransientRetryable)
    }

    /// Short stable name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::TransientRetryable => "transient",
            ErrorClass::NonRetryable => "non_retryable",
            ErrorClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Codes from the connectivity (URL loading) layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityCode {
    TimedOut,
    CannotFindHost,
    CannotConnectToHost,
    ConnectionLost,
    DnsLookupFailed,
    ResourceUnavailable,
    SecureConnectionFailed,
    /// No network path at all.
    NotConnected,
    Other(i64),
}

impl ConnectivityCode {
    /// Map a numeric URL-loading error code.
    pub fn from_code(code: i64) -> Self {
        match code {
            -1001 => Self::TimedOut,
            -1003 => Self::CannotFindHost,
            -1004 => Self::CannotConnectToHost,
            -1005 => Self::ConnectionLost,
            -1006 => Self::DnsLookupFailed,
            -1008 => Self::ResourceUnavailable,
            -1009 => Self::NotConnected,
            -1200 => Self::SecureConnectionFailed,
            other => Self::Other(other),
        }
    }

    /// Numeric code; inverse of [`ConnectivityCode::from_code`] for known codes.
    pub fn code(self) -> i64 {
        match self {
            Self::TimedOut => -1001,
            Self::CannotFindHost => -1003,
            Self::CannotConnectToHost => -1004,
            Self::ConnectionLost => -1005,
            Self::DnsLookupFailed => -1006,
            Self::ResourceUnavailable => -1008,
            Self::NotConnected => -1009,
            Self::SecureConnectionFailed => -1200,
            Self::Other(code) => code,
        }
    }
}

/// Status codes from a managed backend service (cloud storage, database, functions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceCode {
    Unavailable,
    DeadlineExceeded,
    Aborted,
    Internal,
    Unknown,
    /// The service already spent its own retry budget.
    RetryLimitExceeded,
    Other(i64),
}

impl ServiceCode {
    /// Map a numeric gRPC-style status code.
    pub fn from_code(code: i64) -> Self {
        match code {
            2 => Self::Unknown,
            4 => Self::DeadlineExceeded,
            10 => Self::Aborted,
            13 => Self::Internal,
            14 => Self::Unavailable,
            other => Self::Other(other),
        }
    }
}

/// Failure signals from a generic transport (sockets, HTTP clients).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportSignal {
    TimedOut,
    HostUnreachable,
    ConnectionLost,
    Other,
}

/// Domain tag plus code: the only input classification uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Connectivity(ConnectivityCode),
    Service(ServiceCode),
    Transport(TransportSignal),
    /// Any other domain. Unclassified unless a rule is registered for it.
    Custom { domain: Cow<'static, str>, code: i64 },
}

impl ErrorCategory {
    /// Build a custom-domain category.
    pub fn custom(domain: impl Into<Cow<'static, str>>, code: i64) -> Self {
        ErrorCategory::Custom { domain: domain.into(), code }
    }

    /// Domain tag, used in logs and messages.
    pub fn domain(&self) -> &str {
        match self {
            ErrorCategory::Connectivity(_) => "connectivity",
            ErrorCategory::Service(_) => "service",
            ErrorCategory::Transport(_) => "transport",
            ErrorCategory::Custom { domain, .. } => domain,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Connectivity(code) => write!(f, "connectivity/{:?}", code),
            ErrorCategory::Service(code) => write!(f, "service/{:?}", code),
            ErrorCategory::Transport(signal) => write!(f, "transport/{:?}", signal),
            ErrorCategory::Custom { domain, code } => write!(f, "{}/{}", domain, code),
        }
    }
}

/// Errors that can describe themselves as an [`ErrorCategory`].
pub trait Categorized {
    fn category(&self) -> ErrorCategory;
}

impl Categorized for io::Error {
    fn category(&self) -> ErrorCategory {
        let signal = match self.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportSignal::TimedOut,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::AddrNotAvailable => TransportSignal::HostUnreachable,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportSignal::ConnectionLost,
            _ => TransportSignal::Other,
        };
        ErrorCategory::Transport(signal)
    }
}

/// Structured failure produced where an operation meets the outside world.
#[derive(Debug, thiserror::Error)]
#[error("{category}: {message}")]
pub struct OperationError {
    category: ErrorCategory,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl OperationError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into(), source: None }
    }

    /// Shorthand for a connectivity error from a numeric code.
    pub fn connectivity(code: i64, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Connectivity(ConnectivityCode::from_code(code)), message)
    }

    /// Shorthand for a service error.
    pub fn service(code: ServiceCode, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Service(code), message)
    }

    /// Shorthand for a transport error.
    pub fn transport(signal: TransportSignal, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Transport(signal), message)
    }

    /// Attach the underlying error.
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn category(&self) -> &ErrorCategory {
        &self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for OperationError {
    fn from(err: io::Error) -> Self {
        let category = Categorized::category(&err);
        let message = err.to_string();
        Self { category, message, source: Some(Box::new(err)) }
    }
}

impl Categorized for OperationError {
    fn category(&self) -> ErrorCategory {
        self.category.clone()
    }
}

/// Maps an error to an [`ErrorClass`].
///
/// Implementations must be pure: no I/O, no interior state, same answer for
/// the same input. They are shared across concurrent runs without locking.
pub trait Classify<E>: Send + Sync {
    fn classify(&self, error: &E) -> ErrorClass;
}

impl<E, F> Classify<E> for F
where
    F: Fn(&E) -> ErrorClass + Send + Sync,
{
    fn classify(&self, error: &E) -> ErrorClass {
        self(error)
    }
}

/// Built-in classification table, with optional per-category overrides.
#[derive(Debug, Clone, Default)]
pub struct StandardClassifier {
    rules: HashMap<ErrorCategory, ErrorClass>,
}

impl StandardClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the class for one category. Rules take precedence
    /// over the built-in table.
    pub fn with_rule(mut self, category: ErrorCategory, class: ErrorClass) -> Self {
        self.rules.insert(category, class);
        self
    }

    /// Classify a category directly.
    pub fn classify_category(&self, category: &ErrorCategory) -> ErrorClass {
        if let Some(class) = self.rules.get(category) {
            return *class;
        }
        builtin_class(category)
    }
}

impl<E: Categorized> Classify<E> for StandardClassifier {
    fn classify(&self, error: &E) -> ErrorClass {
        self.classify_category(&error.category())
    }
}

fn builtin_class(category: &ErrorCategory) -> ErrorClass {
    match category {
        ErrorCategory::Connectivity(code) => match code {
            ConnectivityCode::TimedOut
            | ConnectivityCode::CannotFindHost
            | ConnectivityCode::CannotConnectToHost
            | ConnectivityCode::ConnectionLost
            | ConnectivityCode::DnsLookupFailed
            | ConnectivityCode::ResourceUnavailable
            | ConnectivityCode::SecureConnectionFailed => ErrorClass::TransientRetryable,
            ConnectivityCode::NotConnected | ConnectivityCode::Other(_) => ErrorClass::NonRetryable,
        },
        ErrorCategory::Service(code) => match code {
            ServiceCode::Unavailable
            | ServiceCode::DeadlineExceeded
            | ServiceCode::Aborted
            | ServiceCode::Internal
            | ServiceCode::Unknown => ErrorClass::TransientRetryable,
            ServiceCode::RetryLimitExceeded | ServiceCode::Other(_) => ErrorClass::NonRetryable,
        },
        ErrorCategory::Transport(signal) => match signal {
            TransportSignal::TimedOut
            | TransportSignal::HostUnreachable
            | TransportSignal::ConnectionLost => ErrorClass::TransientRetryable,
            TransportSignal::Other => ErrorClass::Unknown,
        },
        ErrorCategory::Custom { .. } => ErrorClass::Unknown,
    }
}
