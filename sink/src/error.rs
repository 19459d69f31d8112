//! Error types and result definitions for sink operations.
//!
//! [`SinkError`] carries an [`ErrorKind`] used for policy decisions (retry or not, reject an event
//! or fail a table), a static description, an optional dynamic detail, an optional source error,
//! the callsite location and a captured backtrace. Several errors can be aggregated into one,
//! which is how per-table failures of a batch are surfaced together.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type of the sink.
///
/// Cloning is cheap: the source and backtrace are reference counted, which lets the same error
/// be reported both in a [`crate::report::BatchReport`] and to the caller.
#[derive(Debug, Clone)]
pub struct SinkError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(ErrorPayload),
    /// Several errors aggregated together, for example the failures of multiple tables.
    Many {
        errors: Vec<SinkError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors raised by the sink.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Event errors
    MalformedEvent,

    // Table store errors
    CommitFailed,
    SchemaConflict,
    DestinationConnectionFailed,
    DestinationIoError,
    DestinationThrottled,
    DestinationTableMissing,
    DestinationError,

    // Data errors
    ConversionError,
    DeserializationError,
    InvalidData,

    // Process errors
    ConfigError,
    IoError,
    InvalidState,
    TableWorkerPanic,
    AcknowledgementFailed,

    Unknown,

    /// Used by fault injection to force a retryable failure.
    #[cfg(feature = "failpoints")]
    WithTransientFailure,
    /// Used by fault injection to force a non retryable failure.
    #[cfg(feature = "failpoints")]
    WithFatalFailure,
}

impl ErrorKind {
    /// Returns `true` if a table store failure of this kind is expected to go away on its own.
    ///
    /// Keep this list narrow: anything not listed fails the commit on the first attempt.
    pub fn is_commit_retryable(&self) -> bool {
        match self {
            ErrorKind::DestinationConnectionFailed
            | ErrorKind::DestinationIoError
            | ErrorKind::DestinationThrottled => true,
            #[cfg(feature = "failpoints")]
            ErrorKind::WithTransientFailure => true,
            _ => false,
        }
    }
}

impl SinkError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregated errors, returns the kind of the first error or [`ErrorKind::Unknown`] when
    /// the aggregate is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { .. } => "Multiple errors occurred",
        }
    }

    /// Returns the dynamic detail, or the first detail found in an aggregate.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the aggregated errors, if this is an aggregate.
    pub fn errors(&self) -> Option<&[SinkError]> {
        match self.repr {
            ErrorRepr::Single(_) => None,
            ErrorRepr::Many { ref errors, .. } => Some(errors),
        }
    }

    /// Returns the captured backtrace.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the callsite where the error was created.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating error, exposed through [`error::Error::source`].
    ///
    /// Has no effect on aggregates, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        SinkError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for SinkError {
    fn eq(&self, other: &SinkError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(f, "[{:?}] {}", payload.kind, payload.description)?;
                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, ": {detail}")?;
                }
                if let Some(source) = payload.source.as_deref() {
                    write!(f, " (caused by: {source})")?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, .. } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {count} error{} aggregated",
                    if count == 1 { "" } else { "s" }
                )?;
                for (index, error) in errors.iter().enumerate() {
                    write!(f, "\n  {}. {error}", index + 1)?;
                }

                Ok(())
            }
        }
    }
}

impl error::Error for SinkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`SinkError`] from a kind and a static description.
impl From<(ErrorKind, &'static str)> for SinkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`SinkError`] from a kind, a static description and a dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for SinkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> SinkError {
        SinkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates errors. A single error is returned as is instead of being wrapped.
impl<E> From<Vec<E>> for SinkError
where
    E: Into<SinkError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> SinkError {
        let location = Location::caller();
        let mut errors: Vec<SinkError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        SinkError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::io::Error> for SinkError {
    #[track_caller]
    fn from(err: std::io::Error) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for SinkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> SinkError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => {
                (ErrorKind::DeserializationError, "JSON deserialization failed")
            }
        };

        let detail = err.to_string();
        SinkError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<base64::DecodeError> for SinkError {
    #[track_caller]
    fn from(err: base64::DecodeError) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Base64 decoding failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<std::num::TryFromIntError> for SinkError {
    #[track_caller]
    fn from(err: std::num::TryFromIntError) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConversionError,
            Cow::Borrowed("Integer out of range"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<sink_config::shared::ValidationError> for SinkError {
    #[track_caller]
    fn from(err: sink_config::shared::ValidationError) -> SinkError {
        let detail = err.to_string();
        SinkError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid sink configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<tokio::task::JoinError> for SinkError {
    #[track_caller]
    fn from(err: tokio::task::JoinError) -> SinkError {
        let kind = if err.is_panic() {
            ErrorKind::TableWorkerPanic
        } else {
            ErrorKind::InvalidState
        };

        SinkError::from_components(
            kind,
            Cow::Borrowed("Table worker did not complete"),
            Some(Cow::Owned(err.to_string())),
            None,
        )
    }
}
