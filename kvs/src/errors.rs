use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic, WriteExecutor};

/// Error kinds for key-value store operations.
///
/// Each kind names one category of failure so callers can branch on it
/// without parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use kvs::errors::{ErrorKind, KvsError, KvsResult};
///
/// fn example() -> KvsResult<()> {
///     Err(KvsError::new("store is closed", ErrorKind::StoreAlreadyClosed))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Key normalization
    /// The logical key's type cannot be normalized
    UnsupportedKeyType,

    // Construction
    /// The persistent store could not be opened
    BackendOpenFailure,

    // Value pipeline
    /// The codec could not encode or decode a value
    SerializationFailure,
    /// Text was not valid UTF-8
    EncodingError,

    // Backend signals
    /// The key does not exist in the backend. Never surfaced by the facade.
    NotFound,
    /// The store was opened read-only
    ReadOnly,
    /// Error raised by the storage engine
    BackendError,
    /// Store has already been closed
    StoreAlreadyClosed,

    // Operation errors
    /// The operation is not valid in the current context
    InvalidOperation,

    // IO errors
    /// Generic IO error
    IOError,
    /// The file was not found
    FileNotFound,
    /// Permission denied for file operation
    PermissionDenied,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UnsupportedKeyType => write!(f, "Unsupported key type"),
            ErrorKind::BackendOpenFailure => write!(f, "Backend open failure"),
            ErrorKind::SerializationFailure => write!(f, "Serialization failure"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::ReadOnly => write!(f, "Read only"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::FileNotFound => write!(f, "File not found"),
            ErrorKind::PermissionDenied => write!(f, "Permission denied"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for every fallible operation in this crate.
///
/// `KvsError` carries a message, a kind and an optional cause. A backtrace is
/// captured unresolved when the error is created and symbolized only when the
/// error is debug-printed.
///
/// # Examples
///
/// ```rust,ignore
/// use kvs::errors::{ErrorKind, KvsError};
///
/// let cause = KvsError::new("disk unplugged", ErrorKind::IOError);
/// let err = KvsError::new_with_cause("sync failed", ErrorKind::BackendError, cause);
/// ```
#[derive(Clone)]
pub struct KvsError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<KvsError>>,
    backtrace: Atomic<Backtrace>,
}

impl KvsError {
    /// Creates a new error with the given message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        KvsError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates a new error wrapping `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: KvsError) -> Self {
        KvsError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&KvsError> {
        self.cause.as_deref()
    }

    /// Returns `true` if this error only signals a missing key.
    pub fn is_not_found(&self) -> bool {
        self.error_kind == ErrorKind::NotFound
    }
}

impl Display for KvsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for KvsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let backtrace = self.backtrace.write_with(|bt| {
            bt.resolve();
            format!("{:?}", bt)
        });

        if let Some(cause) = &self.cause {
            write!(
                f,
                "{}: {}\nCaused by: {:?}\n{}",
                self.error_kind, self.message, cause, backtrace
            )
        } else {
            write!(f, "{}: {}\n{}", self.error_kind, self.message, backtrace)
        }
    }
}

impl Error for KvsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn Error + 'static))
    }
}

/// Result type used throughout the crate.
pub type KvsResult<T> = Result<T, KvsError>;

impl From<std::io::Error> for KvsError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IOError,
        };
        KvsError::new(&format!("IO error: {}", err), error_kind)
    }
}

impl From<std::string::FromUtf8Error> for KvsError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        KvsError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<std::str::Utf8Error> for KvsError {
    fn from(err: std::str::Utf8Error) -> Self {
        KvsError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<std::fmt::Error> for KvsError {
    fn from(err: std::fmt::Error) -> Self {
        KvsError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<serde_json::Error> for KvsError {
    fn from(err: serde_json::Error) -> Self {
        KvsError::new(
            &format!("JSON error: {}", err),
            ErrorKind::SerializationFailure,
        )
    }
}

impl From<String> for KvsError {
    fn from(msg: String) -> Self {
        KvsError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for KvsError {
    fn from(msg: &str) -> Self {
        KvsError::new(msg, ErrorKind::InternalError)
    }
}
