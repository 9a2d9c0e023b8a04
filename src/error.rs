use std::fmt;

/// Coarse classification callers use to decide between retrying,
/// re-authenticating and giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Validation,
    Lookup,
    Configuration,
}

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Cancelled,
    Timeout { task_id: String, attempts: u32 },
    Validation {
        schema: &'static str,
        path: String,
        reason: String,
    },
    Lookup(String),
    Config(String),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl Error {
    pub(crate) fn validation(
        schema: &'static str,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Validation {
            schema,
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Cancelled | Error::Timeout { .. } | Error::Io(_) => {
                ErrorKind::Transport
            }
            Error::Validation { .. } | Error::Json(_) => ErrorKind::Validation,
            Error::Lookup(_) => ErrorKind::Lookup,
            Error::Config(_) => ErrorKind::Configuration,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Cancelled => write!(f, "operation cancelled"),
            Error::Timeout { task_id, attempts } => {
                write!(f, "task {task_id} not complete after {attempts} checks")
            }
            Error::Validation {
                schema,
                path,
                reason,
            } => {
                if path.is_empty() || path == "." {
                    write!(f, "invalid {schema}: {reason}")
                } else {
                    write!(f, "invalid {schema} at {path}: {reason}")
                }
            }
            Error::Lookup(what) => write!(f, "not found: {what}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
