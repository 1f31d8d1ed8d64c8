//! Error types for the `session` crate.
//!
//! Follows the same pattern as the other workspace crates: a root `Error` struct
//! holding an error kind tree and an optional source for error chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the session crate.
/// Holds error kind and optional source for error chaining.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the session crate.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Auth(AuthErrorKind),
    Http(HttpErrorKind),
    /// The credential could not be decoded into claims.
    Decode,
}

/// Errors from login, logout and renewal operations.
#[derive(Debug, PartialEq)]
pub enum AuthErrorKind {
    /// The server rejected the submitted email/password pair.
    InvalidCredentials,
    /// The refresh cookie was rejected, expired or absent.
    RenewalFailed,
    /// An operation required a credential and the store was empty.
    NoCredential,
}

/// Errors from HTTP transport operations.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Network,
    /// The server answered with a non-success status.
    Status(u16),
    /// The response body did not match the expected shape.
    InvalidResponse,
}

impl Error {
    /// The HTTP status code carried by this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self.error_kind {
            ErrorKind::Http(HttpErrorKind::Status(code)) => Some(code),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Auth(kind) => write!(f, "Auth error: {:?}", kind),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
            ErrorKind::Decode => write!(f, "Credential decode error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_decode() {
            ErrorKind::Http(HttpErrorKind::InvalidResponse)
        } else if let Some(status) = err.status() {
            ErrorKind::Http(HttpErrorKind::Status(status.as_u16()))
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            // Errors raised by our own middleware keep their kind across the stack.
            reqwest_middleware::Error::Middleware(err) => match err.downcast::<Error>() {
                Ok(err) => err,
                Err(err) => Error {
                    source: Some(err.into()),
                    error_kind: ErrorKind::Http(HttpErrorKind::Network),
                },
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Http(HttpErrorKind::InvalidResponse),
        }
    }
}

/// Helper function to create auth errors.
pub fn auth_error(kind: AuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Auth(kind),
    }
}

/// Helper function to create HTTP errors.
pub fn http_error(kind: HttpErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Http(kind),
    }
}

/// Helper function to create decode errors.
pub fn decode_error(message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Decode,
    }
}
