//! Error types for the `realtime` crate.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// No access token was available to authenticate the connection.
    NoCredential,
    /// The session could not be opened.
    Connect,
    /// The session closed before the operation finished.
    Closed,
    Serialization,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Realtime error ({:?}): {}", self.error_kind, source),
            None => write!(f, "Realtime error ({:?})", self.error_kind),
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

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Serialization,
        }
    }
}

pub(crate) fn error(kind: ErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_message() {
        let err = error(ErrorKind::NoCredential, "no access token");
        assert_eq!(err.to_string(), "Realtime error (NoCredential): no access token");
    }

    #[test]
    fn test_serde_failure_maps_to_serialization() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.error_kind, ErrorKind::Serialization);
        assert!(err.source.is_some());
    }
}
