//! Error taxonomy for the request pipeline.
//!
//! Three families reach the dispatcher:
//! - [`HttpError`]: declared errors, rendered with their own status and message.
//! - [`BodyError`]: body consumption failures, mostly converted into `HttpError`s.
//! - everything else: application errors, routed to the configured error handler.

use thiserror::Error;

/// An error carrying the HTTP status it should be rendered with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status} {message}")]
pub struct HttpError {
  pub status: u16,
  pub message: String,
}

impl HttpError {
  pub fn new(status: u16, message: impl Into<String>) -> Self {
    Self {
      status,
      message: message.into(),
    }
  }

  pub fn bad_request(message: impl Into<String>) -> Self {
    Self::new(400, message)
  }

  pub fn not_found() -> Self {
    Self::new(404, "Not found")
  }
}

/// Failures of the unified body accessors.
#[derive(Debug, Error)]
pub enum BodyError {
  /// A consuming accessor ran after the body was already read.
  #[error("Body already read: cannot call {accessor}() on a consumed stream")]
  AlreadyRead { accessor: &'static str },

  /// The drained body grew past the configured buffer limit.
  #[error("Payload too large: body exceeds {limit} bytes")]
  PayloadTooLarge { limit: usize },

  /// The drained size differs from the declared content length.
  #[error("Body size mismatch: expected {expected} bytes, got {actual}")]
  SizeMismatch { expected: usize, actual: usize },

  #[error("Invalid JSON body: {0}")]
  InvalidJson(#[source] serde_json::Error),

  #[error("Body stream failed: {0}")]
  Io(#[from] std::io::Error),
}

/// Raised at application construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
  #[error("Invalid route pattern {pattern:?}: {reason}")]
  InvalidPattern { pattern: String, reason: &'static str },
}

/// Any failure surfacing from a handler, a context getter or the adapter.
#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Http(#[from] HttpError),

  #[error(transparent)]
  Body(BodyError),

  /// A handler result could not be serialized to JSON.
  #[error("Failed to serialize result of route {route}: {source}")]
  Serialization {
    route: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("{0}")]
  Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wraps any error value as an application error.
  pub fn handler<E>(error: E) -> Self
  where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
  {
    Error::Handler(error.into())
  }

  /// Builds an application error from a plain message.
  pub fn msg(message: impl Into<String>) -> Self {
    Error::Handler(message.into().into())
  }

  /// The error class name, as exposed to error handlers.
  pub fn name(&self) -> &'static str {
    match self {
      Error::Http(_) => "HttpError",
      Error::Body(BodyError::AlreadyRead { .. }) => "BodyAlreadyReadError",
      Error::Body(_) => "BodyError",
      Error::Serialization { .. } => "HandlerSerializationError",
      Error::Handler(_) => "Error",
    }
  }

  /// The message without the class name.
  pub fn message(&self) -> String {
    match self {
      Error::Http(e) => e.message.clone(),
      other => other.to_string(),
    }
  }

  pub fn as_http(&self) -> Option<&HttpError> {
    match self {
      Error::Http(e) => Some(e),
      _ => None,
    }
  }
}

impl From<BodyError> for Error {
  fn from(error: BodyError) -> Self {
    match error {
      BodyError::PayloadTooLarge { .. } => Error::Http(HttpError::new(413, error.to_string())),
      BodyError::SizeMismatch { .. } | BodyError::InvalidJson(_) => {
        Error::Http(HttpError::bad_request(error.to_string()))
      }
      // Broken chunked framing or a body cut short by the client.
      BodyError::Io(ref io)
        if matches!(io.kind(), std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof) =>
      {
        Error::Http(HttpError::bad_request(error.to_string()))
      }
      other => Error::Body(other),
    }
  }
}
