use std::fmt::{self, Display, Formatter};

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum StatusCode {
  Ok,
  Created,
  NoContent,
  NotModified,
  BadRequest,
  Unauthorized,
  Forbidden,
  NotFound,
  MethodNotAllowed,
  PayloadTooLarge,
  UriTooLong,
  InternalServerError,
  NotImplemented,
  HttpVersionNotSupported,
}

impl StatusCode {
  pub fn code(self) -> u16 {
    match self {
      StatusCode::Ok => 200,
      StatusCode::Created => 201,
      StatusCode::NoContent => 204,
      StatusCode::NotModified => 304,
      StatusCode::BadRequest => 400,
      StatusCode::Unauthorized => 401,
      StatusCode::Forbidden => 403,
      StatusCode::NotFound => 404,
      StatusCode::MethodNotAllowed => 405,
      StatusCode::PayloadTooLarge => 413,
      StatusCode::UriTooLong => 414,
      StatusCode::InternalServerError => 500,
      StatusCode::NotImplemented => 501,
      StatusCode::HttpVersionNotSupported => 505,
    }
  }

  pub fn reason(self) -> &'static str {
    reason_for(self.code())
  }
}

impl From<StatusCode> for u16 {
  fn from(status: StatusCode) -> u16 {
    status.code()
  }
}

/// Wire form of the status line tail, e.g. `404 Not Found`.
impl Display for StatusCode {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.code(), self.reason())
  }
}

/// Canonical reason phrase for a numeric status; empty for unknown codes.
pub fn reason_for(code: u16) -> &'static str {
  match code {
    100 => "Continue",
    101 => "Switching Protocols",
    200 => "OK",
    201 => "Created",
    202 => "Accepted",
    204 => "No Content",
    206 => "Partial Content",
    301 => "Moved Permanently",
    302 => "Found",
    303 => "See Other",
    304 => "Not Modified",
    307 => "Temporary Redirect",
    308 => "Permanent Redirect",
    400 => "Bad Request",
    401 => "Unauthorized",
    403 => "Forbidden",
    404 => "Not Found",
    405 => "Method Not Allowed",
    406 => "Not Acceptable",
    409 => "Conflict",
    410 => "Gone",
    411 => "Length Required",
    412 => "Precondition Failed",
    413 => "Payload Too Large",
    414 => "URI Too Long",
    415 => "Unsupported Media Type",
    422 => "Unprocessable Entity",
    429 => "Too Many Requests",
    500 => "Internal Server Error",
    501 => "Not Implemented",
    502 => "Bad Gateway",
    503 => "Service Unavailable",
    504 => "Gateway Timeout",
    505 => "HTTP Version Not Supported",
    _ => "",
  }
}
