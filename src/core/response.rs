use crate::core::body::BodyStream;
use crate::core::headers::Headers;
use crate::core::static_files::StaticFile;
use crate::core::status_code::{StatusCode, reason_for};
use serde::Serialize;
use std::fmt;
use std::io;

/// Status, status text and headers of a response being constructed.
#[derive(Debug, Clone)]
pub struct ResponseInit {
  pub status: u16,
  pub status_text: String,
  pub headers: Headers,
}

impl Default for ResponseInit {
  fn default() -> Self {
    ResponseInit {
      status: 200,
      status_text: String::new(),
      headers: Headers::new(),
    }
  }
}

impl ResponseInit {
  pub fn status(status: u16) -> Self {
    ResponseInit {
      status,
      ..Default::default()
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.set(name, value);
    self
  }
}

pub enum ResponseBody {
  Empty,
  Bytes(Vec<u8>),
  Text(String),
  Stream(Box<dyn BodyStream>),
  /// A file still to be resolved by the adapter.
  File(StaticFile),
}

impl ResponseBody {
  pub fn is_empty(&self) -> bool {
    match self {
      ResponseBody::Empty => true,
      ResponseBody::Bytes(b) => b.is_empty(),
      ResponseBody::Text(t) => t.is_empty(),
      _ => false,
    }
  }

  /// Byte length when known without reading.
  pub fn known_len(&self) -> Option<usize> {
    match self {
      ResponseBody::Empty => Some(0),
      ResponseBody::Bytes(b) => Some(b.len()),
      ResponseBody::Text(t) => Some(t.len()),
      _ => None,
    }
  }
}

impl fmt::Debug for ResponseBody {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResponseBody::Empty => f.write_str("Empty"),
      ResponseBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
      ResponseBody::Text(t) => f.debug_tuple("Text").field(t).finish(),
      ResponseBody::Stream(_) => f.write_str("Stream"),
      ResponseBody::File(file) => f.debug_tuple("File").field(&file.file_path).finish(),
    }
  }
}

impl From<()> for ResponseBody {
  fn from(_: ()) -> Self {
    ResponseBody::Empty
  }
}

impl From<String> for ResponseBody {
  fn from(text: String) -> Self {
    ResponseBody::Text(text)
  }
}

impl From<&str> for ResponseBody {
  fn from(text: &str) -> Self {
    ResponseBody::Text(text.to_string())
  }
}

impl From<Vec<u8>> for ResponseBody {
  fn from(bytes: Vec<u8>) -> Self {
    ResponseBody::Bytes(bytes)
  }
}

/// An immutable response value. Every `with_*` call yields a new response.
#[derive(Debug)]
pub struct Response {
  status: u16,
  status_text: String,
  headers: Headers,
  body: ResponseBody,
}

impl Response {
  pub fn new(body: impl Into<ResponseBody>) -> Self {
    Self::with_init(body, ResponseInit::default())
  }

  pub fn with_init(body: impl Into<ResponseBody>, init: ResponseInit) -> Self {
    Response {
      status: init.status,
      status_text: init.status_text,
      headers: init.headers,
      body: body.into(),
    }
  }

  pub fn text(text: impl Into<String>) -> Self {
    Self::new(text.into()).with_header("Content-Type", "text/plain; charset=utf-8")
  }

  /// Serializes `value` as the body and sets `Content-Type: application/json`.
  pub fn json<T: Serialize + ?Sized>(value: &T, init: ResponseInit) -> serde_json::Result<Self> {
    let bytes = serde_json::to_vec(value)?;
    Ok(Self::with_init(bytes, init).with_header("Content-Type", "application/json"))
  }

  pub fn not_found() -> Self {
    Self::with_init("Not found", ResponseInit::status(StatusCode::NotFound.code()))
  }

  pub fn status_only(status: StatusCode) -> Self {
    Self::with_init(ResponseBody::Empty, ResponseInit::status(status.code()))
  }

  /// A response whose body is the given file, with the file's own init.
  pub fn file(file: StaticFile) -> Self {
    let init = file.init.clone();
    Self::with_init(ResponseBody::File(file), init)
  }

  pub fn status(&self) -> u16 {
    self.status
  }

  pub fn status_text(&self) -> &str {
    &self.status_text
  }

  /// Status text, falling back to the canonical reason phrase.
  pub fn reason(&self) -> &str {
    if self.status_text.is_empty() {
      reason_for(self.status)
    } else {
      &self.status_text
    }
  }

  pub fn headers(&self) -> &Headers {
    &self.headers
  }

  pub fn header(&self, name: &str) -> Option<String> {
    self.headers.get(name)
  }

  pub fn body(&self) -> &ResponseBody {
    &self.body
  }

  pub fn into_parts(self) -> (ResponseInit, ResponseBody) {
    (
      ResponseInit {
        status: self.status,
        status_text: self.status_text,
        headers: self.headers,
      },
      self.body,
    )
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = status;
    self
  }

  pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
    self.status_text = status_text.into();
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.set(name, value);
    self
  }

  pub fn with_headers(mut self, headers: &Headers) -> Self {
    self.headers.merge(headers);
    self
  }

  pub fn with_body(mut self, body: impl Into<ResponseBody>) -> Self {
    self.body = body.into();
    self
  }

  /// Materializes the body. Files must have been resolved by the adapter.
  pub async fn into_bytes(self) -> io::Result<Vec<u8>> {
    match self.body {
      ResponseBody::Empty => Ok(Vec::new()),
      ResponseBody::Bytes(bytes) => Ok(bytes),
      ResponseBody::Text(text) => Ok(text.into_bytes()),
      ResponseBody::Stream(mut stream) => {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
          out.extend_from_slice(&chunk?);
        }
        Ok(out)
      }
      ResponseBody::File(file) => Err(io::Error::other(format!(
        "static file {} was not resolved",
        file.file_path
      ))),
    }
  }

  pub async fn into_text(self) -> io::Result<String> {
    let bytes = self.into_bytes().await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
  }
}

impl Default for Response {
  fn default() -> Self {
    Response::new(ResponseBody::Empty)
  }
}
