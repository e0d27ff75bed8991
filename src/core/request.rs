use crate::core::body::Body;
use crate::core::context::Context;
use crate::core::error::BodyError;
use crate::core::handler::ResponseTransformer;
use crate::core::headers::Headers;
use crate::core::request_type::{RequestType, Rt};
use crate::core::status_code::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

pub const HEAD_READ_TIMEOUT_MS: u64 = 2_000;
/// Silence that ends a body sent without `Content-Length` or chunked framing.
pub const BODY_IDLE_TIMEOUT_MS: u64 = 50;
pub const MAX_HEAD_BYTES: usize = 16 * 1024;
pub const MAX_URI: usize = 2000;

/// Generates a `read_head_*` function for a specific async runtime.
///
/// Reads header lines from a buffered reader until the blank line, a timeout
/// or EOF, then parses them. The reader is left positioned at the first body
/// byte so the caller can hand it to [`Body`] as a stream.
macro_rules! create_async_read_head {
  (
    $(#[$outer:meta])*
    $func_name:ident,
    $async_buf_read:path,
    $($async_buf_read_ext:ident)::+,
    $sleep:path
  ) => {
    $(#[$outer])*
    pub async fn $func_name<R>(reader: &mut R) -> Result<RequestHead, StatusCode>
    where
      R: $async_buf_read + Unpin + Send,
    {
      use $($async_buf_read_ext)::+;

      let mut raw = String::new();
      let timeout = std::time::Duration::from_millis(HEAD_READ_TIMEOUT_MS);
      loop {
        let mut line = String::new();
        let read_fut = reader.read_line(&mut line);
        let sleep = $sleep(timeout);
        futures::pin_mut!(read_fut, sleep);
        match futures::future::select(read_fut, sleep).await {
          futures::future::Either::Left((Ok(n), _)) if n > 0 => {
            raw.push_str(&line);
            if line == "\r\n" || line == "\n" || raw.len() > MAX_HEAD_BYTES {
              break;
            }
          }
          _ => break,
        }
      }
      RequestHead::parse(&raw)
    }
  };
}

create_async_read_head!(
  #[cfg(feature = "async_tokio")]
  read_head_tokio,
  tokio::io::AsyncBufRead,
  tokio::io::AsyncBufReadExt,
  tokio::time::sleep
);

create_async_read_head!(
  #[cfg(feature = "async_std")]
  read_head_async_std,
  async_std::io::BufRead,
  async_std::io::prelude::BufReadExt,
  async_std::task::sleep
);

create_async_read_head!(
  #[cfg(feature = "async_smol")]
  read_head_smol,
  futures_lite::io::AsyncBufRead,
  futures_lite::io::AsyncBufReadExt,
  smol::Timer::after
);

/// Blocking counterpart of the async head readers. Read timeouts are the
/// caller's business (set them on the socket).
#[cfg(feature = "sync")]
pub fn read_head_sync<R: std::io::BufRead>(reader: &mut R) -> Result<RequestHead, StatusCode> {
  let mut raw = String::new();
  loop {
    let mut line = String::new();
    if reader.read_line(&mut line).ok().filter(|&n| n > 0).is_none() {
      break;
    }
    raw.push_str(&line);
    if line == "\r\n" || line == "\n" || raw.len() > MAX_HEAD_BYTES {
      break;
    }
  }
  RequestHead::parse(&raw)
}

/// How the bytes after the head should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyHint {
  None,
  Length(usize),
  Chunked,
  /// No framing at all: read what arrives until the client goes quiet.
  UntilIdle,
}

/// A parsed HTTP/1.x request line plus headers.
#[derive(Debug, Clone)]
pub struct RequestHead {
  pub method: RequestType,
  pub target: String,
  pub version: String,
  pub headers: Headers,
}

impl RequestHead {
  /// Parses and validates a raw head. The error is the status to answer with.
  pub fn parse(raw: &str) -> Result<Self, StatusCode> {
    if raw.trim().is_empty() || raw.len() > MAX_HEAD_BYTES {
      return Err(StatusCode::BadRequest);
    }
    let mut lines = raw.lines();
    let request_line = lines.next().unwrap_or_default();
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 3 {
      return Err(StatusCode::BadRequest);
    }
    let method = RequestType::from_str(parts[0]);
    if !method.is_standard() {
      return Err(StatusCode::MethodNotAllowed);
    }
    let version = parts[2];
    if version != "HTTP/1.1" && version != "HTTP/1.0" {
      return Err(StatusCode::HttpVersionNotSupported);
    }
    if parts[1].len() > MAX_URI {
      return Err(StatusCode::UriTooLong);
    }

    let headers = lines
      .take_while(|l| !l.trim().is_empty())
      .filter_map(|l| l.split_once(':'))
      .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
      .collect();

    let head = RequestHead {
      method,
      target: parts[1].to_string(),
      version: version.to_string(),
      headers,
    };
    if head.has_transfer_encoding() && !head.is_chunked() {
      return Err(StatusCode::NotImplemented);
    }
    Ok(head)
  }

  pub fn content_length(&self) -> Option<usize> {
    self
      .headers
      .get_first("content-length")
      .and_then(|v| v.trim().parse::<usize>().ok())
  }

  pub fn has_transfer_encoding(&self) -> bool {
    self.headers.has("transfer-encoding")
  }

  /// True when `chunked` is the final transfer coding.
  pub fn is_chunked(&self) -> bool {
    self
      .headers
      .get("transfer-encoding")
      .and_then(|codings| codings.rsplit(',').next().map(|c| c.trim().eq_ignore_ascii_case("chunked")))
      .unwrap_or(false)
  }

  /// Chunked framing wins over a declared length. Without either, methods
  /// that carry a body get a short idle-terminated read.
  pub fn body_hint(&self) -> BodyHint {
    if self.is_chunked() {
      return BodyHint::Chunked;
    }
    match self.content_length() {
      Some(0) => BodyHint::None,
      Some(len) => BodyHint::Length(len),
      None if self.method.expects_body() => BodyHint::UntilIdle,
      None => BodyHint::None,
    }
  }
}

/// The runtime-independent request handed to handlers.
pub struct Request {
  pub method: RequestType,
  pub url: String,
  pub path: String,
  pub search: String,
  pub query: Vec<(String, String)>,
  pub version: String,
  pub headers: Headers,
  pub params: HashMap<String, String>,
  pub body: Body,
  pub context: Context,
  transformers: Mutex<Vec<Arc<dyn ResponseTransformer>>>,
}

/// Splits a request target into `(path, search)`; absolute URLs lose their
/// scheme and authority, fragments are dropped, `search` keeps its `?`.
fn split_target(url: &str) -> (String, String) {
  let without_fragment = url.split('#').next().unwrap_or_default();
  let origin_form = match without_fragment.find("://") {
    Some(scheme_end) => {
      let rest = &without_fragment[scheme_end + 3..];
      match rest.find(['/', '?']) {
        Some(i) => &rest[i..],
        None => "",
      }
    }
    None => without_fragment,
  };
  let (path, search) = match origin_form.find('?') {
    Some(i) => (&origin_form[..i], &origin_form[i..]),
    None => (origin_form, ""),
  };
  let path = if path.is_empty() { "/" } else { path };
  (path.to_string(), search.to_string())
}

impl Request {
  /// Builds a request, deriving `path`, `search` and `query` from `url` once.
  pub fn new(method: Rt, url: impl Into<String>) -> Self {
    let url = url.into();
    let (path, search) = split_target(&url);
    let query = url::form_urlencoded::parse(search.trim_start_matches('?').as_bytes())
      .into_owned()
      .collect();
    Request {
      method,
      url,
      path,
      search,
      query,
      version: "HTTP/1.1".to_string(),
      headers: Headers::new(),
      params: HashMap::new(),
      body: Body::empty(),
      context: Context::new(),
      transformers: Mutex::new(Vec::new()),
    }
  }

  pub fn from_head(head: RequestHead, body: Body) -> Self {
    let mut request = Request::new(head.method, head.target)
      .with_headers(head.headers)
      .with_body(body);
    request.version = head.version;
    request
  }

  pub fn with_headers(mut self, headers: Headers) -> Self {
    self.headers = headers;
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.append(name, value);
    self
  }

  pub fn with_body(mut self, body: impl Into<Body>) -> Self {
    self.body = body.into();
    self
  }

  pub fn header(&self, name: &str) -> Option<String> {
    self.headers.get(name)
  }

  pub fn origin(&self) -> Option<&str> {
    self.headers.get_first("origin")
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name).map(String::as_str)
  }

  /// First value of a query parameter.
  pub fn query_value(&self, name: &str) -> Option<&str> {
    self
      .query
      .iter()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }

  pub fn query_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    self
      .query
      .iter()
      .filter(move |(k, _)| k == name)
      .map(|(_, v)| v.as_str())
  }

  /// Typed context value merged in by the application's context getter.
  pub fn ctx<T: Send + Sync + 'static>(&self) -> Option<&T> {
    self.context.get::<T>()
  }

  pub fn body_used(&self) -> bool {
    self.body.body_used()
  }

  pub async fn text(&self) -> Result<String, BodyError> {
    self.body.text().await
  }

  pub async fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
    self.body.json().await
  }

  pub async fn json_value(&self) -> Result<serde_json::Value, BodyError> {
    self.body.json_value().await
  }

  pub async fn array_buffer(&self) -> Result<Vec<u8>, BodyError> {
    self.body.array_buffer().await
  }

  /// Registers a transformer applied to the final response of this request.
  pub fn on_response(&self, transformer: Arc<dyn ResponseTransformer>) {
    self
      .transformers
      .lock()
      .unwrap_or_else(|err| err.into_inner())
      .push(transformer);
  }

  pub(crate) fn take_transformers(&self) -> Vec<Arc<dyn ResponseTransformer>> {
    std::mem::take(&mut *self.transformers.lock().unwrap_or_else(|err| err.into_inner()))
  }
}

impl Default for Request {
  fn default() -> Self {
    Request::new(RequestType::GET, "/")
  }
}

impl std::fmt::Debug for Request {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Request")
      .field("method", &self.method)
      .field("url", &self.url)
      .field("headers", &self.headers)
      .field("params", &self.params)
      .field("body", &self.body)
      .finish()
  }
}

impl Display for Request {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut keys: Vec<&String> = self.params.keys().collect();
    keys.sort();
    let params_str = {
      let parts: Vec<String> = keys
        .into_iter()
        .map(|k| format!("\"{}\": \"{}\"", k, self.params[k]))
        .collect();
      format!("{{{}}}", parts.join(", "))
    };
    write!(
      f,
      "Method: {}\n\
       Path: {}\n\
       Version: {}\n\
       Headers: {:#?},\n\
       Params: {}",
      self.method, self.path, self.version, self.headers, params_str
    )
  }
}
