use crate::core::app::Dispatch;
use crate::core::body::BodyStream;
use crate::core::headers::Headers;
use crate::core::response::{Response, ResponseBody};
use crate::core::status_code::StatusCode;
use futures::FutureExt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

/// Headers the wire writer owns; values set by handlers are replaced.
const FRAMING_HEADERS: [&str; 3] = ["content-length", "connection", "transfer-encoding"];

pub fn log_server_info(runtime: &'static str, addr: SocketAddr, auto_close: bool) {
  tracing::info!(runtime, %addr, auto_close, "server listening on http://{}", addr);
}

fn write_head(status: u16, reason: &str, headers: &Headers, content_length: usize, close: bool) -> Vec<u8> {
  let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason);
  for (name, value) in headers.iter_raw() {
    if FRAMING_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
      continue;
    }
    head.push_str(name);
    head.push_str(": ");
    head.push_str(value);
    head.push_str("\r\n");
  }
  // 204 and 304 go out without Content-Length.
  if !matches!(status, 204 | 304) {
    head.push_str(&format!("Content-Length: {}\r\n", content_length));
  }
  if close {
    head.push_str("Connection: close\r\n");
  }
  head.push_str("\r\n");
  head.into_bytes()
}

/// The body half of an encoded response, handed out piece by piece so a
/// streamed body of known length never sits in memory whole.
pub struct WireBody {
  buffered: Option<Vec<u8>>,
  stream: Option<Box<dyn BodyStream>>,
  left: usize,
}

impl WireBody {
  fn buffered(bytes: Vec<u8>) -> Self {
    WireBody {
      buffered: Some(bytes),
      stream: None,
      left: 0,
    }
  }

  fn streamed(stream: Box<dyn BodyStream>, len: usize) -> Self {
    WireBody {
      buffered: None,
      stream: Some(stream),
      left: len,
    }
  }

  /// Next bytes to write, `None` once the declared length has been sent.
  pub async fn next_piece(&mut self) -> Option<io::Result<Vec<u8>>> {
    if let Some(bytes) = self.buffered.take() {
      return (!bytes.is_empty()).then_some(Ok(bytes));
    }
    if self.left == 0 {
      return None;
    }
    let stream = self.stream.as_mut()?;
    match stream.next_chunk().await {
      Some(Ok(mut chunk)) => {
        chunk.truncate(self.left);
        self.left -= chunk.len();
        Some(Ok(chunk))
      }
      Some(Err(err)) => {
        self.left = 0;
        Some(Err(err))
      }
      None => {
        self.left = 0;
        Some(Err(io::Error::new(
          io::ErrorKind::UnexpectedEof,
          "response body ended before its Content-Length",
        )))
      }
    }
  }
}

/// Splits a response into HTTP/1.1 head bytes and the body to follow. A
/// stream with a declared `Content-Length` (static files) is passed through
/// as is; any other body is materialized to learn its length. `head_only`
/// keeps the length but leaves the body out (HEAD requests).
pub async fn encode_response(response: Response, close: bool, head_only: bool) -> (Vec<u8>, WireBody) {
  let status = response.status();
  let reason = response.reason().to_string();
  let declared = response
    .headers()
    .get_first("content-length")
    .and_then(|v| v.trim().parse::<usize>().ok());
  let (init, body) = response.into_parts();

  let body = match (body, declared) {
    (ResponseBody::Stream(stream), Some(len)) => {
      let head = write_head(status, &reason, &init.headers, len, close);
      let body = if head_only {
        WireBody::buffered(Vec::new())
      } else {
        WireBody::streamed(stream, len)
      };
      return (head, body);
    }
    (body, _) => body,
  };

  let headers = init.headers.clone();
  match Response::with_init(body, init).into_bytes().await {
    Ok(bytes) => {
      let head = write_head(status, &reason, &headers, bytes.len(), close);
      (head, WireBody::buffered(if head_only { Vec::new() } else { bytes }))
    }
    Err(err) => {
      tracing::error!(error = %err, "failed to read response body");
      let fallback = Response::status_only(StatusCode::InternalServerError);
      let head = write_head(fallback.status(), fallback.reason(), fallback.headers(), 0, close);
      (head, WireBody::buffered(Vec::new()))
    }
  }
}

/// Awaits a dispatch, answering 500 when a handler panics so the client is
/// not left without a response.
pub async fn dispatch_guarded<F>(dispatch: F) -> Response
where
  F: Future<Output = Dispatch>,
{
  match AssertUnwindSafe(dispatch).catch_unwind().await {
    Ok(dispatch) => dispatch.into_response(),
    Err(_) => {
      tracing::error!("handler panicked while serving a request");
      Response::status_only(StatusCode::InternalServerError)
    }
  }
}

/// Response for a head that could not be parsed.
pub fn rejected(status: StatusCode) -> Response {
  tracing::debug!(%status, "rejected malformed request");
  Response::status_only(status)
}
