use crate::core::response::Response;
use crate::runtime::shared::encode_response;
use async_trait::async_trait;
use std::io::Result;
use std::sync::Arc;

/// Write side of a connection, abstracted over the async runtimes.
#[async_trait]
pub trait AsyncStream: Send {
  async fn write_all(&mut self, buf: &[u8]) -> Result<()>;
  async fn flush(&mut self) -> Result<()>;
  async fn shutdown(&mut self) -> Result<()>;
}

/// Writes a response to the client over the given stream.
pub async fn send_response<S: AsyncStream>(stream: &mut S, response: Response, close: bool, head_only: bool) {
  let (head, mut body) = encode_response(response, close, head_only).await;
  let mut close = close;
  let mut written = stream.write_all(&head).await;
  while written.is_ok() {
    match body.next_piece().await {
      Some(Ok(piece)) => written = stream.write_all(&piece).await,
      Some(Err(err)) => {
        tracing::error!(error = %err, "response body failed mid-write; closing connection");
        close = true;
        break;
      }
      None => break,
    }
  }
  let written = match written {
    Ok(()) => stream.flush().await,
    Err(err) => Err(err),
  };
  if let Err(err) = written {
    tracing::debug!(error = %err, "client went away before the response was written");
  }
  if close {
    let _ = stream.shutdown().await;
  }
}

/// Listener plus connection handler, shared by the async runtimes. `H` is the
/// runtime's native handler.
pub struct GenericServer<L, H> {
  pub listener: L,
  pub url: String,
  pub handler: Arc<H>,
  pub auto_close: bool,
}

impl<L, H> GenericServer<L, H> {
  pub fn new(listener: L, url: String, handler: H) -> Self {
    GenericServer {
      listener,
      url,
      handler: Arc::new(handler),
      auto_close: true,
    }
  }

  /// Toggles the `Connection: close` header.
  pub fn set_auto_close(&mut self, active: bool) {
    self.auto_close = active;
  }

  pub fn url(&self) -> &str {
    self.url.as_str()
  }
}
