use super::shared::{self, AsyncStream, GenericServer};
use crate::core::adapter::Adapter;
use crate::core::app::{App, Dispatcher};
use crate::core::body::{Body, ChunkedDecoder, TokioReadStream, IdleTimeout};
use crate::core::config::AppConfig;
use crate::core::request::{
  BODY_IDLE_TIMEOUT_MS, BodyHint, HEAD_READ_TIMEOUT_MS, Request, RequestHead, read_head_tokio,
};
use crate::core::request_type::Rt;
use crate::runtime::shared::{dispatch_guarded, log_server_info, rejected};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

#[async_trait]
impl AsyncStream for OwnedWriteHalf {
  async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
    AsyncWriteExt::write_all(self, buf).await
  }

  async fn flush(&mut self) -> std::io::Result<()> {
    AsyncWriteExt::flush(self).await
  }

  async fn shutdown(&mut self) -> std::io::Result<()> {
    AsyncWriteExt::shutdown(self).await
  }
}

fn sleep(duration: Duration) -> BoxFuture<'static, ()> {
  tokio::time::sleep(duration).boxed()
}

/// A connection whose head has been read; the reader sits at the body.
pub struct TokioConnection {
  pub head: RequestHead,
  pub reader: BufReader<OwnedReadHalf>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioAdapter;

#[async_trait]
impl Adapter for TokioAdapter {
  type NativeRequest = TokioConnection;
  type NativeHandler = TokioHandler;

  fn into_request(&self, native: TokioConnection, config: &AppConfig) -> Request {
    let TokioConnection { head, reader } = native;
    let stall = Duration::from_millis(HEAD_READ_TIMEOUT_MS);
    let body = match head.body_hint() {
      BodyHint::None => Body::empty(),
      BodyHint::Length(len) => {
        let raw = TokioReadStream::new(reader.take(len as u64));
        Body::from_stream(IdleTimeout::new(raw, stall, sleep)).with_expected_len(Some(len))
      }
      BodyHint::Chunked => {
        let raw = IdleTimeout::new(TokioReadStream::new(reader), stall, sleep);
        Body::from_stream(ChunkedDecoder::new(raw))
      }
      BodyHint::UntilIdle => {
        let idle = Duration::from_millis(BODY_IDLE_TIMEOUT_MS);
        Body::from_stream(IdleTimeout::new(TokioReadStream::new(reader), idle, sleep))
      }
    };
    Request::from_head(head, body.with_max_buffer_size(config.body_max_buffer_size))
  }

  fn create_native_handler(dispatcher: Dispatcher<Self>) -> TokioHandler {
    TokioHandler { dispatcher }
  }
}

pub struct TokioHandler {
  dispatcher: Dispatcher<TokioAdapter>,
}

impl TokioHandler {
  pub async fn serve(&self, stream: TcpStream, close: bool) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let (response, head_only) = match read_head_tokio(&mut reader).await {
      Ok(head) => {
        let head_only = head.method == Rt::HEAD;
        let dispatch = self.dispatcher.dispatch(TokioConnection { head, reader });
        (dispatch_guarded(dispatch).await, head_only)
      }
      Err(status) => (rejected(status), false),
    };
    shared::send_response(&mut write_half, response, close, head_only).await;
  }
}

/// A non-blocking HTTP server powered by Tokio.
pub struct Server(pub GenericServer<TcpListener, TokioHandler>);

impl Deref for Server {
  type Target = GenericServer<TcpListener, TokioHandler>;
  fn deref(&self) -> &Self::Target {
    &self.0
  }
}

impl DerefMut for Server {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.0
  }
}

impl Server {
  /// Builds the application and binds to the specified URL.
  pub async fn new(serving_url: &str, app: App) -> std::io::Result<Self> {
    let dispatcher = app
      .build(TokioAdapter)
      .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let listener = TcpListener::bind(serving_url).await?;
    let url = listener.local_addr()?.to_string();
    Ok(Server(GenericServer::new(listener, url, dispatcher.into_native_handler())))
  }

  /// Returns the socket address the server is currently bound to.
  pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
    self.listener.local_addr()
  }

  /// Starts accepting connections; each one runs on its own task.
  pub async fn run(&self) {
    if let Ok(addr) = self.listener.local_addr() {
      log_server_info("tokio", addr, self.auto_close);
    }
    loop {
      match self.listener.accept().await {
        Ok((stream, _)) => {
          let handler = self.handler.clone();
          let close = self.auto_close;
          tokio::spawn(async move {
            handler.serve(stream, close).await;
          });
        }
        Err(err) => tracing::warn!(error = %err, "failed to accept connection"),
      }
    }
  }
}
