use super::shared::{self, AsyncStream, GenericServer};
use crate::core::adapter::Adapter;
use crate::core::app::{App, Dispatcher};
use crate::core::body::{Body, ChunkedDecoder, FuturesReadStream, IdleTimeout};
use crate::core::config::AppConfig;
use crate::core::request::{
  BODY_IDLE_TIMEOUT_MS, BodyHint, HEAD_READ_TIMEOUT_MS, Request, RequestHead, read_head_smol,
};
use crate::core::request_type::Rt;
use crate::runtime::shared::{dispatch_guarded, log_server_info, rejected};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures_lite::io::{AsyncReadExt, BufReader};
use smol::io::AsyncWriteExt;
use smol::net::{TcpListener, TcpStream};
use smol::spawn;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

#[async_trait]
impl AsyncStream for TcpStream {
  async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
    AsyncWriteExt::write_all(self, buf).await
  }

  async fn flush(&mut self) -> std::io::Result<()> {
    AsyncWriteExt::flush(self).await
  }

  async fn shutdown(&mut self) -> std::io::Result<()> {
    AsyncWriteExt::close(self).await
  }
}

fn sleep(duration: Duration) -> BoxFuture<'static, ()> {
  async move {
    smol::Timer::after(duration).await;
  }
  .boxed()
}

/// A connection whose head has been read; the reader sits at the body.
pub struct SmolConnection {
  pub head: RequestHead,
  pub reader: BufReader<TcpStream>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SmolAdapter;

#[async_trait]
impl Adapter for SmolAdapter {
  type NativeRequest = SmolConnection;
  type NativeHandler = SmolHandler;

  fn into_request(&self, native: SmolConnection, config: &AppConfig) -> Request {
    let SmolConnection { head, reader } = native;
    let stall = Duration::from_millis(HEAD_READ_TIMEOUT_MS);
    let body = match head.body_hint() {
      BodyHint::None => Body::empty(),
      BodyHint::Length(len) => {
        let raw = FuturesReadStream::new(reader.take(len as u64));
        Body::from_stream(IdleTimeout::new(raw, stall, sleep)).with_expected_len(Some(len))
      }
      BodyHint::Chunked => {
        let raw = IdleTimeout::new(FuturesReadStream::new(reader), stall, sleep);
        Body::from_stream(ChunkedDecoder::new(raw))
      }
      BodyHint::UntilIdle => {
        let idle = Duration::from_millis(BODY_IDLE_TIMEOUT_MS);
        Body::from_stream(IdleTimeout::new(FuturesReadStream::new(reader), idle, sleep))
      }
    };
    Request::from_head(head, body.with_max_buffer_size(config.body_max_buffer_size))
  }

  fn create_native_handler(dispatcher: Dispatcher<Self>) -> SmolHandler {
    SmolHandler { dispatcher }
  }
}

pub struct SmolHandler {
  dispatcher: Dispatcher<SmolAdapter>,
}

impl SmolHandler {
  pub async fn serve(&self, mut stream: TcpStream, close: bool) {
    let mut reader = BufReader::new(stream.clone());
    let (response, head_only) = match read_head_smol(&mut reader).await {
      Ok(head) => {
        let head_only = head.method == Rt::HEAD;
        let dispatch = self.dispatcher.dispatch(SmolConnection { head, reader });
        (dispatch_guarded(dispatch).await, head_only)
      }
      Err(status) => (rejected(status), false),
    };
    shared::send_response(&mut stream, response, close, head_only).await;
  }
}

/// A non-blocking HTTP server powered by Smol.
pub struct Server(pub GenericServer<TcpListener, SmolHandler>);

impl Deref for Server {
  type Target = GenericServer<TcpListener, SmolHandler>;
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
      .build(SmolAdapter)
      .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let listener = TcpListener::bind(serving_url).await?;
    let url = listener.local_addr()?.to_string();
    Ok(Server(GenericServer::new(listener, url, dispatcher.into_native_handler())))
  }

  /// Returns the socket address the server is currently bound to.
  pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
    self.listener.local_addr()
  }

  /// Starts accepting connections; each one runs on a detached task.
  pub async fn run(&self) {
    if let Ok(addr) = self.listener.local_addr() {
      log_server_info("smol", addr, self.auto_close);
    }
    loop {
      match self.listener.accept().await {
        Ok((stream, _)) => {
          let handler = self.handler.clone();
          let close = self.auto_close;
          spawn(async move {
            handler.serve(stream, close).await;
          })
          .detach();
        }
        Err(err) => tracing::warn!(error = %err, "failed to accept connection"),
      }
    }
  }
}
