#![cfg(feature = "sync")]

use crate::core::adapter::Adapter;
use crate::core::app::{App, Dispatcher};
use crate::core::body::{Body, ChunkedDecoder, SyncReadStream};
use crate::core::config::AppConfig;
use crate::core::request::{
  BODY_IDLE_TIMEOUT_MS, BodyHint, HEAD_READ_TIMEOUT_MS, Request, RequestHead, read_head_sync,
};
use crate::core::request_type::Rt;
use crate::runtime::shared::{dispatch_guarded, encode_response, log_server_info, rejected};
use crate::runtime::sync::threadpool::ThreadPool;
use async_trait::async_trait;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A connection whose head has been read; the reader sits at the body.
pub struct SyncConnection {
  pub head: RequestHead,
  pub reader: BufReader<TcpStream>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SyncAdapter;

#[async_trait]
impl Adapter for SyncAdapter {
  type NativeRequest = SyncConnection;
  type NativeHandler = SyncHandler;

  fn into_request(&self, native: SyncConnection, config: &AppConfig) -> Request {
    let SyncConnection { head, reader } = native;
    // The socket keeps its head read timeout, which also bounds a stalled body.
    let body = match head.body_hint() {
      BodyHint::None => Body::empty(),
      BodyHint::Length(len) => {
        let raw = SyncReadStream::new(reader.take(len as u64)).ending_on_timeout();
        Body::from_stream(raw).with_expected_len(Some(len))
      }
      BodyHint::Chunked => Body::from_stream(ChunkedDecoder::new(SyncReadStream::new(reader).ending_on_timeout())),
      BodyHint::UntilIdle => {
        let _ = reader
          .get_ref()
          .set_read_timeout(Some(Duration::from_millis(BODY_IDLE_TIMEOUT_MS)));
        Body::from_stream(SyncReadStream::new(reader).ending_on_timeout())
      }
    };
    Request::from_head(head, body.with_max_buffer_size(config.body_max_buffer_size))
  }

  fn create_native_handler(dispatcher: Dispatcher<Self>) -> SyncHandler {
    SyncHandler { dispatcher }
  }
}

/// Serves one blocking connection at a time, on the calling thread.
#[derive(Clone)]
pub struct SyncHandler {
  dispatcher: Dispatcher<SyncAdapter>,
}

impl SyncHandler {
  pub fn serve(&self, mut stream: TcpStream, close: bool) {
    let read_half = match stream.try_clone() {
      Ok(read_half) => read_half,
      Err(err) => {
        tracing::warn!(error = %err, "could not clone connection");
        return;
      }
    };
    let _ = read_half.set_read_timeout(Some(Duration::from_millis(HEAD_READ_TIMEOUT_MS)));
    let mut reader = BufReader::new(read_half);

    let (response, head_only) = match read_head_sync(&mut reader) {
      Ok(head) => {
        let head_only = head.method == Rt::HEAD;
        let dispatch = self.dispatcher.dispatch(SyncConnection { head, reader });
        (futures::executor::block_on(dispatch_guarded(dispatch)), head_only)
      }
      Err(status) => (rejected(status), false),
    };

    let (head, mut body) = futures::executor::block_on(encode_response(response, close, head_only));
    let mut close = close;
    let mut written = stream.write_all(&head);
    while written.is_ok() {
      match futures::executor::block_on(body.next_piece()) {
        Some(Ok(piece)) => written = stream.write_all(&piece),
        Some(Err(err)) => {
          tracing::error!(error = %err, "response body failed mid-write; closing connection");
          close = true;
          break;
        }
        None => break,
      }
    }
    if let Err(err) = written.and_then(|_| stream.flush()) {
      tracing::debug!(error = %err, "client went away before the response was written");
    }
    if close {
      let _ = stream.shutdown(Shutdown::Both);
    }
  }
}

/// A blocking HTTP server: std sockets, a worker pool and the dispatcher.
pub struct Server {
  url: String,
  listener: TcpListener,
  pool: Arc<Mutex<ThreadPool>>,
  handler: SyncHandler,
  auto_close: bool,
}

impl Server {
  pub fn new(serving_url: &str, pool_size: u8, app: App) -> io::Result<Server> {
    let dispatcher = app
      .build(SyncAdapter)
      .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
    let listener = TcpListener::bind(serving_url)?;
    let url = listener.local_addr()?.to_string();
    let pool = Arc::new(Mutex::new(ThreadPool::new(pool_size as usize)?));

    Ok(Server {
      url,
      listener,
      pool,
      handler: dispatcher.into_native_handler(),
      auto_close: true,
    })
  }

  pub fn set_auto_close(&mut self, state: bool) {
    self.auto_close = state;
  }

  pub fn local_addr(&self) -> io::Result<SocketAddr> {
    self.listener.local_addr()
  }

  pub fn url(&self) -> &str {
    &self.url
  }

  pub fn run(&self) {
    if let Ok(addr) = self.listener.local_addr() {
      log_server_info("sync", addr, self.auto_close);
    }
    for stream in self.listener.incoming() {
      match stream {
        Ok(stream) => {
          let handler = self.handler.clone();
          let close = self.auto_close;
          let pool = self.pool.lock().unwrap_or_else(|err| err.into_inner());
          pool.run(move || handler.serve(stream, close));
        }
        Err(err) => tracing::warn!(error = %err, "failed to accept connection"),
      }
    }
  }

  pub fn stop(&self) {
    self.pool.lock().unwrap_or_else(|err| err.into_inner()).stop();
  }
}
