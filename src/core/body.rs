//! Unified request body.
//!
//! A [`Body`] wraps exactly one byte source (nothing, a buffer, a string or a
//! stream) and hands it out once through `text()`, `json()` or
//! `array_buffer()`. Streams from every supported runtime are reduced to the
//! [`BodyStream`] capability.

use crate::core::error::BodyError;
use async_trait::async_trait;
use futures::future::{BoxFuture, Either};
use serde::de::DeserializeOwned;
use std::fmt;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

/// Default cap for drained bodies: 100 KiB.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100 * 1024;

const CHUNK_SIZE: usize = 8 * 1024;

/// A pull-based byte stream, independent of the runtime that produced it.
#[async_trait]
pub trait BodyStream: Send + Sync {
  /// Next chunk, `None` at end of stream.
  async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>>;

  /// Whether the underlying native stream has been read, if the runtime can
  /// tell. `None` means no signal is available.
  fn disturbed(&self) -> Option<bool> {
    None
  }
}

/// Shared "this stream has been read" flag. Every holder of a native stream
/// clones the same signal, so a read through any of them is observable.
#[derive(Clone, Debug, Default)]
pub struct ReadSignal(Arc<AtomicBool>);

impl ReadSignal {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn mark(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_set(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Blocking reader used by the std runtime.
pub struct SyncReadStream<R> {
  reader: R,
  signal: ReadSignal,
  ends_on_timeout: bool,
}

impl<R: Read + Send + Sync> SyncReadStream<R> {
  pub fn new(reader: R) -> Self {
    Self::with_signal(reader, ReadSignal::new())
  }

  pub fn with_signal(reader: R, signal: ReadSignal) -> Self {
    Self {
      reader,
      signal,
      ends_on_timeout: false,
    }
  }

  /// Treats a socket read timeout as the end of the stream instead of an error.
  pub fn ending_on_timeout(mut self) -> Self {
    self.ends_on_timeout = true;
    self
  }
}

#[async_trait]
impl<R: Read + Send + Sync> BodyStream for SyncReadStream<R> {
  async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
      return match self.reader.read(&mut buf) {
        Ok(0) => None,
        Ok(n) => {
          self.signal.mark();
          buf.truncate(n);
          Some(Ok(buf))
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        Err(e) if self.ends_on_timeout && matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
          None
        }
        Err(e) => Some(Err(e)),
      };
    }
  }

  fn disturbed(&self) -> Option<bool> {
    Some(self.signal.is_set())
  }
}

/// Generates a [`BodyStream`] over an async reader of one runtime family.
macro_rules! create_async_read_stream {
  (
    $(#[$outer:meta])*
    $name:ident,
    $async_read:path,
    $($async_read_ext:ident)::+
  ) => {
    $(#[$outer])*
    pub struct $name<R> {
      reader: R,
      signal: ReadSignal,
    }

    $(#[$outer])*
    impl<R> $name<R>
    where
      R: $async_read + Unpin + Send + Sync,
    {
      pub fn new(reader: R) -> Self {
        Self::with_signal(reader, ReadSignal::new())
      }

      pub fn with_signal(reader: R, signal: ReadSignal) -> Self {
        Self { reader, signal }
      }
    }

    $(#[$outer])*
    #[async_trait]
    impl<R> BodyStream for $name<R>
    where
      R: $async_read + Unpin + Send + Sync,
    {
      async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
        use $($async_read_ext)::+;

        let mut buf = vec![0u8; CHUNK_SIZE];
        match self.reader.read(&mut buf).await {
          Ok(0) => None,
          Ok(n) => {
            self.signal.mark();
            buf.truncate(n);
            Some(Ok(buf))
          }
          Err(e) => Some(Err(e)),
        }
      }

      fn disturbed(&self) -> Option<bool> {
        Some(self.signal.is_set())
      }
    }
  };
}

create_async_read_stream!(
  /// Reader stream for `futures::io::AsyncRead` (smol, async-std).
  FuturesReadStream,
  futures::io::AsyncRead,
  futures::io::AsyncReadExt
);

create_async_read_stream!(
  /// Reader stream for `tokio::io::AsyncRead`.
  #[cfg(feature = "async_tokio")]
  TokioReadStream,
  tokio::io::AsyncRead,
  tokio::io::AsyncReadExt
);

/// Adapts a `futures::Stream` of chunks, as produced by fetch-style callers.
pub struct ChunkStream<S>(pub S);

#[async_trait]
impl<S> BodyStream for ChunkStream<S>
where
  S: futures::Stream<Item = io::Result<Vec<u8>>> + Unpin + Send + Sync,
{
  async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
    futures::StreamExt::next(&mut self.0).await
  }
}

/// A runtime timer, e.g. `tokio::time::sleep` boxed.
pub type Sleep = fn(Duration) -> BoxFuture<'static, ()>;

/// Ends the inner stream once it stays silent for `idle`, so a client that
/// keeps its connection open cannot hold a body read forever.
pub struct IdleTimeout<S> {
  inner: S,
  idle: Duration,
  sleep: Sleep,
}

impl<S: BodyStream> IdleTimeout<S> {
  pub fn new(inner: S, idle: Duration, sleep: Sleep) -> Self {
    Self { inner, idle, sleep }
  }
}

#[async_trait]
impl<S: BodyStream> BodyStream for IdleTimeout<S> {
  async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
    let timer = (self.sleep)(self.idle);
    match futures::future::select(self.inner.next_chunk(), timer).await {
      Either::Left((chunk, _)) => chunk,
      Either::Right(_) => None,
    }
  }

  fn disturbed(&self) -> Option<bool> {
    self.inner.disturbed()
  }
}

/// Longest chunk-size or trailer line accepted before the framing is rejected.
const MAX_CHUNK_LINE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
  Size,
  Data(usize),
  DataEnd,
  Trailers,
  Done,
}

enum ChunkStep {
  Data(Vec<u8>),
  NeedMore,
  End,
}

/// Decodes `Transfer-Encoding: chunked` framing from a stream of raw wire
/// bytes. Stops at the last chunk and never asks the inner stream for bytes
/// past the trailers.
pub struct ChunkedDecoder<S> {
  inner: S,
  buf: Vec<u8>,
  state: ChunkState,
}

impl<S: BodyStream> ChunkedDecoder<S> {
  pub fn new(inner: S) -> Self {
    Self {
      inner,
      buf: Vec::new(),
      state: ChunkState::Size,
    }
  }

  fn take_line(&mut self) -> io::Result<Option<Vec<u8>>> {
    match self.buf.windows(2).position(|w| w == b"\r\n") {
      Some(pos) => {
        let line = self.buf[..pos].to_vec();
        self.buf.drain(..pos + 2);
        Ok(Some(line))
      }
      None if self.buf.len() > MAX_CHUNK_LINE => Err(framing("chunk line too long")),
      None => Ok(None),
    }
  }

  fn step(&mut self) -> io::Result<ChunkStep> {
    loop {
      match self.state {
        ChunkState::Size => {
          let Some(line) = self.take_line()? else {
            return Ok(ChunkStep::NeedMore);
          };
          let line = String::from_utf8_lossy(&line);
          let size = line.split(';').next().unwrap_or_default().trim();
          let size = usize::from_str_radix(size, 16).map_err(|_| framing("invalid chunk size"))?;
          self.state = if size == 0 {
            ChunkState::Trailers
          } else {
            ChunkState::Data(size)
          };
        }
        ChunkState::Data(remaining) => {
          if self.buf.is_empty() {
            return Ok(ChunkStep::NeedMore);
          }
          let n = remaining.min(self.buf.len());
          let data: Vec<u8> = self.buf.drain(..n).collect();
          self.state = if n == remaining {
            ChunkState::DataEnd
          } else {
            ChunkState::Data(remaining - n)
          };
          return Ok(ChunkStep::Data(data));
        }
        ChunkState::DataEnd => {
          if self.buf.len() < 2 {
            return Ok(ChunkStep::NeedMore);
          }
          if &self.buf[..2] != b"\r\n" {
            return Err(framing("missing CRLF after chunk data"));
          }
          self.buf.drain(..2);
          self.state = ChunkState::Size;
        }
        ChunkState::Trailers => {
          let Some(line) = self.take_line()? else {
            return Ok(ChunkStep::NeedMore);
          };
          if line.is_empty() {
            self.state = ChunkState::Done;
          }
        }
        ChunkState::Done => return Ok(ChunkStep::End),
      }
    }
  }
}

fn framing(message: &str) -> io::Error {
  io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

#[async_trait]
impl<S: BodyStream> BodyStream for ChunkedDecoder<S> {
  async fn next_chunk(&mut self) -> Option<io::Result<Vec<u8>>> {
    loop {
      match self.step() {
        Ok(ChunkStep::Data(data)) => return Some(Ok(data)),
        Ok(ChunkStep::End) => return None,
        Ok(ChunkStep::NeedMore) => match self.inner.next_chunk().await {
          Some(Ok(bytes)) => self.buf.extend_from_slice(&bytes),
          Some(Err(err)) => return Some(Err(err)),
          None => {
            self.state = ChunkState::Done;
            return Some(Err(io::Error::new(
              io::ErrorKind::UnexpectedEof,
              "chunked body ended before the last chunk",
            )));
          }
        },
        Err(err) => {
          self.state = ChunkState::Done;
          return Some(Err(err));
        }
      }
    }
  }

  fn disturbed(&self) -> Option<bool> {
    self.inner.disturbed()
  }
}

enum Source {
  Empty,
  Buffer(Vec<u8>),
  Text(String),
  Stream(Box<dyn BodyStream>),
}

/// A request body that can be read at most once.
pub struct Body {
  source: Mutex<Source>,
  consumed: AtomicBool,
  expected_len: Option<usize>,
  max_buffer_size: usize,
  drained: OnceLock<Vec<u8>>,
}

impl Body {
  fn from_source(source: Source) -> Self {
    Body {
      source: Mutex::new(source),
      consumed: AtomicBool::new(false),
      expected_len: None,
      max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
      drained: OnceLock::new(),
    }
  }

  pub fn empty() -> Self {
    Self::from_source(Source::Empty)
  }

  pub fn from_text(text: impl Into<String>) -> Self {
    Self::from_source(Source::Text(text.into()))
  }

  pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
    Self::from_source(Source::Buffer(bytes.into()))
  }

  pub fn from_stream<S: BodyStream + 'static>(stream: S) -> Self {
    Self::from_source(Source::Stream(Box::new(stream)))
  }

  /// Declares the number of bytes the source is expected to yield.
  pub fn with_expected_len(mut self, len: Option<usize>) -> Self {
    self.expected_len = len;
    self
  }

  pub fn with_max_buffer_size(mut self, limit: usize) -> Self {
    self.max_buffer_size = limit;
    self
  }

  pub fn max_buffer_size(&self) -> usize {
    self.max_buffer_size
  }

  pub fn expected_len(&self) -> Option<usize> {
    self.expected_len
  }

  fn lock(&self) -> MutexGuard<'_, Source> {
    self.source.lock().unwrap_or_else(|err| err.into_inner())
  }

  /// True when no source was ever attached.
  pub fn is_empty(&self) -> bool {
    matches!(*self.lock(), Source::Empty) && !self.consumed.load(Ordering::SeqCst)
  }

  /// Whether the body has been read, either through this value or, when the
  /// runtime exposes it, directly on the native stream. Best effort: reads
  /// on a raw stream the runtime cannot observe go unnoticed.
  pub fn body_used(&self) -> bool {
    if self.consumed.load(Ordering::SeqCst) {
      return true;
    }
    match &*self.lock() {
      Source::Stream(stream) => stream.disturbed().unwrap_or(false),
      _ => false,
    }
  }

  /// Bytes produced by the one successful drain, if it happened.
  pub fn drained(&self) -> Option<&[u8]> {
    self.drained.get().map(Vec::as_slice)
  }

  async fn drain(&self, accessor: &'static str) -> Result<Vec<u8>, BodyError> {
    let disturbed = match &*self.lock() {
      Source::Stream(stream) => stream.disturbed().unwrap_or(false),
      _ => false,
    };
    if disturbed || self.consumed.swap(true, Ordering::SeqCst) {
      return Err(BodyError::AlreadyRead { accessor });
    }

    let source = std::mem::replace(&mut *self.lock(), Source::Empty);
    let limit = self.max_buffer_size;
    let bytes = match source {
      Source::Empty => Vec::new(),
      Source::Buffer(bytes) => bytes,
      Source::Text(text) => text.into_bytes(),
      Source::Stream(mut stream) => {
        if self.expected_len.is_some_and(|len| len > limit) {
          return Err(BodyError::PayloadTooLarge { limit });
        }
        let mut out = Vec::new();
        while let Some(chunk) = stream.next_chunk().await {
          let chunk = chunk?;
          if out.len() + chunk.len() > limit {
            return Err(BodyError::PayloadTooLarge { limit });
          }
          out.extend_from_slice(&chunk);
        }
        out
      }
    };

    if bytes.len() > limit {
      return Err(BodyError::PayloadTooLarge { limit });
    }
    if let Some(expected) = self.expected_len {
      if expected != bytes.len() {
        return Err(BodyError::SizeMismatch {
          expected,
          actual: bytes.len(),
        });
      }
    }

    let _ = self.drained.set(bytes.clone());
    Ok(bytes)
  }

  /// Drains the body and decodes it as UTF-8, replacing invalid sequences.
  pub async fn text(&self) -> Result<String, BodyError> {
    let bytes = self.drain("text").await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
  }

  /// Drains the body and parses it as JSON. An empty body is not JSON and
  /// fails with `InvalidJson`.
  pub async fn json<T: DeserializeOwned>(&self) -> Result<T, BodyError> {
    let bytes = self.drain("json").await?;
    serde_json::from_slice(&bytes).map_err(BodyError::InvalidJson)
  }

  pub async fn json_value(&self) -> Result<serde_json::Value, BodyError> {
    self.json().await
  }

  pub async fn array_buffer(&self) -> Result<Vec<u8>, BodyError> {
    self.drain("arrayBuffer").await
  }
}

impl Default for Body {
  fn default() -> Self {
    Body::empty()
  }
}

impl fmt::Debug for Body {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match &*self.lock() {
      Source::Empty => "empty",
      Source::Buffer(_) => "buffer",
      Source::Text(_) => "text",
      Source::Stream(_) => "stream",
    };
    f.debug_struct("Body")
      .field("source", &kind)
      .field("used", &self.body_used())
      .field("expected_len", &self.expected_len)
      .finish()
  }
}

impl From<String> for Body {
  fn from(text: String) -> Self {
    Body::from_text(text)
  }
}

impl From<&str> for Body {
  fn from(text: &str) -> Self {
    Body::from_text(text)
  }
}

impl From<Vec<u8>> for Body {
  fn from(bytes: Vec<u8>) -> Self {
    Body::from_bytes(bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::executor::block_on;

  fn chunked(parts: &[&str]) -> ChunkStream<futures::stream::Iter<std::vec::IntoIter<io::Result<Vec<u8>>>>> {
    let items: Vec<io::Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
    ChunkStream(futures::stream::iter(items))
  }

  #[test]
  fn text_then_any_accessor_fails() {
    let body = Body::from_text("hello");
    assert_eq!(block_on(body.text()).unwrap(), "hello");
    assert!(body.body_used());
    assert!(matches!(
      block_on(body.json_value()),
      Err(BodyError::AlreadyRead { accessor: "json" })
    ));
    assert!(matches!(
      block_on(body.array_buffer()),
      Err(BodyError::AlreadyRead { accessor: "arrayBuffer" })
    ));
    assert_eq!(body.drained(), Some(&b"hello"[..]));
  }

  #[test]
  fn failed_read_still_consumes() {
    let body = Body::from_text("{not json");
    assert!(matches!(block_on(body.json_value()), Err(BodyError::InvalidJson(_))));
    assert!(matches!(block_on(body.text()), Err(BodyError::AlreadyRead { .. })));
  }

  #[test]
  fn empty_body_yields_zero_values() {
    assert_eq!(block_on(Body::empty().text()).unwrap(), "");
    assert!(block_on(Body::empty().array_buffer()).unwrap().is_empty());
  }

  #[test]
  fn empty_body_is_not_json() {
    let body = Body::empty();
    assert!(matches!(block_on(body.json_value()), Err(BodyError::InvalidJson(_))));
    assert!(body.body_used());
  }

  #[test]
  fn stream_is_drained_across_chunks() {
    let body = Body::from_stream(chunked(&["{\"foo\"", ":1}"]));
    let value = block_on(body.json_value()).unwrap();
    assert_eq!(value, serde_json::json!({"foo": 1}));
  }

  #[test]
  fn oversized_stream_aborts_without_partial_data() {
    let body = Body::from_stream(chunked(&["aaaa", "bbbb", "cccc"])).with_max_buffer_size(6);
    assert!(matches!(
      block_on(body.text()),
      Err(BodyError::PayloadTooLarge { limit: 6 })
    ));
    assert!(body.drained().is_none());
  }

  #[test]
  fn oversized_buffer_is_rejected() {
    let body = Body::from_bytes(vec![0u8; 11]).with_max_buffer_size(10);
    assert!(matches!(block_on(body.array_buffer()), Err(BodyError::PayloadTooLarge { .. })));
  }

  #[test]
  fn declared_length_must_match() {
    let body = Body::from_stream(chunked(&["abc"])).with_expected_len(Some(5));
    assert!(matches!(
      block_on(body.text()),
      Err(BodyError::SizeMismatch { expected: 5, actual: 3 })
    ));
  }

  #[test]
  fn external_reads_mark_the_body_used() {
    let signal = ReadSignal::new();
    let body = Body::from_stream(SyncReadStream::with_signal(&b"payload"[..], signal.clone()));
    assert!(!body.body_used());
    signal.mark();
    assert!(body.body_used());
    assert!(matches!(block_on(body.text()), Err(BodyError::AlreadyRead { .. })));
  }

  #[test]
  fn sync_reader_streams_whole_input() {
    let body = Body::from_stream(SyncReadStream::new(std::io::Cursor::new(b"abc".to_vec())))
      .with_expected_len(Some(3));
    assert_eq!(block_on(body.text()).unwrap(), "abc");
  }

  fn instant(_: Duration) -> BoxFuture<'static, ()> {
    Box::pin(async {})
  }

  #[test]
  fn chunked_framing_is_decoded_across_splits() {
    let items: Vec<io::Result<Vec<u8>>> = vec![
      Ok(b"4\r\nWi".to_vec()),
      Ok(b"ki\r\n5;ext=1\r".to_vec()),
      Ok(b"\npedia\r\n0\r\n".to_vec()),
      Ok(b"X-Trailer: y\r\n\r\n".to_vec()),
      Err(io::Error::other("read past the last chunk")),
    ];
    let body = Body::from_stream(ChunkedDecoder::new(ChunkStream(futures::stream::iter(items))));
    assert_eq!(block_on(body.text()).unwrap(), "Wikipedia");
  }

  #[test]
  fn bad_chunk_size_is_invalid_data() {
    let body = Body::from_stream(ChunkedDecoder::new(chunked(&["zz\r\nabc\r\n"])));
    match block_on(body.text()) {
      Err(BodyError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::InvalidData),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn truncated_chunked_body_is_an_early_eof() {
    let body = Body::from_stream(ChunkedDecoder::new(chunked(&["4\r\nWi"])));
    match block_on(body.text()) {
      Err(BodyError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof),
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn silent_stream_ends_at_idle_timeout() {
    let silent = ChunkStream(futures::stream::pending::<io::Result<Vec<u8>>>());
    let body = Body::from_stream(IdleTimeout::new(silent, Duration::from_millis(1), instant));
    assert_eq!(block_on(body.text()).unwrap(), "");
  }

  #[test]
  fn ready_chunks_win_over_the_idle_timer() {
    let body = Body::from_stream(IdleTimeout::new(chunked(&["ab", "c"]), Duration::from_millis(1), instant));
    assert_eq!(block_on(body.text()).unwrap(), "abc");
  }
}
