//! Helpers for end-to-end tests over real sockets.
//!
//! A server is started once per name and reused by every test in the
//! process; tests then talk to it with raw HTTP bytes through [`run_test`].

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::Duration;

pub const POOL_SIZE: u8 = 10;
pub const INTERVAL: Duration = Duration::from_millis(250);
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

static SERVER_REGISTRY: OnceLock<Mutex<HashMap<String, &'static str>>> = OnceLock::new();

fn registry_guard() -> MutexGuard<'static, HashMap<String, &'static str>> {
  SERVER_REGISTRY
    .get_or_init(|| Mutex::new(HashMap::new()))
    .lock()
    .unwrap_or_else(|err| err.into_inner())
}

/// Returns the address of the server registered under `name`, starting it
/// with `start` on first use. `start` must return once the server is bound.
fn register<F>(name: &str, start: F) -> &'static str
where
  F: FnOnce() -> String,
{
  let mut registry = registry_guard();
  if let Some(url) = registry.get(name) {
    return url;
  }
  let url: &'static str = Box::leak(start().into_boxed_str());
  registry.insert(name.to_string(), url);
  drop(registry);
  thread::sleep(INTERVAL);
  url
}

#[cfg(feature = "sync")]
pub fn setup_test_server<F>(name: &str, server_factory: F) -> &'static str
where
  F: FnOnce() -> crate::runtime::sync::server::Server + Send + 'static,
{
  register(name, move || {
    let server = server_factory();
    let url = server.url().to_owned();
    thread::spawn(move || server.run());
    url
  })
}

/// Runs the server on a dedicated thread with its own runtime, reporting the
/// bound address back through a channel.
#[cfg(any(feature = "async_tokio", feature = "async_std", feature = "async_smol"))]
fn spawn_async_server<R, F>(run_on: R, server_factory: F) -> String
where
  R: FnOnce(std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>) + Send + 'static,
  F: FnOnce(std::sync::mpsc::Sender<String>) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    + Send
    + 'static,
{
  let (tx, rx) = std::sync::mpsc::channel();
  thread::spawn(move || run_on(server_factory(tx)));
  rx.recv().expect("test server did not start")
}

#[cfg(feature = "async_tokio")]
pub fn setup_tokio_test_server<F, Fut>(name: &str, server_factory: F) -> &'static str
where
  F: FnOnce() -> Fut + Send + 'static,
  Fut: std::future::Future<Output = crate::runtime::r#async::tokio::Server> + Send + 'static,
{
  register(name, move || {
    spawn_async_server(
      |server| {
        let rt = tokio::runtime::Builder::new_multi_thread()
          .enable_all()
          .build()
          .expect("failed to build tokio runtime");
        rt.block_on(server);
      },
      move |tx| {
        Box::pin(async move {
          let server = server_factory().await;
          let _ = tx.send(server.url().to_owned());
          server.run().await;
        })
      },
    )
  })
}

#[cfg(feature = "async_std")]
pub fn setup_async_std_test_server<F, Fut>(name: &str, server_factory: F) -> &'static str
where
  F: FnOnce() -> Fut + Send + 'static,
  Fut: std::future::Future<Output = crate::runtime::r#async::async_std::Server> + Send + 'static,
{
  register(name, move || {
    spawn_async_server(
      |server| async_std::task::block_on(server),
      move |tx| {
        Box::pin(async move {
          let server = server_factory().await;
          let _ = tx.send(server.url().to_owned());
          server.run().await;
        })
      },
    )
  })
}

#[cfg(feature = "async_smol")]
pub fn setup_smol_test_server<F, Fut>(name: &str, server_factory: F) -> &'static str
where
  F: FnOnce() -> Fut + Send + 'static,
  Fut: std::future::Future<Output = crate::runtime::r#async::smol::Server> + Send + 'static,
{
  register(name, move || {
    spawn_async_server(
      |server| smol::block_on(server),
      move |tx| {
        Box::pin(async move {
          let server = server_factory().await;
          let _ = tx.send(server.url().to_owned());
          server.run().await;
        })
      },
    )
  })
}

/// Sends raw bytes, half-closes, and asserts the reply contains `expected_response`.
pub fn run_test(server_url: &str, request: &[u8], expected_response: &[u8]) -> String {
  let mut stream = TcpStream::connect(server_url).expect("Failed to connect to server");

  stream.write_all(request).unwrap();
  stream.shutdown(std::net::Shutdown::Write).unwrap();

  let mut buffer = Vec::new();
  stream.read_to_end(&mut buffer).unwrap();

  let buffer_string = String::from_utf8_lossy(&buffer).to_string();
  let expected_response_string = String::from_utf8_lossy(expected_response).to_string();

  assert!(
    buffer_string.contains(&expected_response_string),
    "ASSERT FAILED:\n\nRECEIVED: {} \nEXPECTED: {} \n\n",
    buffer_string,
    expected_response_string
  );
  buffer_string
}

/// Like [`run_test`], but keeps the write side open the way a keep-alive
/// client does. The server must answer on its own and close the connection.
pub fn run_test_keep_alive(server_url: &str, request: &[u8], expected_response: &[u8]) -> String {
  let mut stream = TcpStream::connect(server_url).expect("Failed to connect to server");
  stream.set_read_timeout(Some(RESPONSE_TIMEOUT)).unwrap();

  stream.write_all(request).unwrap();

  let mut buffer = Vec::new();
  let mut chunk = [0u8; 1024];
  loop {
    match stream.read(&mut chunk) {
      Ok(0) => break,
      Ok(n) => buffer.extend_from_slice(&chunk[..n]),
      Err(err) => panic!("no complete response within {:?}: {}", RESPONSE_TIMEOUT, err),
    }
  }

  let buffer_string = String::from_utf8_lossy(&buffer).to_string();
  let expected_response_string = String::from_utf8_lossy(expected_response).to_string();

  assert!(
    buffer_string.contains(&expected_response_string),
    "ASSERT FAILED:\n\nRECEIVED: {} \nEXPECTED: {} \n\n",
    buffer_string,
    expected_response_string
  );
  buffer_string
}
