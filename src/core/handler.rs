// src/core/handler.rs

use crate::core::error::Error;
use crate::core::request::Request;
use crate::core::response::Response;
use crate::core::static_files::StaticFile;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

pub type HandlerResult = Result<Outcome, Error>;

/// The core, unified `Handler` trait, powered by `async-trait`.
#[async_trait]
pub trait Handler: Send + Sync {
  async fn handle(&self, request: &Request) -> HandlerResult;
}

// Blanket implementation for Arc<dyn Handler> for convenience.
#[async_trait]
impl Handler for Arc<dyn Handler> {
  async fn handle(&self, request: &Request) -> HandlerResult {
    (**self).handle(request).await
  }
}

/// A value the dispatcher will serialize to a JSON body.
pub trait JsonBody: Send {
  fn to_json(&self) -> serde_json::Result<Vec<u8>>;
}

impl<T: Serialize + Send> JsonBody for T {
  fn to_json(&self) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(self)
  }
}

/// What a handler produced.
pub enum Outcome {
  /// Decline: the dispatcher tries the next matching route.
  Pass,
  Response(Response),
  File(StaticFile),
  /// Plain data, serialized with `Content-Type: application/json`.
  Json(Box<dyn JsonBody>),
}

impl Outcome {
  pub fn json<T: Serialize + Send + 'static>(value: T) -> Self {
    Outcome::Json(Box::new(value))
  }

  /// JSON `null`, a valid result distinct from [`Outcome::Pass`].
  pub fn null() -> Self {
    Outcome::json(serde_json::Value::Null)
  }

  pub fn is_pass(&self) -> bool {
    matches!(self, Outcome::Pass)
  }
}

impl From<Response> for Outcome {
  fn from(response: Response) -> Self {
    Outcome::Response(response)
  }
}

impl From<StaticFile> for Outcome {
  fn from(file: StaticFile) -> Self {
    Outcome::File(file)
  }
}

impl From<serde_json::Value> for Outcome {
  fn from(value: serde_json::Value) -> Self {
    Outcome::Json(Box::new(value))
  }
}

impl fmt::Debug for Outcome {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Outcome::Pass => f.write_str("Pass"),
      Outcome::Response(r) => f.debug_tuple("Response").field(r).finish(),
      Outcome::File(file) => f.debug_tuple("File").field(file).finish(),
      Outcome::Json(_) => f.write_str("Json(..)"),
    }
  }
}

// --- Helper Functions and Structs (To be hidden by the macro) ---

// A private struct to wrap a synchronous function.
struct SyncFnHandler<F>(F);

#[async_trait]
impl<F> Handler for SyncFnHandler<F>
where
  F: for<'a> Fn(&'a Request) -> HandlerResult + Send + Sync,
{
  async fn handle(&self, request: &Request) -> HandlerResult {
    (self.0)(request)
  }
}

/// Wraps a synchronous function, turning it into a type that implements `Handler`.
pub fn sync_h<F>(f: F) -> Arc<dyn Handler>
where
  F: for<'a> Fn(&'a Request) -> HandlerResult + Send + Sync + 'static,
{
  Arc::new(SyncFnHandler(f))
}

// A private struct to wrap an asynchronous function that returns a BoxFuture.
struct AsyncFnHandler<F>(F);

#[async_trait]
impl<F> Handler for AsyncFnHandler<F>
where
  F: for<'a> Fn(&'a Request) -> BoxFuture<'a, HandlerResult> + Send + Sync,
{
  async fn handle(&self, request: &Request) -> HandlerResult {
    (self.0)(request).await
  }
}

/// Wraps an asynchronous closure that returns a BoxFuture.
pub fn async_h<F>(f: F) -> Arc<dyn Handler>
where
  F: for<'a> Fn(&'a Request) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
  Arc::new(AsyncFnHandler(f))
}

/// Turns an `async fn(&Request) -> HandlerResult` into a handler.
///
/// Expands to a call to `async_h`, wrapping the function in a closure that
/// pins and boxes the future.
#[macro_export]
macro_rules! handler {
  ($handler_fn:expr) => {
    $crate::core::handler::async_h(move |req| Box::pin($handler_fn(req)))
  };
}

/// Turns a plain `fn(&Request) -> HandlerResult` into a handler.
#[macro_export]
macro_rules! sync_handler {
  ($handler_fn:expr) => {
    $crate::core::handler::sync_h($handler_fn)
  };
}

/// Rewrites the final response of a request. Returning `None` keeps the
/// response as it is.
#[async_trait]
pub trait ResponseTransformer: Send + Sync {
  async fn transform(&self, request: &Request, response: &mut Response) -> Option<Response>;
}

struct FnTransformer<F>(F);

#[async_trait]
impl<F> ResponseTransformer for FnTransformer<F>
where
  F: Fn(&Request, &mut Response) -> Option<Response> + Send + Sync,
{
  async fn transform(&self, request: &Request, response: &mut Response) -> Option<Response> {
    (self.0)(request, response)
  }
}

/// Wraps a synchronous closure as a [`ResponseTransformer`].
pub fn transform_fn<F>(f: F) -> Arc<dyn ResponseTransformer>
where
  F: Fn(&Request, &mut Response) -> Option<Response> + Send + Sync + 'static,
{
  Arc::new(FnTransformer(f))
}
