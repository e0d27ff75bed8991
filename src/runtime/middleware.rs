//! `next()`-style adapter: requests no route answers are handed on instead
//! of receiving a 404.

use crate::core::adapter::Adapter;
use crate::core::app::{Dispatch, Dispatcher};
use crate::core::config::AppConfig;
use crate::core::request::Request;
use crate::runtime::fetch::{FetchRequest, FetchResponse, extract};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Continuation invoked with the unified request when nothing matched.
pub type Next = Box<dyn FnOnce(Request) -> BoxFuture<'static, FetchResponse> + Send>;

pub type MiddlewareHandler =
  Arc<dyn Fn(FetchRequest, Next) -> BoxFuture<'static, FetchResponse> + Send + Sync>;

/// Wraps an async closure as a [`Next`].
pub fn next_fn<F, Fut>(f: F) -> Next
where
  F: FnOnce(Request) -> Fut + Send + 'static,
  Fut: std::future::Future<Output = FetchResponse> + Send + 'static,
{
  Box::new(move |request: Request| f(request).boxed())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MiddlewareAdapter;

#[async_trait]
impl Adapter for MiddlewareAdapter {
  type NativeRequest = FetchRequest;
  type NativeHandler = MiddlewareHandler;

  fn into_request(&self, native: FetchRequest, config: &AppConfig) -> Request {
    extract(native, config)
  }

  fn create_native_handler(dispatcher: Dispatcher<Self>) -> MiddlewareHandler {
    Arc::new(move |native: FetchRequest, next: Next| {
      let dispatcher = dispatcher.clone();
      async move {
        match dispatcher.dispatch(native).await {
          Dispatch::Handled(response) => FetchResponse::from_response(response).await,
          Dispatch::NotFound { request, .. } => {
            tracing::debug!(path = %request.path, "deferring to next handler");
            next(request).await
          }
        }
      }
      .boxed()
    })
  }
}
