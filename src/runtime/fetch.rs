//! Fetch-style adapter: one request value in, one response value out.

use crate::core::adapter::Adapter;
use crate::core::app::Dispatcher;
use crate::core::body::Body;
use crate::core::config::AppConfig;
use crate::core::headers::Headers;
use crate::core::request::Request;
use crate::core::request_type::RequestType;
use crate::core::response::Response;
use crate::core::status_code::reason_for;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;

/// A request as a fetch-style host hands it over.
#[derive(Debug)]
pub struct FetchRequest {
  pub method: String,
  pub url: String,
  pub headers: Headers,
  pub body: Body,
}

impl FetchRequest {
  pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
    FetchRequest {
      method: method.into(),
      url: url.into(),
      headers: Headers::new(),
      body: Body::empty(),
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new("GET", url)
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.append(name, value);
    self
  }

  pub fn with_body(mut self, body: impl Into<Body>) -> Self {
    self.body = body.into();
    self
  }
}

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
  pub status: u16,
  pub status_text: String,
  pub headers: Headers,
  pub body: Vec<u8>,
}

impl FetchResponse {
  pub async fn from_response(response: Response) -> Self {
    let status = response.status();
    let status_text = response.reason().to_string();
    let headers = response.headers().clone();
    match response.into_bytes().await {
      Ok(body) => FetchResponse {
        status,
        status_text,
        headers,
        body,
      },
      Err(err) => {
        tracing::error!(error = %err, "failed to read response body");
        FetchResponse {
          status: 500,
          status_text: reason_for(500).to_string(),
          headers: Headers::new(),
          body: Vec::new(),
        }
      }
    }
  }

  pub fn header(&self, name: &str) -> Option<String> {
    self.headers.get(name)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  pub fn json(&self) -> serde_json::Result<serde_json::Value> {
    serde_json::from_slice(&self.body)
  }
}

pub type FetchHandler = Arc<dyn Fn(FetchRequest) -> BoxFuture<'static, FetchResponse> + Send + Sync>;

/// Builds the unified request, applying the configured body cap.
pub(crate) fn extract(native: FetchRequest, config: &AppConfig) -> Request {
  Request::new(RequestType::from_str(&native.method), native.url)
    .with_headers(native.headers)
    .with_body(native.body.with_max_buffer_size(config.body_max_buffer_size))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FetchAdapter;

#[async_trait]
impl Adapter for FetchAdapter {
  type NativeRequest = FetchRequest;
  type NativeHandler = FetchHandler;

  fn into_request(&self, native: FetchRequest, config: &AppConfig) -> Request {
    extract(native, config)
  }

  fn create_native_handler(dispatcher: Dispatcher<Self>) -> FetchHandler {
    Arc::new(move |native: FetchRequest| {
      let dispatcher = dispatcher.clone();
      let head_only = native.method.eq_ignore_ascii_case("HEAD");
      async move {
        let response = dispatcher.dispatch(native).await.into_response();
        let mut fetched = FetchResponse::from_response(response).await;
        if head_only {
          fetched.body.clear();
        }
        fetched
      }
      .boxed()
    })
  }
}
