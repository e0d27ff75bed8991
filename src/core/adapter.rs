//! The contract between the runtime-independent dispatcher and one native
//! HTTP stack.

use crate::core::app::Dispatcher;
use crate::core::config::AppConfig;
use crate::core::error::Error;
use crate::core::request::Request;
use crate::core::response::{Response, ResponseBody, ResponseInit};
use crate::core::static_files::{resolve_file_path, serve_static};
use async_trait::async_trait;

/// Bridges the dispatcher to a runtime. All runtime-specific behavior lives
/// in these hooks; the dispatcher never inspects which adapter it drives.
#[async_trait]
pub trait Adapter: Send + Sync + Sized + 'static {
  /// What the runtime hands over per request.
  type NativeRequest: Send + 'static;
  /// The calling convention the runtime's server expects.
  type NativeHandler;

  /// Builds the unified request around the native one.
  fn into_request(&self, native: Self::NativeRequest, config: &AppConfig) -> Request;

  /// Last-resort renderer for application errors.
  fn on_error(&self, _request: &Request, error: &Error) -> Response {
    default_error_response(error)
  }

  /// Final runtime-specific step: resolves file bodies into bytes.
  /// `Ok(None)` makes the dispatcher answer 404.
  async fn to_response(
    &self,
    request: &Request,
    result: Option<Response>,
    config: &AppConfig,
  ) -> Result<Option<Response>, Error> {
    resolve_static(request, result, config).await
  }

  fn create_native_handler(dispatcher: Dispatcher<Self>) -> Self::NativeHandler;
}

/// `500` with the error's message as a plain-text body.
pub fn default_error_response(error: &Error) -> Response {
  Response::with_init(error.to_string(), ResponseInit::status(500))
    .with_header("Content-Type", "text/plain; charset=utf-8")
}

/// Turns a `ResponseBody::File` into bytes (or a 304) through either the
/// configured file server or the built-in one. Other responses pass through.
pub async fn resolve_static(
  request: &Request,
  result: Option<Response>,
  config: &AppConfig,
) -> Result<Option<Response>, Error> {
  let Some(response) = result else {
    return Ok(None);
  };
  let (init, body) = response.into_parts();
  let file = match body {
    ResponseBody::File(file) => file.with_init(init),
    body => return Ok(Some(Response::with_init(body, init))),
  };

  match &config.serve_file {
    Some(server) => {
      match resolve_file_path(&file.file_path, &config.root, &config.allow_static_from) {
        Some(full_path) => server(request, &file, full_path).await,
        None => Ok(None),
      }
    }
    None => serve_static(request, &file, config).map_err(Error::handler),
  }
}
