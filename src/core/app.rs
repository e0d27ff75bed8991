//! Application definition and the per-request dispatch pipeline.
//!
//! Order of work for one request:
//! context merge, request hooks, route candidates (each may pass), result
//! coercion, adapter finalization, default 404, error rendering, response
//! transformers.

use crate::core::adapter::Adapter;
use crate::core::config::AppConfig;
use crate::core::error::{Error, RouteError};
use crate::core::handler::{Handler, Outcome};
use crate::core::request::Request;
use crate::core::request_type::Rt;
use crate::core::response::{Response, ResponseInit};
use crate::core::router::PathRouter;
use std::sync::Arc;

/// Runs once per request, after the context is merged.
pub type RequestHook = Arc<dyn Fn(&Request) + Send + Sync>;
/// Runs before each candidate handler, with the route label (`METHOD:pattern`).
pub type RouteMatchHook = Arc<dyn Fn(&Request, &str) + Send + Sync>;

/// Route table and configuration under construction.
#[derive(Default)]
pub struct App {
  router: PathRouter<Arc<dyn Handler>>,
  config: AppConfig,
  request_hooks: Vec<RequestHook>,
  route_hooks: Vec<RouteMatchHook>,
  route_error: Option<RouteError>,
}

impl App {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_config(config: AppConfig) -> Self {
    App {
      config,
      ..Self::default()
    }
  }

  pub fn config_mut(&mut self) -> &mut AppConfig {
    &mut self.config
  }

  /// Adds a route. Malformed patterns are reported by [`App::build`].
  pub fn route(&mut self, method: Rt, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
    if let Err(err) = self.router.insert(method, path, handler) {
      self.route_error.get_or_insert(err);
    }
    self
  }

  pub fn get(&mut self, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
    self.route(Rt::GET, path, handler)
  }

  pub fn post(&mut self, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
    self.route(Rt::POST, path, handler)
  }

  pub fn put(&mut self, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
    self.route(Rt::PUT, path, handler)
  }

  pub fn delete(&mut self, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
    self.route(Rt::DELETE, path, handler)
  }

  pub fn patch(&mut self, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
    self.route(Rt::PATCH, path, handler)
  }

  /// Route for every method.
  pub fn any(&mut self, path: &str, handler: Arc<dyn Handler>) -> &mut Self {
    self.route(Rt::ANY, path, handler)
  }

  pub fn on_request<F>(&mut self, hook: F) -> &mut Self
  where
    F: Fn(&Request) + Send + Sync + 'static,
  {
    self.request_hooks.push(Arc::new(hook));
    self
  }

  pub fn on_route_match<F>(&mut self, hook: F) -> &mut Self
  where
    F: Fn(&Request, &str) + Send + Sync + 'static,
  {
    self.route_hooks.push(Arc::new(hook));
    self
  }

  pub fn route_count(&self) -> usize {
    self.router.len()
  }

  /// Freezes the routes and configuration behind the given adapter.
  pub fn build<A: Adapter>(self, adapter: A) -> Result<Dispatcher<A>, RouteError> {
    if let Some(err) = self.route_error {
      return Err(err);
    }
    tracing::debug!(routes = self.router.len(), "application built");
    Ok(Dispatcher {
      shared: Arc::new(Shared {
        adapter,
        router: self.router,
        config: self.config,
        request_hooks: self.request_hooks,
        route_hooks: self.route_hooks,
      }),
    })
  }
}

struct Shared<A> {
  adapter: A,
  router: PathRouter<Arc<dyn Handler>>,
  config: AppConfig,
  request_hooks: Vec<RequestHook>,
  route_hooks: Vec<RouteMatchHook>,
}

/// Result of one dispatch, as seen by an adapter's native handler.
#[derive(Debug)]
pub enum Dispatch {
  Handled(Response),
  /// No handler produced a result; carries the default 404 and the request
  /// for adapters that defer to another handler instead.
  NotFound { response: Response, request: Request },
}

impl Dispatch {
  pub fn is_not_found(&self) -> bool {
    matches!(self, Dispatch::NotFound { .. })
  }

  pub fn into_response(self) -> Response {
    match self {
      Dispatch::Handled(response) => response,
      Dispatch::NotFound { response, .. } => response,
    }
  }
}

/// The frozen application. Cheap to clone; shared read-only by every
/// in-flight request.
pub struct Dispatcher<A> {
  shared: Arc<Shared<A>>,
}

impl<A> Clone for Dispatcher<A> {
  fn clone(&self) -> Self {
    Dispatcher {
      shared: Arc::clone(&self.shared),
    }
  }
}

/// Serializes a handler result; `Pass` never reaches here.
fn coerce(route: &str, outcome: Outcome) -> Result<Option<Response>, Error> {
  match outcome {
    Outcome::Pass => Ok(None),
    Outcome::Response(response) => Ok(Some(response)),
    Outcome::File(file) => Ok(Some(Response::file(file))),
    Outcome::Json(data) => {
      let bytes = data.to_json().map_err(|source| Error::Serialization {
        route: route.to_string(),
        source,
      })?;
      Ok(Some(
        Response::with_init(bytes, ResponseInit::default()).with_header("Content-Type", "application/json"),
      ))
    }
  }
}

impl<A: Adapter> Dispatcher<A> {
  pub fn adapter(&self) -> &A {
    &self.shared.adapter
  }

  pub fn config(&self) -> &AppConfig {
    &self.shared.config
  }

  /// Wraps this dispatcher in the adapter's native calling convention.
  pub fn into_native_handler(self) -> A::NativeHandler {
    A::create_native_handler(self)
  }

  /// Full pipeline for one native request.
  pub async fn dispatch(&self, native: A::NativeRequest) -> Dispatch {
    let request = self.shared.adapter.into_request(native, &self.shared.config);
    self.dispatch_request(request).await
  }

  /// Pipeline for a request the adapter already extracted.
  pub async fn dispatch_request(&self, mut request: Request) -> Dispatch {
    let routed = match self.route(&mut request).await {
      Ok(Some(response)) => Ok(response),
      Ok(None) => Err(Response::not_found()),
      Err(error) => Ok(self.render_error(&request, error).await),
    };

    let not_found = routed.is_err();
    let mut response = routed.unwrap_or_else(|response| response);
    for transformer in request.take_transformers() {
      let replaced = transformer.transform(&request, &mut response).await;
      if let Some(next) = replaced {
        response = next;
      }
    }

    if not_found {
      tracing::debug!(method = %request.method, path = %request.path, "no route produced a result");
      Dispatch::NotFound { response, request }
    } else {
      Dispatch::Handled(response)
    }
  }

  async fn route(&self, request: &mut Request) -> Result<Option<Response>, Error> {
    let shared = &*self.shared;

    if let Some(getter) = &shared.config.get_context {
      if let Some(context) = getter(&*request) {
        request.context.merge(context);
      }
    }
    for hook in &shared.request_hooks {
      hook(&*request);
    }

    let method = request.method.clone();
    let path = request.path.clone();
    let mut chosen = None;
    for candidate in shared.router.matches(&method, &path) {
      let route = candidate.route;
      let label = route.label();
      request.params = candidate.params.into_iter().collect();
      for hook in &shared.route_hooks {
        hook(&*request, &label);
      }
      let outcome = route.payload.handle(&*request).await?;
      if outcome.is_pass() {
        tracing::debug!(route = %label, "handler passed, trying next route");
        continue;
      }
      tracing::debug!(route = %label, "route handled");
      chosen = Some((label, outcome));
      break;
    }

    let result = match chosen {
      Some((label, outcome)) => coerce(&label, outcome)?,
      None => None,
    };
    shared.adapter.to_response(&*request, result, &shared.config).await
  }

  async fn render_error(&self, request: &Request, error: Error) -> Response {
    if let Error::Http(http) = &error {
      tracing::debug!(status = http.status, message = %http.message, "declared http error");
      return Response::with_init(http.message.clone(), ResponseInit::status(http.status))
        .with_header("Content-Type", "text/plain; charset=utf-8");
    }

    tracing::warn!(
      method = %request.method,
      path = %request.path,
      error = %error,
      "request failed"
    );
    if let Some(handler) = &self.shared.config.error_handler {
      match handler(&error).await {
        Ok(response) => return response,
        Err(handler_error) => {
          tracing::error!(error = %handler_error, "error handler failed");
        }
      }
    }
    self.shared.adapter.on_error(request, &error)
  }
}
