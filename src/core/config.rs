use crate::core::body::DEFAULT_MAX_BUFFER_SIZE;
use crate::core::context::Context;
use crate::core::error::Error;
use crate::core::request::Request;
use crate::core::response::Response;
use crate::core::static_files::StaticFile;
use futures::future::BoxFuture;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Produces the context merged onto each request before routing.
pub type ContextGetter = Arc<dyn Fn(&Request) -> Option<Context> + Send + Sync>;

/// Renders application errors. Failing here falls back to the adapter.
pub type ErrorHandler =
  Arc<dyn for<'a> Fn(&'a Error) -> BoxFuture<'a, Result<Response, Error>> + Send + Sync>;

/// Replaces the built-in static file renderer. Receives the already
/// validated absolute path.
pub type FileServer = Arc<
  dyn for<'a> Fn(&'a Request, &'a StaticFile, PathBuf) -> BoxFuture<'a, Result<Option<Response>, Error>>
    + Send
    + Sync,
>;

#[derive(Clone)]
pub struct AppConfig {
  pub root: PathBuf,
  pub allow_static_from: Vec<String>,
  pub body_max_buffer_size: usize,
  pub get_context: Option<ContextGetter>,
  pub error_handler: Option<ErrorHandler>,
  pub serve_file: Option<FileServer>,
}

impl Default for AppConfig {
  fn default() -> Self {
    AppConfig {
      root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
      allow_static_from: Vec::new(),
      body_max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
      get_context: None,
      error_handler: None,
      serve_file: None,
    }
  }
}

impl AppConfig {
  /// Parses a comma-separated config string
  /// (e.g. "root=/srv/app,static=public;assets,max_body=4096").
  /// Unknown keys and unparsable values are ignored.
  pub fn from_config_str(config: &str) -> Self {
    let mut cfg = AppConfig::default();
    for pair in config.split(',') {
      let mut parts = pair.splitn(2, '=');
      let key = parts.next().unwrap_or("").trim().to_ascii_lowercase();
      let value = parts.next().unwrap_or("").trim();
      match key.as_str() {
        "root" if !value.is_empty() => cfg.root = PathBuf::from(value),
        "static" | "allow_static_from" => {
          cfg.allow_static_from = value
            .split(';')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        }
        "max_body" | "body_max_buffer_size" => {
          if let Ok(limit) = value.parse::<usize>() {
            cfg.body_max_buffer_size = limit;
          }
        }
        _ => {}
      }
    }
    cfg
  }

  pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
    self.root = root.into();
    self
  }

  pub fn allow_static_from<I, S>(mut self, dirs: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.allow_static_from = dirs.into_iter().map(Into::into).collect();
    self
  }

  pub fn body_max_buffer_size(mut self, limit: usize) -> Self {
    self.body_max_buffer_size = limit;
    self
  }

  pub fn get_context<F>(mut self, getter: F) -> Self
  where
    F: Fn(&Request) -> Option<Context> + Send + Sync + 'static,
  {
    self.get_context = Some(Arc::new(getter));
    self
  }

  pub fn error_handler<F>(mut self, handler: F) -> Self
  where
    F: for<'a> Fn(&'a Error) -> BoxFuture<'a, Result<Response, Error>> + Send + Sync + 'static,
  {
    self.error_handler = Some(Arc::new(handler));
    self
  }

  pub fn serve_file<F>(mut self, server: F) -> Self
  where
    F: for<'a> Fn(&'a Request, &'a StaticFile, PathBuf) -> BoxFuture<'a, Result<Option<Response>, Error>>
      + Send
      + Sync
      + 'static,
  {
    self.serve_file = Some(Arc::new(server));
    self
  }
}

impl fmt::Debug for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppConfig")
      .field("root", &self.root)
      .field("allow_static_from", &self.allow_static_from)
      .field("body_max_buffer_size", &self.body_max_buffer_size)
      .field("get_context", &self.get_context.is_some())
      .field("error_handler", &self.error_handler.is_some())
      .field("serve_file", &self.serve_file.is_some())
      .finish()
  }
}
