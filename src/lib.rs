pub mod core;

// Common re-exports (always available)
pub use crate::core::{
  adapter::Adapter,
  app::{App, Dispatch, Dispatcher},
  body::{Body, BodyStream},
  config::AppConfig,
  context::Context,
  error::{BodyError, Error, HttpError, RouteError},
  handler::{Handler, HandlerResult, Outcome, ResponseTransformer, async_h, sync_h, transform_fn},
  headers::Headers,
  request::Request,
  request_type::Rt,
  response::{Response, ResponseBody, ResponseInit},
  static_files::{FileOptions, StaticFile},
  status_code::StatusCode,
  test_utils,
};
pub use crate::runtime::fetch::{FetchAdapter, FetchHandler, FetchRequest, FetchResponse};
pub use crate::runtime::middleware::{MiddlewareAdapter, MiddlewareHandler, Next, next_fn};

pub mod runtime {
  pub mod fetch;
  pub mod middleware;
  pub mod shared;

  #[cfg(feature = "sync")]
  pub mod sync {
    pub mod server;
    pub mod threadpool;
  }

  #[cfg(any(feature = "async_tokio", feature = "async_smol", feature = "async_std"))]
  pub mod r#async {
    #[cfg(feature = "async_std")]
    pub mod async_std;
    pub mod shared;
    #[cfg(feature = "async_smol")]
    pub mod smol;
    #[cfg(feature = "async_tokio")]
    pub mod tokio;
  }
}

// Server export selection
#[cfg(feature = "sync")]
pub use runtime::sync::server::Server;

#[cfg(all(not(feature = "sync"), feature = "async_tokio"))]
pub use runtime::r#async::tokio::Server;

#[cfg(all(not(feature = "sync"), not(feature = "async_tokio"), feature = "async_smol"))]
pub use runtime::r#async::smol::Server;

#[cfg(all(
  not(feature = "sync"),
  not(feature = "async_tokio"),
  not(feature = "async_smol"),
  feature = "async_std"
))]
pub use runtime::r#async::async_std::Server;
