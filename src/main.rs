use crossroute::{App, AppConfig, HandlerResult, Outcome, Request, Response, StaticFile, handler};
use tracing_subscriber::EnvFilter;

const SERVING_URL: &str = "127.0.0.1:7878";

// ROUTE HANDLERS
async fn demo_home(_request: &Request) -> HandlerResult {
  Ok(
    Response::new(
      "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head>\
<body>crossroute is up. Try <a href=\"/hello/you\">/hello/you</a>.</body></html>",
    )
    .with_header("Content-Type", "text/html; charset=utf-8")
    .into(),
  )
}

async fn demo_hello(request: &Request) -> HandlerResult {
  let name = request.param("name").unwrap_or("stranger");
  Ok(Outcome::json(serde_json::json!({ "hello": name })))
}

async fn demo_echo(request: &Request) -> HandlerResult {
  let payload = request.json_value().await?;
  Ok(Outcome::json(payload))
}

async fn demo_asset(request: &Request) -> HandlerResult {
  let file = request.param("file").unwrap_or_default();
  Ok(StaticFile::new(format!("res/{}", file)).max_age(3600).into())
}

fn demo_app() -> App {
  let config = AppConfig::default().allow_static_from(["res"]);
  let mut app = App::with_config(config);
  app
    .get("/", handler!(demo_home))
    .get("/hello/:name", handler!(demo_hello))
    .post("/echo", handler!(demo_echo))
    .get("/res/:file", handler!(demo_asset));
  app
}

fn init_tracing() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();
}

// SYNC
#[cfg(feature = "sync")]
fn main() -> std::io::Result<()> {
  init_tracing();
  let threads_number: u8 = 10;
  let server = crossroute::Server::new(SERVING_URL, threads_number, demo_app())?;
  server.run();
  Ok(())
}

// ASYNC TOKIO
#[cfg(all(not(feature = "sync"), feature = "async_tokio"))]
#[tokio::main]
async fn main() -> std::io::Result<()> {
  init_tracing();
  let server = crossroute::Server::new(SERVING_URL, demo_app()).await?;
  server.run().await;
  Ok(())
}

// ASYNC SMOL
#[cfg(all(not(feature = "sync"), not(feature = "async_tokio"), feature = "async_smol"))]
fn main() -> std::io::Result<()> {
  init_tracing();
  smol::block_on(async {
    let server = crossroute::Server::new(SERVING_URL, demo_app()).await?;
    server.run().await;
    Ok::<(), std::io::Error>(())
  })
}

// ASYNC STD
#[cfg(all(
  not(feature = "sync"),
  not(feature = "async_tokio"),
  not(feature = "async_smol"),
  feature = "async_std"
))]
#[async_std::main]
async fn main() -> std::io::Result<()> {
  init_tracing();
  let server = crossroute::Server::new(SERVING_URL, demo_app()).await?;
  server.run().await;
  Ok(())
}

// NO RUNTIME: drive the app through the fetch adapter once.
#[cfg(all(
  not(feature = "sync"),
  not(feature = "async_tokio"),
  not(feature = "async_smol"),
  not(feature = "async_std")
))]
fn main() -> Result<(), crossroute::RouteError> {
  use crossroute::{FetchAdapter, FetchRequest};

  init_tracing();
  let fetch = demo_app().build(FetchAdapter)?.into_native_handler();
  let response = futures::executor::block_on(fetch(FetchRequest::get("http://localhost/hello/world")));
  tracing::info!(status = response.status, body = %response.text(), "no server runtime enabled; fetch demo");
  Ok(())
}
