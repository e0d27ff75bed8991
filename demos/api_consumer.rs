// demos/api_consumer.rs
//
// Drives one application through the fetch-style and middleware adapters
// without any server runtime.

use crossroute::{
  App, FetchAdapter, FetchRequest, FetchResponse, HandlerResult, HttpError, MiddlewareAdapter, Outcome, Request,
  Response, handler, next_fn, transform_fn,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
struct Order {
  item: String,
  quantity: u32,
}

async fn demo_handle_home(_request: &Request) -> HandlerResult {
  Ok(Response::text("Welcome to the API consumer example!").into())
}

async fn demo_handle_order(request: &Request) -> HandlerResult {
  let order: Order = request.json().await?;
  if order.quantity == 0 {
    return Err(HttpError::bad_request("quantity must be positive").into());
  }
  let id = request.param("id").unwrap_or("new").to_string();
  Ok(Outcome::json(serde_json::json!({ "id": id, "order": order })))
}

async fn demo_handle_admin(request: &Request) -> HandlerResult {
  // Only answers for the right token; everyone else falls through to the next route.
  if request.header("x-token").as_deref() != Some("secret") {
    return Ok(Outcome::Pass);
  }
  Ok(Response::text("admin area").into())
}

fn build_app() -> App {
  let mut app = App::new();
  app
    .get("/", handler!(demo_handle_home))
    .post("/orders/:id", handler!(demo_handle_order))
    .get("/admin", handler!(demo_handle_admin))
    .on_request(|request| {
      request.on_response(transform_fn(|_, response| {
        Some(std::mem::take(response).with_header("X-Powered-By", "crossroute"))
      }))
    });
  app
}

fn print(label: &str, response: &FetchResponse) {
  println!(
    "{label}: {} {} [{}] {}",
    response.status,
    response.status_text,
    response.header("x-powered-by").unwrap_or_default(),
    response.text()
  );
}

fn main() {
  let fetch = build_app()
    .build(FetchAdapter)
    .expect("routes are valid")
    .into_native_handler();

  futures::executor::block_on(async {
    print("home", &fetch(FetchRequest::get("http://localhost/")).await);

    let order = FetchRequest::new("POST", "http://localhost/orders/42")
      .with_header("Content-Type", "application/json")
      .with_body(r#"{"item":"tea","quantity":2}"#);
    print("order", &fetch(order).await);

    let empty = FetchRequest::new("POST", "http://localhost/orders/43").with_body(r#"{"item":"tea","quantity":0}"#);
    print("empty order", &fetch(empty).await);

    print("admin", &fetch(FetchRequest::get("http://localhost/admin")).await);
  });

  let middleware = build_app()
    .build(MiddlewareAdapter)
    .expect("routes are valid")
    .into_native_handler();

  futures::executor::block_on(async {
    let next = next_fn(|request: Request| async move {
      FetchResponse {
        status: 200,
        status_text: "OK".to_string(),
        headers: Default::default(),
        body: format!("handled downstream: {}", request.path).into_bytes(),
      }
    });
    print("downstream", &middleware(FetchRequest::get("http://localhost/elsewhere"), next).await);
  });
}
