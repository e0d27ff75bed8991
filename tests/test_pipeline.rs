use crossroute::{
  App, AppConfig, Context, Error, FetchAdapter, FetchHandler, FetchRequest, FetchResponse, HandlerResult, HttpError,
  Outcome, Request, Response, ResponseInit, StaticFile, handler, sync_handler, transform_fn,
};
use futures::executor::block_on;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn fetch_with(app: App) -> FetchHandler {
  app.build(FetchAdapter).unwrap().into_native_handler()
}

fn call(fetch: &FetchHandler, request: FetchRequest) -> FetchResponse {
  block_on(fetch(request))
}

async fn demo_foo(request: &Request) -> HandlerResult {
  Ok(Outcome::json(serde_json::json!({ "id": request.param("id") })))
}

async fn demo_oops(_request: &Request) -> HandlerResult {
  Err(Error::msg("Oops"))
}

async fn demo_echo_body(request: &Request) -> HandlerResult {
  let body = request.json_value().await?;
  Ok(Outcome::json(serde_json::json!({ "body": body })))
}

#[derive(Serialize)]
struct ErrorBody<'a> {
  name: &'a str,
  message: String,
}

#[test]
fn test_route_params_become_json() {
  let mut app = App::new();
  app.get("/foo/:id", handler!(demo_foo));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/foo/123"));
  assert_eq!(response.status, 200);
  assert_eq!(response.header("content-type").as_deref(), Some("application/json"));
  assert_eq!(response.text(), r#"{"id":"123"}"#);
}

#[test]
fn test_unmatched_route_is_not_found() {
  let mut app = App::new();
  app.get("/foo/:id", handler!(demo_foo));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/baz"));
  assert_eq!(response.status, 404);
  assert_eq!(response.text(), "Not found");
}

#[test]
fn test_custom_error_handler_renders_errors() {
  let config = AppConfig::default().error_handler(|error| {
    Box::pin(async move {
      let body = ErrorBody {
        name: error.name(),
        message: error.message(),
      };
      Response::json(&body, ResponseInit::status(500)).map_err(Error::handler)
    })
  });
  let mut app = App::with_config(config);
  app.get("/oops", handler!(demo_oops));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/oops"));
  assert_eq!(response.status, 500);
  assert_eq!(response.text(), r#"{"name":"Error","message":"Oops"}"#);
}

#[test]
fn test_json_body_is_echoed() {
  let mut app = App::new();
  app.post("/echo", handler!(demo_echo_body));
  let fetch = fetch_with(app);

  let request = FetchRequest::new("POST", "http://localhost/echo")
    .with_header("Content-Type", "application/json")
    .with_body(r#"{"foo":1}"#);
  let response = call(&fetch, request);
  assert_eq!(response.status, 200);
  assert_eq!(response.text(), r#"{"body":{"foo":1}}"#);
}

#[test]
fn test_head_is_served_by_get_route_without_body() {
  let mut app = App::new();
  app.get("/foo/:id", handler!(demo_foo));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::new("HEAD", "http://localhost/foo/7"));
  assert_eq!(response.status, 200);
  assert_eq!(response.header("content-type").as_deref(), Some("application/json"));
  assert!(response.body.is_empty());
}

#[test]
fn test_json_of_missing_body_is_bad_request() {
  let mut app = App::new();
  app.post("/echo", handler!(demo_echo_body));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::new("POST", "http://localhost/echo"));
  assert_eq!(response.status, 400);
  assert!(response.text().contains("Invalid JSON body"), "{}", response.text());
}

fn static_fixture() -> (tempfile::TempDir, FetchHandler) {
  let dir = tempfile::tempdir().unwrap();
  fs::create_dir(dir.path().join("public")).unwrap();
  fs::write(dir.path().join("public").join("bar.html"), "<p>bar</p>").unwrap();
  fs::write(dir.path().join("secret.txt"), "top secret").unwrap();

  let config = AppConfig::default().root(dir.path()).allow_static_from(["public"]);
  let mut app = App::with_config(config);
  app.get(
    "/static/:file",
    sync_handler!(|request: &Request| -> HandlerResult {
      let file = request.param("file").unwrap_or_default();
      Ok(StaticFile::new(format!("public/{}", file)).into())
    }),
  );
  app.get(
    "/escape",
    sync_handler!(|_request: &Request| -> HandlerResult { Ok(StaticFile::new("public/../secret.txt").into()) }),
  );
  app.get(
    "/cached",
    sync_handler!(|_request: &Request| -> HandlerResult { Ok(StaticFile::new("public/bar.html").max_age(60).into()) }),
  );
  (dir, fetch_with(app))
}

#[test]
fn test_static_file_is_served_with_caching_headers() {
  let (_dir, fetch) = static_fixture();

  let response = call(&fetch, FetchRequest::get("http://localhost/static/bar.html"));
  assert_eq!(response.status, 200);
  assert_eq!(response.text(), "<p>bar</p>");
  assert_eq!(response.header("content-length").as_deref(), Some("10"));
  assert_eq!(response.header("content-type").as_deref(), Some("text/html"));
  let etag = response.header("etag").unwrap();
  assert!(etag.starts_with("W/\"a"), "unexpected etag {}", etag);
  assert!(response.header("last-modified").unwrap().ends_with("GMT"));
  assert!(response.header("cache-control").is_none());

  let cached = call(&fetch, FetchRequest::get("http://localhost/cached"));
  assert_eq!(cached.header("cache-control").as_deref(), Some("max-age=60"));
}

#[test]
fn test_matching_etag_yields_not_modified() {
  let (_dir, fetch) = static_fixture();

  let first = call(&fetch, FetchRequest::get("http://localhost/static/bar.html"));
  let etag = first.header("etag").unwrap();

  let second = call(
    &fetch,
    FetchRequest::get("http://localhost/static/bar.html").with_header("If-None-Match", etag.clone()),
  );
  assert_eq!(second.status, 304);
  assert!(second.body.is_empty());
  assert_eq!(second.header("etag"), Some(etag));

  let stale = call(
    &fetch,
    FetchRequest::get("http://localhost/static/bar.html").with_header("If-None-Match", "W/\"0\""),
  );
  assert_eq!(stale.status, 200);
}

#[test]
fn test_static_traversal_and_missing_files_are_not_found() {
  let (_dir, fetch) = static_fixture();

  let escaped = call(&fetch, FetchRequest::get("http://localhost/escape"));
  assert_eq!(escaped.status, 404);
  assert_eq!(escaped.text(), "Not found");

  let missing = call(&fetch, FetchRequest::get("http://localhost/static/nope.html"));
  assert_eq!(missing.status, 404);
}

#[test]
fn test_pass_falls_through_to_next_route() {
  let mut app = App::new();
  app
    .get(
      "/item/:id",
      sync_handler!(|request: &Request| -> HandlerResult {
        if request.param("id") == Some("special") {
          Ok(Response::text("special").into())
        } else {
          Ok(Outcome::Pass)
        }
      }),
    )
    .any(
      "/item/:id",
      sync_handler!(|request: &Request| -> HandlerResult {
        Ok(Response::text(format!("generic {}", request.param("id").unwrap_or_default())).into())
      }),
    );
  let fetch = fetch_with(app);

  assert_eq!(call(&fetch, FetchRequest::get("http://localhost/item/special")).text(), "special");
  assert_eq!(call(&fetch, FetchRequest::get("http://localhost/item/7")).text(), "generic 7");
  assert_eq!(
    call(&fetch, FetchRequest::new("DELETE", "http://localhost/item/7")).text(),
    "generic 7"
  );
}

#[test]
fn test_every_candidate_passing_is_not_found() {
  let mut app = App::new();
  app.get("/maybe", sync_handler!(|_: &Request| -> HandlerResult { Ok(Outcome::Pass) }));
  let fetch = fetch_with(app);

  assert_eq!(call(&fetch, FetchRequest::get("http://localhost/maybe")).status, 404);
}

#[test]
fn test_null_is_a_result() {
  let mut app = App::new();
  app
    .get("/null", sync_handler!(|_: &Request| -> HandlerResult { Ok(Outcome::null()) }))
    .get("/null", sync_handler!(|_: &Request| -> HandlerResult { Ok(Response::text("second").into()) }));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/null"));
  assert_eq!(response.status, 200);
  assert_eq!(response.text(), "null");
}

#[test]
fn test_http_errors_bypass_error_handler() {
  let config = AppConfig::default().error_handler(|_| Box::pin(async { Ok(Response::text("custom")) }));
  let mut app = App::with_config(config);
  app.get(
    "/teapot",
    sync_handler!(|_: &Request| -> HandlerResult { Err(HttpError::new(418, "short and stout").into()) }),
  );
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/teapot"));
  assert_eq!(response.status, 418);
  assert_eq!(response.text(), "short and stout");
}

#[test]
fn test_failing_error_handler_falls_back_to_adapter() {
  let config = AppConfig::default().error_handler(|_| Box::pin(async { Err(Error::msg("handler broke")) }));
  let mut app = App::with_config(config);
  app.get("/oops", handler!(demo_oops));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/oops"));
  assert_eq!(response.status, 500);
  assert_eq!(response.text(), "Oops");
}

#[test]
fn test_unhandled_error_is_internal_server_error() {
  let mut app = App::new();
  app.get("/oops", handler!(demo_oops));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/oops"));
  assert_eq!(response.status, 500);
  assert_eq!(response.text(), "Oops");
}

#[test]
fn test_serialization_failure_names_route() {
  let mut app = App::new();
  app.get(
    "/bad/:id",
    sync_handler!(|_: &Request| -> HandlerResult {
      let mut map = HashMap::new();
      map.insert(vec![1u8], 1);
      Ok(Outcome::json(map))
    }),
  );
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/bad/1"));
  assert_eq!(response.status, 500);
  assert!(response.text().contains("GET:/bad/:id"), "got {}", response.text());
}

#[test]
fn test_invalid_json_is_bad_request() {
  let mut app = App::new();
  app.post("/echo", handler!(demo_echo_body));
  let fetch = fetch_with(app);

  let request = FetchRequest::new("POST", "http://localhost/echo").with_body("{not json");
  assert_eq!(call(&fetch, request).status, 400);
}

#[test]
fn test_oversized_body_is_payload_too_large() {
  let mut app = App::with_config(AppConfig::default().body_max_buffer_size(8));
  app.post("/echo", handler!(demo_echo_body));
  let fetch = fetch_with(app);

  let request = FetchRequest::new("POST", "http://localhost/echo").with_body(r#"{"foo":"far too long"}"#);
  assert_eq!(call(&fetch, request).status, 413);
}

#[test]
fn test_second_body_read_fails() {
  async fn read_twice(request: &Request) -> HandlerResult {
    let _ = request.text().await?;
    let _ = request.json_value().await?;
    Ok(Outcome::null())
  }
  let mut app = App::new();
  app.post("/twice", handler!(read_twice));
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::new("POST", "http://localhost/twice").with_body("{}"));
  assert_eq!(response.status, 500);
  assert!(response.text().contains("json()"), "got {}", response.text());
}

#[derive(Debug, PartialEq)]
struct User(&'static str);

#[test]
fn test_context_is_merged_before_routing() {
  let config = AppConfig::default().get_context(|request| {
    request
      .header("authorization")
      .map(|_| Context::new().with(User("ada")))
  });
  let mut app = App::with_config(config);
  app.get(
    "/me",
    sync_handler!(|request: &Request| -> HandlerResult {
      match request.ctx::<User>() {
        Some(user) => Ok(Response::text(user.0).into()),
        None => Err(HttpError::new(401, "Unauthorized").into()),
      }
    }),
  );
  let fetch = fetch_with(app);

  let anonymous = call(&fetch, FetchRequest::get("http://localhost/me"));
  assert_eq!(anonymous.status, 401);

  let signed_in = call(
    &fetch,
    FetchRequest::get("http://localhost/me").with_header("Authorization", "Bearer x"),
  );
  assert_eq!(signed_in.text(), "ada");
}

#[test]
fn test_transformers_run_in_registration_order() {
  let mut app = App::new();
  app
    .get("/t", sync_handler!(|_: &Request| -> HandlerResult { Ok(Response::text("body").into()) }))
    .on_request(|request| {
      request.on_response(transform_fn(|_, response| {
        Some(std::mem::take(response).with_header("X-Order", "first"))
      }));
    })
    .on_route_match(|request, route| {
      let route = route.to_string();
      request.on_response(transform_fn(move |_, response| {
        let order = response.header("x-order").unwrap_or_default();
        Some(
          std::mem::take(response)
            .with_header("X-Order", format!("{},second", order))
            .with_header("X-Route", route.clone()),
        )
      }));
    })
    .on_request(|request| {
      request.on_response(transform_fn(|_, _| None));
    });
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/t"));
  assert_eq!(response.text(), "body");
  assert_eq!(response.header("x-order").as_deref(), Some("first,second"));
  assert_eq!(response.header("x-route").as_deref(), Some("GET:/t"));

  let missing = call(&fetch, FetchRequest::get("http://localhost/nowhere"));
  assert_eq!(missing.status, 404);
  assert_eq!(missing.header("x-order").as_deref(), Some("first"));
}

#[test]
fn test_invalid_pattern_fails_build() {
  let mut app = App::new();
  app.get("no-slash", handler!(demo_foo));
  assert!(app.build(FetchAdapter).is_err());
}

#[test]
fn test_query_is_parsed_once() {
  let mut app = App::new();
  app.get(
    "/search",
    sync_handler!(|request: &Request| -> HandlerResult {
      let tags: Vec<&str> = request.query_all("tag").collect();
      Ok(Outcome::json(serde_json::json!({
        "q": request.query_value("q"),
        "tags": tags,
        "search": &request.search,
      })))
    }),
  );
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/search?q=a+b&tag=x&tag=y"));
  let value = response.json().unwrap();
  assert_eq!(value["q"], "a b");
  assert_eq!(value["tags"], serde_json::json!(["x", "y"]));
  assert_eq!(value["search"], "?q=a+b&tag=x&tag=y");
}

#[test]
fn test_custom_file_server_receives_resolved_path() {
  let dir = tempfile::tempdir().unwrap();
  fs::create_dir(dir.path().join("public")).unwrap();
  let root = dir.path().to_path_buf();
  let config = AppConfig::default()
    .root(&root)
    .allow_static_from(["public"])
    .serve_file(|_, file, path| {
      Box::pin(async move {
        let shown = format!("{} -> {}", file.file_path, path.display());
        Ok(Some(Response::text(shown)))
      })
    });
  let mut app = App::with_config(config);
  app.get(
    "/f",
    sync_handler!(|_: &Request| -> HandlerResult { Ok(StaticFile::new("public/x.txt").into()) }),
  );
  let fetch = fetch_with(app);

  let response = call(&fetch, FetchRequest::get("http://localhost/f"));
  let expected = format!("public/x.txt -> {}", Path::new(&root).join("public/x.txt").display());
  assert_eq!(response.text(), expected);
}
