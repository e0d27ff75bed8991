#![allow(dead_code)]

use crossroute::{App, AppConfig, HandlerResult, Request, Response, StaticFile, handler, sync_handler};
use std::collections::BTreeMap;

async fn demo_handle_home(_request: &Request) -> HandlerResult {
  Ok(Response::text("home").into())
}

async fn demo_handle_get(_request: &Request) -> HandlerResult {
  Ok(Response::text("get").into())
}

async fn demo_handle_post(request: &Request) -> HandlerResult {
  let params: BTreeMap<&String, &String> = request.params.iter().collect();
  let body = request.text().await?;
  let report = format!(
    "Method: {}\nUri: {}\nParams: {:?}\nQuery: {:?}\nBody: {:?}",
    request.method, request.path, params, request.query, body
  );
  Ok(Response::text(report).into())
}

async fn demo_handle_delete(_request: &Request) -> HandlerResult {
  Ok(Response::text("delete").into())
}

fn demo_handle_panic(_request: &Request) -> HandlerResult {
  panic!("handler blew up")
}

async fn demo_handle_file(request: &Request) -> HandlerResult {
  let name = request.param("name").unwrap_or_default();
  Ok(StaticFile::new(format!("tests/fixtures/{}", name)).into())
}

pub fn test_app() -> App {
  let config = AppConfig::default()
    .root(env!("CARGO_MANIFEST_DIR"))
    .allow_static_from(["tests/fixtures"]);
  let mut app = App::with_config(config);
  app
    .get("/", handler!(demo_handle_home))
    .get("/test", handler!(demo_handle_get))
    .post("/test", handler!(demo_handle_post))
    .post("/test/:param1", handler!(demo_handle_post))
    .post("/test/:param1/:param2", handler!(demo_handle_post))
    .put("/test", handler!(demo_handle_post))
    .delete("/test", handler!(demo_handle_delete))
    .get("/files/:name", handler!(demo_handle_file))
    .get("/panic", sync_handler!(demo_handle_panic));
  app
}

pub const HOME: (&[u8], &[u8]) = (b"GET / HTTP/1.1\r\n\r\n", b"home");
pub const HEAD_HOME: (&[u8], &[u8]) = (b"HEAD / HTTP/1.1\r\n\r\n", b"HTTP/1.1 200 OK");
pub const GET: (&[u8], &[u8]) = (b"GET /test HTTP/1.1\r\n\r\n", b"get");
pub const GET_WITH_QUERY: (&[u8], &[u8]) = (b"GET /test?foo=bar&baz=qux HTTP/1.1\r\n\r\n", b"get");
pub const POST: (&[u8], &[u8]) = (
  b"POST /test HTTP/1.1\r\n\r\nmueve tu cuerpo",
  b"Method: POST\nUri: /test\nParams: {}\nQuery: []\nBody: \"mueve tu cuerpo\"",
);
pub const POST_WITH_QUERY: (&[u8], &[u8]) = (
  b"POST /test?foo=bar HTTP/1.1\r\n\r\nmueve tu cuerpo",
  b"Params: {}\nQuery: [(\"foo\", \"bar\")]\nBody: \"mueve tu cuerpo\"",
);
pub const POST_WITH_CONTENT_LENGTH: (&[u8], &[u8]) = (
  b"POST /test HTTP/1.1\r\nContent-Length: 15\r\n\r\nmueve tu cuerpo",
  b"Body: \"mueve tu cuerpo\"",
);
pub const POST_WITH_PARAMS: (&[u8], &[u8]) = (
  b"POST /test/123/abc HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody",
  b"Uri: /test/123/abc\nParams: {\"param1\": \"123\", \"param2\": \"abc\"}",
);
pub const POST_WITH_INCOMPLETE_PATH: (&[u8], &[u8]) =
  (b"POST /test/123/abc/def HTTP/1.1\r\n\r\n", b"HTTP/1.1 404 Not Found");
pub const PUT: (&[u8], &[u8]) = (
  b"PUT /test HTTP/1.1\r\nContent-Length: 3\r\n\r\nput",
  b"Method: PUT\nUri: /test",
);
pub const DELETE: (&[u8], &[u8]) = (b"DELETE /test HTTP/1.1\r\n\r\n", b"delete");
pub const FILE_EXISTS: (&[u8], &[u8]) = (
  b"GET /files/hello.txt HTTP/1.1\r\nHost: localhost\r\n\r\n",
  b"hello from disk",
);
pub const FILE_NOT_FOUND: (&[u8], &[u8]) = (
  b"GET /files/no_file_here.png HTTP/1.1\r\n\r\n",
  b"HTTP/1.1 404 Not Found",
);
pub const METHOD_NOT_ALLOWED: (&[u8], &[u8]) = (b"BREW /coffee HTTP/1.1\r\n\r\n", b"HTTP/1.1 405 Method Not Allowed");
pub const EMPTY_REQUEST: (&[u8], &[u8]) = (b"", b"HTTP/1.1 400 Bad Request");
pub const MALFORMED_REQUEST: (&[u8], &[u8]) = (b"THIS_IS_NOT_HTTP\r\n\r\n", b"HTTP/1.1 400 Bad Request");
pub const UNSUPPORTED_VERSION: (&[u8], &[u8]) = (b"GET / HTTP/0.9\r\n\r\n", b"HTTP/1.1 505 HTTP Version Not Supported");
pub const MISSING_METHOD: (&[u8], &[u8]) = (b"/ HTTP/1.1\r\n\r\n", b"HTTP/1.1 400 Bad Request");

pub const KEEP_ALIVE_POST: (&[u8], &[u8]) = (
  b"POST /test HTTP/1.1\r\nHost: x\r\n\r\nabc",
  b"Body: \"abc\"",
);
pub const CHUNKED_POST: (&[u8], &[u8]) = (
  b"POST /test HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n4;note=x\r\ndefg\r\n0\r\n\r\n",
  b"Body: \"abcdefg\"",
);
pub const BROKEN_CHUNKED_POST: (&[u8], &[u8]) = (
  b"POST /test HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nabc\r\n0\r\n\r\n",
  b"HTTP/1.1 400 Bad Request",
);
pub const UNSUPPORTED_TRANSFER_ENCODING: (&[u8], &[u8]) = (
  b"POST /test HTTP/1.1\r\nTransfer-Encoding: gzip\r\n\r\nabc",
  b"HTTP/1.1 501 Not Implemented",
);

pub const PANIC: (&[u8], &[u8]) = (b"GET /panic HTTP/1.1\r\n\r\n", b"HTTP/1.1 500 Internal Server Error");

pub fn long_path_request() -> Vec<u8> {
  format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(10_000)).into_bytes()
}

pub const LONG_PATH_EXPECTED: &[u8] = b"HTTP/1.1 414 URI Too Long";
