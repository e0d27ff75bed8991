#![cfg(feature = "sync")]

mod common;

use crossroute::runtime::sync::server::Server;
use crossroute::test_utils::{POOL_SIZE, run_test, run_test_keep_alive, setup_test_server};

fn create_test_server() -> Server {
  Server::new("127.0.0.1:0", POOL_SIZE, common::test_app()).unwrap()
}

fn server_url() -> &'static str {
  setup_test_server("sync", create_test_server)
}

fn check((request, expected): (&[u8], &[u8])) -> String {
  run_test(server_url(), request, expected)
}

#[test]
fn test_home() {
  check(common::HOME);
}

#[test]
fn test_get() {
  check(common::GET);
}

#[test]
fn test_get_with_query() {
  check(common::GET_WITH_QUERY);
}

#[test]
fn test_post() {
  check(common::POST);
}

#[test]
fn test_post_with_query() {
  check(common::POST_WITH_QUERY);
}

#[test]
fn test_post_with_content_length() {
  check(common::POST_WITH_CONTENT_LENGTH);
}

#[test]
fn test_post_with_params() {
  check(common::POST_WITH_PARAMS);
}

#[test]
fn test_post_with_incomplete_path_params() {
  check(common::POST_WITH_INCOMPLETE_PATH);
}

#[test]
fn test_put() {
  check(common::PUT);
}

#[test]
fn test_delete() {
  check(common::DELETE);
}

#[test]
fn test_file_exists() {
  check(common::FILE_EXISTS);
}

#[test]
fn test_file_not_found() {
  check(common::FILE_NOT_FOUND);
}

#[test]
fn test_method_not_allowed() {
  check(common::METHOD_NOT_ALLOWED);
}

#[test]
fn test_empty_request() {
  check(common::EMPTY_REQUEST);
}

#[test]
fn test_malformed_request() {
  check(common::MALFORMED_REQUEST);
}

#[test]
fn test_unsupported_http_version() {
  check(common::UNSUPPORTED_VERSION);
}

#[test]
fn test_missing_method() {
  check(common::MISSING_METHOD);
}

#[test]
fn test_long_path() {
  run_test(server_url(), &common::long_path_request(), common::LONG_PATH_EXPECTED);
}

#[test]
fn test_responses_close_the_connection() {
  let response = check(common::HOME);
  assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
  assert!(response.contains("Content-Length: 4\r\n"));
  assert!(response.contains("Connection: close\r\n"));
}

#[test]
fn test_post_without_length_on_open_connection() {
  let (request, expected) = common::KEEP_ALIVE_POST;
  run_test_keep_alive(server_url(), request, expected);
}

#[test]
fn test_chunked_post() {
  let (request, expected) = common::CHUNKED_POST;
  run_test_keep_alive(server_url(), request, expected);
}

#[test]
fn test_broken_chunked_post() {
  let (request, expected) = common::BROKEN_CHUNKED_POST;
  run_test_keep_alive(server_url(), request, expected);
}

#[test]
fn test_unsupported_transfer_encoding() {
  check(common::UNSUPPORTED_TRANSFER_ENCODING);
}

#[test]
fn test_panicking_handler_leaves_server_serving() {
  for _ in 0..(POOL_SIZE as usize + 2) {
    check(common::PANIC);
  }
  check(common::HOME);
}

#[test]
fn test_head_uses_get_route_without_body() {
  let response = check(common::HEAD_HOME);
  assert!(response.contains("Content-Length: 4\r\n"));
  assert!(response.ends_with("\r\n\r\n"));
}
