pub mod adapter;
pub mod app;
pub mod body;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod headers;
pub mod request;
pub mod request_type;
pub mod response;
pub mod router;
pub mod static_files;
pub mod status_code;
pub mod test_utils;
