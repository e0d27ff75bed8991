//! Static file resolution and conditional-GET caching headers.
//!
//! # Responsibilities
//! - Confine requested paths to the allowed static roots
//! - Derive `ETag` / `Last-Modified` from file metadata
//! - Decide between `304 Not Modified` and a full response

use crate::core::body::SyncReadStream;
use crate::core::config::AppConfig;
use crate::core::headers::Headers;
use crate::core::request::Request;
use crate::core::response::{Response, ResponseBody, ResponseInit};
use crate::core::status_code::StatusCode;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Caching options of a [`StaticFile`].
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
  /// Adds `Cache-Control: max-age=<n>` when set.
  pub max_age: Option<u64>,
  /// `ETag`/`Last-Modified` and 304 handling; on unless set to `false`.
  pub caching_headers: Option<bool>,
}

/// Intent to answer with a file's contents rather than literal bytes.
/// Resolved by the adapter, never by the dispatcher.
#[derive(Debug, Clone)]
pub struct StaticFile {
  pub file_path: String,
  pub init: ResponseInit,
  pub options: FileOptions,
}

impl StaticFile {
  pub fn new(file_path: impl Into<String>) -> Self {
    StaticFile {
      file_path: file_path.into(),
      init: ResponseInit::default(),
      options: FileOptions::default(),
    }
  }

  pub fn with_init(mut self, init: ResponseInit) -> Self {
    self.init = init;
    self
  }

  pub fn max_age(mut self, seconds: u64) -> Self {
    self.options.max_age = Some(seconds);
    self
  }

  pub fn caching_headers(mut self, enabled: bool) -> Self {
    self.options.caching_headers = Some(enabled);
    self
  }

  fn caching_enabled(&self) -> bool {
    self.options.caching_headers.unwrap_or(true)
  }
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

fn absolute_root(root: &Path) -> PathBuf {
  if root.is_absolute() {
    normalize(root)
  } else {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    normalize(&cwd.join(root))
  }
}

/// Maps a requested relative path to an absolute one under `root`, or `None`
/// when it does not land strictly inside one of the `allow_static_from`
/// directories. The path is normalized before the check, so
/// `public/../secret` never resolves through `public`.
pub fn resolve_file_path<S: AsRef<str>>(
  requested: &str,
  root: &Path,
  allow_static_from: &[S],
) -> Option<PathBuf> {
  let project_root = absolute_root(root);
  let full_path = normalize(&project_root.join(requested.trim_start_matches('/')));
  allow_static_from
    .iter()
    .map(|allowed| normalize(&project_root.join(allowed.as_ref().trim_start_matches('/'))))
    .any(|allowed| full_path != allowed && full_path.starts_with(&allowed))
    .then_some(full_path)
}

/// The file metadata the caching headers are derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
  pub size: u64,
  pub modified: SystemTime,
}

impl FileStat {
  pub fn from_metadata(metadata: &fs::Metadata) -> Self {
    FileStat {
      size: metadata.len(),
      modified: metadata.modified().unwrap_or(UNIX_EPOCH),
    }
  }

  fn modified_millis(&self) -> u128 {
    self
      .modified
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_millis())
      .unwrap_or(0)
  }

  /// Modification time truncated to the second precision of HTTP dates.
  fn modified_secs(&self) -> SystemTime {
    let secs = self
      .modified
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs())
      .unwrap_or(0);
    UNIX_EPOCH + Duration::from_secs(secs)
  }
}

/// `W/"<size-hex><mtime-ms-hex>"`.
pub fn weak_etag(stat: &FileStat) -> String {
  format!("W/\"{:x}{:x}\"", stat.size, stat.modified_millis())
}

pub fn last_modified(stat: &FileStat) -> String {
  httpdate::fmt_http_date(stat.modified)
}

/// True when every conditional header the client sent agrees the cached
/// copy is current. Without any conditional header the answer is `false`.
pub fn is_not_modified(headers: &Headers, stat: &FileStat) -> bool {
  let if_none_match = headers.get("if-none-match");
  let if_modified_since = headers.get("if-modified-since");
  if if_none_match.is_none() && if_modified_since.is_none() {
    return false;
  }
  if let Some(tag) = if_none_match {
    if tag.trim() != weak_etag(stat) {
      return false;
    }
  }
  if let Some(since) = if_modified_since {
    match httpdate::parse_http_date(since.trim()) {
      Ok(since) if stat.modified_secs() <= since => {}
      _ => return false,
    }
  }
  true
}

pub fn content_type_for(path: &Path) -> String {
  mime_guess::from_path(path)
    .first_raw()
    .unwrap_or("application/octet-stream")
    .to_string()
}

/// Answers `file` for `request`: `None` when the path is not allowed or the
/// file does not exist, a bodiless 304 when the client copy is fresh, and the
/// file contents otherwise.
pub fn serve_static(
  request: &Request,
  file: &StaticFile,
  config: &AppConfig,
) -> io::Result<Option<Response>> {
  let Some(full_path) = resolve_file_path(&file.file_path, &config.root, &config.allow_static_from)
  else {
    tracing::debug!(path = %file.file_path, "static path outside allowed roots");
    return Ok(None);
  };
  serve_resolved(request, file, &full_path)
}

/// Serves an already resolved path; shared with custom file servers.
///
/// The body streams from the open file with `Content-Length` taken from its
/// metadata. The metadata lookup and each chunk read are blocking `std::fs`
/// calls made on the task that writes the response.
pub fn serve_resolved(request: &Request, file: &StaticFile, full_path: &Path) -> io::Result<Option<Response>> {
  let metadata = match fs::metadata(full_path) {
    Ok(metadata) if metadata.is_file() => metadata,
    Ok(_) => return Ok(None),
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e),
  };
  let stat = FileStat::from_metadata(&metadata);

  let mut headers = file.init.headers.clone();
  if file.caching_enabled() {
    headers.set("ETag", weak_etag(&stat));
    headers.set("Last-Modified", last_modified(&stat));
  }
  if let Some(max_age) = file.options.max_age {
    headers.set("Cache-Control", format!("max-age={}", max_age));
  }

  if file.caching_enabled() && is_not_modified(&request.headers, &stat) {
    let init = ResponseInit {
      status: StatusCode::NotModified.code(),
      status_text: String::new(),
      headers,
    };
    return Ok(Some(Response::with_init(ResponseBody::Empty, init)));
  }

  let data = fs::File::open(full_path)?;
  headers.set("Content-Length", stat.size.to_string());
  if !headers.has("content-type") {
    headers.set("Content-Type", content_type_for(full_path));
  }
  let init = ResponseInit {
    status: file.init.status,
    status_text: file.init.status_text.clone(),
    headers,
  };
  let body = ResponseBody::Stream(Box::new(SyncReadStream::new(data)));
  Ok(Some(Response::with_init(body, init)))
}
