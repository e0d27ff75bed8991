use std::fmt::{self, Display, Formatter};

pub type Rt = RequestType;

/// HTTP method of a request or route. `ANY` is the route wildcard `*`.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum RequestType {
  GET,
  POST,
  PUT,
  DELETE,
  HEAD,
  OPTIONS,
  CONNECT,
  PATCH,
  TRACE,
  ANY,
  Other(String),
}

impl Display for RequestType {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      RequestType::ANY => f.write_str("*"),
      RequestType::Other(name) => f.write_str(name),
      known => write!(f, "{:?}", known),
    }
  }
}

impl RequestType {
  /// Parses a method name, upper-casing it. Unknown verbs are kept as `Other`.
  pub fn from_str(s: &str) -> Self {
    match s.to_uppercase().as_str() {
      "GET" => RequestType::GET,
      "POST" => RequestType::POST,
      "PUT" => RequestType::PUT,
      "DELETE" => RequestType::DELETE,
      "HEAD" => RequestType::HEAD,
      "OPTIONS" => RequestType::OPTIONS,
      "CONNECT" => RequestType::CONNECT,
      "PATCH" => RequestType::PATCH,
      "TRACE" => RequestType::TRACE,
      "*" => RequestType::ANY,
      other => RequestType::Other(other.to_string()),
    }
  }

  /// Methods understood by the HTTP/1.1 parser.
  pub fn is_standard(&self) -> bool {
    !matches!(self, RequestType::ANY | RequestType::Other(_))
  }

  /// Methods whose requests conventionally carry a body.
  pub fn expects_body(&self) -> bool {
    matches!(
      self,
      RequestType::POST | RequestType::PUT | RequestType::DELETE | RequestType::PATCH
    )
  }

  /// Route-side method check: `*` on either side matches everything, and a
  /// `GET` route also answers `HEAD`.
  pub fn accepts(&self, requested: &RequestType) -> bool {
    *self == RequestType::ANY
      || *requested == RequestType::ANY
      || self == requested
      || (*self == RequestType::GET && *requested == RequestType::HEAD)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_case_insensitively() {
    assert_eq!(RequestType::from_str("get"), RequestType::GET);
    assert_eq!(RequestType::from_str("*"), RequestType::ANY);
    assert_eq!(RequestType::from_str("brew"), RequestType::Other("BREW".into()));
    assert_eq!(RequestType::from_str("brew").to_string(), "BREW");
  }

  #[test]
  fn wildcard_accepts_everything() {
    assert!(RequestType::ANY.accepts(&RequestType::POST));
    assert!(RequestType::GET.accepts(&RequestType::GET));
    assert!(!RequestType::GET.accepts(&RequestType::POST));
  }

  #[test]
  fn get_routes_answer_head() {
    assert!(RequestType::GET.accepts(&RequestType::HEAD));
    assert!(!RequestType::HEAD.accepts(&RequestType::GET));
    assert!(!RequestType::POST.accepts(&RequestType::HEAD));
  }
}
