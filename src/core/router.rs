//! Ordered path router.
//!
//! Routes are tried in insertion order; the router reports every structural
//! match and leaves the choice to the dispatcher, which moves on to the next
//! candidate whenever a handler passes.

use crate::core::error::RouteError;
use crate::core::request_type::RequestType;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  Literal(String),
  Param(String),
}

#[derive(Debug)]
pub struct Route<T> {
  pub method: RequestType,
  pub pattern: String,
  segments: Vec<Segment>,
  pub payload: T,
}

impl<T> Route<T> {
  /// `METHOD:pattern`, used to name the route in errors and logs.
  pub fn label(&self) -> String {
    format!("{}:{}", self.method, self.pattern)
  }
}

fn parse_pattern(pattern: &str) -> Result<Vec<Segment>, RouteError> {
  if !pattern.starts_with('/') {
    return Err(RouteError::InvalidPattern {
      pattern: pattern.to_string(),
      reason: "must start with '/'",
    });
  }
  pattern
    .split('/')
    .map(|segment| match segment.strip_prefix(':') {
      Some("") => Err(RouteError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: "parameter segment without a name",
      }),
      Some(name) => Ok(Segment::Param(name.to_string())),
      None => Ok(Segment::Literal(segment.to_string())),
    })
    .collect()
}

#[derive(Debug)]
pub struct PathRouter<T> {
  routes: Vec<Route<T>>,
}

impl<T> Default for PathRouter<T> {
  fn default() -> Self {
    PathRouter { routes: Vec::new() }
  }
}

impl<T> PathRouter<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a route. Duplicate patterns are kept and tried in order.
  pub fn insert(&mut self, method: RequestType, pattern: &str, payload: T) -> Result<(), RouteError> {
    let segments = parse_pattern(pattern)?;
    self.routes.push(Route {
      method,
      pattern: pattern.to_string(),
      segments,
      payload,
    });
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.routes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.routes.is_empty()
  }

  pub fn routes(&self) -> impl Iterator<Item = &Route<T>> {
    self.routes.iter()
  }

  /// Lazily yields every route matching `method` and `path`, in insertion
  /// order. Nothing is cached; each call walks the table again.
  pub fn matches<'a>(&'a self, method: &'a RequestType, path: &'a str) -> Matches<'a, T> {
    Matches {
      routes: self.routes.iter(),
      method,
      path_segments: path.split('/').collect(),
    }
  }
}

/// One structural match with its captures in declaration order.
#[derive(Debug)]
pub struct RouteMatch<'a, T> {
  pub route: &'a Route<T>,
  pub params: Vec<(String, String)>,
}

pub struct Matches<'a, T> {
  routes: std::slice::Iter<'a, Route<T>>,
  method: &'a RequestType,
  path_segments: Vec<&'a str>,
}

impl<'a, T> Matches<'a, T> {
  fn capture(&self, route: &Route<T>) -> Option<Vec<(String, String)>> {
    if route.segments.len() != self.path_segments.len() {
      return None;
    }
    let mut params = Vec::new();
    for (segment, actual) in route.segments.iter().zip(&self.path_segments) {
      match segment {
        Segment::Param(name) => params.push((name.clone(), actual.to_string())),
        Segment::Literal(literal) if literal.as_str() == *actual => {}
        Segment::Literal(_) => return None,
      }
    }
    Some(params)
  }
}

impl<'a, T> Iterator for Matches<'a, T> {
  type Item = RouteMatch<'a, T>;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(route) = self.routes.next() {
      if !route.method.accepts(self.method) {
        continue;
      }
      if let Some(params) = self.capture(route) {
        return Some(RouteMatch { route, params });
      }
    }
    None
  }
}
