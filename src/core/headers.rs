//! Case-insensitive, multi-value header map.

use std::fmt;

#[derive(Clone, Debug)]
struct Entry {
  name: String,
  values: Vec<String>,
}

/// Header names compare case-insensitively; the first-seen casing is kept for
/// iteration and on the wire. Repeated headers accumulate values in order.
#[derive(Clone, Debug, Default)]
pub struct Headers {
  entries: Vec<Entry>,
}

impl Headers {
  pub fn new() -> Self {
    Self::default()
  }

  fn position(&self, name: &str) -> Option<usize> {
    self
      .entries
      .iter()
      .position(|e| e.name.eq_ignore_ascii_case(name))
  }

  /// Adds a value, keeping any existing ones.
  pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    let value = value.into();
    match self.position(&name) {
      Some(i) => self.entries[i].values.push(value),
      None => self.entries.push(Entry {
        name,
        values: vec![value],
      }),
    }
  }

  /// Replaces all values of `name`. The original casing survives a replace.
  pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
    let name = name.into();
    let value = value.into();
    match self.position(&name) {
      Some(i) => self.entries[i].values = vec![value],
      None => self.entries.push(Entry {
        name,
        values: vec![value],
      }),
    }
  }

  /// All values joined by `", "`.
  pub fn get(&self, name: &str) -> Option<String> {
    self.position(name).map(|i| self.entries[i].values.join(", "))
  }

  /// The first value only, borrowed.
  pub fn get_first(&self, name: &str) -> Option<&str> {
    self
      .position(name)
      .and_then(|i| self.entries[i].values.first())
      .map(String::as_str)
  }

  pub fn get_all(&self, name: &str) -> &[String] {
    match self.position(name) {
      Some(i) => &self.entries[i].values,
      None => &[],
    }
  }

  pub fn has(&self, name: &str) -> bool {
    self.position(name).is_some()
  }

  pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
    self.position(name).map(|i| self.entries.remove(i).values)
  }

  /// Yields `(name, joined values)` in first-seen order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, String)> + '_ {
    self
      .entries
      .iter()
      .map(|e| (e.name.as_str(), e.values.join(", ")))
  }

  /// Yields every `(name, value)` pair without joining, for the wire writer.
  pub fn iter_raw(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self
      .entries
      .iter()
      .flat_map(|e| e.values.iter().map(move |v| (e.name.as_str(), v.as_str())))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Copies every entry of `other`, replacing same-named entries here.
  pub fn merge(&mut self, other: &Headers) {
    for entry in &other.entries {
      match self.position(&entry.name) {
        Some(i) => self.entries[i].values = entry.values.clone(),
        None => self.entries.push(entry.clone()),
      }
    }
  }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
  K: Into<String>,
  V: Into<String>,
{
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut headers = Headers::new();
    headers.extend(iter);
    headers
  }
}

impl<K, V> Extend<(K, V)> for Headers
where
  K: Into<String>,
  V: Into<String>,
{
  fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
    for (k, v) in iter {
      self.append(k, v);
    }
  }
}

impl fmt::Display for Headers {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (name, value) in self.iter() {
      writeln!(f, "{}: {}", name, value)?;
    }
    Ok(())
  }
}
