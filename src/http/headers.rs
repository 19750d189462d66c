//! HTTP header map with case-insensitive name lookup.
//!
//! Names keep the spelling they were received (or set) with; lookups ignore
//! ASCII case.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

/// An insertion-ordered, case-insensitive HTTP header map.
///
/// Each name holds a single value: inserting a name that is already present
/// replaces the earlier entry in place, so the last write wins while the
/// original position in the iteration order is kept.
///
/// # Examples
///
/// ```
/// use radix_httpd::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/html; charset=utf-8");
/// headers.insert("X-Custom", "first");
/// headers.insert("x-custom", "second");
///
/// assert_eq!(headers.get("content-type"), Some("text/html; charset=utf-8"));
/// assert_eq!(headers.get("X-CUSTOM"), Some("second"));
/// assert_eq!(headers.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, String)>,
    /// Lowercased name to position in `inner`.
    index: HashMap<String, usize>,
}

impl Headers {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any entry whose name matches case-insensitively.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.index.entry(name.to_ascii_lowercase()) {
            Entry::Occupied(slot) => self.inner[*slot.get()] = (name, value),
            Entry::Vacant(slot) => {
                slot.insert(self.inner.len());
                self.inner.push((name, value));
            }
        }
    }

    /// Returns the value for the given header name (case-insensitive), or `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let pos = *self.index.get(&name.to_ascii_lowercase())?;
        Some(self.inner[pos].1.as_str())
    }

    /// Removes the entry with the given header name (case-insensitive).
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let Some(pos) = self.index.remove(&name.to_ascii_lowercase()) else {
            return false;
        };
        self.inner.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        true
    }

    /// Returns `true` if the map contains an entry with the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&name.to_ascii_lowercase())
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no header entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.inner {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}
