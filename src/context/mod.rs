//! Per-request context: route parameters and the request handed to closure handlers.

use std::collections::HashMap;

use crate::http::Request;

/// Key under which a wildcard route stores the remainder of the path.
pub const WILDCARD_KEY: &str = "*";

/// Path parameters extracted by the router for one resolution attempt.
///
/// `:name` segments are stored under `name`; a trailing `*` segment stores
/// the rest of the path under [`WILDCARD_KEY`] (and additionally under its
/// name when registered as `*name`).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RouteParams {
    map: HashMap<String, String>,
}

impl RouteParams {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value into the parameters map
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Get a value from the parameters map
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// The wildcard capture, if the matched route ends in `*`.
    pub fn wildcard(&self) -> Option<&str> {
        self.get(WILDCARD_KEY)
    }

    /// Remove every captured value.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A fully received request together with its route parameters.
///
/// Built by [`FnHandler`](crate::handler::FnHandler) once the body is complete.
#[derive(Debug, Clone)]
pub struct Context {
    request: Request,
    params: RouteParams,
}

impl Context {
    pub fn new(request: Request, params: RouteParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    /// Shorthand for `params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    pub fn body(&self) -> &[u8] {
        self.request.body()
    }

    /// Deserializes the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
