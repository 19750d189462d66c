//! Request routing: a radix tree per HTTP method mapping paths to handler factories.
//!
//! This module provides [`Router`], which resolves a `(method, path)` pair to a
//! fresh [`Handler`] plus the [`RouteParams`] captured along the way. Three
//! segment styles are supported:
//!
//! | Pattern              | Example match              | Captured params                  |
//! |----------------------|----------------------------|----------------------------------|
//! | `/users/new`         | `/users/new`               | *(none)*                         |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                      |
//! | `/static/*`          | `/static/css/app.css`      | `* → "css/app.css"`              |
//!
//! Static text is stored prefix-compressed: inserting `/users` next to
//! `/uploads` splits the shared `u` into its own node. Lookups therefore cost
//! time proportional to the path, not to the number of routes.
//!
//! At every node a static continuation is tried first, then the parameter
//! child, then the wildcard child, backtracking when a branch dead-ends. So
//! `/users/new` beats `/users/:id` for the path `/users/new`, at any depth.
//!
//! Trees are built before the server starts and only read afterwards, which
//! is why a `Router` can be shared by every connection without locking.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use thiserror::Error;
use tracing::{debug, warn};

use crate::context::{RouteParams, WILDCARD_KEY};
use crate::handler::{Handler, HandlerFactory, IntoResponder, responder_factory};
use crate::http::Method;

/// Reasons a route registration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("cannot register a route for an unknown method")]
    UnknownMethod,

    #[error("route path must not be empty")]
    EmptyPath,

    #[error("parameter segment in {path:?} has no name")]
    EmptyParamName { path: String },

    #[error("wildcard must be the last segment of {path:?}")]
    WildcardNotLast { path: String },

    #[error("parameter :{new} in {path:?} conflicts with existing parameter :{existing}")]
    ParamConflict {
        path: String,
        existing: String,
        new: String,
    },
}

// Registration pattern, decomposed into runs of static text and captures.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Static(String),
    Param(String),
    Wildcard(String),
}

fn tokenize(path: &str) -> Result<Vec<Token>, RouteError> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let segments: Vec<&str> = trimmed.split('/').collect();
    let last = segments.len() - 1;

    let mut tokens = Vec::new();
    let mut text = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            text.push('/');
        }
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(RouteError::EmptyParamName { path: path.into() });
            }
            if !text.is_empty() {
                tokens.push(Token::Static(std::mem::take(&mut text)));
            }
            tokens.push(Token::Param(name.to_owned()));
        } else if let Some(name) = segment.strip_prefix('*') {
            if i != last {
                return Err(RouteError::WildcardNotLast { path: path.into() });
            }
            if !text.is_empty() {
                tokens.push(Token::Static(std::mem::take(&mut text)));
            }
            tokens.push(Token::Wildcard(name.to_owned()));
        } else {
            text.push_str(segment);
        }
    }
    if !text.is_empty() {
        tokens.push(Token::Static(text));
    }
    Ok(tokens)
}

struct ParamChild {
    name: String,
    node: Node,
}

// Wildcards consume the rest of the path, so they carry no children.
struct WildcardLeaf {
    name: String,
    factory: HandlerFactory,
}

#[derive(Default)]
struct Node {
    prefix: String,
    children: BTreeMap<char, Node>,
    param: Option<Box<ParamChild>>,
    wildcard: Option<WildcardLeaf>,
    factory: Option<HandlerFactory>,
}

impl Node {
    fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    fn insert(
        &mut self,
        tokens: &[Token],
        path: &str,
        factory: HandlerFactory,
    ) -> Result<(), RouteError> {
        let Some((token, rest)) = tokens.split_first() else {
            if self.factory.replace(factory).is_some() {
                debug!(path, "route re-registered, replacing previous handler");
            }
            return Ok(());
        };

        match token {
            Token::Static(text) => self.insert_static(text, rest, path, factory),
            Token::Param(name) => {
                let child = self.param.get_or_insert_with(|| {
                    Box::new(ParamChild {
                        name: name.clone(),
                        node: Node::default(),
                    })
                });
                if child.name != *name {
                    return Err(RouteError::ParamConflict {
                        path: path.into(),
                        existing: child.name.clone(),
                        new: name.clone(),
                    });
                }
                child.node.insert(rest, path, factory)
            }
            Token::Wildcard(name) => {
                if self.wildcard.is_some() {
                    debug!(path, "wildcard re-registered, replacing previous handler");
                }
                self.wildcard = Some(WildcardLeaf {
                    name: name.clone(),
                    factory,
                });
                Ok(())
            }
        }
    }

    fn insert_static(
        &mut self,
        text: &str,
        rest: &[Token],
        path: &str,
        factory: HandlerFactory,
    ) -> Result<(), RouteError> {
        let Some(first) = text.chars().next() else {
            return self.insert(rest, path, factory);
        };

        let child = self
            .children
            .entry(first)
            .or_insert_with(|| Node::with_prefix(text));

        let common = common_prefix_len(&child.prefix, text);
        if common < child.prefix.len() {
            child.split_at(common);
        }
        if common == text.len() {
            child.insert(rest, path, factory)
        } else {
            child.insert_static(&text[common..], rest, path, factory)
        }
    }

    // Moves everything below `at` into a new child holding the prefix suffix.
    fn split_at(&mut self, at: usize) {
        let suffix = self.prefix.split_off(at);
        let Some(first) = suffix.chars().next() else {
            return;
        };
        let lower = Node {
            prefix: suffix,
            children: std::mem::take(&mut self.children),
            param: self.param.take(),
            wildcard: self.wildcard.take(),
            factory: self.factory.take(),
        };
        self.children.insert(first, lower);
    }

    fn find<'n, 'p>(
        &'n self,
        path: &'p str,
        captures: &mut Vec<(&'n str, &'p str)>,
    ) -> Option<&'n HandlerFactory> {
        if path.is_empty() {
            return self.factory.as_ref();
        }

        let mark = captures.len();
        if let Some(child) = path.chars().next().and_then(|c| self.children.get(&c)) {
            if let Some(rest) = path.strip_prefix(child.prefix.as_str()) {
                if let Some(factory) = child.find(rest, captures) {
                    return Some(factory);
                }
                captures.truncate(mark);
            }
        }

        if let Some(param) = &self.param {
            let end = path.find('/').unwrap_or(path.len());
            let (segment, rest) = path.split_at(end);
            if !segment.is_empty() {
                captures.push((param.name.as_str(), segment));
                if let Some(factory) = param.node.find(rest, captures) {
                    return Some(factory);
                }
                captures.truncate(mark);
            }
        }

        if let Some(wildcard) = &self.wildcard {
            captures.push((WILDCARD_KEY, path));
            if !wildcard.name.is_empty() {
                captures.push((wildcard.name.as_str(), path));
            }
            return Some(&wildcard.factory);
        }

        None
    }

    fn render(&self, label: &str, depth: usize, out: &mut String) {
        let _ = write!(out, "{}{label}", "  ".repeat(depth));
        if self.factory.is_some() {
            out.push_str(" [route]");
        }
        out.push('\n');
        for child in self.children.values() {
            child.render(&format!("{:?}", child.prefix), depth + 1, out);
        }
        if let Some(param) = &self.param {
            param.node.render(&format!(":{}", param.name), depth + 1, out);
        }
        if let Some(wildcard) = &self.wildcard {
            let _ = writeln!(out, "{}*{} [route]", "  ".repeat(depth + 1), wildcard.name);
        }
    }
}

// Length in bytes of the longest common prefix, on a char boundary.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// HTTP request router backed by one radix tree per method.
///
/// # Examples
///
/// ```
/// use radix_httpd::{Response, Router, StatusCode};
/// use radix_httpd::context::{Context, RouteParams};
/// use radix_httpd::http::Method;
///
/// let mut router = Router::new();
/// router.get("/users/new", |_ctx: &Context| Response::new(StatusCode::Ok)).unwrap();
/// router.get("/users/:id", |_ctx: &Context| Response::new(StatusCode::Ok)).unwrap();
///
/// let mut params = RouteParams::new();
/// assert!(router.route(Method::Get, "/users/42", &mut params).is_some());
/// assert_eq!(params.get("id"), Some("42"));
/// ```
#[derive(Default)]
pub struct Router {
    trees: HashMap<Method, Node>,
    routes: usize,
    method_not_allowed: bool,
}

impl Router {
    /// Create a new, empty `Router` with no registered routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `method` requests matching `path`.
    ///
    /// Rejected registrations are logged and leave the router unchanged.
    /// Registering the same method and pattern twice replaces the factory.
    ///
    /// # Errors
    ///
    /// See [`RouteError`].
    pub fn add_route<F>(&mut self, method: Method, path: &str, factory: F) -> Result<(), RouteError>
    where
        F: Fn() -> Box<dyn Handler> + Send + Sync + 'static,
    {
        self.insert(method, path, std::sync::Arc::new(factory))
    }

    /// Register a closure for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, responder: impl IntoResponder) -> Result<(), RouteError> {
        self.insert(Method::Get, path, responder_factory(responder))
    }

    /// Register a closure for `POST` requests matching `path`.
    pub fn post(&mut self, path: &str, responder: impl IntoResponder) -> Result<(), RouteError> {
        self.insert(Method::Post, path, responder_factory(responder))
    }

    /// Register a closure for `PUT` requests matching `path`.
    pub fn put(&mut self, path: &str, responder: impl IntoResponder) -> Result<(), RouteError> {
        self.insert(Method::Put, path, responder_factory(responder))
    }

    /// Register a closure for `DELETE` requests matching `path`.
    pub fn delete(&mut self, path: &str, responder: impl IntoResponder) -> Result<(), RouteError> {
        self.insert(Method::Delete, path, responder_factory(responder))
    }

    /// Register a closure for `PATCH` requests matching `path`.
    pub fn patch(&mut self, path: &str, responder: impl IntoResponder) -> Result<(), RouteError> {
        self.insert(Method::Patch, path, responder_factory(responder))
    }

    /// Register a closure for `OPTIONS` requests matching `path`.
    pub fn options(&mut self, path: &str, responder: impl IntoResponder) -> Result<(), RouteError> {
        self.insert(Method::Options, path, responder_factory(responder))
    }

    /// Register a closure for `HEAD` requests matching `path`.
    pub fn head(&mut self, path: &str, responder: impl IntoResponder) -> Result<(), RouteError> {
        self.insert(Method::Head, path, responder_factory(responder))
    }

    fn insert(
        &mut self,
        method: Method,
        path: &str,
        factory: HandlerFactory,
    ) -> Result<(), RouteError> {
        let result = self.try_insert(method, path, factory);
        match &result {
            Ok(()) => debug!(%method, path, "route registered"),
            Err(e) => warn!(%method, path, error = %e, "route rejected"),
        }
        result
    }

    fn try_insert(
        &mut self,
        method: Method,
        path: &str,
        factory: HandlerFactory,
    ) -> Result<(), RouteError> {
        if method == Method::Unknown {
            return Err(RouteError::UnknownMethod);
        }
        if path.is_empty() {
            return Err(RouteError::EmptyPath);
        }
        let tokens = tokenize(path)?;

        // A param-name conflict is only detected mid-insert; check on a dry
        // walk first so a rejected route leaves no partial branch behind.
        if let Some(tree) = self.trees.get(&method) {
            check_param_names(tree, &tokens, path)?;
        }

        self.trees
            .entry(method)
            .or_default()
            .insert(&tokens, path, factory)?;
        self.routes += 1;
        Ok(())
    }

    /// Resolves `path` for `method`.
    ///
    /// On success returns a brand-new handler and fills `params` with the
    /// captured segments; otherwise returns `None` and leaves `params` empty.
    /// A leading `/` on `path` is ignored.
    pub fn route(
        &self,
        method: Method,
        path: &str,
        params: &mut RouteParams,
    ) -> Option<Box<dyn Handler>> {
        params.clear();
        let tree = self.trees.get(&method)?;
        let path = path.strip_prefix('/').unwrap_or(path);

        let mut captures = Vec::new();
        let factory = tree.find(path, &mut captures)?;
        for (name, value) in captures {
            params.insert(name, value);
        }
        Some(factory())
    }

    /// Methods with a route matching `path`, in [`Method::ROUTABLE`] order.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let path = path.strip_prefix('/').unwrap_or(path);
        Method::ROUTABLE
            .into_iter()
            .filter(|method| {
                self.trees
                    .get(method)
                    .is_some_and(|tree| tree.find(path, &mut Vec::new()).is_some())
            })
            .collect()
    }

    /// Answer misses on paths registered under other methods with `405` instead of `404`.
    pub fn set_method_not_allowed(&mut self, enabled: bool) {
        self.method_not_allowed = enabled;
    }

    /// Whether `405` is reported for method mismatches.
    pub fn method_not_allowed(&self) -> bool {
        self.method_not_allowed
    }

    /// Return the number of successful registrations.
    pub fn len(&self) -> usize {
        self.routes
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes == 0
    }

    /// Renders the tree for `method` as indented text, for debugging.
    pub fn render_tree(&self, method: Method) -> Option<String> {
        let tree = self.trees.get(&method)?;
        let mut out = String::new();
        tree.render("/", 0, &mut out);
        Some(out)
    }
}

// Walks the static/param path `tokens` would take, without mutating, and
// reports a parameter whose name differs from the one already in place.
fn check_param_names(tree: &Node, tokens: &[Token], path: &str) -> Result<(), RouteError> {
    let mut node = tree;
    let mut pending = String::new();
    for token in tokens {
        match token {
            Token::Static(text) => {
                pending.push_str(text);
                while !pending.is_empty() {
                    let Some(child) = pending.chars().next().and_then(|c| node.children.get(&c))
                    else {
                        return Ok(());
                    };
                    if !pending.starts_with(child.prefix.as_str()) {
                        return Ok(());
                    }
                    pending.replace_range(..child.prefix.len(), "");
                    node = child;
                }
            }
            Token::Param(name) => {
                if !pending.is_empty() {
                    return Ok(());
                }
                let Some(param) = &node.param else {
                    return Ok(());
                };
                if param.name != *name {
                    return Err(RouteError::ParamConflict {
                        path: path.into(),
                        existing: param.name.clone(),
                        new: name.clone(),
                    });
                }
                node = &param.node;
            }
            Token::Wildcard(_) => return Ok(()),
        }
    }
    Ok(())
}
