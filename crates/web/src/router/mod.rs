//! Request routing.
//!
//! Routes are registered on a [`RouterBuilder`] and frozen into a [`Router`]
//! that keeps one table per method. Within a table exact patterns are found
//! with a single map lookup and always win. Dynamic patterns are tried one after
//! another, longest literal prefix first and, for equal prefixes, highest
//! specificity score first:
//!
//! ```
//! use http::Method;
//! use tern_web::router::{ParamValue, Router};
//!
//! let router = Router::builder()
//!     .on(&[Method::GET], "/test/{number:int}", "number")
//!     .on(&[Method::GET], "/test/{string:str}", "string")
//!     .on(&[Method::GET], "/test/exact", "exact")
//!     .build()
//!     .unwrap();
//!
//! let (handler, params) = router.find(&Method::GET, "/test/42").unwrap();
//! assert_eq!(*handler, "number");
//! assert_eq!(params.get("number"), Some(&ParamValue::Int(42)));
//! ```

mod param;
mod pattern;

pub use param::ParamType;
pub use param::ParamValue;
pub use pattern::CompiledPattern;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use http::Method;
use tracing::{debug, trace};

use crate::error::RouteError;
use crate::handler::{BoxedHandler, RequestHandler};
use crate::request::PathParams;
use pattern::normalize;

/// Routes of every method, immutable once built.
pub struct Router<H> {
    tables: HashMap<Method, RouteTable<H>>,
}

struct RouteTable<H> {
    exact: HashMap<String, Arc<H>>,
    dynamic: Vec<DynamicRoute<H>>,
}

struct DynamicRoute<H> {
    pattern: CompiledPattern,
    handler: Arc<H>,
}

impl<H> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("methods", &self.tables.keys().collect::<Vec<_>>()).field("routes", &self.len()).finish()
    }
}

impl<H> Router<H> {
    pub fn builder() -> RouterBuilder<H> {
        RouterBuilder::new()
    }

    /// Resolves `path` to a handler and its converted path parameters.
    ///
    /// # Errors
    ///
    /// - [`RouteError::RouteNotFound`] when nothing matches
    /// - [`RouteError::ParamConversion`] when a matched value can't be converted
    pub fn find(&self, method: &Method, path: &str) -> Result<(&H, PathParams), RouteError> {
        let path = normalize(path);
        let not_found = || RouteError::RouteNotFound { method: method.clone(), path: path.clone() };

        let table = self.tables.get(method).ok_or_else(not_found)?;

        if let Some(handler) = table.exact.get(&path) {
            trace!(%method, %path, "exact route matched");
            return Ok((handler.as_ref(), PathParams::empty()));
        }

        for route in &table.dynamic {
            if let Some(params) = route.pattern.matches(&path)? {
                trace!(%method, %path, pattern = route.pattern.pattern(), "dynamic route matched");
                return Ok((route.handler.as_ref(), params));
            }
        }

        Err(not_found())
    }

    /// Number of registered (method, pattern) pairs
    pub fn len(&self) -> usize {
        self.tables.values().map(|table| table.exact.len() + table.dynamic.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H> RouteTable<H> {
    fn new() -> Self {
        Self { exact: HashMap::new(), dynamic: Vec::new() }
    }

    fn insert(&mut self, method: &Method, pattern: CompiledPattern, handler: Arc<H>) -> Result<(), RouteError> {
        let duplicate = || RouteError::DuplicateRoute { method: method.clone(), path: pattern.pattern().to_string() };

        if pattern.is_exact() {
            return match self.exact.entry(pattern.pattern().to_string()) {
                Entry::Occupied(_) => Err(duplicate()),
                Entry::Vacant(entry) => {
                    entry.insert(handler);
                    Ok(())
                }
            };
        }

        if self.dynamic.iter().any(|route| route.pattern.pattern() == pattern.pattern()) {
            return Err(duplicate());
        }
        self.dynamic.push(DynamicRoute { pattern, handler });
        Ok(())
    }

    /// Longest prefix first, then highest score. The sort is stable so equally
    /// ranked routes keep their registration order.
    fn sort(&mut self) {
        self.dynamic.sort_by(|a, b| {
            b.pattern.prefix().len().cmp(&a.pattern.prefix().len()).then_with(|| b.pattern.score().cmp(&a.pattern.score()))
        });
    }
}

/// A handler together with the methods it answers.
pub struct MethodRoute<H> {
    methods: Vec<Method>,
    handler: H,
}

impl<H> MethodRoute<H> {
    /// Routes `handler` for `methods`, `GET` if `methods` is empty.
    pub fn new(methods: &[Method], handler: H) -> Self {
        let methods = if methods.is_empty() { vec![Method::GET] } else { methods.to_vec() };
        Self { methods, handler }
    }

    /// Also answers `method`.
    pub fn and(mut self, method: Method) -> Self {
        if !self.methods.contains(&method) {
            self.methods.push(method);
        }
        self
    }
}

impl<H> fmt::Debug for MethodRoute<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRoute").field("methods", &self.methods).finish_non_exhaustive()
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        #[doc = concat!("Routes `handler` for `", stringify!($method), "`.")]
        pub fn $name<T: RequestHandler + 'static>(handler: T) -> MethodRoute<BoxedHandler> {
            MethodRoute::new(&[Method::$method], Box::new(handler))
        }
    };
}

method_route!(get, GET);
method_route!(head, HEAD);
method_route!(post, POST);
method_route!(put, PUT);
method_route!(delete, DELETE);
method_route!(connect, CONNECT);
method_route!(options, OPTIONS);
method_route!(trace, TRACE);
method_route!(patch, PATCH);

/// Collects routes, nested groups included, until [`build`](Self::build).
pub struct RouterBuilder<H> {
    routes: Vec<(String, Vec<Method>, Arc<H>)>,
}

impl<H> fmt::Debug for RouterBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes: Vec<_> = self.routes.iter().map(|(pattern, methods, _)| (pattern, methods)).collect();
        f.debug_struct("RouterBuilder").field("routes", &routes).finish()
    }
}

impl<H> RouterBuilder<H> {
    fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn route(mut self, pattern: impl Into<String>, route: MethodRoute<H>) -> Self {
        self.routes.push((pattern.into(), route.methods, Arc::new(route.handler)));
        self
    }

    /// Routes `handler` for every method in `methods`, `GET` if it is empty.
    pub fn on(self, methods: &[Method], pattern: impl Into<String>, handler: H) -> Self {
        self.route(pattern, MethodRoute::new(methods, handler))
    }

    /// Takes over the routes of `group` below the literal `prefix`.
    ///
    /// `nest("/api", group)` turns the group's `/users` into `/api/users` and its
    /// `/` into `/api`.
    pub fn nest(mut self, prefix: &str, group: RouterBuilder<H>) -> Self {
        let prefix = prefix.trim_end_matches('/');
        self.routes
            .extend(group.routes.into_iter().map(|(pattern, methods, handler)| (join(prefix, &pattern), methods, handler)));
        self
    }

    /// Compiles every pattern and freezes the tables.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] or [`RouteError::DuplicateRoute`].
    pub fn build(self) -> Result<Router<H>, RouteError> {
        let mut tables: HashMap<Method, RouteTable<H>> = HashMap::new();

        for (pattern, methods, handler) in self.routes {
            let compiled = CompiledPattern::compile(&pattern)?;
            for method in methods {
                debug!(%method, pattern = compiled.pattern(), score = compiled.score(), "register route");
                tables.entry(method.clone()).or_insert_with(RouteTable::new).insert(&method, compiled.clone(), handler.clone())?;
            }
        }

        tables.values_mut().for_each(RouteTable::sort);
        Ok(Router { tables })
    }
}

fn join(prefix: &str, pattern: &str) -> String {
    let pattern = normalize(pattern);
    match (prefix.is_empty(), pattern.as_str()) {
        (true, _) => pattern,
        (false, "/") => prefix.to_string(),
        (false, _) => format!("{prefix}{pattern}"),
    }
}
