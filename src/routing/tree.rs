//! Route registration tree and flattening.
//!
//! # Responsibilities
//! - Accumulate one service's handlers and middleware before startup
//! - Flatten nested trees into a single [`RouteTable`]
//!
//! # Flattening
//! ```text
//! 1. copy this tree's handlers unchanged
//! 2. for each mount route P (insertion order), each entry (registration order):
//!      Function(m) → append m at P
//!      Nested(t)   → flatten t, then re-home its handlers and middleware under P
//! ```
//!
//! # Design Decisions
//! - Nested trees are frozen (`Arc<RouteTree>`) before they can be mounted, so a
//!   tree can never reach itself and recursion always terminates
//! - Last registration for a (route, method) wins

use std::sync::Arc;

use axum::http::Method;

use crate::routing::error::ConfigurationError;
use crate::routing::handler::{SharedHandler, SharedMiddleware};
use crate::routing::route::Route;
use crate::routing::table::{HandlerTable, MountTable, RouteTable};

/// An entry in a tree's middleware table.
#[derive(Clone)]
pub enum MiddlewareEntry {
    /// A middleware function.
    Function(SharedMiddleware),
    /// Another service's routes, mounted here.
    Nested(Arc<RouteTree>),
}

impl std::fmt::Debug for MiddlewareEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareEntry::Function(_) => f.write_str("Function"),
            MiddlewareEntry::Nested(tree) => f.debug_tuple("Nested").field(tree).finish(),
        }
    }
}

/// Mutable builder for one service's routes.
#[derive(Clone, Default)]
pub struct RouteTree {
    handlers: HandlerTable,
    middleware: MountTable<MiddlewareEntry>,
}

impl RouteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` at `route`.
    pub fn add_handler(
        &mut self,
        method: Method,
        route: &str,
        handler: SharedHandler,
    ) -> Result<(), ConfigurationError> {
        let route = Route::parse(route)?;
        self.insert_handler(route, method, handler);
        Ok(())
    }

    /// Append a middleware entry at `mount_route`.
    pub fn add_middleware(
        &mut self,
        mount_route: &str,
        entry: MiddlewareEntry,
    ) -> Result<(), ConfigurationError> {
        let route = Route::parse(mount_route)?;
        self.middleware.push(route, entry);
        Ok(())
    }

    fn insert_handler(&mut self, route: Route, method: Method, handler: SharedHandler) {
        let key = format!("{} {}", method, route);
        if self.handlers.insert(route, method, handler).is_some() {
            tracing::debug!(route = %key, "Replacing previously registered handler");
        }
    }

    /// Resolve every nested tree into one flat table.
    pub fn flatten(&self) -> RouteTable {
        let mut table = RouteTable::default();

        for entry in self.handlers.iter() {
            table
                .handlers
                .insert(entry.route.clone(), entry.method.clone(), entry.handler.clone());
        }

        for (mount, entries) in self.middleware.iter() {
            for entry in entries {
                match entry {
                    MiddlewareEntry::Function(middleware) => {
                        table.middleware.push(mount.clone(), middleware.clone());
                    }
                    MiddlewareEntry::Nested(tree) => {
                        let nested = tree.flatten();
                        for handler in nested.handlers() {
                            let route = mount.join(&handler.route);
                            if table
                                .handlers
                                .insert(
                                    route.clone(),
                                    handler.method.clone(),
                                    handler.handler.clone(),
                                )
                                .is_some()
                            {
                                tracing::debug!(
                                    route = %route,
                                    method = %handler.method,
                                    "Nested handler replaces an earlier registration"
                                );
                            }
                        }
                        for (route, middleware) in nested.mounts() {
                            let route = mount.join(route);
                            for m in middleware {
                                table.middleware.push(route.clone(), m.clone());
                            }
                        }
                    }
                }
            }
        }

        table
    }
}

impl From<&RouteTable> for RouteTree {
    /// Lift a flat table back into a tree of function entries only.
    fn from(table: &RouteTable) -> Self {
        let mut tree = RouteTree::new();
        for entry in table.handlers() {
            tree.insert_handler(entry.route.clone(), entry.method.clone(), entry.handler.clone());
        }
        for (route, middleware) in table.mounts() {
            for m in middleware {
                tree.middleware
                    .push(route.clone(), MiddlewareEntry::Function(m.clone()));
            }
        }
        tree
    }
}

impl std::fmt::Debug for RouteTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTree")
            .field("handlers", &self.handlers.iter().collect::<Vec<_>>())
            .field("middleware", &self.middleware.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};
    use crate::routing::handler::Advance;

    fn handler() -> SharedHandler {
        Arc::new(|_req: Request, res: Response| async move { res.send("ok") })
    }

    fn middleware() -> SharedMiddleware {
        Arc::new(|_req: Request, _res: Response, next: Advance| async move { next.advance() })
    }

    fn routes(table: &RouteTable) -> Vec<String> {
        table
            .handlers()
            .map(|e| format!("{} {}", e.method, e.route))
            .collect()
    }

    #[test]
    fn test_add_handler_normalizes_and_validates() {
        let mut tree = RouteTree::new();
        tree.add_handler(Method::GET, "/foo//bar/", handler()).unwrap();
        assert_eq!(
            tree.add_handler(Method::GET, "foo", handler()),
            Err(ConfigurationError::MissingLeadingSlash("foo".into()))
        );
        assert_eq!(
            tree.add_middleware("", MiddlewareEntry::Function(middleware())),
            Err(ConfigurationError::EmptyRoute)
        );

        assert_eq!(routes(&tree.flatten()), vec!["GET /foo/bar"]);
    }

    #[test]
    fn test_last_registration_wins() {
        let first = handler();
        let second = handler();
        let mut tree = RouteTree::new();
        tree.add_handler(Method::GET, "/", first).unwrap();
        tree.add_handler(Method::POST, "/", handler()).unwrap();
        tree.add_handler(Method::GET, "/", second.clone()).unwrap();

        let table = tree.flatten();
        assert_eq!(table.handler_count(), 2);
        assert!(Arc::ptr_eq(table.handler("/", &Method::GET).unwrap(), &second));
        assert_eq!(routes(&table), vec!["GET /", "POST /"]);
    }

    #[test]
    fn test_middleware_appends_in_order() {
        let m1 = middleware();
        let m2 = middleware();
        let mut tree = RouteTree::new();
        tree.add_middleware("/", MiddlewareEntry::Function(m1.clone())).unwrap();
        tree.add_middleware("/", MiddlewareEntry::Function(m2.clone())).unwrap();
        tree.add_middleware("/", MiddlewareEntry::Function(m1.clone())).unwrap();

        let table = tree.flatten();
        let applied = table.applicable_middleware("/anything");
        assert_eq!(applied.len(), 3);
        assert!(Arc::ptr_eq(&applied[0], &m1));
        assert!(Arc::ptr_eq(&applied[1], &m2));
        assert!(Arc::ptr_eq(&applied[2], &m1));
    }

    #[test]
    fn test_flatten_composes_nested_paths() {
        let mut d = RouteTree::new();
        d.add_handler(Method::POST, "/x", handler()).unwrap();

        let mut c = RouteTree::new();
        c.add_handler(Method::GET, "/bar", handler()).unwrap();
        c.add_middleware("/qux", MiddlewareEntry::Nested(Arc::new(d))).unwrap();

        let mut root = RouteTree::new();
        root.add_middleware("/baz", MiddlewareEntry::Nested(Arc::new(c))).unwrap();

        let table = root.flatten();
        assert_eq!(routes(&table), vec!["GET /baz/bar", "POST /baz/qux/x"]);
        assert_eq!(table.middleware_count(), 0);
    }

    #[test]
    fn test_flatten_rehomes_nested_middleware() {
        let inner_mw = middleware();
        let mut child = RouteTree::new();
        child.add_middleware("/", MiddlewareEntry::Function(inner_mw.clone())).unwrap();
        child.add_middleware("/admin", MiddlewareEntry::Function(inner_mw.clone())).unwrap();
        child.add_handler(Method::GET, "/", handler()).unwrap();

        let mut root = RouteTree::new();
        root.add_middleware("/api", MiddlewareEntry::Nested(Arc::new(child))).unwrap();

        let table = root.flatten();
        let mounts: Vec<_> = table
            .mounts()
            .map(|(route, entries)| (route.to_string(), entries.len()))
            .collect();
        assert_eq!(
            mounts,
            vec![("/api".to_string(), 1), ("/api/admin".to_string(), 1)]
        );
        assert_eq!(routes(&table), vec!["GET /api"]);
    }

    #[test]
    fn test_shared_subtree_mounted_twice() {
        let mut health = RouteTree::new();
        health.add_handler(Method::GET, "/health", handler()).unwrap();
        let health = Arc::new(health);

        let mut root = RouteTree::new();
        root.add_middleware("/v1", MiddlewareEntry::Nested(health.clone())).unwrap();
        root.add_middleware("/v2", MiddlewareEntry::Nested(health)).unwrap();

        assert_eq!(
            routes(&root.flatten()),
            vec!["GET /v1/health", "GET /v2/health"]
        );
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let mut child = RouteTree::new();
        child.add_middleware("/", MiddlewareEntry::Function(middleware())).unwrap();
        child.add_handler(Method::DELETE, "/delete", handler()).unwrap();

        let mut root = RouteTree::new();
        root.add_handler(Method::GET, "/", handler()).unwrap();
        root.add_middleware("/", MiddlewareEntry::Function(middleware())).unwrap();
        root.add_middleware("/bar", MiddlewareEntry::Nested(Arc::new(child))).unwrap();

        let once = root.flatten();
        assert_eq!(once.flatten(), once);
        assert_eq!(RouteTree::from(&once).flatten(), once);
    }
}
