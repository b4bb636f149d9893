//! Flat, immutable routing table.
//!
//! # Responsibilities
//! - Hold every handler keyed by (route, method)
//! - Hold middleware functions per mount route, in registration order
//! - Answer the two dispatch-time questions: which middleware applies, which handler
//!
//! # Design Decisions
//! - Insertion order is preserved for both tables (deterministic dispatch and manifest)
//! - Only constructed by flattening; no public mutation
//! - Shared across requests behind `Arc` without locks

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;

use crate::manifest::RouteSpec;
use crate::routing::handler::{SharedHandler, SharedMiddleware};
use crate::routing::route::Route;

/// A registered handler.
#[derive(Clone)]
pub struct HandlerEntry {
    pub route: Route,
    pub method: Method,
    pub handler: SharedHandler,
}

impl std::fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.route)
    }
}

/// Handlers in registration order, indexed by route then method.
#[derive(Clone, Default)]
pub(crate) struct HandlerTable {
    entries: Vec<HandlerEntry>,
    index: HashMap<Route, HashMap<Method, usize>>,
}

impl HandlerTable {
    /// Store a handler. An existing entry for the same (route, method) is
    /// replaced in place and returned.
    pub(crate) fn insert(
        &mut self,
        route: Route,
        method: Method,
        handler: SharedHandler,
    ) -> Option<SharedHandler> {
        let methods = self.index.entry(route.clone()).or_default();
        if let Some(&i) = methods.get(&method) {
            return Some(std::mem::replace(&mut self.entries[i].handler, handler));
        }
        methods.insert(method.clone(), self.entries.len());
        self.entries.push(HandlerEntry { route, method, handler });
        None
    }

    pub(crate) fn get(&self, route: &str, method: &Method) -> Option<&SharedHandler> {
        let i = *self.index.get(route)?.get(method)?;
        Some(&self.entries[i].handler)
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, HandlerEntry> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Ordered lists of entries keyed by mount route, in first-mount order.
#[derive(Clone)]
pub(crate) struct MountTable<T> {
    mounts: Vec<(Route, Vec<T>)>,
    index: HashMap<Route, usize>,
}

impl<T> Default for MountTable<T> {
    fn default() -> Self {
        Self {
            mounts: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> MountTable<T> {
    pub(crate) fn push(&mut self, route: Route, entry: T) {
        match self.index.get(&route) {
            Some(&i) => self.mounts[i].1.push(entry),
            None => {
                self.index.insert(route.clone(), self.mounts.len());
                self.mounts.push((route, vec![entry]));
            }
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Route, &[T])> {
        self.mounts.iter().map(|(route, entries)| (route, entries.as_slice()))
    }

    pub(crate) fn len(&self) -> usize {
        self.mounts.iter().map(|(_, entries)| entries.len()).sum()
    }
}

/// The flattened result of a service tree, used for every request.
#[derive(Clone, Default)]
pub struct RouteTable {
    pub(crate) handlers: HandlerTable,
    pub(crate) middleware: MountTable<SharedMiddleware>,
}

impl RouteTable {
    /// Flattening an already flat table is a copy.
    pub fn flatten(&self) -> RouteTable {
        self.clone()
    }

    /// The handler registered for `route` and `method`, if any.
    pub fn handler(&self, route: &str, method: &Method) -> Option<&SharedHandler> {
        self.handlers.get(route, method)
    }

    /// Every middleware whose mount route contains `route`, in table order.
    pub fn applicable_middleware(&self, route: &str) -> Vec<SharedMiddleware> {
        self.middleware
            .iter()
            .filter(|(mount, _)| mount.contains(route))
            .flat_map(|(_, entries)| entries.iter().cloned())
            .collect()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &HandlerEntry> {
        self.handlers.iter()
    }

    pub fn mounts(&self) -> impl Iterator<Item = (&Route, &[SharedMiddleware])> {
        self.middleware.iter()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handler_count() == 0 && self.middleware_count() == 0
    }

    /// Describe every handler as `{method, route, handler}`, grouped by route in
    /// first-registration order, methods in registration order within a route.
    pub fn route_manifest(&self) -> Vec<RouteSpec> {
        let mut routes: Vec<&Route> = Vec::new();
        for entry in self.handlers.iter() {
            if !routes.contains(&&entry.route) {
                routes.push(&entry.route);
            }
        }

        routes
            .into_iter()
            .flat_map(|route| self.handlers.iter().filter(move |entry| &entry.route == route))
            .map(|entry| RouteSpec {
                method: entry.method.to_string(),
                handler: format!("{} {}", entry.method, entry.route),
                route: entry.route.to_string(),
            })
            .collect()
    }
}

impl PartialEq for RouteTable {
    /// Structural equality: same routes in the same order, pointing at the same
    /// handler and middleware instances.
    fn eq(&self, other: &Self) -> bool {
        let handlers_eq = self.handlers.len() == other.handlers.len()
            && self.handlers.iter().zip(other.handlers.iter()).all(|(a, b)| {
                a.route == b.route && a.method == b.method && Arc::ptr_eq(&a.handler, &b.handler)
            });
        let mounts_eq = self.middleware.mounts.len() == other.middleware.mounts.len()
            && self.mounts().zip(other.mounts()).all(|((ra, ma), (rb, mb))| {
                ra == rb
                    && ma.len() == mb.len()
                    && ma.iter().zip(mb).all(|(a, b)| Arc::ptr_eq(a, b))
            });
        handlers_eq && mounts_eq
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable")
            .field("handlers", &self.handlers.entries)
            .field(
                "middleware",
                &self
                    .mounts()
                    .map(|(route, entries)| (route.as_str(), entries.len()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
