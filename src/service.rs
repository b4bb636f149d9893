//! Composable services.
//!
//! # Data Flow
//! ```text
//! Service::get / post / use_fn / mount ...   (registration phase)
//!     → RouteTree (per service, nested via mount)
//! Service::build                             (startup, consumes the service)
//!     → RouteTree::flatten → RouteTable
//!     → Dispatcher + Manifest
//! ```
//!
//! # Design Decisions
//! - `build` takes `self`: no registration is possible once the table exists
//! - Mounting freezes the child's tree; a frozen tree can be mounted in several places

use std::sync::Arc;

use axum::http::Method;

use crate::manifest::{Manifest, Version};
use crate::routing::dispatcher::Dispatcher;
use crate::routing::error::ConfigurationError;
use crate::routing::handler::{Handler, Middleware, SharedHandler};
use crate::routing::tree::{MiddlewareEntry, RouteTree};
use crate::settings::Settings;

/// Methods registered by [`Service::all`].
pub const ALL_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
    Method::PATCH,
];

/// A named, versioned collection of handlers and middleware.
#[derive(Debug)]
pub struct Service {
    name: String,
    version: Version,
    settings: Settings,
    routes: RouteTree,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Version::default(),
            settings: Settings::default(),
            routes: RouteTree::new(),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Register `handler` for `method` at `route`.
    pub fn route<H: Handler>(
        &mut self,
        method: Method,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.routes.add_handler(method, route, Arc::new(handler))?;
        Ok(self)
    }

    pub fn get<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::GET, route, handler)
    }

    pub fn head<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::HEAD, route, handler)
    }

    pub fn post<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::POST, route, handler)
    }

    pub fn put<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::PUT, route, handler)
    }

    pub fn delete<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::DELETE, route, handler)
    }

    pub fn connect<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::CONNECT, route, handler)
    }

    pub fn options<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::OPTIONS, route, handler)
    }

    pub fn trace<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::TRACE, route, handler)
    }

    pub fn patch<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        self.route(Method::PATCH, route, handler)
    }

    /// Register the same handler for every standard method.
    pub fn all<H: Handler>(
        &mut self,
        route: &str,
        handler: H,
    ) -> Result<&mut Self, ConfigurationError> {
        let handler: SharedHandler = Arc::new(handler);
        for method in ALL_METHODS {
            self.routes.add_handler(method, route, handler.clone())?;
        }
        Ok(self)
    }

    /// Add middleware that applies to every route of this service.
    pub fn use_fn<M: Middleware>(
        &mut self,
        middleware: M,
    ) -> Result<&mut Self, ConfigurationError> {
        self.use_at("/", middleware)
    }

    /// Add middleware that applies to `route` and everything beneath it.
    pub fn use_at<M: Middleware>(
        &mut self,
        route: &str,
        middleware: M,
    ) -> Result<&mut Self, ConfigurationError> {
        self.routes
            .add_middleware(route, MiddlewareEntry::Function(Arc::new(middleware)))?;
        Ok(self)
    }

    /// Nest `child` under `route`.
    pub fn mount(
        &mut self,
        route: &str,
        child: Service,
    ) -> Result<&mut Self, ConfigurationError> {
        tracing::debug!(parent = %self.name, child = %child.name, route, "Mounting service");
        self.mount_shared(route, child.into_tree())
    }

    /// Nest an already frozen tree under `route`.
    pub fn mount_shared(
        &mut self,
        route: &str,
        tree: Arc<RouteTree>,
    ) -> Result<&mut Self, ConfigurationError> {
        self.routes.add_middleware(route, MiddlewareEntry::Nested(tree))?;
        Ok(self)
    }

    /// Freeze this service's routes so they can be mounted elsewhere.
    pub fn into_tree(self) -> Arc<RouteTree> {
        Arc::new(self.routes)
    }

    /// End the registration phase: flatten once and build the dispatcher.
    pub fn build(self) -> ServiceRuntime {
        let table = self.routes.flatten();
        let dispatcher = Dispatcher::new(table);
        let manifest = Manifest {
            name: self.name,
            version: self.version,
            routes: dispatcher.route_manifest(),
        };

        tracing::info!(
            service = %manifest.name,
            version = %manifest.version,
            handlers = dispatcher.table().handler_count(),
            middleware = dispatcher.table().middleware_count(),
            "Route table built"
        );

        ServiceRuntime {
            dispatcher,
            manifest,
            settings: self.settings,
        }
    }
}

/// A built service, ready to handle requests.
#[derive(Debug, Clone)]
pub struct ServiceRuntime {
    dispatcher: Dispatcher,
    manifest: Manifest,
    settings: Settings,
}

impl ServiceRuntime {
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Request, Response};

    async fn ok(_req: Request, res: Response) {
        res.send("ok");
    }

    #[test]
    fn test_all_registers_every_method() {
        let mut svc = Service::new("svc");
        svc.all("/any", ok).unwrap();
        let runtime = svc.build();

        let methods: Vec<_> = runtime
            .manifest()
            .routes
            .iter()
            .map(|r| r.method.as_str())
            .collect();
        assert_eq!(
            methods,
            vec!["GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH"]
        );
    }

    #[test]
    fn test_invalid_route_is_rejected() {
        let mut svc = Service::new("svc");
        assert!(svc.get("no-slash", ok).is_err());
        assert!(svc.use_at("", |_req: Request, _res: Response, next: crate::Advance| async move {
            next.advance()
        })
        .is_err());
    }

    #[test]
    fn test_nested_manifest() {
        let mut bar = Service::new("bar");
        bar.delete("/delete", ok).unwrap().post("/post", ok).unwrap();
        let mut baz = Service::new("baz");
        baz.mount("/bar", bar).unwrap();
        let mut root = Service::new("root").with_version(Version::new(1, 0, 0));
        root.mount("/baz", baz).unwrap();

        let runtime = root.build();
        let handlers: Vec<_> = runtime
            .manifest()
            .routes
            .iter()
            .map(|r| r.handler.as_str())
            .collect();
        assert_eq!(handlers, vec!["DELETE /baz/bar/delete", "POST /baz/bar/post"]);
        assert_eq!(runtime.manifest().name, "root");
        assert_eq!(runtime.manifest().version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_settings_survive_build() {
        let mut svc = Service::new("svc");
        svc.settings_mut().enable("strict routing");
        let runtime = svc.build();
        assert!(runtime.settings().enabled("strict routing"));
    }
}
