//! HTTP host for a built service.
//!
//! # Responsibilities
//! - Build an axum Router from the service manifest (path matching, path params)
//! - Translate axum requests into dispatch [`Request`]s and run the dispatcher
//! - Wire up tower-http layers (tracing, request timeout)
//! - Serve the admin API on its own address
//! - Graceful shutdown
//!
//! # Design Decisions
//! - axum resolves the path to a registered route; the dispatcher only sees the route
//! - Unmatched paths are still dispatched (by raw path) so middleware and the 404 run
//! - Each request runs on its own task; the HTTP response is sent as soon as the
//!   dispatcher signals completion

use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinError;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::ServiceConfig;
use crate::http::{Request, Response};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::service::ServiceRuntime;

/// Errors raised while building or running the HTTP host.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Two registered routes map onto the same URL shape.
    #[error("route {route} conflicts with {existing}")]
    ConflictingRoutes { existing: String, route: String },

    /// A catch-all segment that is not the last segment.
    #[error("route {0} has a catch-all segment before the end")]
    MisplacedWildcard(String),

    /// A `:param` or `*rest` segment with an empty or unusable name.
    #[error("route {route} has an invalid parameter name {name:?}")]
    InvalidParameter { route: String, name: String },

    /// The same parameter name captured twice in one route.
    #[error("route {route} captures {name} more than once")]
    DuplicateParameter { route: String, name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ServiceRuntime>,
}

/// The parts of an inbound HTTP request the dispatcher needs.
struct Incoming {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Bytes,
}

/// HTTP server for a service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
    runtime: Arc<ServiceRuntime>,
}

impl HttpServer {
    /// Create a new HTTP server for `runtime`.
    pub fn new(runtime: ServiceRuntime, config: ServiceConfig) -> Result<Self, ServerError> {
        let runtime = Arc::new(runtime);
        let state = AppState {
            runtime: runtime.clone(),
        };
        let router = Self::build_router(&config, state)?;
        Ok(Self {
            router,
            config,
            runtime,
        })
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState) -> Result<Router, ServerError> {
        let mut router = Router::new();
        let mut registered: Vec<(Vec<Shape>, &str)> = Vec::new();

        for entry in &state.runtime.manifest().routes {
            if registered.iter().any(|(_, route)| *route == entry.route) {
                continue;
            }
            let (path, has_params) = to_axum_path(&entry.route)?;
            let shape = route_shape(&entry.route);
            if let Some((_, existing)) = registered
                .iter()
                .find(|(other, _)| shapes_conflict(other, &shape))
            {
                return Err(ServerError::ConflictingRoutes {
                    existing: existing.to_string(),
                    route: entry.route.clone(),
                });
            }
            registered.push((shape, entry.route.as_str()));

            let route = entry.route.clone();
            router = if has_params {
                router.route(
                    &path,
                    any(
                        move |State(state): State<AppState>,
                              Path(params): Path<HashMap<String, String>>,
                              method: Method,
                              uri: Uri,
                              headers: HeaderMap,
                              Query(query): Query<Vec<(String, String)>>,
                              body: Bytes| {
                            let route = route.clone();
                            let incoming = Incoming { method, uri, headers, query, body };
                            async move { dispatch(state, Some(route), params, incoming).await }
                        },
                    ),
                )
            } else {
                router.route(
                    &path,
                    any(
                        move |State(state): State<AppState>,
                              method: Method,
                              uri: Uri,
                              headers: HeaderMap,
                              Query(query): Query<Vec<(String, String)>>,
                              body: Bytes| {
                            let route = route.clone();
                            let incoming = Incoming { method, uri, headers, query, body };
                            async move {
                                dispatch(state, Some(route), HashMap::new(), incoming).await
                            }
                        },
                    ),
                )
            };
        }

        Ok(router
            .fallback(fallback_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            ))
    }

    /// The service router, without binding a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` is triggered or Ctrl+C is received.
    ///
    /// In-flight requests get `timeouts.shutdown_grace_secs` to finish.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.runtime.manifest().name,
            routes = self.runtime.manifest().routes.len(),
            "HTTP server starting"
        );

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let admin = setup_admin_router(self.runtime.clone(), self.config.admin.api_key.clone());
            let mut admin_shutdown = shutdown.subscribe();
            tracing::info!(address = %self.config.admin.bind_address, "Admin API starting");
            tokio::spawn(async move {
                if let Err(e) = axum::serve(admin_listener, admin)
                    .with_graceful_shutdown(async move {
                        let _ = admin_shutdown.recv().await;
                    })
                    .await
                {
                    tracing::error!(error = %e, "Admin API failed");
                }
            });
        }

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let mut stopping = shutdown.subscribe();
        let signal = shutdown_signal(shutdown.clone(), shutdown.subscribe());
        let mut server = tokio::spawn(
            axum::serve(listener, self.router)
                .with_graceful_shutdown(signal)
                .into_future(),
        );

        tokio::select! {
            joined = &mut server => return finish(joined),
            _ = stopping.recv() => {}
        }

        match tokio::time::timeout(grace, &mut server).await {
            Ok(joined) => finish(joined),
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Grace period elapsed, dropping in-flight requests"
                );
                server.abort();
                Ok(())
            }
        }
    }
}

/// Paths that match no registered route are dispatched by their raw path.
async fn fallback_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> axum::response::Response {
    let incoming = Incoming { method, uri, headers, query, body };
    dispatch(state, None, HashMap::new(), incoming).await
}

async fn dispatch(
    state: AppState,
    route: Option<String>,
    params: HashMap<String, String>,
    incoming: Incoming,
) -> axum::response::Response {
    let path = incoming.uri.path().to_string();
    let mut builder = Request::builder(incoming.method, route.unwrap_or_else(|| path.clone()))
        .path(path)
        .headers(incoming.headers)
        .path_params(params)
        .body(incoming.body);
    for (name, value) in incoming.query {
        builder = builder.query_param(name, value);
    }
    let req = builder.build();
    let res = Response::new();

    let (tx, rx) = oneshot::channel();
    let runtime = state.runtime.clone();
    let task_res = res.clone();
    tokio::spawn(async move {
        runtime
            .dispatcher()
            .handle(req, task_res, move |completion| {
                let _ = tx.send(completion);
            })
            .await;
    });

    match rx.await {
        Ok(_) => {
            let parts = res.parts();
            metrics::record_http_request(parts.status.as_u16());
            parts.into_response()
        }
        Err(_) => {
            tracing::error!("Dispatcher dropped the request without completing it");
            metrics::record_http_request(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
            (StatusCode::INTERNAL_SERVER_ERROR, "Request handling aborted").into_response()
        }
    }
}

/// Convert a dispatch route (`/items/:name`, `/files/*rest`) into axum syntax.
///
/// Returns the path and whether it captures any parameters.
fn to_axum_path(route: &str) -> Result<(String, bool), ServerError> {
    if route == "/" {
        return Ok(("/".to_string(), false));
    }
    let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
    let mut path = String::with_capacity(route.len() + 4);
    let mut names: Vec<&str> = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        path.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            check_parameter(route, name, &mut names)?;
            path.push_str(&format!("{{{name}}}"));
        } else if let Some(name) = segment.strip_prefix('*') {
            if i + 1 != segments.len() {
                return Err(ServerError::MisplacedWildcard(route.to_string()));
            }
            check_parameter(route, name, &mut names)?;
            path.push_str(&format!("{{*{name}}}"));
        } else {
            path.push_str(&segment.replace('{', "{{").replace('}', "}}"));
        }
    }
    Ok((path, !names.is_empty()))
}

/// Parameter names must be non-empty, made of `[A-Za-z0-9_-]`, and unique per route.
fn check_parameter<'a>(
    route: &str,
    name: &'a str,
    seen: &mut Vec<&'a str>,
) -> Result<(), ServerError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ServerError::InvalidParameter {
            route: route.to_string(),
            name: name.to_string(),
        });
    }
    if seen.contains(&name) {
        return Err(ServerError::DuplicateParameter {
            route: route.to_string(),
            name: name.to_string(),
        });
    }
    seen.push(name);
    Ok(())
}

/// One segment of a route, as the axum matcher sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    Literal(String),
    Param,
    CatchAll,
}

fn route_shape(route: &str) -> Vec<Shape> {
    route
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if segment.starts_with(':') {
                Shape::Param
            } else if segment.starts_with('*') {
                Shape::CatchAll
            } else {
                Shape::Literal(segment.to_string())
            }
        })
        .collect()
}

/// Two routes conflict when they share a prefix and then either match the same
/// URLs (differing only in parameter names) or put a catch-all where the other
/// captures a parameter. Literals may sit beside captures.
fn shapes_conflict(a: &[Shape], b: &[Shape]) -> bool {
    for (x, y) in a.iter().zip(b) {
        match (x, y) {
            (Shape::Literal(l), Shape::Literal(r)) if l == r => continue,
            (Shape::Param, Shape::Param) => continue,
            (Shape::CatchAll, Shape::Param | Shape::CatchAll) | (Shape::Param, Shape::CatchAll) => {
                return true
            }
            _ => return false,
        }
    }
    a.len() == b.len()
}

fn finish(joined: Result<std::io::Result<()>, JoinError>) -> Result<(), ServerError> {
    match joined {
        Ok(result) => {
            result?;
            tracing::info!("HTTP server stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "HTTP server task failed");
            Err(ServerError::Io(std::io::Error::other(e)))
        }
    }
}

/// Wait for the shutdown coordinator or Ctrl+C. Ctrl+C is forwarded to the
/// coordinator so every subscriber stops together.
async fn shutdown_signal(shutdown: Shutdown, mut rx: broadcast::Receiver<()>) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => shutdown.trigger(),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    let _ = rx.recv().await;
                }
            }
        }
        _ = rx.recv() => {}
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Service;

    #[test]
    fn test_to_axum_path() {
        assert_eq!(to_axum_path("/").unwrap(), ("/".to_string(), false));
        assert_eq!(to_axum_path("/items").unwrap(), ("/items".to_string(), false));
        assert_eq!(
            to_axum_path("/items/:name").unwrap(),
            ("/items/{name}".to_string(), true)
        );
        assert_eq!(
            to_axum_path("/files/*rest").unwrap(),
            ("/files/{*rest}".to_string(), true)
        );
        assert!(matches!(
            to_axum_path("/files/*rest/more"),
            Err(ServerError::MisplacedWildcard(_))
        ));
    }

    #[test]
    fn test_to_axum_path_rejects_bad_parameters() {
        assert!(matches!(
            to_axum_path("/items/:"),
            Err(ServerError::InvalidParameter { name, .. }) if name.is_empty()
        ));
        assert!(matches!(
            to_axum_path("/files/*"),
            Err(ServerError::InvalidParameter { .. })
        ));
        assert!(matches!(
            to_axum_path("/items/:{name}"),
            Err(ServerError::InvalidParameter { .. })
        ));
        assert!(matches!(
            to_axum_path("/a/:id/b/:id"),
            Err(ServerError::DuplicateParameter { name, .. }) if name == "id"
        ));
    }

    #[test]
    fn test_shapes_conflict() {
        let conflict = |a: &str, b: &str| shapes_conflict(&route_shape(a), &route_shape(b));

        assert!(conflict("/items/:name", "/items/:id"));
        assert!(conflict("/x/:id", "/x/*rest"));
        assert!(conflict("/x/*rest", "/x/:id/more"));
        assert!(conflict("/files/*a", "/files/*b"));
        assert!(!conflict("/items/:name", "/items/all"));
        assert!(!conflict("/items/:name", "/items/:name/reviews"));
        assert!(!conflict("/a/:id", "/b/:id"));
    }

    fn server_for(routes: &[&str]) -> Result<HttpServer, ServerError> {
        let mut svc = Service::new("svc");
        for route in routes {
            svc.get(route, |_req: Request, res: Response| async move { res.end() })
                .unwrap();
        }
        HttpServer::new(svc.build(), ServiceConfig::default())
    }

    #[test]
    fn test_new_reports_unusable_routes() {
        assert!(matches!(
            server_for(&["/items/:"]),
            Err(ServerError::InvalidParameter { .. })
        ));
        assert!(matches!(
            server_for(&["/files/*"]),
            Err(ServerError::InvalidParameter { .. })
        ));
        assert!(matches!(
            server_for(&["/x/:id", "/x/*rest"]),
            Err(ServerError::ConflictingRoutes { .. })
        ));
        assert!(server_for(&["/", "/items/:name", "/items/all", "/files/*rest"]).is_ok());
    }
}
