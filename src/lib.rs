//! Composable HTTP services.
//!
//! A [`Service`] collects handlers and middleware, can mount other services
//! beneath a route, and is flattened once at startup into an immutable
//! [`RouteTable`]. The [`Dispatcher`] runs the middleware chain and handler for
//! each request; [`HttpServer`] hosts a built service over axum.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod manifest;
pub mod observability;
pub mod routing;
pub mod service;
pub mod settings;

pub use config::ServiceConfig;
pub use http::{HttpServer, Request, Response};
pub use lifecycle::Shutdown;
pub use manifest::{Manifest, Version};
pub use routing::{
    Advance, Completion, ConfigurationError, Dispatcher, Flow, HandlerError, RouteTable,
    RouteTree,
};
pub use service::{Service, ServiceRuntime};
