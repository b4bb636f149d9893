//! Admin API: service status and manifest for the control plane.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use crate::service::ServiceRuntime;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub runtime: Arc<ServiceRuntime>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(runtime: Arc<ServiceRuntime>, api_key: String) -> Router {
    let state = AdminState {
        runtime,
        api_key: api_key.into(),
    };
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/manifest", get(get_manifest))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
