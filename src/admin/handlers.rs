use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::manifest::Manifest;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub service: String,
    pub version: String,
    pub status: &'static str,
    pub handlers: usize,
    pub middleware: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let manifest = state.runtime.manifest();
    let table = state.runtime.dispatcher().table();
    Json(SystemStatus {
        service: manifest.name.clone(),
        version: manifest.version.to_string(),
        status: "operational",
        handlers: table.handler_count(),
        middleware: table.middleware_count(),
    })
}

pub async fn get_manifest(State(state): State<AdminState>) -> Json<Manifest> {
    Json(state.runtime.manifest().clone())
}
