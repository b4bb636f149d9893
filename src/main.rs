//! Demo host: a small shopping service with a mounted inventory service.
//!
//! ```text
//!     Client ──▶ HttpServer (axum) ──▶ Dispatcher
//!                     │                    │
//!                     │                    └─▶ request_id ─▶ request_logger ─▶ handler
//!                     └── Admin API (/admin/status, /admin/manifest)
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use axum::http::StatusCode;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use fold_service::config::{default_config, load_config};
use fold_service::http::middleware::{request_id, request_logger};
use fold_service::observability::{logging, metrics};
use fold_service::{HttpServer, Request, Response, Service, Shutdown};

#[derive(Parser)]
#[command(name = "fold-service")]
#[command(about = "Run the demo shopping service", long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults plus FOLD_* overrides when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Item {
    price: f64,
    #[serde(default)]
    quantity: u32,
}

type Store = Arc<Mutex<HashMap<String, Item>>>;

fn shopping_service(store: Store) -> Result<Service, fold_service::ConfigurationError> {
    let mut svc = Service::new("shopping");
    svc.use_fn(request_id())?.use_fn(request_logger())?;

    let put_store = store.clone();
    svc.put("/items/:name", move |req: Request, res: Response| {
        let store = put_store.clone();
        async move {
            let Some(name) = req.path_param("name").map(str::to_string) else {
                res.set_status(StatusCode::BAD_REQUEST).send("missing item name");
                return;
            };
            match req.json::<Item>() {
                Ok(item) => {
                    store
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(name.clone(), item.clone());
                    tracing::debug!(item = %name, "Item stored");
                    res.json(&item);
                }
                Err(e) => {
                    res.set_status(StatusCode::BAD_REQUEST).send(e.to_string());
                }
            }
        }
    })?;

    let get_store = store.clone();
    svc.get("/items/:name", move |req: Request, res: Response| {
        let store = get_store.clone();
        async move {
            let item = req.path_param("name").and_then(|name| {
                store
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(name)
                    .cloned()
            });
            match item {
                Some(item) => res.json(&item),
                None => {
                    res.set_status(StatusCode::NOT_FOUND).send("no such item");
                }
            }
        }
    })?;

    let mut inventory = Service::new("inventory");
    inventory.get("/count", move |_req: Request, res: Response| {
        let store = store.clone();
        async move {
            let count = store.lock().unwrap_or_else(PoisonError::into_inner).len();
            res.json(&serde_json::json!({ "items": count }));
        }
    })?;
    svc.mount("/inventory", inventory)?;

    Ok(svc)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => default_config()?,
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        service = %config.service.name,
        version = %config.service.version,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let store: Store = Arc::new(Mutex::new(HashMap::new()));
    let mut root =
        Service::new(config.service.name.clone()).with_version(config.service.version);
    root.mount("/", shopping_service(store)?)?;
    let runtime = root.build();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(runtime, config)?;
    server.run(listener, Shutdown::new()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
