//! Shared helpers for dispatch and server tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fold_service::http::{Request, Response};
use fold_service::lifecycle::Shutdown;
use fold_service::routing::{Advance, Handler, Middleware};
use fold_service::{Completion, HttpServer, ServiceConfig, ServiceRuntime};

/// Ordered record of which entries ran.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<u32>>>);

impl CallLog {
    pub fn push(&self, id: u32) {
        self.0.lock().unwrap().push(id);
    }

    pub fn calls(&self) -> Vec<u32> {
        self.0.lock().unwrap().clone()
    }
}

/// Middleware that records `id` and advances.
pub fn recording_middleware(log: &CallLog, id: u32) -> impl Middleware {
    let log = log.clone();
    move |_req: Request, _res: Response, next: Advance| {
        let log = log.clone();
        async move {
            log.push(id);
            next.advance()
        }
    }
}

/// Middleware that records `id` and faults with `message`.
pub fn faulting_middleware(log: &CallLog, id: u32, message: &'static str) -> impl Middleware {
    let log = log.clone();
    move |_req: Request, _res: Response, next: Advance| {
        let log = log.clone();
        async move {
            log.push(id);
            next.fault(message)
        }
    }
}

/// Handler that records `id` and answers with `body`.
pub fn recording_handler(log: &CallLog, id: u32, body: &'static str) -> impl Handler {
    let log = log.clone();
    move |_req: Request, res: Response| {
        let log = log.clone();
        async move {
            log.push(id);
            res.send(body);
        }
    }
}

/// Counts `on_complete` invocations and keeps the last outcome.
#[derive(Clone, Default)]
pub struct CompletionCounter {
    count: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<Completion>>>,
}

impl CompletionCounter {
    pub fn callback(&self) -> impl FnOnce(Completion) + Send + 'static {
        let count = self.count.clone();
        let last = self.last.clone();
        move |completion| {
            count.fetch_add(1, Ordering::SeqCst);
            *last.lock().unwrap() = Some(completion);
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<Completion> {
        *self.last.lock().unwrap()
    }
}

/// Start an HTTP host for `runtime` on `addr` and wait until it accepts connections.
pub async fn start_server(addr: SocketAddr, runtime: ServiceRuntime, shutdown: Shutdown) {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = addr.to_string();
    config.timeouts.shutdown_grace_secs = 1;

    let server = HttpServer::new(runtime, config).unwrap();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener, shutdown).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// Client that never reuses connections, so each test request is independent.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
