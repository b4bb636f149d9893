//! HTTP host tests against a real listener.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

use fold_service::http::middleware::{request_id, X_REQUEST_ID};
use fold_service::http::{Request, Response};
use fold_service::lifecycle::Shutdown;
use fold_service::Service;

mod common;

fn items_service() -> Service {
    let mut svc = Service::new("shopping");
    svc.use_fn(request_id()).unwrap();
    svc.get("/items/:name", |req: Request, res: Response| async move {
        let name = req.path_param("name").unwrap_or_default().to_string();
        let verbose = req.query("verbose").is_some();
        res.json(&serde_json::json!({ "name": name, "verbose": verbose }));
    })
    .unwrap();
    svc.post("/echo", |req: Request, res: Response| async move {
        res.set_status(StatusCode::CREATED).send(req.body().clone());
    })
    .unwrap();
    svc
}

#[tokio::test]
async fn test_path_params_and_query_reach_handler() {
    let addr: SocketAddr = "127.0.0.1:28381".parse().unwrap();
    let shutdown = Shutdown::new();
    common::start_server(addr, items_service().build(), shutdown.clone()).await;

    let res = common::client()
        .get(format!("http://{}/items/apple?verbose=1", addr))
        .send()
        .await
        .expect("Server unreachable");

    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key(X_REQUEST_ID.as_str()));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "apple");
    assert_eq!(body["verbose"], true);

    shutdown.trigger();
}

#[tokio::test]
async fn test_body_is_passed_through() {
    let addr: SocketAddr = "127.0.0.1:28382".parse().unwrap();
    let shutdown = Shutdown::new();
    common::start_server(addr, items_service().build(), shutdown.clone()).await;

    let res = common::client()
        .post(format!("http://{}/echo", addr))
        .body("hello")
        .send()
        .await
        .expect("Server unreachable");

    assert_eq!(res.status(), 201);
    assert_eq!(res.text().await.unwrap(), "hello");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_path_still_runs_middleware() {
    let addr: SocketAddr = "127.0.0.1:28383".parse().unwrap();
    let shutdown = Shutdown::new();
    common::start_server(addr, items_service().build(), shutdown.clone()).await;

    let res = common::client()
        .get(format!("http://{}/nowhere", addr))
        .header(X_REQUEST_ID.as_str(), "trace-me")
        .send()
        .await
        .expect("Server unreachable");

    // request_id is mounted at `/`, so it matches and the chain drains with
    // the default status rather than a 404.
    assert_eq!(res.headers()[X_REQUEST_ID.as_str()], "trace-me");
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_empty_service_answers_404_over_http() {
    let addr: SocketAddr = "127.0.0.1:28384".parse().unwrap();
    let shutdown = Shutdown::new();
    common::start_server(addr, Service::new("empty").build(), shutdown.clone()).await;

    let res = common::client()
        .get(format!("http://{}/missing", addr))
        .send()
        .await
        .expect("Server unreachable");

    assert_eq!(res.status(), 404);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["title"], "Page not found");
    assert_eq!(body["detail"], "/missing");

    shutdown.trigger();
}

#[tokio::test]
async fn test_faulting_middleware_answers_500() {
    let addr: SocketAddr = "127.0.0.1:28385".parse().unwrap();
    let shutdown = Shutdown::new();

    let mut svc = Service::new("svc");
    svc.use_fn(|_req: Request, _res: Response, next: fold_service::Advance| async move {
        next.fault("database unavailable")
    })
    .unwrap();
    common::start_server(addr, svc.build(), shutdown.clone()).await;

    let res = common::client()
        .get(format!("http://{}/", addr))
        .send()
        .await
        .expect("Server unreachable");

    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["detail"], "database unavailable");

    shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let addr: SocketAddr = "127.0.0.1:28386".parse().unwrap();
    let shutdown = Shutdown::new();
    common::start_server(addr, items_service().build(), shutdown.clone()).await;

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let result = common::client()
        .get(format!("http://{}/items/apple", addr))
        .timeout(Duration::from_secs(1))
        .send()
        .await;
    assert!(result.is_err(), "Server should be closed after shutdown");
}
