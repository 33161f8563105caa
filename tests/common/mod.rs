//! Shared utilities for integration testing.

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use rest_dispatch::config::AppConfig;
use rest_dispatch::rest::{OperationTable, RestError, RestHandler, ServiceRegistry};
use rest_dispatch::{HttpServer, Shutdown};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

/// A small order book used across the REST tests.
#[derive(Debug, Default)]
pub struct Orders;

impl RestHandler for Orders {
    fn routes(table: &mut OperationTable<Self>) {
        table.get("/orders/{id}").handle(|_, args| async move {
            Ok::<_, RestError>(json!({"id": args.require("id")?}))
        });
        table
            .get("/orders?<page>&<size>")
            .params(["page", "size"])
            .handle(|_, args| async move {
                let page = args.parse::<u64>("page")?.unwrap_or(0);
                let size = args.parse::<u64>("size")?.unwrap_or(2);
                let items: Vec<String> = (page * size..(page + 1) * size)
                    .map(|n| format!("order-{n}"))
                    .collect();
                Ok::<_, RestError>((items, 40u64))
            });
        table.post("/orders").handle(|_, args| async move {
            let body = args
                .body()
                .cloned()
                .ok_or_else(|| RestError::MissingParameter("body".into()))?;
            Ok::<_, RestError>(body)
        });
        table.delete("/orders/{id}").handle(|_, _| async { Ok::<_, RestError>(()) });
    }
}

/// Router for `registry` wrapped in the full middleware stack.
#[allow(dead_code)]
pub fn app(registry: ServiceRegistry) -> Router {
    HttpServer::new(AppConfig::default(), registry).router()
}

/// Send one request through `router`.
#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

/// Split a response into its status and JSON body.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Serve `registry` on an ephemeral local port.
#[allow(dead_code)]
pub async fn start_server(registry: ServiceRegistry) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut config = AppConfig::default();
    config.listener.bind_address = addr.to_string();
    config.listener.landing_path = Some("/web/login.html".into());

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry);
    let stop = shutdown.wait();
    let handle = tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });
    (addr, shutdown, handle)
}
