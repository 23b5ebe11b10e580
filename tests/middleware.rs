use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use streamline_http::transport::{from_fn, Next, ProgressLayer};
use streamline_http::{Client, ClientConfig, Context, Request};

#[derive(Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

async fn spawn_gauged_server(gauge: Arc<Gauge>) -> String {
    let app = Router::new().route(
        "/work",
        get(move || {
            let gauge = gauge.clone();
            async move {
                let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(40)).await;
                gauge.current.fetch_sub(1, Ordering::SeqCst);
                "done"
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_configured_limit_caps_server_concurrency() {
    let gauge = Arc::new(Gauge::default());
    let base_url = spawn_gauged_server(gauge.clone()).await;
    let client = Client::with_config(ClientConfig {
        max_concurrent_requests: 2,
        ..ClientConfig::new(base_url)
    })
    .unwrap();

    let calls: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move {
                let response = client
                    .get(&Context::background(), "/work")
                    .send()
                    .await
                    .unwrap();
                // The slot frees when the call returns, before the body is read.
                response.into_body().text().await.unwrap()
            })
        })
        .collect();
    for call in calls {
        assert_eq!(call.await.unwrap(), "done");
    }

    let peak = gauge.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency was {peak}");
}

#[tokio::test]
async fn test_header_injecting_middleware() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/secure")
        .match_header("authorization", "Bearer token-1")
        .match_header("x-call", "per-call")
        .with_status(200)
        .create_async()
        .await;

    let client = Client::builder(server.url())
        .middleware(from_fn(|mut req: Request, next: Next| async move {
            req.headers_mut()
                .insert("authorization", "Bearer token-1".parse().unwrap());
            next.run(req).await
        }))
        .build()
        .unwrap();

    client
        .get(&Context::background(), "/secure")
        .with_middleware(from_fn(|mut req: Request, next: Next| async move {
            req.headers_mut().insert("x-call", "per-call".parse().unwrap());
            next.run(req).await
        }))
        .send()
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_middleware_can_short_circuit() {
    let client = Client::builder("http://127.0.0.1:9")
        .middleware(from_fn(|_req: Request, _next: Next| async move {
            let response = http::Response::builder()
                .status(503)
                .body(streamline_http::Body::from("maintenance"))?;
            Ok::<_, streamline_http::Error>(response)
        }))
        .build()
        .unwrap();

    let response = client
        .get(&Context::background(), "/anything")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
    assert_eq!(response.into_body().text().await.unwrap(), "maintenance");
}

#[tokio::test]
async fn test_progress_layer_is_transparent() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/echo")
        .match_body(r#"{"n":1}"#)
        .with_status(200)
        .with_body("x".repeat(100_000))
        .create_async()
        .await;

    let client = Client::builder(server.url())
        .middleware(ProgressLayer::new())
        .logging(true)
        .build()
        .unwrap();

    let body = client
        .post(&Context::background(), "/echo")
        .json(serde_json::json!({"n": 1}))
        .send()
        .await
        .unwrap()
        .into_body()
        .bytes()
        .await
        .unwrap();

    assert_eq!(body.len(), 100_000);
    mock.assert_async().await;
}
