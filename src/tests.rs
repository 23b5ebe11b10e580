//! End-to-end tests of the client over in-process transports.

use crate::transport::{BoxTransport, ServiceTransport};
use crate::{Body, Client, Context, Error, Request, Response};
use bytes::Bytes;
use futures::StreamExt;
use std::io;
use std::time::Duration;
use tower::service_fn;

fn client(transport: BoxTransport) -> Client {
    Client::from_transport("http://localhost/api", transport, []).unwrap()
}

/// Reads the whole request body, then echoes its content type and bytes.
fn echo_body() -> BoxTransport {
    ServiceTransport::boxed(service_fn(|req: Request| async move {
        let content_type = req
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = req.into_body().bytes().await?;
        let response = http::Response::builder()
            .header("x-received-type", content_type)
            .body(Body::from(body))?;
        Ok::<_, Error>(response)
    }))
}

/// Waits `delay` before answering.
fn slow(delay: Duration) -> BoxTransport {
    ServiceTransport::boxed(service_fn(move |_req: Request| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, Error>(http::Response::new(Body::from("slow")))
    }))
}

/// Answers at once with a body that never yields a chunk.
fn stalled_body() -> BoxTransport {
    ServiceTransport::boxed(service_fn(|_req: Request| async {
        Ok::<_, Error>(http::Response::new(Body::from_stream(
            futures::stream::pending::<crate::Result<Bytes>>(),
        )))
    }))
}

#[tokio::test]
async fn test_multipart_body_reaches_transport_in_order() {
    let client = client(echo_body());
    let response = client
        .multipart(&Context::background(), "/upload")
        .field("first", "1")
        .file("doc", "notes.txt", &b"line one\nline two"[..])
        .field_bool("last", true)
        .send()
        .await
        .unwrap();

    let content_type = response.headers()["x-received-type"].to_str().unwrap().to_string();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .unwrap()
        .to_string();
    let body = response.into_body().text().await.unwrap();

    let first = body.find("name=\"first\"").unwrap();
    let doc = body.find("name=\"doc\"; filename=\"notes.txt\"").unwrap();
    let last = body.find("name=\"last\"").unwrap();
    assert!(first < doc && doc < last);
    assert!(body.contains("line one\nline two"));
    assert!(body.starts_with(&format!("--{boundary}\r\n")));
    assert!(body.ends_with(&format!("\r\n--{boundary}--\r\n")));
}

#[tokio::test]
async fn test_multipart_source_error_is_returned_by_send() {
    let failing = tokio_test::io::Builder::new()
        .read(b"some bytes")
        .read_error(io::Error::new(io::ErrorKind::PermissionDenied, "not allowed"))
        .build();

    let err = client(echo_body())
        .multipart(&Context::background(), "/upload")
        .field("before", "ok")
        .file("doc", "secret.bin", failing)
        .send()
        .await
        .unwrap_err();

    assert!(err.is_encode());
    assert!(err.to_string().contains("not allowed"));
}

#[tokio::test]
async fn test_timeout_shorter_than_server_fails() {
    let err = client(slow(Duration::from_millis(200)))
        .get(&Context::background(), "/slow")
        .timeout(Duration::from_millis(50))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_timeout_longer_than_server_succeeds() {
    let response = client(slow(Duration::from_millis(50)))
        .get(&Context::background(), "/slow")
        .timeout(Duration::from_millis(500))
        .send()
        .await
        .unwrap();
    assert_eq!(response.into_body().text().await.unwrap(), "slow");
}

#[tokio::test]
async fn test_nested_timeouts_use_the_shortest() {
    let err = client(slow(Duration::from_millis(200)))
        .get(&Context::background(), "/slow")
        .timeout(Duration::from_secs(5))
        .timeout(Duration::from_millis(30))
        .send()
        .await
        .unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_deadline_covers_body_reads() {
    let response = client(stalled_body())
        .get(&Context::background(), "/stream")
        .timeout(Duration::from_millis(50))
        .send()
        .await
        .unwrap();

    let mut body = response.into_body();
    match body.next().await {
        Some(Err(err)) => assert!(err.is_timeout()),
        other => panic!("expected deadline error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_parent_cancellation_aborts_call() {
    let (ctx, cancel) = Context::background().with_cancel();
    let call = tokio::spawn({
        let client = client(slow(Duration::from_secs(10)));
        async move { client.get(&ctx, "/slow").send().await }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let err = call.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Canceled));
}

#[tokio::test]
async fn test_non_success_status_is_not_an_error() {
    let teapot = ServiceTransport::boxed(service_fn(|_req: Request| async {
        let response: Response = http::Response::builder()
            .status(418)
            .body(Body::from("short and stout"))?;
        Ok::<_, Error>(response)
    }));
    let response = client(teapot)
        .delete(&Context::background(), "/pot")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 418);
}
