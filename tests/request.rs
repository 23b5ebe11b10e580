use mockito::Matcher;
use serde_json::json;
use std::time::Duration;
use streamline_http::{Client, Context, Error};

#[tokio::test]
async fn test_path_query_headers_and_cookies_reach_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/users/123/posts/123")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("active".into(), "true".into()),
            Matcher::UrlEncoded("min".into(), "0.5".into()),
        ]))
        .match_header("x-request-id", "abc")
        .match_header("cookie", "session=s1; theme=dark")
        .with_status(200)
        .with_body("found")
        .create_async()
        .await;

    let client = Client::new(&format!("{}/v1", server.url())).unwrap();
    let response = client
        .get(&Context::background(), "/users/{id}/posts/{id}")
        .path_int("id", 123)
        .query_int("page", 1)
        .query_int("page", 2)
        .query_bool("active", true)
        .query_float("min", 0.5)
        .header("x-request-id", "abc")
        .cookie("session", "s1")
        .cookie("theme", "dark")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.into_body().text().await.unwrap(), "found");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_json_body_is_streamed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/items")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"name": "widget", "price": 19.99})))
        .with_status(201)
        .with_body(r#"{"id": 9}"#)
        .create_async()
        .await;

    let client = Client::new(&server.url()).unwrap();
    let response = client
        .post(&Context::background(), "/items")
        .json(json!({"name": "widget", "price": 19.99}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let created: serde_json::Value = response.into_body().json().await.unwrap();
    assert_eq!(created["id"], 9);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_form_body_is_url_encoded() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("PUT", "/profile")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("name".into(), "Ada Lovelace".into()),
            Matcher::UrlEncoded("lang".into(), "en".into()),
        ]))
        .with_status(204)
        .create_async()
        .await;

    let client = Client::new(&server.url()).unwrap();
    let response = client
        .put(&Context::background(), "/profile")
        .form("name", "Ada Lovelace")
        .form("lang", "en")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_raw_body_with_explicit_content_type() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/xml")
        .match_header("content-type", "application/xml")
        .match_body("<ping/>")
        .with_status(200)
        .create_async()
        .await;

    let client = Client::new(&server.url()).unwrap();
    client
        .post(&Context::background(), "/xml")
        .body("<ping/>", "application/xml")
        .send()
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_returned_as_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("not here")
        .create_async()
        .await;

    let client = Client::new(&server.url()).unwrap();
    let response = client
        .get(&Context::background(), "/missing")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert_eq!(response.into_body().text().await.unwrap(), "not here");
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // Port 9 (discard) is closed on loopback in practice.
    let client = Client::new("http://127.0.0.1:9").unwrap();
    let err = client
        .get(&Context::background(), "/")
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .unwrap_err();

    assert!(err.is_transport() || err.is_timeout(), "unexpected error: {err}");
}

#[tokio::test]
async fn test_invalid_base_url() {
    let err = Client::new("://invalid").unwrap_err();
    assert!(matches!(err, Error::InvalidUrl(_)));
}
