use std::net::SocketAddr;

use axum::Router;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::{Value, json};

use crate::common::{TestApp, jpeg_bytes, routes, token_for};

const IMAGE_LEN: usize = 2000;

/// Remote host serving images for upload-from-URL.
async fn spawn_image_host() -> SocketAddr {
    let app = Router::new()
        .route(
            "/img/face.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], jpeg_bytes(IMAGE_LEN)) }),
        )
        .route("/img/", get(|| async { jpeg_bytes(IMAGE_LEN) }))
        .route("/big.jpg", get(|| async { jpeg_bytes(8 * 1024) }))
        .route(
            "/gone.jpg",
            get(|| async { StatusCode::NOT_FOUND.into_response() }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn stored_metadata(app: &TestApp, guid: &str) -> Value {
    let raw = app
        .metadata
        .raw(&format!("avatar:{guid}"))
        .expect("metadata should be stored");
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn remote_image_becomes_avatar() {
    let app = TestApp::spawn().await;
    let host = spawn_image_host().await;

    let res = app
        .post_with_token(
            routes::AVATAR_FROM_URL,
            &json!({"url": format!("http://{host}/img/face.png")}),
            &token_for("alice"),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);
    let guid = res.body["guid"].as_str().unwrap().to_string();

    let meta = stored_metadata(&app, &guid);
    assert_eq!(meta["filename"], "face.png");
    assert_eq!(meta["mime_type"], "image/png");
    assert_eq!(meta["size"], IMAGE_LEN);

    let res = app.get_with_token(routes::MY_AVATAR, &token_for("alice")).await;
    let download = app.download(res.body["url"].as_str().unwrap()).await;
    assert_eq!(download.bytes, jpeg_bytes(IMAGE_LEN));
    assert_eq!(download.content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn missing_filename_and_type_use_defaults() {
    let app = TestApp::spawn().await;
    let host = spawn_image_host().await;

    let res = app
        .post_with_token(
            routes::AVATAR_FROM_URL,
            &json!({"url": format!("http://{host}/img/")}),
            &token_for("alice"),
        )
        .await;
    assert_eq!(res.status, 200, "{}", res.text);

    let meta = stored_metadata(&app, res.body["guid"].as_str().unwrap());
    assert_eq!(meta["filename"], "avatar.jpg");
    assert_eq!(meta["mime_type"], "application/octet-stream");
}

#[tokio::test]
async fn remote_error_status_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let host = spawn_image_host().await;

    let res = app
        .post_with_token(
            routes::AVATAR_FROM_URL,
            &json!({"url": format!("http://{host}/gone.jpg")}),
            &token_for("alice"),
        )
        .await;

    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
    assert!(app.metadata.is_empty());
}

#[tokio::test]
async fn non_http_scheme_is_rejected() {
    let app = TestApp::spawn().await;

    for url in ["ftp://example.com/a.png", "file:///etc/passwd", "not a url"] {
        let res = app
            .post_with_token(
                routes::AVATAR_FROM_URL,
                &json!({ "url": url }),
                &token_for("alice"),
            )
            .await;
        assert_eq!(res.status, 400, "{url}: {}", res.text);
    }
}

#[tokio::test]
async fn unreachable_host_is_a_bad_request() {
    let app = TestApp::spawn().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let res = app
        .post_with_token(
            routes::AVATAR_FROM_URL,
            &json!({"url": format!("http://{addr}/a.jpg")}),
            &token_for("alice"),
        )
        .await;

    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn oversized_remote_image_is_rejected() {
    let app = TestApp::spawn_with(|cfg| cfg.server.max_upload_bytes = 4 * 1024).await;
    let host = spawn_image_host().await;

    let res = app
        .post_with_token(
            routes::AVATAR_FROM_URL,
            &json!({"url": format!("http://{host}/big.jpg")}),
            &token_for("alice"),
        )
        .await;

    assert_eq!(res.status, 413);
    assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.metadata.is_empty());
}

#[tokio::test]
async fn upload_from_url_requires_authentication() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(
            routes::AVATAR_FROM_URL,
            &json!({"url": "http://example.com/a.png"}),
        )
        .await;

    assert_eq!(res.status, 401);
}
