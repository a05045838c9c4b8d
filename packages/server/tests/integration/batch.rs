use serde_json::json;

use crate::common::{TestApp, jpeg_bytes, routes, token_for};

#[tokio::test]
async fn batch_lookup_returns_only_users_with_avatars() {
    let app = TestApp::spawn().await;
    let guid = app.upload_avatar("alice", "a.jpg", jpeg_bytes(128)).await;

    let res = app
        .post_without_token(routes::AVATARS, &json!({"usernames": ["alice", "bob"]}))
        .await;

    assert_eq!(res.status, 200, "{}", res.text);
    let map = res.body.as_object().expect("response should be an object");
    assert_eq!(map.len(), 1);
    let url = map["alice"].as_str().unwrap();
    assert!(url.contains(&guid));

    let download = app.download(url).await;
    assert_eq!(download.bytes.len(), 128);
}

#[tokio::test]
async fn batch_lookup_with_no_matches_is_an_empty_object() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(routes::AVATARS, &json!({"usernames": ["ghost"]}))
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({}));
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(routes::AVATARS, &json!({"usernames": []}))
        .await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");

    let res = app
        .post_without_token(routes::AVATARS, &json!({"usernames": ["", "  "]}))
        .await;
    assert_eq!(res.status, 400);
}

#[tokio::test]
async fn malformed_body_is_a_validation_error() {
    let app = TestApp::spawn().await;

    let res = app
        .post_without_token(routes::AVATARS, &json!({"names": ["alice"]}))
        .await;

    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn duplicate_usernames_collapse() {
    let app = TestApp::spawn().await;
    app.upload_avatar("alice", "a.jpg", jpeg_bytes(16)).await;

    let res = app
        .post_without_token(
            routes::AVATARS,
            &json!({"usernames": ["alice", "alice", " alice "]}),
        )
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.body.as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn batch_size_is_capped() {
    let app = TestApp::spawn_with(|cfg| cfg.avatar.max_batch_size = 2).await;

    let res = app
        .post_without_token(routes::AVATARS, &json!({"usernames": ["a", "b", "c"]}))
        .await;

    assert_eq!(res.status, 400);
    assert_eq!(res.body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn batch_lookup_can_require_a_token() {
    let app = TestApp::spawn_with(|cfg| cfg.avatar.public_batch_lookup = false).await;
    let body = json!({"usernames": ["alice"]});

    let res = app.post_without_token(routes::AVATARS, &body).await;
    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");

    let res = app
        .post_with_token(routes::AVATARS, &body, &token_for("bob"))
        .await;
    assert_eq!(res.status, 200);
}
