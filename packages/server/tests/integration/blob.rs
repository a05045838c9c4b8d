use ::common::storage::UrlSigner;
use chrono::Utc;

use crate::common::{SIGNING_SECRET, TestApp, jpeg_bytes, routes, token_for};

async fn avatar_url(app: &TestApp) -> (String, String) {
    let guid = app.upload_avatar("alice", "a.jpg", jpeg_bytes(64)).await;
    let res = app.get_with_token(routes::MY_AVATAR, &token_for("alice")).await;
    (guid, res.body["url"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn tampered_signature_is_forbidden() {
    let app = TestApp::spawn().await;
    let (_, url) = avatar_url(&app).await;

    let (base, _) = url.split_once("&signature=").unwrap();
    let tampered = format!("{base}&signature={}", "0".repeat(64));
    let download = app.download(&tampered).await;

    assert_eq!(download.status, 403);
}

#[tokio::test]
async fn link_for_another_key_is_forbidden() {
    let app = TestApp::spawn().await;
    let (guid, url) = avatar_url(&app).await;
    let other = app.upload_avatar("bob", "b.jpg", jpeg_bytes(64)).await;

    let download = app.download(&url.replace(&guid, &other)).await;

    assert_eq!(download.status, 403);
}

#[tokio::test]
async fn expired_link_is_forbidden() {
    let app = TestApp::spawn().await;
    let (guid, _) = avatar_url(&app).await;

    let key = format!("avatars/{guid}");
    let expires = Utc::now().timestamp() - 60;
    let signature = UrlSigner::new(SIGNING_SECRET).unwrap().sign(&key, expires);
    let url = app.url(&format!("/blobs/{key}?expires={expires}&signature={signature}"));

    let download = app.download(&url).await;
    assert_eq!(download.status, 403);
}

#[tokio::test]
async fn unsigned_link_is_forbidden() {
    let app = TestApp::spawn().await;
    let (guid, _) = avatar_url(&app).await;

    let download = app.download(&app.url(&format!("/blobs/avatars/{guid}"))).await;

    assert_eq!(download.status, 403);
}
