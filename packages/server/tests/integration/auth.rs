use crate::common::{OUTAGE_TOKEN, TestApp, jpeg_bytes, routes, token_for};

#[tokio::test]
async fn missing_header_is_token_missing() {
    let app = TestApp::spawn().await;

    let res = app.get_without_token(routes::MY_AVATAR).await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn unknown_token_is_token_invalid() {
    let app = TestApp::spawn().await;

    let res = app.get_with_token(routes::MY_AVATAR, "forged").await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn empty_quoted_token_is_token_invalid() {
    let app = TestApp::spawn().await;

    let res = app.get_with_auth_header(routes::MY_AVATAR, "Bearer \"\"").await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_INVALID");
}

#[tokio::test]
async fn empty_authorization_header_is_token_missing() {
    let app = TestApp::spawn().await;

    let res = app.get_with_auth_header(routes::MY_AVATAR, "").await;

    assert_eq!(res.status, 401);
    assert_eq!(res.body["code"], "TOKEN_MISSING");
}

#[tokio::test]
async fn quoted_and_unprefixed_tokens_are_accepted() {
    let app = TestApp::spawn().await;
    app.upload_avatar("alice", "a.jpg", jpeg_bytes(32)).await;

    let quoted = format!("Bearer \"{}\"", token_for("alice"));
    let res = app.get_with_auth_header(routes::MY_AVATAR, &quoted).await;
    assert_eq!(res.status, 200, "{}", res.text);

    let bare = token_for("alice");
    let res = app.get_with_auth_header(routes::MY_AVATAR, &bare).await;
    assert_eq!(res.status, 200, "{}", res.text);
}

#[tokio::test]
async fn identity_outage_is_service_unavailable() {
    let app = TestApp::spawn().await;

    let res = app.get_with_token(routes::MY_AVATAR, OUTAGE_TOKEN).await;

    assert_eq!(res.status, 503);
    assert_eq!(res.body["code"], "IDENTITY_UNAVAILABLE");
}

#[tokio::test]
async fn upload_requires_authentication() {
    let app = TestApp::spawn().await;

    let res = app
        .upload_with_token("avatar", "a.jpg", "image/jpeg", jpeg_bytes(8), "forged")
        .await;

    assert_eq!(res.status, 401);
    assert!(app.metadata.is_empty());
}
