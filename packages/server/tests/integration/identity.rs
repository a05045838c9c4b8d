use std::net::SocketAddr;
use std::time::Duration;

use ::common::identity::wire::{self, FLAG_DATA, FLAG_TRAILER, UserResponse};
use ::common::identity::{GrpcWebVerifier, IdentityError, IdentityVerifier};
use axum::Router;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const GRPC_WEB_PROTO: &str = "application/grpc-web+proto";

fn request_for(token: &str) -> Vec<u8> {
    wire::encode_frame(FLAG_DATA, &wire::encode_token_request(token))
}

fn alice_body() -> Vec<u8> {
    let user = UserResponse {
        id: "42".into(),
        username: "alice".into(),
        email: "alice@example.com".into(),
    };
    let mut body = wire::encode_frame(FLAG_DATA, &user.encode());
    body.extend(wire::encode_frame(FLAG_TRAILER, b"grpc-status:0\r\n"));
    body
}

/// Fake user directory speaking gRPC-Web.
async fn validate_token(headers: HeaderMap, body: Bytes) -> Response {
    if headers.get("x-grpc-web").and_then(|v| v.to_str().ok()) != Some("1") {
        return StatusCode::BAD_REQUEST.into_response();
    }

    if body.as_ref() == request_for("good").as_slice() {
        ([(header::CONTENT_TYPE, GRPC_WEB_PROTO)], alice_body()).into_response()
    } else if body.as_ref() == request_for("text").as_slice() {
        (
            [(header::CONTENT_TYPE, "application/grpc-web-text+proto")],
            STANDARD.encode(alice_body()),
        )
            .into_response()
    } else if body.as_ref() == request_for("trailer-reject").as_slice() {
        let trailer = wire::encode_frame(
            FLAG_TRAILER,
            b"grpc-status:16\r\ngrpc-message:token expired\r\n",
        );
        ([(header::CONTENT_TYPE, GRPC_WEB_PROTO)], trailer).into_response()
    } else if body.as_ref() == request_for("broken").as_slice() {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    } else {
        (
            [
                (header::CONTENT_TYPE, GRPC_WEB_PROTO),
                (header::HeaderName::from_static("grpc-status"), "16"),
            ],
            Vec::new(),
        )
            .into_response()
    }
}

async fn spawn_directory() -> SocketAddr {
    let app = Router::new().route("/user.UserService/ValidateToken", post(validate_token));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn verifier() -> GrpcWebVerifier {
    let addr = spawn_directory().await;
    GrpcWebVerifier::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn valid_token_resolves_identity() {
    let verifier = verifier().await;

    let identity = verifier.verify_token("good").await.unwrap();

    assert_eq!(identity.id, "42");
    assert_eq!(identity.username, "alice");
    assert_eq!(identity.email, "alice@example.com");
}

#[tokio::test]
async fn text_encoded_response_is_decoded() {
    let verifier = verifier().await;

    let identity = verifier.verify_token("text").await.unwrap();

    assert_eq!(identity.username, "alice");
}

#[tokio::test]
async fn grpc_status_header_rejects_token() {
    let verifier = verifier().await;

    let err = verifier.verify_token("nope").await.unwrap_err();

    assert!(err.is_rejection(), "{err}");
}

#[tokio::test]
async fn grpc_status_trailer_rejects_token() {
    let verifier = verifier().await;

    let err = verifier.verify_token("trailer-reject").await.unwrap_err();

    assert!(err.is_rejection(), "{err}");
}

#[tokio::test]
async fn server_error_is_not_a_rejection() {
    let verifier = verifier().await;

    let err = verifier.verify_token("broken").await.unwrap_err();

    assert!(matches!(err, IdentityError::Status(500)), "{err}");
}

#[tokio::test]
async fn unreachable_directory_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let verifier =
        GrpcWebVerifier::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = verifier.verify_token("good").await.unwrap_err();

    assert!(matches!(err, IdentityError::Transport(_)), "{err}");
}
