use serde_json::Value;

use crate::common::{TestApp, jpeg_bytes, routes, token_for};

mod upload {
    use super::*;

    #[tokio::test]
    async fn uploaded_avatar_is_served_byte_for_byte() {
        let app = TestApp::spawn().await;
        let payload = jpeg_bytes(4096);

        let guid = app.upload_avatar("alice", "pic.jpg", payload.clone()).await;

        let res = app.get_with_token(routes::MY_AVATAR, &token_for("alice")).await;
        assert_eq!(res.status, 200, "{}", res.text);
        let url = res.body["url"].as_str().unwrap();
        assert!(url.contains(&guid));

        let download = app.download(url).await;
        assert_eq!(download.status, 200);
        assert_eq!(download.bytes, payload);
    }

    #[tokio::test]
    async fn upload_records_metadata_and_mapping() {
        let app = TestApp::spawn().await;

        let guid = app.upload_avatar("alice", "pic.jpg", jpeg_bytes(300)).await;

        assert_eq!(
            app.metadata.raw("username:alice").as_deref(),
            Some(guid.as_str())
        );
        let raw = app
            .metadata
            .raw(&format!("avatar:{guid}"))
            .expect("metadata should be stored");
        let meta: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta["guid"], guid.as_str());
        assert_eq!(meta["username"], "alice");
        assert_eq!(meta["filename"], "pic.jpg");
        assert_eq!(meta["size"], 300);
        assert_eq!(meta["mime_type"], "image/jpeg");
        assert!(meta["uploaded_at"].is_string());
    }

    #[tokio::test]
    async fn reupload_points_owner_at_new_avatar() {
        let app = TestApp::spawn().await;

        let first = app.upload_avatar("alice", "a.jpg", jpeg_bytes(100)).await;
        let second = app.upload_avatar("alice", "b.jpg", jpeg_bytes(200)).await;
        assert_ne!(first, second);

        let res = app.get_with_token(routes::MY_AVATAR, &token_for("alice")).await;
        let download = app.download(res.body["url"].as_str().unwrap()).await;
        assert_eq!(download.bytes.len(), 200);

        // The previous avatar is kept by default.
        assert!(app.metadata.raw(&format!("avatar:{first}")).is_some());
    }

    #[tokio::test]
    async fn reupload_retires_previous_avatar_when_enabled() {
        let app = TestApp::spawn_with(|cfg| cfg.avatar.retire_previous_on_upload = true).await;

        let first = app.upload_avatar("alice", "a.jpg", jpeg_bytes(100)).await;
        let second = app.upload_avatar("alice", "b.jpg", jpeg_bytes(200)).await;

        assert!(app.metadata.raw(&format!("avatar:{first}")).is_none());
        assert!(app.metadata.raw(&format!("avatar:{second}")).is_some());
    }

    #[tokio::test]
    async fn missing_avatar_field_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .upload_with_token("file", "pic.jpg", "image/jpeg", jpeg_bytes(10), &token_for("alice"))
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
        assert!(app.metadata.is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let app = TestApp::spawn_with(|cfg| cfg.server.max_upload_bytes = 1024).await;

        let res = app
            .upload_with_token("avatar", "big.jpg", "image/jpeg", jpeg_bytes(2048), &token_for("alice"))
            .await;

        assert_eq!(res.status, 413, "{}", res.text);
        assert_eq!(res.body["code"], "PAYLOAD_TOO_LARGE");
        assert!(app.metadata.is_empty());
    }

    #[tokio::test]
    async fn unsafe_filename_is_replaced() {
        let app = TestApp::spawn().await;

        let guid = app.upload_avatar("alice", "../../etc/passwd", jpeg_bytes(10)).await;

        let raw = app.metadata.raw(&format!("avatar:{guid}")).unwrap();
        let meta: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(meta["filename"], "avatar.jpg");
    }
}

mod lookup {
    use super::*;

    #[tokio::test]
    async fn avatar_lifecycle_end_to_end() {
        let app = TestApp::spawn().await;
        let payload = jpeg_bytes(1024);

        let guid = app.upload_avatar("alice", "pic.jpg", payload.clone()).await;

        let res = app.avatar_url("alice", &token_for("bob")).await;
        assert_eq!(res.status, 200, "{}", res.text);
        let url = res.body["url"].as_str().unwrap().to_string();
        assert!(url.contains(&guid));

        let download = app.download(&url).await;
        assert_eq!(download.status, 200);
        assert_eq!(download.content_length, Some(1024));
        assert_eq!(download.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(download.bytes, payload);

        let res = app.delete_with_token(routes::MY_AVATAR, &token_for("alice")).await;
        assert_eq!(res.status, 204);

        let res = app.avatar_url("alice", &token_for("bob")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");

        let download = app.download(&url).await;
        assert_eq!(download.status, 404);
    }

    #[tokio::test]
    async fn unknown_user_has_no_avatar() {
        let app = TestApp::spawn().await;

        let res = app.avatar_url("nobody", &token_for("alice")).await;
        assert_eq!(res.status, 404);

        let res = app.get_with_token(routes::MY_AVATAR, &token_for("alice")).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn username_query_is_required() {
        let app = TestApp::spawn().await;

        let res = app.get_with_token(routes::AVATAR, &token_for("alice")).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app.get_with_token(&routes::avatar_of(""), &token_for("alice")).await;
        assert_eq!(res.status, 400);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn second_delete_reports_not_found() {
        let app = TestApp::spawn().await;
        app.upload_avatar("alice", "pic.jpg", jpeg_bytes(64)).await;

        let first = app.delete_with_token(routes::MY_AVATAR, &token_for("alice")).await;
        assert_eq!(first.status, 204);

        let second = app.delete_with_token(routes::MY_AVATAR, &token_for("alice")).await;
        assert_eq!(second.status, 404);
        assert_eq!(second.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn delete_only_touches_the_callers_avatar() {
        let app = TestApp::spawn().await;
        app.upload_avatar("alice", "a.jpg", jpeg_bytes(64)).await;
        app.upload_avatar("bob", "b.jpg", jpeg_bytes(64)).await;

        let res = app.delete_with_token(routes::MY_AVATAR, &token_for("alice")).await;
        assert_eq!(res.status, 204);

        let res = app.avatar_url("bob", &token_for("alice")).await;
        assert_eq!(res.status, 200);
    }
}

mod docs {
    use super::*;

    #[tokio::test]
    async fn health_and_openapi_are_served() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HEALTH).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.text, "OK");

        let res = app.get_without_token(routes::OPENAPI).await;
        assert_eq!(res.status, 200);
        assert!(res.body["paths"]["/api/avatar"].is_object());
        assert!(res.body["paths"]["/api/avatars"].is_object());
        assert!(res.body["components"]["securitySchemes"]["jwt"].is_object());
    }
}
