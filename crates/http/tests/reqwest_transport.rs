//! Dispatcher over the real reqwest transport against a local axum server.

use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use concord_core::{Classified, ErrorClass, Id, User};
use concord_http::{HttpConfig, HttpDispatcher, HttpError, Request, Route};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpListener;

async fn current_user(headers: HeaderMap) -> impl IntoResponse {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != "Bot secret-token" {
        return (StatusCode::UNAUTHORIZED, HeaderMap::new(), Json(json!({"message": "401: Unauthorized", "code": 0})));
    }
    let mut out = HeaderMap::new();
    out.insert("x-ratelimit-bucket", "me".parse().unwrap());
    out.insert("x-ratelimit-limit", "5".parse().unwrap());
    out.insert("x-ratelimit-remaining", "4".parse().unwrap());
    out.insert("x-ratelimit-reset-after", "1.000".parse().unwrap());
    (
        StatusCode::OK,
        out,
        Json(json!({"id": "42", "username": "concord", "bot": true})),
    )
}

async fn create_message(Path(channel_id): Path<String>, Json(body): Json<Value>) -> impl IntoResponse {
    if channel_id == "404" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Unknown Channel", "code": 10003})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "id": "1000",
            "channel_id": channel_id,
            "author": {"id": "42", "username": "concord"},
            "content": body["content"],
        })),
    )
}

async fn start_server() -> String {
    let app = Router::new()
        .route("/api/v10/users/@me", get(current_user))
        .route("/api/v10/channels/{channel_id}/messages", post(create_message));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/v10")
}

fn dispatcher(base: &str, token: &str) -> HttpDispatcher {
    HttpDispatcher::with_reqwest(base, token, Duration::from_secs(5), HttpConfig::default())
        .unwrap()
}

#[tokio::test]
async fn test_authorized_get() {
    let base = start_server().await;
    let http = dispatcher(&base, "secret-token");

    let me: User = http.get(Route::current_user()).await.unwrap();
    assert_eq!(me.id, Id::new(42));
    assert!(me.bot);

    let info = http.limiter().bucket_info(&Route::current_user().key()).unwrap();
    assert!(info.discovered);
    assert_eq!(info.limit, Some(5));
}

#[tokio::test]
async fn test_bad_token_is_client_error() {
    let base = start_server().await;
    let http = dispatcher(&base, "wrong");

    let err = http.get::<User>(Route::current_user()).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.classification(), ErrorClass::Client);
}

#[tokio::test]
async fn test_post_json_body() {
    let base = start_server().await;
    let http = dispatcher(&base, "secret-token");

    let request = Request::new(Route::create_message(Id::new(77)))
        .json(&json!({"content": "hello"}))
        .unwrap();
    let message: concord_core::Message = http.request(request).await.unwrap();
    assert_eq!(message.channel_id, Id::new(77));
    assert_eq!(message.content, "hello");

    let request = Request::new(Route::create_message(Id::new(404)))
        .json(&json!({"content": "hello"}))
        .unwrap();
    let err = http.request::<Value>(request).await.unwrap_err();
    assert!(matches!(err, HttpError::Client { status: 404, .. }));
}
