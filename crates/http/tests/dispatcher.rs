mod common;

use common::{ScriptedTransport, ok, response, too_many};
use concord_core::{Classified, ErrorClass, Id};
use concord_http::{HttpConfig, HttpDispatcher, HttpError, Request, Route};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn dispatcher(transport: &Arc<ScriptedTransport>) -> HttpDispatcher {
    HttpDispatcher::new(transport.clone(), HttpConfig::default())
}

// =========================================================================
// 429 handling
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_two_429s_then_success() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        too_many("1.2"),
        too_many("0.8"),
        ok(r#"{"id":"1","channel_id":"123","author":{"id":"2","username":"bot"},"content":"hi"}"#),
    ]));
    let http = dispatcher(&transport);

    let request = Request::new(Route::create_message(Id::new(123)))
        .json(&serde_json::json!({"content": "hi"}))
        .unwrap();
    let message: concord_core::Message = http.request(request).await.unwrap();
    assert_eq!(message.content, "hi");

    let times = transport.call_times();
    assert_eq!(times.len(), 3, "exactly two retries");
    assert!(times[1] - times[0] >= Duration::from_millis(1200));
    assert!(times[2] - times[1] >= Duration::from_millis(800));
}

#[tokio::test(start_paused = true)]
async fn test_429_budget_exhausted() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        too_many("0.1"),
        too_many("0.1"),
        too_many("0.1"),
        too_many("0.1"),
        ok("{}"),
    ]));
    let http = dispatcher(&transport);

    let err = http.get::<Value>(Route::current_user()).await.unwrap_err();
    assert!(matches!(err, HttpError::RateLimitExceeded { attempts: 4, .. }), "{err:?}");
    assert_eq!(err.classification(), ErrorClass::RateLimited);
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_shared_scope_429_waits_out_retry_after() {
    let shared = response(
        429,
        &[
            ("x-ratelimit-bucket", "b1"),
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "3"),
            ("x-ratelimit-reset-after", "1.0"),
            ("x-ratelimit-scope", "shared"),
        ],
        r#"{"message":"You are being rate limited.","retry_after":2.0,"global":false}"#,
    );
    let transport = Arc::new(ScriptedTransport::new(vec![ok("{}"), shared, ok("{}")]));
    let http = dispatcher(&transport);

    http.get::<Value>(Route::current_user()).await.unwrap();
    http.get::<Value>(Route::current_user()).await.unwrap();

    let times = transport.call_times();
    assert_eq!(times.len(), 3);
    assert!(
        times[2] - times[1] >= Duration::from_secs(2),
        "retried {:?} after a shared 429",
        times[2] - times[1]
    );
}

// =========================================================================
// 4xx / 5xx / network
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_client_error_surfaced_verbatim() {
    let body = r#"{"message": "Unknown Channel", "code": 10003}"#;
    let transport = Arc::new(ScriptedTransport::new(vec![response(404, &[], body)]));
    let http = dispatcher(&transport);

    let err = http
        .get::<Value>(Route::channel_messages(Id::new(9)))
        .await
        .unwrap_err();
    match &err {
        HttpError::Client { status, body: got, api, .. } => {
            assert_eq!(*status, 404);
            assert_eq!(got, body);
            assert_eq!(api.as_ref().unwrap().code, 10003);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.classification(), ErrorClass::Client);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_server_error_retried_then_succeeds() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        response(502, &[], "bad gateway"),
        response(503, &[], "unavailable"),
        ok(r#"{"id":"1","username":"bot"}"#),
    ]));
    let http = dispatcher(&transport);

    let user: concord_core::User = http.get(Route::current_user()).await.unwrap();
    assert_eq!(user.username, "bot");

    let times = transport.call_times();
    assert_eq!(times.len(), 3);
    assert!(times[1] - times[0] >= Duration::from_millis(500));
    assert!(times[2] - times[1] >= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_server_error_budget_exhausted() {
    let transport = Arc::new(ScriptedTransport::new(
        (0..4).map(|_| response(500, &[], "boom")).collect(),
    ));
    let http = dispatcher(&transport);

    let err = http.get::<Value>(Route::current_user()).await.unwrap_err();
    assert!(matches!(err, HttpError::Server { status: 500, attempts: 4, .. }), "{err:?}");
    assert_eq!(err.classification(), ErrorClass::Server);
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_retried() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Err(HttpError::Network("connection reset".into())),
        ok(r#"{"id":"1","username":"bot"}"#),
    ]));
    let http = dispatcher(&transport);

    let user: concord_core::User = http.get(Route::current_user()).await.unwrap();
    assert_eq!(user.id, Id::new(1));
    assert_eq!(transport.call_count(), 2);
    // The failed attempt did not leak its rate limit slot.
    let info = http.limiter().bucket_info(&Route::current_user().key()).unwrap();
    assert_eq!(info.in_flight, 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_body_decodes_as_unit() {
    let transport = Arc::new(ScriptedTransport::new(vec![response(204, &[], "")]));
    let http = dispatcher(&transport);
    http.get::<()>(Route::current_user()).await.unwrap();
}

// =========================================================================
// gateway_info
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_gateway_info() {
    let transport = Arc::new(ScriptedTransport::new(vec![ok(
        r#"{"url":"wss://gw.example","shards":4,"session_start_limit":{"total":1000,"remaining":998,"reset_after":1000,"max_concurrency":2}}"#,
    )]));
    let http = dispatcher(&transport);
    let info = http.gateway_info().await.unwrap();
    assert_eq!(info.url, "wss://gw.example");
    assert_eq!(info.shards, 4);
    assert_eq!(info.session_start_limit.max_concurrency, 2);
    assert_eq!(transport.calls.lock()[0].path, "/gateway/bot");
}
