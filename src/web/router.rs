//! Route definitions for the receiver.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::api;
use crate::receiver::Receiver;

/// Create the app router. Unknown paths and wrong methods on known paths
/// both answer 404.
pub fn create_app_router(receiver: Arc<Receiver>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", post(api::receive).fallback(api::not_found))
        .route("/inbox", get(api::inbox).fallback(api::not_found))
        .route("/health", get(api::health).fallback(api::not_found))
        .fallback(api::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(receiver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
        response::Response,
        Json,
    };
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use crate::audit::AuditSink;
    use crate::handlers::{CommandHandler, Dispatcher, Handler};
    use crate::inbox::InboxBuffer;
    use crate::reply::ReplyRouter;

    fn app_with(dir: &tempfile::TempDir, handler: Option<Arc<dyn Handler>>, capacity: usize) -> Router {
        let audit = Arc::new(AuditSink::new(dir.path().join("logs/mesh-audit.jsonl"), "beta"));
        let replies = ReplyRouter::new("beta", Duration::from_secs(2), 4, audit.clone());
        let receiver = Receiver::new(
            "beta",
            audit,
            InboxBuffer::new(capacity),
            Dispatcher::new(handler, Duration::from_secs(5), 4),
            replies,
        );
        create_app_router(Arc::new(receiver), 64 * 1024)
    }

    fn post_message(message: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "message": message.to_string() }).to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn post_acknowledges_and_audits() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(&dir, None, 10);

        let raw = r#"{"message":"{\"id\":\"m1\",\"from\":\"a\",\"to\":\"b\",\"type\":\"notification\",\"payload\":{\"subject\":\"hi\",\"body\":\"hello\"}}"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from(raw))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await, json!({"ok": true, "id": "m1"}));

        let audit = std::fs::read_to_string(dir.path().join("logs/mesh-audit.jsonl")).unwrap();
        let lines: Vec<Value> = audit.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["id"], "m1");
        assert_eq!(lines[0]["status"], "received");
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(&dir, None, 10);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from("{oops"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({"error": "invalid JSON"}));

        let inbox = json_body(app.oneshot(get("/inbox")).await.unwrap()).await;
        assert_eq!(inbox["count"], 0);
    }

    #[tokio::test]
    async fn malformed_nested_message_is_still_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(&dir, None, 10);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from(json!({"message": "raw text {"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let inbox = json_body(app.oneshot(get("/inbox")).await.unwrap()).await;
        assert_eq!(inbox["messages"][0]["payload"]["body"], "raw text {");
    }

    #[tokio::test]
    async fn inbox_keeps_last_n_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(&dir, None, 3);

        for i in 1..=4 {
            let response = app
                .clone()
                .oneshot(post_message(json!({"id": format!("m{}", i), "type": "notification"})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
        }

        let inbox = json_body(app.clone().oneshot(get("/inbox")).await.unwrap()).await;
        assert_eq!(inbox["count"], 3);
        let ids: Vec<&str> = inbox["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["m2", "m3", "m4"]);

        // Reading twice returns the same entries.
        let again = json_body(app.clone().oneshot(get("/inbox")).await.unwrap()).await;
        assert_eq!(again["count"], 3);

        let health = json_body(app.oneshot(get("/health")).await.unwrap()).await;
        assert_eq!(health, json!({"status": "ok", "agent": "beta", "inbox": 3}));
    }

    #[tokio::test]
    async fn unknown_routes_and_methods_are_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(&dir, None, 3);

        let response = app.clone().oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/inbox")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    async fn reply_sink() -> (String, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        let app = Router::new().route(
            "/mesh",
            axum::routing::post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    StatusCode::ACCEPTED
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/mesh", addr), rx)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn request_with_handler_gets_correlated_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (url, mut rx) = reply_sink().await;
        let handler: Arc<dyn Handler> = Arc::new(
            CommandHandler::new("sh").with_args(["-c", "cat >/dev/null; echo '{\"body\":\"ok\"}'"]),
        );
        let app = app_with(&dir, Some(handler), 10);

        let response = app
            .oneshot(post_message(json!({
                "id": "req-7", "from": "alpha", "to": "beta", "type": "request",
                "replyTo": {"url": url, "token": "t0k"},
                "payload": {"subject": "ping", "body": "ping?"}
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(response).await["id"], "req-7");

        let wire = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let reply: Value = serde_json::from_str(wire["message"].as_str().unwrap()).unwrap();
        assert_eq!(reply["correlationId"], "req-7");
        assert_eq!(reply["type"], "response");
        assert_eq!(reply["payload"]["body"], "ok");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_handler_sends_no_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (url, mut rx) = reply_sink().await;
        let handler: Arc<dyn Handler> = Arc::new(
            CommandHandler::new("sh").with_args(["-c", "cat >/dev/null; echo '{\"body\":\"ok\"}'; exit 1"]),
        );
        let app = app_with(&dir, Some(handler), 10);

        let response = app
            .oneshot(post_message(json!({
                "id": "req-8", "from": "alpha", "type": "request",
                "replyTo": {"url": url, "token": "t0k"}
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let waited = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(waited.is_err(), "no reply should be delivered");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(&dir, None, 3);

        let big = json!({ "message": { "id": "big", "payload": {"body": "x".repeat(128 * 1024)} } })
            .to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .header("content-length", big.len())
                    .body(Body::from(big))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
