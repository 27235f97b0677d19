use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::gateway::types::Update;
use crate::AppState;

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Receives one update pushed by the Bot API.
///
/// Malformed bodies are acknowledged anyway; a non-2xx reply would make the
/// Bot API redeliver the same update indefinitely.
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if let Some(ref expected) = state.config.bot.webhook_secret {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != expected {
            return Err(ApiError::unauthorized("Invalid webhook secret"));
        }
    }

    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            let update_id = update.update_id;
            match update.into_event() {
                Some(event) => state.router.dispatch(event),
                None => tracing::trace!(update_id, "Ignoring update without usable message"),
            }
        }
        Err(e) => tracing::warn!(error = %e, "Discarding malformed webhook update"),
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use super::*;
    use crate::api::create_router;
    use crate::bot::SessionRouter;
    use crate::config::Config;
    use crate::settings::Settings;
    use crate::testutil::{self, Harness, OWNER};

    fn app(h: &Harness, secret: Option<&str>) -> axum::Router {
        let mut env = HashMap::from([
            ("BOT_TOKEN", "123:abc".to_string()),
            ("OWNER_ID", OWNER.0.to_string()),
            ("UPDATE_MODE", "webhook".to_string()),
            ("WEBHOOK_URL", "https://bot.example.com/telegram/webhook".to_string()),
        ]);
        if let Some(secret) = secret {
            env.insert("WEBHOOK_SECRET", secret.to_string());
        }
        let config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();

        let state = Arc::new(AppState {
            config,
            pending: Arc::clone(&h.pending),
            router: SessionRouter::new(
                Arc::clone(&h.bot),
                Duration::from_secs(60),
                CancellationToken::new(),
            ),
        });
        create_router(state)
    }

    fn upload_update() -> String {
        serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "from": {"id": OWNER.0},
                "chat": {"id": OWNER.0},
                "document": {"file_id": "f1", "file_name": "movie.mkv"}
            }
        })
        .to_string()
    }

    fn request(secret: Option<&str>, body: String) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/telegram/webhook")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn wait_until_pending(h: &Harness) {
        for _ in 0..200 {
            if h.pending.is_pending(OWNER) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("file was never staged");
    }

    #[tokio::test]
    async fn test_webhook_stages_file() {
        let h = testutil::harness(Settings::defaults(OWNER), true);
        let resp = app(&h, Some("s3cret"))
            .oneshot(request(Some("s3cret"), upload_update()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        wait_until_pending(&h).await;
    }

    #[tokio::test]
    async fn test_webhook_rejects_wrong_secret() {
        let h = testutil::harness(Settings::defaults(OWNER), true);

        let resp = app(&h, Some("s3cret"))
            .oneshot(request(Some("guess"), upload_update()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app(&h, Some("s3cret"))
            .oneshot(request(None, upload_update()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!h.pending.is_pending(OWNER));
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_malformed_body() {
        let h = testutil::harness(Settings::defaults(OWNER), true);
        let resp = app(&h, None)
            .oneshot(request(None, "{\"not\": \"an update\"}".to_string()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(h.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let h = testutil::harness(Settings::defaults(OWNER), true);
        let resp = app(&h, None)
            .oneshot(
                Request::builder()
                    .uri("/_internal/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
    }
}
