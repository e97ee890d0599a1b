use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::channel::{InboundAdapter, OutboundMessage};
use crate::dispatcher::{ReplyOutcome, SideEffectOutcome};
use crate::error::RouterError;

use super::state::AppState;
use super::verify::{verify_line_webhook, verify_push_token, PushAuthError};

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(super) async fn line_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(err) = verify_line_webhook(&state.config.line.channel_secret, &headers, &body) {
        warn!("rejecting line webhook: {}", err);
        let reason = match err {
            RouterError::SignatureInvalid(reason) => reason,
            _ => "invalid_signature",
        };
        return (StatusCode::BAD_REQUEST, Json(json!({"status": reason})));
    }

    let events = match state.inbound.parse(&body) {
        Ok(events) => events,
        Err(err) => {
            error!("failed to parse line webhook: {}", err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status": "parse_error"})),
            );
        }
    };

    let batch_id = Uuid::new_v4();
    let event_count = events.len();
    let span = tracing::info_span!("line_webhook", %batch_id);
    let outcomes = async {
        info!("dispatching {} event(s)", event_count);
        state.dispatcher.dispatch(events).await
    }
    .instrument(span)
    .await;

    let replies = outcomes
        .iter()
        .filter(|outcome| matches!(outcome.reply, ReplyOutcome::Sent(_)))
        .count();
    let failures = outcomes
        .iter()
        .filter(|outcome| {
            outcome.intent_error.is_some()
                || matches!(outcome.reply, ReplyOutcome::Failed(_))
                || matches!(outcome.card, SideEffectOutcome::Failed(_))
                || matches!(outcome.weather, SideEffectOutcome::Failed(_))
        })
        .count();
    info!(
        "line webhook batch={} events={} replies={} failures={}",
        batch_id, event_count, replies, failures
    );

    (
        StatusCode::OK,
        Json(json!({"status": "processed", "events": event_count})),
    )
}

/// `message` is read from the form body first, then from the query string.
pub(super) async fn line_push(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Err(err) = verify_push_token(state.config.line.push_token.as_deref(), &headers) {
        warn!("rejecting push request: {}", err.reason());
        let status = match err {
            PushAuthError::NotConfigured => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        };
        return (status, Json(json!({"status": err.reason()})));
    }

    let params: HashMap<String, String> = match serde_urlencoded::from_bytes(&body) {
        Ok(values) => values,
        Err(_) => return (StatusCode::BAD_REQUEST, Json(json!({"status": "bad_form"}))),
    };

    let message = params
        .get("message")
        .filter(|value| !value.is_empty())
        .or_else(|| query.get("message"))
        .map(String::as_str)
        .unwrap_or("");
    if message.is_empty() {
        return (StatusCode::OK, Json(json!({"status": "empty"})));
    }

    info!("[bot][push] {}", message);
    let dispatcher = &state.dispatcher;
    match dispatcher
        .line()
        .push(dispatcher.push_to(), vec![OutboundMessage::text(message)])
        .await
    {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "sent"}))),
        Err(err) => {
            error!("push failed: {}", err);
            (StatusCode::OK, Json(json!({"status": "push_failed"})))
        }
    }
}
