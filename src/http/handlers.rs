//! The four HTTP transport endpoints (§4.7.2).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use super::AppState;
use crate::message::{error_code, ErrorObject, Message};
use crate::sse::SseEvent as StoredEvent;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/message", post(post_message))
        .route("/events", get(get_events))
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .layer(axum::middleware::from_fn_with_state(state.clone(), super::middleware::cors_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), super::middleware::auth_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), super::middleware::rate_limit_middleware))
        .with_state(state)
}

async fn post_message(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let text = String::from_utf8_lossy(&body);
    let message = match Message::decode(&text) {
        Ok(message) => message,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let Some(handler) = state.handler.as_ref() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let request_id = message.id.clone();
    let response = match handler.handle(message).await {
        Ok(response) => response,
        Err(err) => Some(Message::error_response(request_id, ErrorObject::new(error_code::INTERNAL_ERROR, err.to_string()))),
    };

    let Some(response) = response else {
        return StatusCode::NO_CONTENT.into_response();
    };

    let encoded = match response.encode() {
        Ok(encoded) => encoded,
        Err(err) => {
            tracing::error!(error = %err, "failed to encode message response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let event_id = state.next_event_id();
    state.registry.broadcast(StoredEvent::new(event_id, "message", encoded.clone()));
    state.metrics.record_sse_event();

    ([(axum::http::header::CONTENT_TYPE, "application/json")], encoded).into_response()
}

/// Drops its client out of the registry and refreshes the connection gauge
/// on every exit path from the SSE stream: normal completion, a dropped
/// future on client disconnect, or a panic unwind.
struct ClientDisconnectGuard {
    state: Arc<AppState>,
    client_id: String,
}

impl Drop for ClientDisconnectGuard {
    fn drop(&mut self) {
        self.state.registry.remove(&self.client_id);
        self.state.metrics.set_sse_connections(self.state.registry.count() as i64);
    }
}

fn to_event(event: &StoredEvent) -> Event {
    Event::default().id(event.id.clone()).event(event.event_type.clone()).data(event.data.clone())
}

async fn get_events(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let last_event_id = headers
        .get("Last-Event-ID")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string());

    let client = state.registry.add(last_event_id.clone());
    let client_id = client.id.clone();
    state.metrics.set_sse_connections(state.registry.count() as i64);

    let replay = last_event_id.map(|last_id| state.registry.event_store().get_since(&last_id)).unwrap_or_default();

    let heartbeat_interval = Duration::from_secs(state.config.heartbeat_interval_secs.max(1));
    let shutdown = state.shutdown.clone();
    let guard_state = state.clone();
    let mut receiver = client.receiver;

    let stream = async_stream::stream! {
        let _guard = ClientDisconnectGuard { state: guard_state, client_id };

        for event in replay {
            yield Ok::<Event, std::convert::Infallible>(to_event(&event));
        }

        let mut ticker = tokio::time::interval(heartbeat_interval);
        ticker.tick().await; // the first tick fires immediately; discard it

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    yield Ok(Event::default().event("complete").data("server shutdown"));
                    break;
                }
                _ = ticker.tick() => {
                    yield Ok(Event::default().comment("heartbeat"));
                }
                received = receiver.recv() => {
                    match received {
                        Some(event) => yield Ok(to_event(&event)),
                        None => break,
                    }
                }
            }
        }
    };

    let mut response = Sse::new(stream).into_response();
    response.headers_mut().insert(axum::http::header::CACHE_CONTROL, axum::http::HeaderValue::from_static("no-cache"));
    response
        .headers_mut()
        .insert(axum::http::header::CONNECTION, axum::http::HeaderValue::from_static("keep-alive"));
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    clients: usize,
    server_time: chrono::DateTime<Utc>,
}

async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        clients: state.registry.count(),
        server_time: Utc::now(),
    })
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.write_prometheus(),
    )
        .into_response()
}
