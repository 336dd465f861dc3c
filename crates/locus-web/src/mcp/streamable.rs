//! Streamable HTTP transport: `POST`/`GET`/`DELETE /__mcp__`.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self, Stream};
use locus_types::{SessionId, TransportKind};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::protocol::{Incoming, JsonRpcResponse, RpcErrorCode};
use super::session::{SessionManager, SessionTransport, StreamError, new_session_id};
use super::{ConnectParams, SESSION_HEADER, declare_role, handle_message};
use crate::app::AppState;

pub async fn handle_streamable_post(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let incoming = match Incoming::parse(&body) {
        Ok(incoming) => incoming,
        Err(envelope) => return envelope.into_http(StatusCode::BAD_REQUEST),
    };

    let session_id = match header_session_id(&headers) {
        Some(session_id) => {
            let guard = state.inner.lock().await;
            if let Err(response) = check_session(&guard.sessions, &session_id) {
                return response;
            }
            session_id
        }
        None => {
            if !incoming.is_initialize() {
                return no_valid_session(request_id(&incoming)).into_http(StatusCode::BAD_REQUEST);
            }
            let session_id = new_session_id();
            let mut guard = state.inner.lock().await;
            guard.sessions.register_transport(
                session_id.clone(),
                SessionTransport::new(TransportKind::Streamed),
            );
            declare_role(&mut guard.sessions, &session_id, &params);
            info!(session_id = %session_id, "streamed session initialized");
            session_id
        }
    };

    let mut response = match handle_message(&state, &session_id, incoming).await {
        Some(reply) => reply.into_http(StatusCode::OK),
        None => StatusCode::ACCEPTED.into_response(),
    };
    match HeaderValue::from_str(session_id.as_str()) {
        Ok(value) => {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
        Err(e) => warn!(%e, session_id = %session_id, "session id is not a valid header value"),
    }
    response
}

/// Opens the server-to-client half of a streamed session. One per session.
pub async fn handle_streamable_get(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = header_session_id(&headers) else {
        return no_valid_session(JsonValue::Null).into_http(StatusCode::BAD_REQUEST);
    };
    let stream = {
        let mut guard = state.inner.lock().await;
        if let Err(response) = check_session(&guard.sessions, &session_id) {
            return response;
        }
        guard.sessions.take_stream(&session_id)
    };
    match stream {
        Ok(rx) => {
            info!(session_id = %session_id, "server stream opened");
            Sse::new(message_events(rx))
                .keep_alive(KeepAlive::default())
                .into_response()
        }
        Err(StreamError::AlreadyOpen) => JsonRpcResponse::failure(
            JsonValue::Null,
            RpcErrorCode::InvalidRequest.error("a stream is already open for this session"),
        )
        .into_http(StatusCode::CONFLICT),
        Err(StreamError::UnknownSession) => session_not_found(),
    }
}

pub async fn handle_streamable_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    let Some(session_id) = header_session_id(&headers) else {
        return no_valid_session(JsonValue::Null).into_http(StatusCode::BAD_REQUEST);
    };
    let mut guard = state.inner.lock().await;
    if let Err(response) = check_session(&guard.sessions, &session_id) {
        return response;
    }
    guard.sessions.close_session(&session_id);
    StatusCode::OK.into_response()
}

/// Each queued JSON-RPC message as one `message` event.
pub(crate) fn message_events(
    rx: mpsc::Receiver<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let message = rx.recv().await?;
        Some((Ok(Event::default().event("message").data(message)), rx))
    })
}

fn header_session_id(headers: &HeaderMap) -> Option<SessionId> {
    let value = headers.get(SESSION_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| SessionId::new(value))
}

/// Known, and carried by this transport.
fn check_session(sessions: &SessionManager, session_id: &SessionId) -> Result<(), Response> {
    match sessions.transport_kind(session_id) {
        None => Err(session_not_found()),
        Some(TransportKind::Streamed) => Ok(()),
        Some(other) => Err(JsonRpcResponse::failure(
            JsonValue::Null,
            RpcErrorCode::InvalidRequest.error(format!(
                "session {session_id} uses the {other} transport"
            )),
        )
        .into_http(StatusCode::BAD_REQUEST)),
    }
}

fn request_id(incoming: &Incoming) -> JsonValue {
    match incoming {
        Incoming::Request(request) => request.id.clone(),
        _ => JsonValue::Null,
    }
}

pub(crate) fn no_valid_session(id: JsonValue) -> JsonRpcResponse {
    JsonRpcResponse::failure(
        id,
        RpcErrorCode::NoValidSession.error("Bad Request: No valid session ID provided"),
    )
}

pub(crate) fn session_not_found() -> Response {
    JsonRpcResponse::failure(
        JsonValue::Null,
        RpcErrorCode::NoValidSession.error("Session not found"),
    )
    .into_http(StatusCode::NOT_FOUND)
}
