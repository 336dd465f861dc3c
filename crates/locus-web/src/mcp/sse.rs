//! Legacy event-stream transport: `GET /__mcp__/sse` opens a session whose
//! replies all travel down that one stream; clients deliver messages with
//! `POST /__mcp__/messages?sessionId=`.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use locus_types::{SessionId, TransportKind};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::protocol::{Incoming, JsonRpcResponse, RpcErrorCode};
use super::session::{SessionTransport, new_session_id};
use super::streamable::{no_valid_session, session_not_found};
use super::{ConnectParams, MESSAGES_ENDPOINT, declare_role, handle_message};
use crate::app::AppState;

/// Closes the session when the event stream is dropped, which is how a
/// disconnecting client shows up.
struct CloseOnDrop {
    state: AppState,
    session_id: SessionId,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        let session_id = self.session_id.clone();
        if let Ok(mut guard) = self.state.inner.try_lock() {
            guard.sessions.close_session(&session_id);
            return;
        }
        let state = self.state.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    state.inner.lock().await.sessions.close_session(&session_id);
                });
            }
            Err(e) => debug!(%e, session_id = %session_id, "no runtime to close session on"),
        }
    }
}

struct LegacyStream {
    endpoint: Option<Event>,
    rx: mpsc::Receiver<String>,
    _close: CloseOnDrop,
}

pub async fn handle_sse_open(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> Response {
    if let Some(requested) = params.session_id.as_deref() {
        debug!(requested, "ignoring client-chosen session id");
    }
    let session_id = new_session_id();
    let mut transport = SessionTransport::new(TransportKind::LegacyEventStream);
    let Some(rx) = transport.take_stream() else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    {
        let mut guard = state.inner.lock().await;
        guard
            .sessions
            .register_transport(session_id.clone(), transport);
        declare_role(&mut guard.sessions, &session_id, &params);
    }
    info!(session_id = %session_id, "legacy event stream opened");

    let endpoint = format!("{MESSAGES_ENDPOINT}?sessionId={session_id}");
    let events = LegacyStream {
        endpoint: Some(Event::default().event("endpoint").data(endpoint)),
        rx,
        _close: CloseOnDrop {
            state: state.clone(),
            session_id,
        },
    };
    let events = stream::unfold(events, |mut events| async move {
        if let Some(endpoint) = events.endpoint.take() {
            return Some((Ok::<_, Infallible>(endpoint), events));
        }
        let message = events.rx.recv().await?;
        Some((Ok(Event::default().event("message").data(message)), events))
    });
    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Accepts one message for a legacy session. The reply, if any, goes out
/// on the session's event stream, so this always answers `202`.
pub async fn handle_sse_message(
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
    body: String,
) -> Response {
    let Some(session_id) = params
        .session_id
        .filter(|id| !id.is_empty())
        .map(SessionId::new)
    else {
        return no_valid_session(JsonValue::Null).into_http(StatusCode::BAD_REQUEST);
    };

    let outbound = {
        let guard = state.inner.lock().await;
        match guard.sessions.transport_kind(&session_id) {
            None => return session_not_found(),
            Some(TransportKind::LegacyEventStream) => guard.sessions.sender(&session_id),
            Some(other) => {
                return JsonRpcResponse::failure(
                    JsonValue::Null,
                    RpcErrorCode::InvalidRequest.error(format!(
                        "session {session_id} uses the {other} transport"
                    )),
                )
                .into_http(StatusCode::BAD_REQUEST);
            }
        }
    };
    let Some(outbound) = outbound else {
        return session_not_found();
    };

    let incoming = match Incoming::parse(&body) {
        Ok(incoming) => incoming,
        Err(envelope) => return envelope.into_http(StatusCode::BAD_REQUEST),
    };

    tokio::spawn(async move {
        let Some(reply) = handle_message(&state, &session_id, incoming).await else {
            return;
        };
        if outbound.send(reply.to_json()).await.is_err() {
            debug!(session_id = %session_id, "event stream closed before the reply");
        }
    });
    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{ServerConfig, build_router};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use futures_util::StreamExt;
    use locus_types::SessionRole;
    use tower::ServiceExt;

    fn open(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn deliver(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn endpoint_event_then_replies_then_close_on_drop() {
        let state = AppState::new(ServerConfig::default());
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(open("/__mcp__/sse?puppetId=chrome"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let mut body = response.into_body().into_data_stream();

        let first = body.next().await.unwrap().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: endpoint\ndata: /__mcp__/messages?sessionId="));
        let messages_uri = first
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap()
            .to_string();
        let session_id = SessionId::new(messages_uri.rsplit('=').next().unwrap());
        assert_eq!(
            state.inner.lock().await.sessions.role(&session_id),
            Some(SessionRole::Watcher)
        );

        let response = app
            .oneshot(deliver(&messages_uri, r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let reply = body.next().await.unwrap().unwrap();
        let reply = String::from_utf8(reply.to_vec()).unwrap();
        assert!(reply.starts_with("event: message\n"));
        assert!(reply.contains(r#""id":9"#));

        drop(body);
        assert!(!state.inner.lock().await.sessions.contains(&session_id));
    }

    #[tokio::test]
    async fn messages_need_a_known_legacy_session() {
        let state = AppState::new(ServerConfig::default());
        let app = build_router(state.clone());
        let ping = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;

        let missing = app
            .clone()
            .oneshot(deliver("/__mcp__/messages", ping))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let unknown = app
            .clone()
            .oneshot(deliver("/__mcp__/messages?sessionId=ghost", ping))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

        state.inner.lock().await.sessions.register_transport(
            SessionId::new("streamed"),
            SessionTransport::new(TransportKind::Streamed),
        );
        let wrong = app
            .oneshot(deliver("/__mcp__/messages?sessionId=streamed", ping))
            .await
            .unwrap();
        assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    }
}
