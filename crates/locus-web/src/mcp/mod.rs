//! MCP server: one session table behind two HTTP transports.
//!
//! - `streamable`: `POST`/`GET`/`DELETE /__mcp__`, session id in the
//!   `mcp-session-id` header.
//! - `sse`: the deprecated `GET /__mcp__/sse` + `POST /__mcp__/messages`
//!   pair, session id in the query string.
//!
//! Both feed [`handle_message`], so pairing and forwarding do not care
//! which transport a session arrived on.

use locus_types::SessionId;
use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, LATEST_PROTOCOL_VERSION, ListToolsResult,
    ServerCapabilities, ServerCapabilitiesTools,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::debug;

use crate::app::AppState;
use protocol::{Incoming, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcErrorCode};
use session::SessionManager;

pub mod protocol;
pub mod session;
pub mod sse;
pub mod streamable;
pub mod tools;

pub const MCP_ENDPOINT: &str = "/__mcp__";
pub const SSE_ENDPOINT: &str = "/__mcp__/sse";
pub const MESSAGES_ENDPOINT: &str = "/__mcp__/messages";
pub const SESSION_HEADER: &str = "mcp-session-id";

/// `clientType` value the in-page inspector connects with.
pub const INSPECTOR_CLIENT_TYPE: &str = "inspector";

/// Query parameters a connection declares its role with.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "puppetId")]
    pub puppet_id: Option<String>,
    #[serde(rename = "clientType")]
    pub client_type: Option<String>,
}

/// Applies the role `params` declare to a freshly registered session.
pub fn declare_role(sessions: &mut SessionManager, session_id: &SessionId, params: &ConnectParams) {
    if params.client_type.as_deref() == Some(INSPECTOR_CLIENT_TYPE) {
        sessions.handle_primary_connection(session_id);
    } else if let Some(group) = params.puppet_id.as_deref().filter(|g| !g.is_empty()) {
        sessions.handle_watcher_connection(session_id, group);
    }
}

/// Handles one message from `session_id`. Returns the response to send
/// back, if the message was a request.
pub async fn handle_message(
    state: &AppState,
    session_id: &SessionId,
    incoming: Incoming,
) -> Option<JsonRpcResponse> {
    match incoming {
        Incoming::Response { id, outcome } => {
            let mut guard = state.inner.lock().await;
            guard.sessions.complete_forward(session_id, &id, outcome);
            None
        }
        Incoming::Notification { method } => {
            debug!(session_id = %session_id, method = %method, "notification");
            None
        }
        Incoming::Request(request) => {
            let id = request.id.clone();
            let outcome = handle_request(state, session_id, request).await;
            Some(JsonRpcResponse::outcome(id, outcome))
        }
    }
}

async fn handle_request(
    state: &AppState,
    session_id: &SessionId,
    request: JsonRpcRequest,
) -> Result<JsonValue, JsonRpcError> {
    debug!(session_id = %session_id, method = %request.method, "request");
    match request.method.as_str() {
        "initialize" => to_value(&server_details()),
        "ping" => Ok(json!({})),
        "tools/list" => to_value(&ListToolsResult {
            tools: tools::LocusTools::tools(),
            meta: None,
            next_cursor: None,
        }),
        "tools/call" => tools::call_tool(state, session_id, request.params).await,
        other => Err(RpcErrorCode::MethodNotFound.error(format!("method `{other}` not found"))),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<JsonValue, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| RpcErrorCode::InternalError.error(format!("encode result: {e}")))
}

pub fn server_details() -> InitializeResult {
    InitializeResult {
        server_info: Implementation {
            name: "locus-web".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Maps elements clicked in a running web app back to their source. Run locus_help first."
                    .into(),
            ),
            title: Some("locus MCP".into()),
            icons: vec![],
            website_url: Some("https://github.com/bearcove/locus".into()),
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools { list_changed: None }),
            ..Default::default()
        },
        protocol_version: LATEST_PROTOCOL_VERSION.into(),
        instructions: Some(
            "Run locus_help first. Then call inspect_element whenever you need the user to point \
at something in the page."
                .into(),
        ),
        meta: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ServerConfig;
    use crate::mcp::session::SessionTransport;
    use locus_types::{SessionRole, TransportKind};

    async fn request(state: &AppState, session: &SessionId, body: &str) -> JsonRpcResponse {
        let incoming = Incoming::parse(body).unwrap();
        handle_message(state, session, incoming).await.unwrap()
    }

    #[tokio::test]
    async fn initialize_and_list_tools() {
        let state = AppState::new(ServerConfig::default());
        let id = SessionId::new("agent");
        state
            .inner
            .lock()
            .await
            .sessions
            .register_transport(id.clone(), SessionTransport::new(TransportKind::Streamed));

        let init = request(
            &state,
            &id,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
        )
        .await;
        assert_eq!(init.result.unwrap()["serverInfo"]["name"], "locus-web");

        let list = request(&state, &id, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        assert_eq!(list.id, json!(2));
        assert_eq!(list.result.unwrap()["tools"].as_array().unwrap().len(), 3);

        let missing =
            request(&state, &id, r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#).await;
        assert_eq!(missing.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn notifications_get_no_reply() {
        let state = AppState::new(ServerConfig::default());
        let incoming =
            Incoming::parse(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(
            handle_message(&state, &SessionId::new("x"), incoming)
                .await
                .is_none()
        );
    }

    #[test]
    fn declared_roles() {
        let mut sessions = SessionManager::new("chrome");
        let inspector = SessionId::new("inspector");
        let puppet = SessionId::new("puppet");
        let plain = SessionId::new("plain");
        for id in [&inspector, &puppet, &plain] {
            sessions.register_transport(id.clone(), SessionTransport::new(TransportKind::Streamed));
        }
        declare_role(
            &mut sessions,
            &inspector,
            &ConnectParams {
                client_type: Some(String::from("inspector")),
                ..Default::default()
            },
        );
        declare_role(
            &mut sessions,
            &puppet,
            &ConnectParams {
                puppet_id: Some(String::from("chrome")),
                ..Default::default()
            },
        );
        declare_role(&mut sessions, &plain, &ConnectParams::default());

        assert_eq!(sessions.role(&inspector), Some(SessionRole::Primary));
        assert_eq!(sessions.role(&puppet), Some(SessionRole::Watcher));
        assert_eq!(sessions.role(&plain), Some(SessionRole::Standalone));
        assert_eq!(sessions.paired_primary(&puppet), Some(&inspector));
    }
}
