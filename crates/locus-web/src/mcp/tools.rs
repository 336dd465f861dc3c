use std::fmt::Write as _;

use locus_types::SessionId;
use rust_mcp_sdk::macros::{JsonSchema, mcp_tool};
use rust_mcp_sdk::schema::CallToolResult;
use rust_mcp_sdk::tool_box;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::protocol::{JsonRpcError, RpcErrorCode};
use super::session::{ForwardError, ForwardOutcome, ForwardTicket};
use crate::app::AppState;

pub const INSPECT_ELEMENT: &str = "inspect_element";
pub const GET_INSPECTED_ELEMENTS: &str = "get_inspected_elements";
pub const LOCUS_HELP: &str = "locus_help";

const NO_INSPECTOR: &str = "No inspector is connected. Open the app in a browser with the locus \
inspector loaded (it connects as the primary session), then call this tool again.";

#[mcp_tool(
    name = "inspect_element",
    description = "Ask the user to click an element in the running app. Blocks until they pick one and type a request, then returns its source file, line, component, DOM snapshot and the request text."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct InspectElementTool {
    /// Shown to the user next to the crosshair, e.g. what to pick.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[mcp_tool(
    name = "get_inspected_elements",
    description = "Return every element the user has inspected and queued since the last clear, oldest first."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct GetInspectedElementsTool {
    /// Empty the queue after reading it.
    #[serde(default)]
    pub clear: Option<bool>,
}

#[mcp_tool(
    name = "locus_help",
    description = "Read this first. Explains how locus maps page elements to source and how to use its tools."
)]
#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct LocusHelpTool {}

tool_box!(
    LocusTools,
    [InspectElementTool, GetInspectedElementsTool, LocusHelpTool]
);

/// `tools/call` from `caller`. Inspector tools are forwarded to the primary
/// the caller is routed to; the result is whatever the inspector answers.
pub async fn call_tool(
    state: &AppState,
    caller: &SessionId,
    params: Option<JsonValue>,
) -> Result<JsonValue, JsonRpcError> {
    let params = params.unwrap_or(JsonValue::Null);
    let JsonValue::Object(object) = &params else {
        return Err(invalid_params("`tools/call` params must be an object"));
    };
    let name = object
        .get("name")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| invalid_params("missing tool `name`"))?;
    let args = match object.get("arguments") {
        None | Some(JsonValue::Null) => JsonMap::new(),
        Some(JsonValue::Object(args)) => args.clone(),
        Some(_) => return Err(invalid_params("`arguments` must be an object")),
    };

    match name {
        LOCUS_HELP => tool_text(render_help_markdown(), false),
        INSPECT_ELEMENT => {
            optional_non_empty_string(&args, "prompt").map_err(invalid_params)?;
            forward(state, caller, INSPECT_ELEMENT, params.clone()).await
        }
        GET_INSPECTED_ELEMENTS => {
            optional_bool(&args, "clear").map_err(invalid_params)?;
            forward(state, caller, GET_INSPECTED_ELEMENTS, params.clone()).await
        }
        other => Err(invalid_params(format!("unknown tool `{other}`"))),
    }
}

async fn forward(
    state: &AppState,
    caller: &SessionId,
    tool: &str,
    params: JsonValue,
) -> Result<JsonValue, JsonRpcError> {
    let ticket = {
        let mut guard = state.inner.lock().await;
        guard.sessions.begin_forward(caller, tool, params)
    };
    let ForwardTicket {
        forward_id,
        primary,
        timeout,
        outbound,
        message,
        reply,
    } = match ticket {
        Ok(ticket) => ticket,
        Err(ForwardError::NoInspector) => return tool_text(NO_INSPECTOR.to_string(), true),
        Err(ForwardError::UnknownSession) => {
            return Err(RpcErrorCode::NoValidSession.error("session is no longer registered"));
        }
    };

    let outcome = match tokio::time::timeout(timeout, deliver(outbound, message, reply)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(
                forward_id = %forward_id,
                primary = %primary,
                timeout_secs = timeout.as_secs(),
                "forwarded call timed out"
            );
            Err(RpcErrorCode::RequestTimedOut.error(format!(
                "the inspector did not answer `{tool}` within {} seconds",
                timeout.as_secs()
            )))
        }
    };

    if outcome.is_err() {
        state
            .inner
            .lock()
            .await
            .sessions
            .abandon_forward(&forward_id);
    } else {
        info!(forward_id = %forward_id, caller = %caller, tool, "forwarded call answered");
    }
    outcome
}

async fn deliver(
    outbound: mpsc::Sender<String>,
    message: String,
    reply: oneshot::Receiver<ForwardOutcome>,
) -> ForwardOutcome {
    outbound
        .send(message)
        .await
        .map_err(|_| RpcErrorCode::NoInspector.error("the inspector stream is closed"))?;
    reply
        .await
        .map_err(|_| RpcErrorCode::RequestCancelled.error("forwarded request was dropped"))?
}

fn tool_text(text: String, is_error: bool) -> Result<JsonValue, JsonRpcError> {
    let mut result = CallToolResult::text_content(vec![text.into()]);
    if is_error {
        result.is_error = Some(true);
    }
    serde_json::to_value(&result)
        .map_err(|e| RpcErrorCode::InternalError.error(format!("encode tool result: {e}")))
}

fn invalid_params(message: impl Into<String>) -> JsonRpcError {
    RpcErrorCode::InvalidParams.error(message)
}

fn render_help_markdown() -> String {
    let mut out = String::new();
    let _ = writeln!(out, "How locus works");
    let _ = writeln!(
        out,
        "Every JSX and Vue element in the dev build carries a data-source=\"path:line:column\" attribute. \
The in-page inspector resolves a clicked element to that location (or, failing that, to the \
component that rendered it) and hands the result to you."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommended workflow");
    let _ = writeln!(
        out,
        "- Call {INSPECT_ELEMENT} and wait. The user picks an element and types what they want."
    );
    let _ = writeln!(
        out,
        "- Open the reported file at the reported line. The column points at the element's `<`."
    );
    let _ = writeln!(out, "- Make the change, then ask for the next element.");
    let _ = writeln!(
        out,
        "- Call {GET_INSPECTED_ELEMENTS} to read elements the user queued without being asked."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Interpretation notes");
    let _ = writeln!(
        out,
        "- `source: unknown` means the element came from a file the tagger does not see (a library, a portal)."
    );
    let _ = writeln!(
        out,
        "- When the component is a tag name like `div`, the location is the nearest tagged element, \
not a component declaration."
    );
    let _ = writeln!(
        out,
        "- A newer {INSPECT_ELEMENT} call cancels an unanswered one."
    );
    out.trim_end().to_string()
}

fn optional_non_empty_string(
    args: &JsonMap<String, JsonValue>,
    field: &str,
) -> Result<Option<String>, String> {
    let Some(value) = args.get(field) else {
        return Ok(None);
    };
    let Some(value) = value.as_str() else {
        return Err(format!("`{field}` must be a string"));
    };
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("`{field}` must not be empty when provided"));
    }
    Ok(Some(value.to_owned()))
}

fn optional_bool(args: &JsonMap<String, JsonValue>, field: &str) -> Result<Option<bool>, String> {
    let Some(raw) = args.get(field) else {
        return Ok(None);
    };
    raw.as_bool()
        .map(Some)
        .ok_or_else(|| format!("`{field}` must be a boolean"))
}
