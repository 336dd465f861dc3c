use axum::extract::State;
use axum::response::IntoResponse;
use locus_types::{AgentInfo, InspectorConfig};

use crate::app::AppState;
use crate::mcp::MCP_ENDPOINT;
use crate::util::http::json_ok;

/// Agents the inspector offers when nothing else is configured.
pub fn builtin_agents() -> Vec<AgentInfo> {
    [
        ("claude", "Claude", "claude"),
        ("codex", "Codex", "codex"),
        ("gemini", "Gemini", "gemini"),
    ]
    .into_iter()
    .map(|(id, label, command)| AgentInfo {
        id: id.to_string(),
        label: label.to_string(),
        command: command.to_string(),
    })
    .collect()
}

pub async fn api_config(State(state): State<AppState>) -> impl IntoResponse {
    json_ok(&InspectorConfig {
        agents: state.config.agents.clone(),
        default_agent: state.config.default_agent.clone(),
        mcp_endpoint: MCP_ENDPOINT.to_string(),
    })
}
