use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use locus_types::AgentInfo;
use tokio::sync::Mutex;
use tower_http::services::ServeFile;

use crate::api::config::{api_config, builtin_agents};
use crate::api::sessions::api_sessions;
use crate::api::transform::api_transform;
use crate::mcp::session::{DEFAULT_PUPPET_GROUP, SessionManager};
use crate::mcp::sse::{handle_sse_message, handle_sse_open};
use crate::mcp::streamable::{
    handle_streamable_delete, handle_streamable_get, handle_streamable_post,
};
use crate::mcp::{MCP_ENDPOINT, MESSAGES_ENDPOINT, SSE_ENDPOINT};

pub const INSPECTOR_SCRIPT: &str = "inspector.js";
pub const INSPECTOR_STYLESHEET: &str = "inspector.css";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Directory holding the built inspector script and stylesheet.
    pub assets_dir: PathBuf,
    /// Absolute module paths under this root are reported relative to it.
    pub project_root: Option<PathBuf>,
    /// Watchers in this puppet group follow the active primary.
    pub puppet_group: String,
    pub agents: Vec<AgentInfo>,
    pub default_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let agents = builtin_agents();
        let default_agent = agents
            .first()
            .map(|agent| agent.id.clone())
            .unwrap_or_default();
        Self {
            assets_dir: PathBuf::from("inspector/dist"),
            project_root: None,
            puppet_group: DEFAULT_PUPPET_GROUP.to_string(),
            agents,
            default_agent,
        }
    }
}

impl ServerConfig {
    pub fn missing_assets(&self) -> Vec<PathBuf> {
        [INSPECTOR_SCRIPT, INSPECTOR_STYLESHEET]
            .into_iter()
            .map(|name| self.assets_dir.join(name))
            .filter(|path| !path.is_file())
            .collect()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<Mutex<ServerState>>,
    pub config: Arc<ServerConfig>,
}

pub struct ServerState {
    pub sessions: SessionManager,
}

impl ServerState {
    pub fn new(puppet_group: &str) -> Self {
        Self {
            sessions: SessionManager::new(puppet_group),
        }
    }
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerState::new(&config.puppet_group))),
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let assets_dir = state.config.assets_dir.clone();
    Router::new()
        .route("/health", get(health))
        .route("/__locus__/config.json", get(api_config))
        .route("/__locus__/sessions", get(api_sessions))
        .route("/__locus__/transform", post(api_transform))
        .route_service(
            "/__locus__/inspector.js",
            ServeFile::new(assets_dir.join(INSPECTOR_SCRIPT)),
        )
        .route_service(
            "/__locus__/inspector.css",
            ServeFile::new(assets_dir.join(INSPECTOR_STYLESHEET)),
        )
        .route(
            MCP_ENDPOINT,
            get(handle_streamable_get)
                .post(handle_streamable_post)
                .delete(handle_streamable_delete),
        )
        .route(SSE_ENDPOINT, get(handle_sse_open))
        .route(MESSAGES_ENDPOINT, post(handle_sse_message))
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}
