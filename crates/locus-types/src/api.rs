use facet::Facet;

/// Error body for plain HTTP endpoints.
#[derive(Facet)]
pub struct ApiError {
    pub error: String,
}

/// An agent the in-page inspector can hand inspections to.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct AgentInfo {
    pub id: String,
    pub label: String,
    pub command: String,
}

/// Configuration document fetched once by the in-page inspector at startup.
#[derive(Facet, Clone, Debug)]
pub struct InspectorConfig {
    pub agents: Vec<AgentInfo>,
    pub default_agent: String,
    /// Message endpoint the inspector should open its primary session on.
    pub mcp_endpoint: String,
}

/// Result of `POST /__locus__/transform` when the module changed.
#[derive(Facet, Clone, Debug)]
pub struct TransformResponse {
    pub code: String,
    pub map: String,
}
