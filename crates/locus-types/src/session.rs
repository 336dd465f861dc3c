use facet::Facet;
use std::fmt;

/// Opaque, server-generated transport session identifier.
#[derive(Facet, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[facet(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a connection is for.
#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum SessionRole {
    /// The in-page inspector UI; executes inspector tools on behalf of watchers.
    Primary,
    /// A subordinate agent connection routed through the active primary.
    Watcher,
    /// A plain MCP client that declared neither role.
    Standalone,
}

/// Which HTTP transport style carries a session.
#[derive(Facet, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum TransportKind {
    /// Session-header based streamable HTTP (`POST`/`GET`/`DELETE /__mcp__`).
    Streamed,
    /// Deprecated query-parameter based server-sent events.
    LegacyEventStream,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Streamed => f.write_str("streamed"),
            TransportKind::LegacyEventStream => f.write_str("legacy-sse"),
        }
    }
}

/// Snapshot of one live session, as reported by `/__locus__/sessions`.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub role: SessionRole,
    #[facet(skip_unless_truthy)]
    pub puppet_group_id: Option<String>,
    pub transport_kind: TransportKind,
    /// Primary this watcher currently forwards to.
    #[facet(skip_unless_truthy)]
    pub bound_primary: Option<SessionId>,
}

#[derive(Facet, Clone, Debug)]
pub struct SessionsResponse {
    #[facet(skip_unless_truthy)]
    pub active_primary: Option<SessionId>,
    pub sessions: Vec<SessionInfo>,
}
