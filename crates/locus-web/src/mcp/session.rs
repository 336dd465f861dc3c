//! Session table and watcher pairing.
//!
//! Every MCP connection, whichever transport carries it, lands here as a
//! session. The in-page inspector connects as a *primary*; agent
//! connections that should drive it connect as *watchers* of a puppet
//! group. Watchers of the distinguished group always pair with the most
//! recently connected primary, and a paired watcher's inspector tool calls
//! are forwarded to that primary's stream under a rewritten request id.
//!
//! The manager is plain synchronous state. Handlers take the server lock,
//! mutate, and release it before doing any I/O; forwarded calls complete
//! through a `oneshot` that the waiting handler holds.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use locus_inspector::selection_timeout;
use locus_types::{SessionId, SessionInfo, SessionRole, SessionsResponse, TransportKind};
use serde_json::{Value as JsonValue, json};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::protocol::{JsonRpcError, JsonRpcRequest, RpcErrorCode};
use super::tools::INSPECT_ELEMENT;

pub const DEFAULT_PUPPET_GROUP: &str = "chrome";

/// Messages a client may have queued on its server-to-client stream before
/// senders start waiting.
pub const OUTBOUND_CAPACITY: usize = 64;

pub type ForwardOutcome = Result<JsonValue, JsonRpcError>;

pub fn new_session_id() -> SessionId {
    SessionId::new(uuid::Uuid::new_v4().to_string())
}

/// Server-to-client half of one session. Serialized JSON-RPC messages go in
/// through `outbound`; whoever serves the client's stream drains `stream`.
#[derive(Debug)]
pub struct SessionTransport {
    pub kind: TransportKind,
    outbound: mpsc::Sender<String>,
    stream: Option<mpsc::Receiver<String>>,
}

impl SessionTransport {
    pub fn new(kind: TransportKind) -> Self {
        let (outbound, stream) = mpsc::channel(OUTBOUND_CAPACITY);
        Self {
            kind,
            outbound,
            stream: Some(stream),
        }
    }

    pub fn sender(&self) -> mpsc::Sender<String> {
        self.outbound.clone()
    }

    /// The receiving end, once. Later calls get `None`.
    pub fn take_stream(&mut self) -> Option<mpsc::Receiver<String>> {
        self.stream.take()
    }
}

/// A watcher's binding to the primary its tool calls go to.
#[derive(Clone, Debug)]
pub struct Pairing {
    pub primary: SessionId,
    outbound: mpsc::Sender<String>,
}

struct SessionEntry {
    role: SessionRole,
    puppet_group_id: Option<String>,
    transport: SessionTransport,
}

struct PendingForward {
    watcher: SessionId,
    primary: SessionId,
    tool: String,
    reply: oneshot::Sender<ForwardOutcome>,
}

/// Everything a handler needs to deliver one forwarded call and wait for
/// its answer without holding the server lock.
pub struct ForwardTicket {
    pub forward_id: String,
    pub primary: SessionId,
    pub timeout: Duration,
    pub outbound: mpsc::Sender<String>,
    pub message: String,
    pub reply: oneshot::Receiver<ForwardOutcome>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardError {
    UnknownSession,
    /// Nothing to forward to: the caller is unpaired, or is itself a primary.
    NoInspector,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamError {
    UnknownSession,
    AlreadyOpen,
}

pub struct SessionManager {
    puppet_group: String,
    sessions: HashMap<SessionId, SessionEntry>,
    /// Live primaries, oldest first.
    primaries: Vec<SessionId>,
    active_primary: Option<SessionId>,
    /// Watchers of the distinguished puppet group.
    watchers: BTreeSet<SessionId>,
    pairings: HashMap<SessionId, Pairing>,
    pending_forwards: HashMap<String, PendingForward>,
    next_forward: u64,
}

impl SessionManager {
    pub fn new(puppet_group: impl Into<String>) -> Self {
        Self {
            puppet_group: puppet_group.into(),
            sessions: HashMap::new(),
            primaries: Vec::new(),
            active_primary: None,
            watchers: BTreeSet::new(),
            pairings: HashMap::new(),
            pending_forwards: HashMap::new(),
            next_forward: 1,
        }
    }

    pub fn puppet_group(&self) -> &str {
        &self.puppet_group
    }

    /// Adds a session that has not declared a role yet.
    pub fn register_transport(&mut self, session_id: SessionId, transport: SessionTransport) {
        info!(session_id = %session_id, transport = %transport.kind, "session registered");
        self.sessions.insert(
            session_id,
            SessionEntry {
                role: SessionRole::Standalone,
                puppet_group_id: None,
                transport,
            },
        );
    }

    /// Makes `session_id` the active primary and re-pairs every watcher of
    /// the distinguished group to it.
    pub fn handle_primary_connection(&mut self, session_id: &SessionId) -> bool {
        let Some(entry) = self.sessions.get_mut(session_id) else {
            warn!(session_id = %session_id, "primary connection for unknown session");
            return false;
        };
        entry.role = SessionRole::Primary;
        entry.puppet_group_id = None;
        self.watchers.remove(session_id);
        self.unpair(session_id, "session became a primary");
        self.primaries.retain(|id| id != session_id);
        self.primaries.push(session_id.clone());
        self.activate(session_id.clone());
        true
    }

    /// Marks `session_id` as a watcher of `puppet_group_id`. Watchers of the
    /// distinguished group follow the active primary; any other group value
    /// names the session to pair with directly.
    pub fn handle_watcher_connection(
        &mut self,
        session_id: &SessionId,
        puppet_group_id: &str,
    ) -> bool {
        let Some(entry) = self.sessions.get_mut(session_id) else {
            warn!(session_id = %session_id, "watcher connection for unknown session");
            return false;
        };
        if entry.role == SessionRole::Primary {
            warn!(session_id = %session_id, "primary sessions cannot become watchers");
            return false;
        }
        entry.role = SessionRole::Watcher;
        entry.puppet_group_id = Some(puppet_group_id.to_string());

        if puppet_group_id == self.puppet_group {
            self.watchers.insert(session_id.clone());
            if let Some(active) = self.active_primary.clone() {
                self.unpair(session_id, "watcher re-paired");
                self.pair(session_id, &active);
            } else {
                debug!(session_id = %session_id, "watcher waiting for a primary");
            }
            return true;
        }

        let target = SessionId::new(puppet_group_id);
        if &target != session_id && self.sessions.contains_key(&target) {
            self.unpair(session_id, "watcher re-paired");
            self.pair(session_id, &target);
        } else {
            debug!(
                session_id = %session_id,
                target = %target,
                "direct pairing target is not a live session"
            );
        }
        true
    }

    /// Removes the session and everything bound to it. In-flight forwards
    /// from or to it fail immediately.
    pub fn close_session(&mut self, session_id: &SessionId) -> bool {
        let Some(entry) = self.sessions.remove(session_id) else {
            return false;
        };

        self.watchers.remove(session_id);
        self.unpair(session_id, "watcher session closed");

        self.fail_forwards(
            |forward| &forward.primary == session_id,
            RpcErrorCode::NoInspector,
            "inspector session closed before answering",
        );
        self.pairings.retain(|watcher, pairing| {
            let keep = &pairing.primary != session_id;
            if !keep {
                debug!(watcher = %watcher, primary = %session_id, "pairing dropped");
            }
            keep
        });

        if entry.role == SessionRole::Primary {
            self.primaries.retain(|id| id != session_id);
            if self.active_primary.as_ref() == Some(session_id) {
                self.active_primary = None;
                match self.primaries.last().cloned() {
                    Some(next) => {
                        info!(closed = %session_id, primary = %next, "falling back to previous primary");
                        self.activate(next);
                    }
                    None => info!(closed = %session_id, "no primary left, watchers unbound"),
                }
            }
        }

        info!(session_id = %session_id, role = ?entry.role, "session closed");
        true
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn role(&self, session_id: &SessionId) -> Option<SessionRole> {
        self.sessions.get(session_id).map(|entry| entry.role)
    }

    pub fn transport_kind(&self, session_id: &SessionId) -> Option<TransportKind> {
        self.sessions.get(session_id).map(|entry| entry.transport.kind)
    }

    pub fn sender(&self, session_id: &SessionId) -> Option<mpsc::Sender<String>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.transport.sender())
    }

    pub fn active_primary(&self) -> Option<&SessionId> {
        self.active_primary.as_ref()
    }

    pub fn paired_primary(&self, watcher: &SessionId) -> Option<&SessionId> {
        self.pairings.get(watcher).map(|pairing| &pairing.primary)
    }

    pub fn pending_forward_count(&self) -> usize {
        self.pending_forwards.len()
    }

    /// Hands out the server-to-client stream of a session, once.
    pub fn take_stream(
        &mut self,
        session_id: &SessionId,
    ) -> Result<mpsc::Receiver<String>, StreamError> {
        let entry = self
            .sessions
            .get_mut(session_id)
            .ok_or(StreamError::UnknownSession)?;
        entry
            .transport
            .take_stream()
            .ok_or(StreamError::AlreadyOpen)
    }

    /// Registers a tool call from `caller` to be forwarded to the primary it
    /// is routed to. Watchers go to their pairing, role-less sessions to the
    /// active primary.
    pub fn begin_forward(
        &mut self,
        caller: &SessionId,
        tool: &str,
        params: JsonValue,
    ) -> Result<ForwardTicket, ForwardError> {
        let entry = self
            .sessions
            .get(caller)
            .ok_or(ForwardError::UnknownSession)?;
        let timeout = selection_timeout(entry.transport.kind);
        let (primary, outbound) = match entry.role {
            SessionRole::Watcher => {
                let pairing = self.pairings.get(caller).ok_or(ForwardError::NoInspector)?;
                (pairing.primary.clone(), pairing.outbound.clone())
            }
            SessionRole::Standalone => {
                let primary = self
                    .active_primary
                    .clone()
                    .ok_or(ForwardError::NoInspector)?;
                let outbound = self.sender(&primary).ok_or(ForwardError::NoInspector)?;
                (primary, outbound)
            }
            SessionRole::Primary => return Err(ForwardError::NoInspector),
        };

        if tool == INSPECT_ELEMENT {
            self.fail_forwards(
                |forward| forward.primary == primary && forward.tool == INSPECT_ELEMENT,
                RpcErrorCode::RequestCancelled,
                "superseded by a newer inspect_element request",
            );
        }

        let forward_id = format!("locus-fwd-{}", self.next_forward);
        self.next_forward += 1;
        let message =
            JsonRpcRequest::new(json!(forward_id), "tools/call", Some(params));
        let message = serde_json::to_string(&message).map_err(|e| {
            warn!(%e, "failed to encode forwarded request");
            ForwardError::NoInspector
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending_forwards.insert(
            forward_id.clone(),
            PendingForward {
                watcher: caller.clone(),
                primary: primary.clone(),
                tool: tool.to_string(),
                reply: reply_tx,
            },
        );
        debug!(
            forward_id = %forward_id,
            caller = %caller,
            primary = %primary,
            tool,
            "forwarding tool call"
        );

        Ok(ForwardTicket {
            forward_id,
            primary,
            timeout,
            outbound,
            message,
            reply: reply_rx,
        })
    }

    /// Routes a primary's answer to the forward it belongs to. Answers from
    /// any other session, or for ids we never issued, are dropped.
    pub fn complete_forward(
        &mut self,
        from: &SessionId,
        id: &JsonValue,
        outcome: ForwardOutcome,
    ) -> bool {
        let Some(forward_id) = id.as_str() else {
            warn!(session_id = %from, %id, "response with a non-forward id");
            return false;
        };
        match self.pending_forwards.get(forward_id) {
            Some(forward) if &forward.primary == from => {}
            Some(forward) => {
                warn!(
                    session_id = %from,
                    expected = %forward.primary,
                    forward_id,
                    "response from the wrong session"
                );
                return false;
            }
            None => {
                debug!(session_id = %from, forward_id, "response for no pending forward");
                return false;
            }
        }
        let Some(forward) = self.pending_forwards.remove(forward_id) else {
            return false;
        };
        debug!(forward_id, watcher = %forward.watcher, "forward answered");
        if forward.reply.send(outcome).is_err() {
            debug!(forward_id, "forward caller stopped waiting");
        }
        true
    }

    /// Forgets a forward whose caller gave up (timeout, failed delivery).
    pub fn abandon_forward(&mut self, forward_id: &str) -> bool {
        self.pending_forwards.remove(forward_id).is_some()
    }

    pub fn snapshot(&self) -> SessionsResponse {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|(session_id, entry)| SessionInfo {
                session_id: session_id.clone(),
                role: entry.role,
                puppet_group_id: entry.puppet_group_id.clone(),
                transport_kind: entry.transport.kind,
                bound_primary: self.paired_primary(session_id).cloned(),
            })
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        SessionsResponse {
            active_primary: self.active_primary.clone(),
            sessions,
        }
    }

    fn activate(&mut self, primary: SessionId) {
        info!(
            primary = %primary,
            watchers = self.watchers.len(),
            "active primary changed"
        );
        self.active_primary = Some(primary.clone());
        let watchers: Vec<SessionId> = self.watchers.iter().cloned().collect();
        for watcher in watchers {
            self.unpair(&watcher, "watcher re-paired to a newer primary");
            self.pair(&watcher, &primary);
        }
    }

    fn pair(&mut self, watcher: &SessionId, primary: &SessionId) {
        let Some(outbound) = self.sender(primary) else {
            return;
        };
        debug!(watcher = %watcher, primary = %primary, "watcher paired");
        self.pairings.insert(
            watcher.clone(),
            Pairing {
                primary: primary.clone(),
                outbound,
            },
        );
    }

    fn unpair(&mut self, watcher: &SessionId, reason: &str) {
        let Some(previous) = self.pairings.remove(watcher) else {
            return;
        };
        debug!(watcher = %watcher, primary = %previous.primary, reason, "watcher unpaired");
        self.fail_forwards(
            |forward| &forward.watcher == watcher,
            RpcErrorCode::RequestCancelled,
            reason,
        );
    }

    fn fail_forwards(
        &mut self,
        matches: impl Fn(&PendingForward) -> bool,
        code: RpcErrorCode,
        message: &str,
    ) {
        let failed: Vec<String> = self
            .pending_forwards
            .iter()
            .filter(|(_, forward)| matches(forward))
            .map(|(id, _)| id.clone())
            .collect();
        for forward_id in failed {
            if let Some(forward) = self.pending_forwards.remove(&forward_id) {
                debug!(forward_id = %forward_id, message, "failing forward");
                let _ = forward.reply.send(Err(code.error(message)));
            }
        }
    }
}
