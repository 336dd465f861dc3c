//! Pending "wait for the user to pick an element" requests.
//!
//! At most one request is pending. Starting a new one rejects the previous
//! one with [`SelectionError::Cancelled`] before the new one is stored.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures_channel::oneshot;
use futures_util::future::{Either, select};
use locus_types::{InspectionRecord, TransportKind};
use parking_lot::Mutex;
use tracing::debug;

/// How long an agent waits for a pick over a streamed session.
pub const STREAMED_SELECTION_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// How long an agent waits for a pick over the legacy event stream.
pub const LEGACY_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

pub fn selection_timeout(transport: TransportKind) -> Duration {
    match transport {
        TransportKind::Streamed => STREAMED_SELECTION_TIMEOUT,
        TransportKind::LegacyEventStream => LEGACY_SELECTION_TIMEOUT,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionError {
    /// A newer request replaced this one, or the user cancelled.
    Cancelled,
    TimedOut,
    /// The inspector went away before answering.
    Closed,
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::Cancelled => f.write_str("element selection was cancelled"),
            SelectionError::TimedOut => f.write_str("timed out waiting for element selection"),
            SelectionError::Closed => f.write_str("inspector closed before an element was selected"),
        }
    }
}

impl std::error::Error for SelectionError {}

type Outcome = Result<InspectionRecord, SelectionError>;

struct Pending {
    id: u64,
    tx: oneshot::Sender<Outcome>,
}

/// Receiving half of one selection request.
pub struct SelectionTicket {
    id: u64,
    timeout: Duration,
    rx: oneshot::Receiver<Outcome>,
}

impl SelectionTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[derive(Default)]
pub struct SelectionManager {
    pending: Mutex<Option<Pending>>,
    next_id: Mutex<u64>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request, rejecting any pending one first.
    pub fn begin(&self, transport: TransportKind) -> SelectionTicket {
        let id = {
            let mut next_id = self.next_id.lock();
            *next_id += 1;
            *next_id
        };
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            debug!(previous = previous.id, next = id, "superseding pending selection");
            let _ = previous.tx.send(Err(SelectionError::Cancelled));
        }
        *pending = Some(Pending { id, tx });
        SelectionTicket {
            id,
            timeout: selection_timeout(transport),
            rx,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Resolves the pending request. Returns false when nobody was waiting.
    pub fn complete(&self, record: InspectionRecord) -> bool {
        self.finish(None, Ok(record))
    }

    /// Rejects request `id` with [`SelectionError::Cancelled`] if it is
    /// still the pending one.
    pub fn cancel_request(&self, id: u64) -> bool {
        self.finish(Some(id), Err(SelectionError::Cancelled))
    }

    /// Rejects request `id` with [`SelectionError::TimedOut`] if it is still
    /// the pending one.
    pub fn expire(&self, id: u64) -> bool {
        self.finish(Some(id), Err(SelectionError::TimedOut))
    }

    fn finish(&self, only_id: Option<u64>, outcome: Outcome) -> bool {
        let mut pending = self.pending.lock();
        if only_id.is_some_and(|id| pending.as_ref().is_none_or(|p| p.id != id)) {
            return false;
        }
        match pending.take() {
            Some(p) => p.tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Waits for `ticket` to be answered or for `sleep` to elapse, whichever
    /// comes first. `sleep` should be a timer for [`SelectionTicket::timeout`];
    /// it is passed in so the caller picks the runtime.
    pub async fn wait<S>(&self, ticket: SelectionTicket, sleep: S) -> Outcome
    where
        S: Future<Output = ()>,
    {
        let id = ticket.id;
        let sleep = std::pin::pin!(sleep);
        match select(ticket.rx, sleep).await {
            Either::Left((Ok(outcome), _)) => outcome,
            Either::Left((Err(oneshot::Canceled), _)) => Err(SelectionError::Closed),
            Either::Right(((), rx)) => {
                if self.expire(id) {
                    return Err(SelectionError::TimedOut);
                }
                // Answered or superseded while the timer fired.
                rx.await.unwrap_or(Err(SelectionError::Closed))
            }
        }
    }
}
