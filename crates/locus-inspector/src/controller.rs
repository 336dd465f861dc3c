use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use locus_types::{InspectionRecord, TransportKind};
use tracing::{debug, info};

use crate::dom::DomElement;
use crate::events::{InspectorMessage, MessageSender};
use crate::handoff::render_inspections;
use crate::machine::{Effect, InspectorEvent, InspectorMachine, InspectorState};
use crate::registry::ComponentRegistry;
use crate::resolve::{ElementResolver, OwnerResolver};
use crate::selection::{SelectionError, SelectionManager, SelectionTicket};

/// The in-page inspector: interaction state plus everything a transition
/// needs to reach (resolver, pending agent request, message channel).
pub struct InspectorController<R> {
    machine: InspectorMachine,
    registry: Arc<ComponentRegistry>,
    owner: R,
    selection: Arc<SelectionManager>,
    messages: MessageSender,
    queue: Vec<InspectionRecord>,
    /// The agent request the inspector is currently armed for.
    armed_for: Option<u64>,
}

impl<R> InspectorController<R> {
    pub fn new(
        registry: Arc<ComponentRegistry>,
        owner: R,
        selection: Arc<SelectionManager>,
        messages: MessageSender,
    ) -> Self {
        Self {
            machine: InspectorMachine::new(),
            registry,
            owner,
            selection,
            messages,
            queue: Vec::new(),
            armed_for: None,
        }
    }

    pub fn state(&self) -> &InspectorState {
        self.machine.state()
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Feeds a page event through the machine and carries out the effects
    /// that belong to the core (forwarding, cancellation). The returned
    /// effects are for the page to render.
    ///
    /// Clicks should go through [`Self::click`] so the target gets resolved.
    pub fn handle(&mut self, event: InspectorEvent) -> Vec<Effect> {
        let effects = self.machine.handle(event);
        self.settle(&effects);
        effects
    }

    /// A click on `target`. While armed, the overlay is hidden and the
    /// target resolved before the feedback prompt shows, in that order.
    pub fn click<E>(&mut self, target: &E) -> Vec<Effect>
    where
        E: DomElement,
        R: OwnerResolver<E>,
    {
        let mut effects = Vec::new();
        for effect in self.machine.handle(InspectorEvent::Click) {
            if effect == Effect::ResolveTarget {
                let descriptor =
                    ElementResolver::new(&self.registry, &self.owner).resolve(target);
                effects.extend(self.machine.element_resolved(descriptor));
            } else {
                effects.push(effect);
            }
        }
        self.settle(&effects);
        effects
    }

    /// An agent asked for a pick: supersede any pending request and arm
    /// the inspector if it is not already.
    pub fn begin_selection(&mut self, transport: TransportKind) -> (SelectionTicket, Vec<Effect>) {
        let ticket = self.selection.begin(transport);
        self.armed_for = Some(ticket.id());
        let effects = match self.machine.state() {
            InspectorState::Disarmed => self.handle(InspectorEvent::Toggle),
            _ => Vec::new(),
        };
        (ticket, effects)
    }

    /// Request `id` ran out of time. Disarms the inspector unless a newer
    /// request has taken over since.
    pub fn selection_expired(&mut self, id: u64) -> Vec<Effect> {
        if self.armed_for != Some(id) {
            debug!(id, current = ?self.armed_for, "ignoring expiry of a superseded selection");
            return Vec::new();
        }
        info!(id, "element selection timed out");
        self.handle(InspectorEvent::Timeout)
    }

    /// Waits for `ticket` without holding the controller borrowed, so page
    /// events keep flowing. On expiry the inspector is disarmed and the
    /// resulting effects are returned for the page to render.
    pub async fn await_selection<S>(
        this: &RefCell<Self>,
        ticket: SelectionTicket,
        sleep: S,
    ) -> (Result<InspectionRecord, SelectionError>, Vec<Effect>)
    where
        S: Future<Output = ()>,
    {
        let id = ticket.id();
        let selection = this.borrow().selection.clone();
        let outcome = selection.wait(ticket, sleep).await;
        let effects = match outcome {
            Err(SelectionError::TimedOut) => this.borrow_mut().selection_expired(id),
            _ => Vec::new(),
        };
        (outcome, effects)
    }

    /// Inspections the user has submitted, oldest first.
    pub fn queued(&self) -> &[InspectionRecord] {
        &self.queue
    }

    pub fn queued_text(&self) -> String {
        render_inspections(&self.queue)
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    fn settle(&mut self, effects: &[Effect]) {
        for effect in effects {
            match effect {
                Effect::Forward(record) => {
                    info!(
                        file = %record.descriptor.location.file_path,
                        line = record.descriptor.location.line,
                        component = %record.descriptor.component_name,
                        "element inspected"
                    );
                    self.queue.push(record.clone());
                    self.armed_for = None;
                    self.selection.complete(record.clone());
                    self.messages.emit(InspectorMessage::ElementInspected {
                        descriptor: record.descriptor.clone(),
                        feedback: record.feedback.clone(),
                    });
                }
                Effect::Cancelled => {
                    if let Some(id) = self.armed_for.take() {
                        self.selection.cancel_request(id);
                    }
                    self.messages.emit(InspectorMessage::InspectorCancelled);
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::fake::FakeElement;
    use crate::events::message_channel;
    use crate::resolve::NoOwnerResolver;
    use crate::selection::SelectionError;
    use futures_util::StreamExt;
    use locus_types::SourceLocation;
    use std::future::pending;

    fn controller() -> (
        InspectorController<NoOwnerResolver>,
        Arc<SelectionManager>,
        crate::events::MessageReceiver,
    ) {
        let selection = Arc::new(SelectionManager::new());
        let (tx, rx) = message_channel();
        let controller = InspectorController::new(
            Arc::new(ComponentRegistry::new()),
            NoOwnerResolver,
            selection.clone(),
            tx,
        );
        (controller, selection, rx)
    }

    #[tokio::test]
    async fn agent_request_is_answered_by_a_click_and_feedback() {
        let (mut controller, selection, mut rx) = controller();
        let (ticket, effects) = controller.begin_selection(TransportKind::Streamed);
        assert!(!effects.is_empty());
        assert_eq!(controller.state(), &InspectorState::ArmedHovering);

        let target = FakeElement::root("body").child("button", &[("data-source", "src/App.tsx:9:4")]);
        let effects = controller.click(&target);
        assert!(matches!(effects.last(), Some(Effect::ShowFeedbackPrompt(_))));
        assert!(!effects.contains(&Effect::ResolveTarget));

        controller.handle(InspectorEvent::SubmitFeedback {
            feedback: String::from("rename to Save"),
        });

        let record = selection.wait(ticket, pending()).await.unwrap();
        assert_eq!(record.descriptor.location, SourceLocation::new("src/App.tsx", 9, 4));
        assert_eq!(controller.queued().len(), 1);
        assert!(matches!(
            rx.next().await,
            Some(InspectorMessage::ElementInspected { feedback, .. }) if feedback == "rename to Save"
        ));
    }

    #[tokio::test]
    async fn escape_rejects_the_pending_request() {
        let (mut controller, selection, mut rx) = controller();
        let (ticket, _) = controller.begin_selection(TransportKind::Streamed);
        controller.handle(InspectorEvent::Cancel);
        assert_eq!(
            selection.wait(ticket, pending()).await.unwrap_err(),
            SelectionError::Cancelled
        );
        assert_eq!(rx.next().await, Some(InspectorMessage::InspectorCancelled));
    }

    #[test]
    fn second_request_keeps_the_inspector_armed() {
        let (mut controller, selection, _rx) = controller();
        controller.begin_selection(TransportKind::Streamed);
        let (_, effects) = controller.begin_selection(TransportKind::LegacyEventStream);
        assert!(effects.is_empty());
        assert!(selection.is_pending());
        assert_eq!(controller.state(), &InspectorState::ArmedHovering);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_selection_disarms_the_inspector() {
        let (mut controller, selection, mut rx) = controller();
        let (ticket, _) = controller.begin_selection(TransportKind::LegacyEventStream);
        assert_eq!(controller.state(), &InspectorState::ArmedHovering);

        let sleep = tokio::time::sleep(ticket.timeout());
        let controller = RefCell::new(controller);
        let (outcome, effects) =
            InspectorController::await_selection(&controller, ticket, sleep).await;

        assert_eq!(outcome.unwrap_err(), SelectionError::TimedOut);
        assert!(effects.contains(&Effect::SetCursor(crate::machine::Cursor::Default)));
        assert!(effects.contains(&Effect::HideOverlay));
        assert_eq!(controller.borrow().state(), &InspectorState::Disarmed);
        assert!(!selection.is_pending());
        assert_eq!(rx.next().await, Some(InspectorMessage::InspectorCancelled));
    }

    #[test]
    fn stale_expiry_leaves_a_newer_request_armed() {
        let (mut controller, selection, _rx) = controller();
        let (first, _) = controller.begin_selection(TransportKind::LegacyEventStream);
        let (second, _) = controller.begin_selection(TransportKind::Streamed);

        assert!(controller.selection_expired(first.id()).is_empty());
        assert_eq!(controller.state(), &InspectorState::ArmedHovering);
        assert!(selection.is_pending());

        controller.handle(InspectorEvent::Cancel);
        assert!(!selection.is_pending());
        assert!(controller.selection_expired(second.id()).is_empty());
    }
}
