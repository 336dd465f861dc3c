use facet::Facet;
use futures_channel::mpsc;
use locus_types::ElementDescriptor;
use tracing::debug;

/// One step of an agent's work plan, as shown next to the inspected element.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
pub struct PlanStep {
    pub title: String,
    pub done: bool,
}

/// Everything the inspector tells the surrounding page about.
#[derive(Facet, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
#[facet(rename_all = "snake_case")]
pub enum InspectorMessage {
    ElementInspected {
        descriptor: ElementDescriptor,
        feedback: String,
    },
    InspectorCancelled,
    PlanProgress {
        steps: Vec<PlanStep>,
    },
}

#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::UnboundedSender<InspectorMessage>,
}

pub type MessageReceiver = mpsc::UnboundedReceiver<InspectorMessage>;

pub fn message_channel() -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::unbounded();
    (MessageSender { tx }, rx)
}

impl MessageSender {
    /// Sends `message`; a closed receiver only means nobody is listening.
    pub fn emit(&self, message: InspectorMessage) {
        if let Err(e) = self.tx.unbounded_send(message) {
            debug!(%e, "inspector message dropped, receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn messages_arrive_in_order() {
        let (tx, mut rx) = message_channel();
        tx.emit(InspectorMessage::InspectorCancelled);
        tx.emit(InspectorMessage::PlanProgress {
            steps: vec![PlanStep {
                title: String::from("edit Button.tsx"),
                done: false,
            }],
        });
        drop(tx);
        assert_eq!(rx.next().await, Some(InspectorMessage::InspectorCancelled));
        assert!(matches!(
            rx.next().await,
            Some(InspectorMessage::PlanProgress { steps }) if steps.len() == 1
        ));
        assert_eq!(rx.next().await, None);
    }

    #[test]
    fn emit_after_receiver_drop_is_harmless() {
        let (tx, rx) = message_channel();
        drop(rx);
        tx.emit(InspectorMessage::InspectorCancelled);
    }
}
