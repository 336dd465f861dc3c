use locus_types::{ElementDescriptor, InspectionRecord};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InspectorState {
    Disarmed,
    ArmedHovering,
    /// An element was picked; the user is typing their request.
    /// `descriptor` is filled once the resolver has run.
    AwaitingFeedback {
        descriptor: Option<ElementDescriptor>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InspectorEvent {
    /// The floating toggle control was pressed.
    Toggle,
    PointerMove {
        over_toggle: bool,
    },
    Click,
    SubmitFeedback {
        feedback: String,
    },
    /// Escape key or explicit close.
    Cancel,
    /// The pending selection request expired.
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Crosshair,
}

/// What the page has to do after a transition, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    SetCursor(Cursor),
    Notify(String),
    /// Move the highlight overlay and tooltip onto the hovered element.
    TrackHover,
    HideOverlay,
    PreventDefault,
    StopPropagation,
    /// Run the resolver on the click target and report back through
    /// [`InspectorMachine::element_resolved`].
    ResolveTarget,
    ShowFeedbackPrompt(ElementDescriptor),
    HideFeedbackPrompt,
    /// Hand the finished inspection to the agent.
    Forward(InspectionRecord),
    /// The inspection ended without a result.
    Cancelled,
}

/// Hover/click interaction state for the in-page inspector.
#[derive(Debug)]
pub struct InspectorMachine {
    state: InspectorState,
}

impl Default for InspectorMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectorMachine {
    pub fn new() -> Self {
        Self {
            state: InspectorState::Disarmed,
        }
    }

    pub fn state(&self) -> &InspectorState {
        &self.state
    }

    pub fn is_armed(&self) -> bool {
        !matches!(self.state, InspectorState::Disarmed)
    }

    pub fn handle(&mut self, event: InspectorEvent) -> Vec<Effect> {
        let state = std::mem::replace(&mut self.state, InspectorState::Disarmed);
        let (next, effects) = transition(state, event);
        self.state = next;
        effects
    }

    /// Stores the resolver's result for the element picked by the last click.
    pub fn element_resolved(&mut self, resolved: ElementDescriptor) -> Vec<Effect> {
        match &mut self.state {
            InspectorState::AwaitingFeedback { descriptor } => {
                *descriptor = Some(resolved.clone());
                vec![Effect::ShowFeedbackPrompt(resolved)]
            }
            _ => vec![],
        }
    }
}

fn transition(state: InspectorState, event: InspectorEvent) -> (InspectorState, Vec<Effect>) {
    use InspectorEvent as Ev;
    use InspectorState as St;

    match (state, event) {
        (St::Disarmed, Ev::Toggle) => (
            St::ArmedHovering,
            vec![
                Effect::SetCursor(Cursor::Crosshair),
                Effect::Notify(String::from("Click an element to inspect it")),
            ],
        ),
        (St::ArmedHovering, Ev::Toggle) => disarm(false),
        (St::ArmedHovering, Ev::PointerMove { over_toggle }) => {
            let effects = if over_toggle {
                vec![]
            } else {
                vec![Effect::TrackHover]
            };
            (St::ArmedHovering, effects)
        }
        (St::ArmedHovering, Ev::Click) => (
            St::AwaitingFeedback { descriptor: None },
            vec![
                Effect::PreventDefault,
                Effect::StopPropagation,
                Effect::HideOverlay,
                Effect::ResolveTarget,
            ],
        ),
        (
            St::AwaitingFeedback {
                descriptor: Some(descriptor),
            },
            Ev::SubmitFeedback { feedback },
        ) => (
            St::Disarmed,
            vec![
                Effect::HideFeedbackPrompt,
                Effect::SetCursor(Cursor::Default),
                Effect::Forward(InspectionRecord {
                    descriptor,
                    feedback,
                }),
            ],
        ),
        (St::Disarmed, Ev::Cancel | Ev::Timeout) => (St::Disarmed, vec![]),
        (St::ArmedHovering, Ev::Cancel | Ev::Timeout) => disarm(false),
        (St::AwaitingFeedback { .. }, Ev::Cancel | Ev::Timeout) => disarm(true),
        // Re-arming while picking, clicks while disarmed, and feedback
        // without a resolved element are ignored.
        (state, _) => (state, vec![]),
    }
}

fn disarm(was_awaiting: bool) -> (InspectorState, Vec<Effect>) {
    let mut effects = vec![Effect::SetCursor(Cursor::Default), Effect::HideOverlay];
    if was_awaiting {
        effects.push(Effect::HideFeedbackPrompt);
    }
    effects.push(Effect::Cancelled);
    (InspectorState::Disarmed, effects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_types::SourceLocation;
    use std::collections::BTreeMap;

    fn descriptor() -> ElementDescriptor {
        ElementDescriptor {
            location: SourceLocation::new("app.tsx", 20, 1),
            component_name: String::from("span"),
            element_tag: String::from("span"),
            text_excerpt: String::from("Go"),
            attributes: BTreeMap::new(),
            computed_style: BTreeMap::new(),
            apis: vec![],
        }
    }

    #[test]
    fn full_inspection_cycle() {
        let mut machine = InspectorMachine::new();
        assert_eq!(
            machine.handle(InspectorEvent::Toggle)[0],
            Effect::SetCursor(Cursor::Crosshair)
        );
        assert_eq!(
            machine.handle(InspectorEvent::PointerMove { over_toggle: false }),
            vec![Effect::TrackHover]
        );
        assert_eq!(
            machine.handle(InspectorEvent::Click),
            vec![
                Effect::PreventDefault,
                Effect::StopPropagation,
                Effect::HideOverlay,
                Effect::ResolveTarget,
            ]
        );
        assert_eq!(
            machine.element_resolved(descriptor()),
            vec![Effect::ShowFeedbackPrompt(descriptor())]
        );
        let effects = machine.handle(InspectorEvent::SubmitFeedback {
            feedback: String::from("make it red"),
        });
        assert_eq!(
            effects.last(),
            Some(&Effect::Forward(InspectionRecord {
                descriptor: descriptor(),
                feedback: String::from("make it red"),
            }))
        );
        assert_eq!(machine.state(), &InspectorState::Disarmed);
    }

    #[test]
    fn hovering_the_toggle_is_ignored() {
        let mut machine = InspectorMachine::new();
        machine.handle(InspectorEvent::Toggle);
        assert!(
            machine
                .handle(InspectorEvent::PointerMove { over_toggle: true })
                .is_empty()
        );
    }

    #[test]
    fn toggle_while_awaiting_feedback_is_ignored() {
        let mut machine = InspectorMachine::new();
        machine.handle(InspectorEvent::Toggle);
        machine.handle(InspectorEvent::Click);
        assert!(machine.handle(InspectorEvent::Toggle).is_empty());
        assert!(matches!(
            machine.state(),
            InspectorState::AwaitingFeedback { .. }
        ));
    }

    #[test]
    fn toggle_while_armed_disarms() {
        let mut machine = InspectorMachine::new();
        machine.handle(InspectorEvent::Toggle);
        let effects = machine.handle(InspectorEvent::Toggle);
        assert!(effects.contains(&Effect::Cancelled));
        assert_eq!(machine.state(), &InspectorState::Disarmed);
    }

    #[test]
    fn cancel_and_timeout_always_disarm() {
        for event in [InspectorEvent::Cancel, InspectorEvent::Timeout] {
            let mut machine = InspectorMachine::new();
            machine.handle(InspectorEvent::Toggle);
            machine.handle(InspectorEvent::Click);
            machine.element_resolved(descriptor());
            let effects = machine.handle(event);
            assert_eq!(effects[0], Effect::SetCursor(Cursor::Default));
            assert!(effects.contains(&Effect::HideFeedbackPrompt));
            assert_eq!(machine.state(), &InspectorState::Disarmed);
        }
    }

    #[test]
    fn clicks_while_disarmed_do_nothing() {
        let mut machine = InspectorMachine::new();
        assert!(machine.handle(InspectorEvent::Click).is_empty());
        assert!(machine.handle(InspectorEvent::Cancel).is_empty());
    }
}
