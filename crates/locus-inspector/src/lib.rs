//! Runtime core of the in-page inspector.
//!
//! Maps a clicked element back to the source that produced it, drives the
//! hover/click interaction, and keeps the single pending "pick an element"
//! request an agent may be waiting on. Browser specifics live in `web`
//! (wasm only); everything else runs natively so it can be tested without a
//! browser.

pub mod controller;
pub mod dom;
pub mod events;
pub mod handoff;
pub mod machine;
pub mod registry;
pub mod resolve;
pub mod selection;
pub mod snapshot;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
pub mod web;

pub use controller::InspectorController;
pub use dom::DomElement;
pub use events::{InspectorMessage, MessageReceiver, MessageSender, PlanStep, message_channel};
pub use handoff::{render_inspection, render_inspections};
pub use machine::{Cursor, Effect, InspectorEvent, InspectorMachine, InspectorState};
pub use registry::ComponentRegistry;
pub use resolve::{
    ComponentId, ElementResolver, MAX_ANCESTOR_DEPTH, NoOwnerResolver, OwnerResolver,
    attribute_location,
};
pub use selection::{
    LEGACY_SELECTION_TIMEOUT, STREAMED_SELECTION_TIMEOUT, SelectionError, SelectionManager,
    SelectionTicket, selection_timeout,
};
