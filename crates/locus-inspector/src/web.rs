//! Browser bindings: `web_sys::Element` as a [`DomElement`], framework owner
//! resolvers, loading the registry the page's modules wrote, and the
//! [`Inspector`] handle the page script drives.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::poll_fn;
use js_sys::{Array, Function, JsString, Object, Promise, Reflect};
use locus_types::{REGISTRY_GLOBAL, RegistryRecord, TransportKind};
use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::future_to_promise;

use crate::controller::InspectorController;
use crate::dom::DomElement;
use crate::events::{MessageReceiver, message_channel};
use crate::machine::{Cursor, Effect, InspectorEvent, InspectorState};
use crate::registry::ComponentRegistry;
use crate::resolve::{ComponentId, OwnerResolver};
use crate::selection::SelectionManager;

/// How far up a framework's component-instance chain we look for a name.
const MAX_OWNER_HOPS: usize = 50;

impl DomElement for web_sys::Element {
    fn tag_name(&self) -> String {
        web_sys::Element::tag_name(self).to_lowercase()
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        web_sys::Element::get_attribute(self, name)
    }

    fn parent(&self) -> Option<Self> {
        self.parent_element()
    }

    fn text_content(&self) -> String {
        web_sys::Node::text_content(self).unwrap_or_default()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .filter_map(|name| {
                let value = web_sys::Element::get_attribute(self, &name)?;
                Some((name, value))
            })
            .collect()
    }

    fn computed_style(&self, property: &str) -> Option<String> {
        let window = web_sys::window()?;
        let style = window.get_computed_style(self).ok()??;
        style.get_property_value(property).ok()
    }
}

/// Which framework's internals to walk, chosen when the inspector starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framework {
    React,
    Vue,
}

impl OwnerResolver<web_sys::Element> for Framework {
    fn resolve_owning_component(&self, node: &web_sys::Element) -> Option<ComponentId> {
        match self {
            Framework::React => ReactFiberResolver.resolve_owning_component(node),
            Framework::Vue => VueInstanceResolver.resolve_owning_component(node),
        }
    }
}

/// Follows the fiber React attaches to host nodes (`__reactFiber$…`) up its
/// `return` chain to the nearest named function component.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReactFiberResolver;

impl OwnerResolver<web_sys::Element> for ReactFiberResolver {
    fn resolve_owning_component(&self, node: &web_sys::Element) -> Option<ComponentId> {
        let key = Object::keys(node.unchecked_ref::<Object>())
            .iter()
            .filter_map(|key| key.as_string())
            .find(|key| {
                key.starts_with("__reactFiber$") || key.starts_with("__reactInternalInstance$")
            })?;
        let mut fiber = get(node.as_ref(), &key)?;
        for _ in 0..MAX_OWNER_HOPS {
            if let Some(name) = get(&fiber, "type").and_then(|ty| function_name(&ty)) {
                return Some(ComponentId(name));
            }
            fiber = get(&fiber, "return")?;
        }
        None
    }
}

/// Follows `__vueParentComponent` up the `parent` chain to the nearest
/// component with a name (`name`, or `__name` for `<script setup>`).
#[derive(Clone, Copy, Debug, Default)]
pub struct VueInstanceResolver;

impl OwnerResolver<web_sys::Element> for VueInstanceResolver {
    fn resolve_owning_component(&self, node: &web_sys::Element) -> Option<ComponentId> {
        let mut instance = get(node.as_ref(), "__vueParentComponent")?;
        for _ in 0..MAX_OWNER_HOPS {
            let name = get(&instance, "type").and_then(|ty| {
                get(&ty, "name")
                    .and_then(|n| n.as_string())
                    .or_else(|| get(&ty, "__name").and_then(|n| n.as_string()))
            });
            if let Some(name) = name.filter(|n| !n.is_empty()) {
                return Some(ComponentId(name));
            }
            instance = get(&instance, "parent")?;
        }
        None
    }
}

fn get(target: &JsValue, key: &str) -> Option<JsValue> {
    let value = Reflect::get(target, &JsValue::from_str(key)).ok()?;
    (!value.is_undefined() && !value.is_null()).then_some(value)
}

/// Name of a capitalized function, which is how components are told apart
/// from host elements (whose type is a tag string).
fn function_name(value: &JsValue) -> Option<String> {
    let function = value.dyn_ref::<Function>()?;
    let name = get(function.as_ref(), "displayName")
        .and_then(|n| n.as_string())
        .unwrap_or_else(|| String::from(function.name()));
    let capitalized = name.chars().next().is_some_and(char::is_uppercase);
    capitalized.then_some(name)
}

/// Copies every entry of `window.__LOCUS_COMPONENTS__` into `registry`.
/// Returns how many entries were loaded.
pub fn load_registry_from_window(registry: &ComponentRegistry) -> usize {
    let Some(window) = web_sys::window() else {
        return 0;
    };
    let Some(table) = get(window.as_ref(), REGISTRY_GLOBAL) else {
        return 0;
    };
    let mut loaded = 0;
    for value in Object::values(table.unchecked_ref::<Object>()).iter() {
        let Some(json) = js_sys::JSON::stringify(&value)
            .ok()
            .and_then(|s: JsString| s.as_string())
        else {
            continue;
        };
        match facet_json::from_str::<RegistryRecord>(&json) {
            Ok(record) => {
                registry.register_record(record);
                loaded += 1;
            }
            Err(e) => warn!(%e, "skipping malformed registry entry"),
        }
    }
    loaded
}

/// The inspector as the page sees it. Every call hands the resulting
/// effects to the `render` callback given at construction, as an array of
/// `{ kind, value? }` objects.
#[wasm_bindgen]
pub struct Inspector {
    controller: Rc<RefCell<InspectorController<Framework>>>,
    messages: Rc<RefCell<MessageReceiver>>,
    render: Function,
}

#[wasm_bindgen]
impl Inspector {
    /// `framework` is `"react"` or `"vue"`.
    #[wasm_bindgen(constructor)]
    pub fn new(framework: &str, render: Function) -> Inspector {
        let framework = match framework {
            "vue" => Framework::Vue,
            _ => Framework::React,
        };
        let registry = Arc::new(ComponentRegistry::new());
        let loaded = load_registry_from_window(&registry);
        debug!(loaded, ?framework, "inspector started");
        let (tx, rx) = message_channel();
        let controller = InspectorController::new(
            registry,
            framework,
            Arc::new(SelectionManager::new()),
            tx,
        );
        Inspector {
            controller: Rc::new(RefCell::new(controller)),
            messages: Rc::new(RefCell::new(rx)),
            render,
        }
    }

    /// Picks up registry entries written by modules loaded since start.
    pub fn reload_registry(&self) -> usize {
        load_registry_from_window(self.controller.borrow().registry())
    }

    pub fn toggle(&self) {
        self.dispatch(InspectorEvent::Toggle);
    }

    pub fn pointer_move(&self, over_toggle: bool) {
        self.dispatch(InspectorEvent::PointerMove { over_toggle });
    }

    pub fn click(&self, target: web_sys::Element) {
        let effects = self.controller.borrow_mut().click(&target);
        render(&self.render, &effects);
    }

    pub fn submit_feedback(&self, feedback: String) {
        self.dispatch(InspectorEvent::SubmitFeedback { feedback });
    }

    pub fn cancel(&self) {
        self.dispatch(InspectorEvent::Cancel);
    }

    /// `"disarmed"`, `"armed"` or `"awaiting_feedback"`.
    pub fn state(&self) -> String {
        match self.controller.borrow().state() {
            InspectorState::Disarmed => "disarmed",
            InspectorState::ArmedHovering => "armed",
            InspectorState::AwaitingFeedback { .. } => "awaiting_feedback",
        }
        .to_string()
    }

    pub fn queued_text(&self) -> String {
        self.controller.borrow().queued_text()
    }

    pub fn clear_queue(&self) {
        self.controller.borrow_mut().clear_queue();
    }

    /// An agent wants the user to pick an element. Arms the inspector and
    /// resolves with the inspection as JSON, or rejects with the reason.
    /// `transport` is `"legacy-sse"` for the event-stream transport.
    pub fn select_element(&self, transport: &str) -> Promise {
        let transport = match transport {
            "legacy-sse" => TransportKind::LegacyEventStream,
            _ => TransportKind::Streamed,
        };
        let (ticket, effects) = self.controller.borrow_mut().begin_selection(transport);
        render(&self.render, &effects);

        let controller = self.controller.clone();
        let render_fn = self.render.clone();
        future_to_promise(async move {
            let sleep = gloo_timers::future::sleep(ticket.timeout());
            let (outcome, effects) =
                InspectorController::await_selection(&controller, ticket, sleep).await;
            render(&render_fn, &effects);
            let record = outcome.map_err(|e| JsValue::from_str(&e.to_string()))?;
            to_js(&record)
        })
    }

    /// Resolves with the next [`crate::InspectorMessage`] as JSON, or with
    /// `null` once the inspector is gone.
    pub fn next_message(&self) -> Promise {
        let messages = self.messages.clone();
        future_to_promise(async move {
            let next = poll_fn(|cx| messages.borrow_mut().poll_next_unpin(cx)).await;
            match next {
                Some(message) => to_js(&message),
                None => Ok(JsValue::NULL),
            }
        })
    }
}

impl Inspector {
    fn dispatch(&self, event: InspectorEvent) {
        let effects = self.controller.borrow_mut().handle(event);
        render(&self.render, &effects);
    }
}

fn render(callback: &Function, effects: &[Effect]) {
    if effects.is_empty() {
        return;
    }
    let array: Array = effects.iter().map(effect_to_js).collect();
    if let Err(e) = callback.call1(&JsValue::UNDEFINED, &array) {
        warn!(?e, "render callback threw");
    }
}

fn effect_to_js(effect: &Effect) -> JsValue {
    let (kind, value) = match effect {
        Effect::SetCursor(Cursor::Default) => ("set_cursor", JsValue::from_str("default")),
        Effect::SetCursor(Cursor::Crosshair) => ("set_cursor", JsValue::from_str("crosshair")),
        Effect::Notify(text) => ("notify", JsValue::from_str(text)),
        Effect::TrackHover => ("track_hover", JsValue::UNDEFINED),
        Effect::HideOverlay => ("hide_overlay", JsValue::UNDEFINED),
        Effect::PreventDefault => ("prevent_default", JsValue::UNDEFINED),
        Effect::StopPropagation => ("stop_propagation", JsValue::UNDEFINED),
        Effect::ResolveTarget => ("resolve_target", JsValue::UNDEFINED),
        Effect::ShowFeedbackPrompt(descriptor) => (
            "show_feedback_prompt",
            to_js(descriptor).unwrap_or(JsValue::UNDEFINED),
        ),
        Effect::HideFeedbackPrompt => ("hide_feedback_prompt", JsValue::UNDEFINED),
        Effect::Forward(record) => ("forward", to_js(record).unwrap_or(JsValue::UNDEFINED)),
        Effect::Cancelled => ("cancelled", JsValue::UNDEFINED),
    };
    let object = Object::new();
    let _ = Reflect::set(&object, &JsValue::from_str("kind"), &JsValue::from_str(kind));
    if !value.is_undefined() {
        let _ = Reflect::set(&object, &JsValue::from_str("value"), &value);
    }
    object.into()
}

fn to_js<'a, T: facet::Facet<'a>>(value: &T) -> Result<JsValue, JsValue> {
    let json = facet_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&json)
}
