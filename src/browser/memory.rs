//! In-memory page used to exercise adapters without a browser.
//!
//! Elements are declared with the selectors they answer to; there is no CSS
//! engine. Reactions model the page's own responses to clicks and typing
//! (a modal opening, an autocomplete list appearing).

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::page::{DomEvent, ElementRef, ElementState, FilePayload, InjectionCandidate, PageDriver};

#[derive(Debug, Clone)]
pub struct MemoryElement {
    tag: String,
    selectors: Vec<String>,
    state: ElementState,
    value: String,
    text: String,
    accepts_insert_text: bool,
    accepts_paste: bool,
    accepts_select_delete: bool,
}

impl MemoryElement {
    pub fn new(tag: &str, selector: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            selectors: vec![selector.to_string()],
            state: ElementState {
                attached: true,
                width: 320.0,
                height: 32.0,
                ..Default::default()
            },
            value: String::new(),
            text: String::new(),
            accepts_insert_text: true,
            accepts_paste: true,
            accepts_select_delete: true,
        }
    }

    pub fn input(selector: &str) -> Self {
        Self::new("input", selector)
    }

    pub fn textarea(selector: &str) -> Self {
        Self::new("textarea", selector)
    }

    /// A `contenteditable` region.
    pub fn editable(selector: &str) -> Self {
        Self::new("div", selector)
    }

    pub fn button(selector: &str, label: &str) -> Self {
        Self::new("button", selector).with_text(label)
    }

    pub fn also_matches(mut self, selector: &str) -> Self {
        self.selectors.push(selector.to_string());
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    /// `display: none`.
    pub fn hidden(mut self) -> Self {
        self.state.display_none = true;
        self
    }

    pub fn zero_size(mut self) -> Self {
        self.state.width = 0.0;
        self.state.height = 0.0;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.state.disabled = true;
        self
    }

    pub fn rejecting_insert_text(mut self) -> Self {
        self.accepts_insert_text = false;
        self
    }

    pub fn rejecting_paste(mut self) -> Self {
        self.accepts_paste = false;
        self
    }

    pub fn rejecting_select_delete(mut self) -> Self {
        self.accepts_select_delete = false;
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    element: MemoryElement,
    scope: Option<ElementRef>,
    shadow_root: bool,
    files: Vec<String>,
}

/// Something the page did, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomAction {
    Focus(ElementRef),
    SetValue(ElementRef, String),
    Event(ElementRef, String),
    SetHtml(ElementRef, String),
    SelectAllDelete(ElementRef),
    InsertText(ElementRef, String),
    Paste(ElementRef, String),
    SetText(ElementRef, String),
    Click(ElementRef),
    PointerClick(ElementRef),
    SetFiles(ElementRef, Vec<String>),
    Inject { anchor: String, property: String },
    Refresh { anchor: String, method: String },
    Clipboard(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Click,
    Typing,
    Enter,
}

#[derive(Debug, Clone)]
pub enum Effect {
    Reveal(ElementRef),
    Hide(ElementRef),
    AppendText(ElementRef, String),
    Navigate(String),
}

#[derive(Debug, Clone)]
struct Reaction {
    source: ElementRef,
    trigger: Trigger,
    effect: Effect,
}

#[derive(Debug, Clone)]
struct ComponentSlot {
    anchor: String,
    property: String,
    value: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct MemoryDom {
    url: String,
    nodes: Vec<Node>,
    cookies: BTreeMap<String, String>,
    components: Vec<ComponentSlot>,
    reactions: Vec<Reaction>,
    actions: Vec<DomAction>,
    clipboard: Option<String>,
}

impl MemoryDom {
    fn node(&self, el: ElementRef) -> Result<&Node> {
        self.nodes
            .get(el.0 as usize)
            .ok_or_else(|| anyhow!("unknown element {}", el))
    }

    fn node_mut(&mut self, el: ElementRef) -> Result<&mut Node> {
        self.nodes
            .get_mut(el.0 as usize)
            .ok_or_else(|| anyhow!("unknown element {}", el))
    }

    fn live_node_mut(&mut self, el: ElementRef) -> Result<&mut Node> {
        let node = self.node_mut(el)?;
        if !node.element.state.attached {
            bail!("element {} is detached", el);
        }
        Ok(node)
    }

    fn fire(&mut self, source: ElementRef, trigger: Trigger) {
        let effects: Vec<Effect> = self
            .reactions
            .iter()
            .filter(|r| r.source == source && r.trigger == trigger)
            .map(|r| r.effect.clone())
            .collect();
        for effect in effects {
            match effect {
                Effect::Reveal(target) => {
                    if let Ok(node) = self.node_mut(target) {
                        node.element.state.display_none = false;
                        node.element.state.visibility_hidden = false;
                        node.element.state.attached = true;
                    }
                }
                Effect::Hide(target) => {
                    if let Ok(node) = self.node_mut(target) {
                        node.element.state.display_none = true;
                    }
                }
                Effect::AppendText(target, text) => {
                    if let Ok(node) = self.node_mut(target) {
                        node.element.text.push_str(&text);
                    }
                }
                Effect::Navigate(url) => self.url = url,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryPage {
    dom: Mutex<MemoryDom>,
}

impl MemoryPage {
    pub fn new(url: &str) -> Self {
        Self {
            dom: Mutex::new(MemoryDom {
                url: url.to_string(),
                ..Default::default()
            }),
        }
    }

    fn with_dom<T>(&self, f: impl FnOnce(&mut MemoryDom) -> T) -> T {
        let mut guard = match self.dom.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn push(&self, element: MemoryElement, scope: Option<ElementRef>) -> ElementRef {
        self.with_dom(|dom| {
            let id = ElementRef(dom.nodes.len() as u64);
            if let Some(host) = scope {
                if let Ok(node) = dom.node_mut(host) {
                    node.shadow_root = true;
                }
            }
            dom.nodes.push(Node {
                element,
                scope,
                shadow_root: false,
                files: Vec::new(),
            });
            id
        })
    }

    /// Add an element to the top-level document.
    pub fn add(&self, element: MemoryElement) -> ElementRef {
        self.push(element, None)
    }

    /// Add an element inside the sub-tree root attached to `host`.
    pub fn add_in_shadow(&self, host: ElementRef, element: MemoryElement) -> ElementRef {
        self.push(element, Some(host))
    }

    pub fn navigate(&self, url: &str) {
        self.with_dom(|dom| dom.url = url.to_string());
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.with_dom(|dom| {
            dom.cookies.insert(name.to_string(), value.to_string());
        });
    }

    pub fn detach(&self, el: ElementRef) {
        self.with_dom(|dom| {
            if let Ok(node) = dom.node_mut(el) {
                node.element.state.attached = false;
            }
        });
    }

    pub fn set_hidden(&self, el: ElementRef, hidden: bool) {
        self.with_dom(|dom| {
            if let Ok(node) = dom.node_mut(el) {
                node.element.state.display_none = hidden;
            }
        });
    }

    /// Declare a component property reachable from `anchor`.
    pub fn add_component(&self, anchor: &str, property: &str) {
        self.with_dom(|dom| {
            dom.components.push(ComponentSlot {
                anchor: anchor.to_string(),
                property: property.to_string(),
                value: None,
            })
        });
    }

    pub fn on(&self, source: ElementRef, trigger: Trigger, effect: Effect) {
        self.with_dom(|dom| {
            dom.reactions.push(Reaction {
                source,
                trigger,
                effect,
            })
        });
    }

    pub fn value_of(&self, el: ElementRef) -> String {
        self.with_dom(|dom| dom.node(el).map(|n| n.element.value.clone()).unwrap_or_default())
    }

    pub fn text_of(&self, el: ElementRef) -> String {
        self.with_dom(|dom| dom.node(el).map(|n| n.element.text.clone()).unwrap_or_default())
    }

    pub fn files_of(&self, el: ElementRef) -> Vec<String> {
        self.with_dom(|dom| dom.node(el).map(|n| n.files.clone()).unwrap_or_default())
    }

    pub fn component_value(&self, anchor: &str, property: &str) -> Option<serde_json::Value> {
        self.with_dom(|dom| {
            dom.components
                .iter()
                .find(|c| c.anchor == anchor && c.property == property)
                .and_then(|c| c.value.clone())
        })
    }

    pub fn clipboard(&self) -> Option<String> {
        self.with_dom(|dom| dom.clipboard.clone())
    }

    pub fn actions(&self) -> Vec<DomAction> {
        self.with_dom(|dom| dom.actions.clone())
    }

    pub fn clicks_on(&self, el: ElementRef) -> usize {
        self.actions()
            .iter()
            .filter(|a| matches!(a, DomAction::Click(e) | DomAction::PointerClick(e) if *e == el))
            .count()
    }

    pub fn events_on(&self, el: ElementRef) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                DomAction::Event(e, name) if e == el => Some(name),
                _ => None,
            })
            .collect()
    }
}

fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn is_value_tag(tag: &str) -> bool {
    tag == "input" || tag == "textarea"
}

#[async_trait]
impl PageDriver for MemoryPage {
    async fn current_url(&self) -> Result<String> {
        Ok(self.with_dom(|dom| dom.url.clone()))
    }

    async fn query_all(&self, scope: Option<ElementRef>, selector: &str) -> Result<Vec<ElementRef>> {
        if selector.trim().is_empty() {
            bail!("empty selector");
        }
        Ok(self.with_dom(|dom| {
            dom.nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.scope == scope && n.element.state.attached)
                .filter(|(_, n)| n.element.selectors.iter().any(|s| s == selector))
                .map(|(i, _)| ElementRef(i as u64))
                .collect()
        }))
    }

    async fn shadow_hosts(&self, scope: Option<ElementRef>) -> Result<Vec<ElementRef>> {
        Ok(self.with_dom(|dom| {
            dom.nodes
                .iter()
                .enumerate()
                .filter(|(_, n)| n.scope == scope && n.shadow_root && n.element.state.attached)
                .map(|(i, _)| ElementRef(i as u64))
                .collect()
        }))
    }

    async fn element_state(&self, el: ElementRef) -> Result<ElementState> {
        self.with_dom(|dom| dom.node(el).map(|n| n.element.state))
    }

    async fn tag_name(&self, el: ElementRef) -> Result<String> {
        self.with_dom(|dom| dom.node(el).map(|n| n.element.tag.clone()))
    }

    async fn text_content(&self, el: ElementRef) -> Result<String> {
        self.with_dom(|dom| dom.node(el).map(|n| n.element.text.clone()))
    }

    async fn value(&self, el: ElementRef) -> Result<String> {
        self.with_dom(|dom| dom.node(el).map(|n| n.element.value.clone()))
    }

    async fn focus(&self, el: ElementRef) -> Result<()> {
        self.with_dom(|dom| {
            dom.live_node_mut(el)?;
            dom.actions.push(DomAction::Focus(el));
            Ok(())
        })
    }

    async fn set_native_value(&self, el: ElementRef, value: &str) -> Result<()> {
        self.with_dom(|dom| {
            let node = dom.live_node_mut(el)?;
            if !is_value_tag(&node.element.tag) {
                bail!("{} <{}> has no native value setter", el, node.element.tag);
            }
            node.element.value = value.to_string();
            dom.actions.push(DomAction::SetValue(el, value.to_string()));
            Ok(())
        })
    }

    async fn dispatch_event(&self, el: ElementRef, event: DomEvent) -> Result<()> {
        self.with_dom(|dom| {
            dom.live_node_mut(el)?;
            dom.actions
                .push(DomAction::Event(el, event.name().to_string()));
            if matches!(&event, DomEvent::KeyDown(key) if key == "Enter") {
                dom.fire(el, Trigger::Enter);
            }
            Ok(())
        })
    }

    async fn set_inner_html(&self, el: ElementRef, html: &str) -> Result<()> {
        self.with_dom(|dom| {
            let node = dom.live_node_mut(el)?;
            node.element.text = strip_markup(html);
            dom.actions.push(DomAction::SetHtml(el, html.to_string()));
            Ok(())
        })
    }

    async fn select_all_and_delete(&self, el: ElementRef) -> Result<bool> {
        self.with_dom(|dom| {
            let node = dom.live_node_mut(el)?;
            if !node.element.accepts_select_delete {
                return Ok(false);
            }
            node.element.text.clear();
            if is_value_tag(&node.element.tag) {
                node.element.value.clear();
            }
            dom.actions.push(DomAction::SelectAllDelete(el));
            Ok(true)
        })
    }

    async fn insert_text(&self, el: ElementRef, text: &str) -> Result<bool> {
        self.with_dom(|dom| {
            let node = dom.live_node_mut(el)?;
            if !node.element.accepts_insert_text {
                return Ok(false);
            }
            if is_value_tag(&node.element.tag) {
                node.element.value.push_str(text);
            } else {
                node.element.text.push_str(text);
            }
            dom.actions.push(DomAction::InsertText(el, text.to_string()));
            dom.fire(el, Trigger::Typing);
            Ok(true)
        })
    }

    async fn dispatch_paste(&self, el: ElementRef, text: &str) -> Result<bool> {
        self.with_dom(|dom| {
            let node = dom.live_node_mut(el)?;
            if !node.element.accepts_paste {
                return Ok(false);
            }
            node.element.text.push_str(text);
            dom.actions.push(DomAction::Paste(el, text.to_string()));
            dom.fire(el, Trigger::Typing);
            Ok(true)
        })
    }

    async fn set_text_content(&self, el: ElementRef, text: &str) -> Result<()> {
        self.with_dom(|dom| {
            let node = dom.live_node_mut(el)?;
            node.element.text = text.to_string();
            dom.actions.push(DomAction::SetText(el, text.to_string()));
            Ok(())
        })
    }

    async fn click(&self, el: ElementRef) -> Result<()> {
        self.with_dom(|dom| {
            dom.live_node_mut(el)?;
            dom.actions.push(DomAction::Click(el));
            dom.fire(el, Trigger::Click);
            Ok(())
        })
    }

    async fn pointer_click(&self, el: ElementRef) -> Result<()> {
        self.with_dom(|dom| {
            dom.live_node_mut(el)?;
            dom.actions.push(DomAction::PointerClick(el));
            dom.fire(el, Trigger::Click);
            Ok(())
        })
    }

    async fn set_input_files(&self, el: ElementRef, files: &[FilePayload]) -> Result<()> {
        self.with_dom(|dom| {
            let node = dom.live_node_mut(el)?;
            if node.element.tag != "input" {
                bail!("{} is not a file input", el);
            }
            let names: Vec<String> = files.iter().map(|f| f.file_name.clone()).collect();
            node.files = names.clone();
            dom.actions.push(DomAction::SetFiles(el, names));
            Ok(())
        })
    }

    async fn cookie(&self, name: &str) -> Result<Option<String>> {
        Ok(self.with_dom(|dom| dom.cookies.get(name).cloned()))
    }

    async fn cookie_header(&self) -> Result<String> {
        Ok(self.with_dom(|dom| {
            dom.cookies
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ")
        }))
    }

    async fn inject_component_state(
        &self,
        candidate: &InjectionCandidate,
        value: &serde_json::Value,
    ) -> Result<usize> {
        Ok(self.with_dom(|dom| {
            let anchor_present = dom.nodes.iter().any(|n| {
                n.element.state.attached && n.element.selectors.iter().any(|s| *s == candidate.anchor)
            });
            if !anchor_present {
                return 0;
            }
            let Some(slot) = dom
                .components
                .iter_mut()
                .find(|c| c.anchor == candidate.anchor && c.property == candidate.property)
            else {
                return 0;
            };
            slot.value = Some(value.clone());
            dom.actions.push(DomAction::Inject {
                anchor: candidate.anchor.clone(),
                property: candidate.property.clone(),
            });
            if let Some(method) = &candidate.refresh {
                dom.actions.push(DomAction::Refresh {
                    anchor: candidate.anchor.clone(),
                    method: method.clone(),
                });
            }
            1
        }))
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        self.with_dom(|dom| {
            dom.clipboard = Some(text.to_string());
            dom.actions.push(DomAction::Clipboard(text.to_string()));
        });
        Ok(())
    }
}
