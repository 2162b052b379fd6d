use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an element on the driven page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementRef(pub u64);

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el#{}", self.0)
    }
}

/// Layout and liveness snapshot taken right before an element is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementState {
    pub attached: bool,
    pub width: f64,
    pub height: f64,
    pub display_none: bool,
    pub visibility_hidden: bool,
    pub disabled: bool,
}

impl ElementState {
    pub fn is_visible(&self) -> bool {
        self.attached
            && self.width > 0.0
            && self.height > 0.0
            && !self.display_none
            && !self.visibility_hidden
    }

    pub fn is_writable(&self) -> bool {
        self.is_visible() && !self.disabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomEvent {
    Focus,
    Input,
    Change,
    Blur,
    KeyDown(String),
}

impl DomEvent {
    pub fn name(&self) -> &str {
        match self {
            DomEvent::Focus => "focus",
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::Blur => "blur",
            DomEvent::KeyDown(_) => "keydown",
        }
    }
}

/// File constructed in-page and handed to an `<input type=file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    pub file_name: String,
    pub mime_type: String,
    pub base64: String,
}

/// Where to look for a framework component and which property to set on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionCandidate {
    /// CSS selector of the element the component instance hangs off.
    pub anchor: String,
    pub property: String,
    /// How many levels of child components to walk from the anchor.
    #[serde(default = "default_injection_depth")]
    pub max_depth: usize,
    /// Method invoked on the owning component after the property is set.
    #[serde(default)]
    pub refresh: Option<String>,
}

fn default_injection_depth() -> usize {
    3
}

impl InjectionCandidate {
    pub fn new(anchor: &str, property: &str) -> Self {
        Self {
            anchor: anchor.to_string(),
            property: property.to_string(),
            max_depth: default_injection_depth(),
            refresh: None,
        }
    }

    pub fn with_refresh(mut self, method: &str) -> Self {
        self.refresh = Some(method.to_string());
        self
    }
}

/// Everything the engine needs from a live page.
///
/// `scope: None` means the top-level document; `Some(host)` means the
/// sub-tree root attached to `host`.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn current_url(&self) -> Result<String>;

    async fn query_all(&self, scope: Option<ElementRef>, selector: &str) -> Result<Vec<ElementRef>>;

    /// Elements in `scope` that expose an attached sub-tree root.
    async fn shadow_hosts(&self, scope: Option<ElementRef>) -> Result<Vec<ElementRef>>;

    async fn element_state(&self, el: ElementRef) -> Result<ElementState>;

    /// Lower-case tag name.
    async fn tag_name(&self, el: ElementRef) -> Result<String>;

    async fn text_content(&self, el: ElementRef) -> Result<String>;

    async fn value(&self, el: ElementRef) -> Result<String>;

    async fn focus(&self, el: ElementRef) -> Result<()>;

    /// Assign `value` through the element prototype's property setter.
    async fn set_native_value(&self, el: ElementRef, value: &str) -> Result<()>;

    async fn dispatch_event(&self, el: ElementRef, event: DomEvent) -> Result<()>;

    async fn set_inner_html(&self, el: ElementRef, html: &str) -> Result<()>;

    /// Select everything in the region and delete it. `false` if the page refused.
    async fn select_all_and_delete(&self, el: ElementRef) -> Result<bool>;

    /// `document.execCommand('insertText')` at the caret.
    async fn insert_text(&self, el: ElementRef, text: &str) -> Result<bool>;

    /// Dispatch a synthetic paste carrying `text`. `false` if nothing consumed it.
    async fn dispatch_paste(&self, el: ElementRef, text: &str) -> Result<bool>;

    /// Plain `textContent` assignment. Fires no events; callers dispatch `input`.
    async fn set_text_content(&self, el: ElementRef, text: &str) -> Result<()>;

    async fn click(&self, el: ElementRef) -> Result<()>;

    /// pointerdown, mousedown, pointerup, mouseup, click.
    async fn pointer_click(&self, el: ElementRef) -> Result<()>;

    /// Replace the input's file list. Fires no events; callers dispatch `change`.
    async fn set_input_files(&self, el: ElementRef, files: &[FilePayload]) -> Result<()>;

    async fn cookie(&self, name: &str) -> Result<Option<String>>;

    /// Full `document.cookie` string, forwarded to private endpoints.
    async fn cookie_header(&self) -> Result<String>;

    /// Set the candidate property on the first component that has it.
    /// Returns the number of properties changed.
    async fn inject_component_state(
        &self,
        candidate: &InjectionCandidate,
        value: &serde_json::Value,
    ) -> Result<usize>;

    async fn write_clipboard(&self, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_requires_a_box_and_no_hiding_style() {
        let visible = ElementState {
            attached: true,
            width: 10.0,
            height: 4.0,
            ..Default::default()
        };
        assert!(visible.is_visible());
        assert!(!ElementState { width: 0.0, ..visible }.is_visible());
        assert!(!ElementState { display_none: true, ..visible }.is_visible());
        assert!(!ElementState { visibility_hidden: true, ..visible }.is_visible());
        assert!(!ElementState { attached: false, ..visible }.is_visible());
        assert!(!ElementState { disabled: true, ..visible }.is_writable());
    }

    #[test]
    fn injection_candidate_defaults_depth() {
        let candidate: InjectionCandidate =
            serde_json::from_str(r##"{"anchor":"#app","property":"coverUrl"}"##).unwrap();
        assert_eq!(candidate.max_depth, 3);
        assert!(candidate.refresh.is_none());
    }
}
