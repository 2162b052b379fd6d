use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use futures::StreamExt;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::page::{DomEvent, ElementRef, ElementState, FilePayload, InjectionCandidate, PageDriver};

/// Connect to an already-running Chrome instance via CDP
pub async fn connect_to_chrome(port: u16) -> Result<(Browser, Page)> {
    let debug_url = format!("http://127.0.0.1:{}", port);

    let (browser, mut handler) = Browser::connect(&debug_url)
        .await
        .context(format!("Failed to connect to Chrome on port {}", port))?;

    // Spawn the handler to process CDP events
    tokio::spawn(async move {
        while let Some(_event) = handler.next().await {}
    });

    let pages = browser.pages().await.context("Failed to get pages")?;
    let page = pages.into_iter().next().context("No pages found in Chrome")?;

    info!("Connected to Chrome CDP on port {}", port);
    Ok((browser, page))
}

/// Shared helpers prepended to every script.
///
/// Elements are addressed by a `data-autofill-ref` attribute assigned the
/// first time a query returns them; lookups search open shadow roots too.
const PRELUDE: &str = r#"
    const __autofillTag = (el) => {
        if (!el.dataset.autofillRef) {
            window.__autofillSeq = (window.__autofillSeq || 0) + 1;
            el.dataset.autofillRef = String(window.__autofillSeq);
        }
        return Number(el.dataset.autofillRef);
    };
    const __autofillFind = (id) => {
        const sel = '[data-autofill-ref="' + id + '"]';
        const walk = (root, depth) => {
            const hit = root.querySelector(sel);
            if (hit) return hit;
            if (depth >= 8) return null;
            for (const el of root.querySelectorAll('*')) {
                if (el.shadowRoot) {
                    const inner = walk(el.shadowRoot, depth + 1);
                    if (inner) return inner;
                }
            }
            return null;
        };
        return walk(document, 0);
    };
    const __autofillEl = (id) => {
        const el = __autofillFind(id);
        if (!el) throw new Error('detached element ' + id);
        return el;
    };
    const __autofillScope = (id) => {
        if (id === null) return document;
        const host = __autofillFind(id);
        return host && host.shadowRoot ? host.shadowRoot : null;
    };
"#;

fn js_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// `execCommand('copy')` first, then the async clipboard API. The promise is
/// returned so `evaluate` waits for the real outcome.
fn clipboard_script(text: &str) -> String {
    format!(
        r#"
        const text = {};
        const area = document.createElement('textarea');
        area.value = text;
        area.style.cssText = 'position:fixed;top:-1000px;opacity:0;';
        document.body.appendChild(area);
        area.select();
        let ok = false;
        try {{ ok = document.execCommand('copy'); }} catch (_) {{}}
        area.remove();
        if (!ok && navigator.clipboard) {{
            return navigator.clipboard.writeText(text).then(() => true, () => false);
        }}
        return ok;
        "#,
        js_literal(text)
    )
}

/// [`PageDriver`] over a live Chrome tab.
#[derive(Clone)]
pub struct CdpPage {
    page: Page,
}

impl CdpPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Run `body` inside an IIFE with the prelude in scope.
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T> {
        let script = format!("(function() {{ {}\n{} }})()", PRELUDE, body);
        let result = self
            .page
            .evaluate(script.as_str())
            .await
            .context("Failed to execute JavaScript")?;
        result
            .into_value()
            .context("Unexpected JavaScript result shape")
    }

    async fn eval_on<T: DeserializeOwned>(&self, el: ElementRef, body: &str) -> Result<T> {
        self.eval(&format!("const el = __autofillEl({});\n{}", el.0, body))
            .await
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn current_url(&self) -> Result<String> {
        self.eval("return window.location.href;").await
    }

    async fn query_all(&self, scope: Option<ElementRef>, selector: &str) -> Result<Vec<ElementRef>> {
        let ids: Vec<u64> = self
            .eval(&format!(
                r#"
                const root = __autofillScope({});
                if (!root) return [];
                try {{
                    return Array.from(root.querySelectorAll({})).map(__autofillTag);
                }} catch (_) {{
                    return [];
                }}
                "#,
                js_literal(&scope.map(|s| s.0)),
                js_literal(selector)
            ))
            .await?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    async fn shadow_hosts(&self, scope: Option<ElementRef>) -> Result<Vec<ElementRef>> {
        let ids: Vec<u64> = self
            .eval(&format!(
                r#"
                const root = __autofillScope({});
                if (!root) return [];
                return Array.from(root.querySelectorAll('*'))
                    .filter((el) => !!el.shadowRoot)
                    .map(__autofillTag);
                "#,
                js_literal(&scope.map(|s| s.0))
            ))
            .await?;
        Ok(ids.into_iter().map(ElementRef).collect())
    }

    async fn element_state(&self, el: ElementRef) -> Result<ElementState> {
        self.eval(&format!(
            r#"
            const el = __autofillFind({});
            if (!el || !el.isConnected) return {{ attached: false }};
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            return {{
                attached: true,
                width: rect.width,
                height: rect.height,
                displayNone: style.display === 'none',
                visibilityHidden: style.visibility === 'hidden',
                disabled: !!el.disabled || el.getAttribute('aria-disabled') === 'true',
            }};
            "#,
            el.0
        ))
        .await
    }

    async fn tag_name(&self, el: ElementRef) -> Result<String> {
        self.eval_on(el, "return el.tagName.toLowerCase();").await
    }

    async fn text_content(&self, el: ElementRef) -> Result<String> {
        self.eval_on(el, "return el.innerText || el.textContent || '';")
            .await
    }

    async fn value(&self, el: ElementRef) -> Result<String> {
        self.eval_on(el, "return typeof el.value === 'string' ? el.value : '';")
            .await
    }

    async fn focus(&self, el: ElementRef) -> Result<()> {
        self.eval_on::<bool>(el, "el.focus(); return true;").await?;
        Ok(())
    }

    async fn set_native_value(&self, el: ElementRef, value: &str) -> Result<()> {
        self.eval_on::<bool>(
            el,
            &format!(
                r#"
                const proto = el.tagName === 'TEXTAREA'
                    ? window.HTMLTextAreaElement.prototype
                    : window.HTMLInputElement.prototype;
                const descriptor = Object.getOwnPropertyDescriptor(proto, 'value');
                if (!descriptor || !descriptor.set) throw new Error('no native value setter');
                descriptor.set.call(el, {});
                return true;
                "#,
                js_literal(value)
            ),
        )
        .await?;
        Ok(())
    }

    async fn dispatch_event(&self, el: ElementRef, event: DomEvent) -> Result<()> {
        let body = match &event {
            DomEvent::KeyDown(key) => format!(
                r#"
                const key = {};
                const code = key === 'Enter' ? 13 : (key === ' ' ? 32 : 0);
                for (const type of ['keydown', 'keypress', 'keyup']) {{
                    el.dispatchEvent(new KeyboardEvent(type, {{ key, keyCode: code, which: code, bubbles: true }}));
                }}
                return true;
                "#,
                js_literal(key)
            ),
            DomEvent::Focus => "el.focus(); el.dispatchEvent(new FocusEvent('focus')); return true;".to_string(),
            DomEvent::Blur => "el.dispatchEvent(new FocusEvent('blur')); el.dispatchEvent(new FocusEvent('focusout', { bubbles: true })); return true;".to_string(),
            other => format!(
                "el.dispatchEvent(new Event({}, {{ bubbles: true }})); return true;",
                js_literal(other.name())
            ),
        };
        self.eval_on::<bool>(el, &body).await?;
        Ok(())
    }

    async fn set_inner_html(&self, el: ElementRef, html: &str) -> Result<()> {
        self.eval_on::<bool>(el, &format!("el.innerHTML = {}; return true;", js_literal(html)))
            .await?;
        Ok(())
    }

    async fn select_all_and_delete(&self, el: ElementRef) -> Result<bool> {
        self.eval_on(
            el,
            r#"
            el.focus();
            const selection = window.getSelection();
            const range = document.createRange();
            range.selectNodeContents(el);
            selection.removeAllRanges();
            selection.addRange(range);
            return document.execCommand('delete', false);
            "#,
        )
        .await
    }

    async fn insert_text(&self, el: ElementRef, text: &str) -> Result<bool> {
        self.eval_on(
            el,
            &format!(
                r#"
                el.focus();
                if (el.isContentEditable) {{
                    const selection = window.getSelection();
                    const range = document.createRange();
                    range.selectNodeContents(el);
                    range.collapse(false);
                    selection.removeAllRanges();
                    selection.addRange(range);
                }}
                return document.execCommand('insertText', false, {});
                "#,
                js_literal(text)
            ),
        )
        .await
    }

    async fn dispatch_paste(&self, el: ElementRef, text: &str) -> Result<bool> {
        self.eval_on(
            el,
            &format!(
                r#"
                el.focus();
                const data = new DataTransfer();
                data.setData('text/plain', {});
                const event = new ClipboardEvent('paste', {{ clipboardData: data, bubbles: true, cancelable: true }});
                el.dispatchEvent(event);
                return event.defaultPrevented;
                "#,
                js_literal(text)
            ),
        )
        .await
    }

    async fn set_text_content(&self, el: ElementRef, text: &str) -> Result<()> {
        self.eval_on::<bool>(
            el,
            &format!(
                "el.textContent = {}; return true;",
                js_literal(text)
            ),
        )
        .await?;
        Ok(())
    }

    async fn click(&self, el: ElementRef) -> Result<()> {
        self.eval_on::<bool>(el, "el.click(); return true;").await?;
        Ok(())
    }

    async fn pointer_click(&self, el: ElementRef) -> Result<()> {
        self.eval_on::<bool>(
            el,
            r#"
            const rect = el.getBoundingClientRect();
            const init = {
                bubbles: true,
                cancelable: true,
                clientX: rect.left + rect.width / 2,
                clientY: rect.top + rect.height / 2,
                button: 0,
            };
            el.dispatchEvent(new PointerEvent('pointerdown', init));
            el.dispatchEvent(new MouseEvent('mousedown', init));
            el.dispatchEvent(new PointerEvent('pointerup', init));
            el.dispatchEvent(new MouseEvent('mouseup', init));
            el.dispatchEvent(new MouseEvent('click', init));
            return true;
            "#,
        )
        .await?;
        Ok(())
    }

    async fn set_input_files(&self, el: ElementRef, files: &[FilePayload]) -> Result<()> {
        let specs: Vec<serde_json::Value> = files
            .iter()
            .map(|f| {
                serde_json::json!({
                    "name": f.file_name,
                    "type": f.mime_type,
                    "data": f.base64,
                })
            })
            .collect();
        let count: usize = self
            .eval_on(
                el,
                &format!(
                    r#"
                    const transfer = new DataTransfer();
                    for (const spec of {}) {{
                        const raw = atob(spec.data);
                        const bytes = new Uint8Array(raw.length);
                        for (let i = 0; i < raw.length; i++) bytes[i] = raw.charCodeAt(i);
                        transfer.items.add(new File([bytes], spec.name, {{ type: spec.type }}));
                    }}
                    el.files = transfer.files;
                    return el.files ? el.files.length : 0;
                    "#,
                    js_literal(&specs)
                ),
            )
            .await?;
        debug!("[cdp] file input {} now holds {} file(s)", el, count);
        Ok(())
    }

    async fn cookie(&self, name: &str) -> Result<Option<String>> {
        // `null` does not survive by-value evaluation, so a miss comes back as ''.
        let value: String = self
            .eval(&format!(
            r#"
            const name = {};
            for (const part of document.cookie.split(';')) {{
                const idx = part.indexOf('=');
                if (idx < 0) continue;
                if (part.slice(0, idx).trim() === name) return decodeURIComponent(part.slice(idx + 1).trim());
            }}
            return '';
            "#,
                js_literal(name)
            ))
            .await?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    async fn cookie_header(&self) -> Result<String> {
        self.eval("return document.cookie || '';").await
    }

    async fn inject_component_state(
        &self,
        candidate: &InjectionCandidate,
        value: &serde_json::Value,
    ) -> Result<usize> {
        self.eval(&format!(
            r#"
            const candidate = {};
            const value = {};
            const anchor = document.querySelector(candidate.anchor);
            if (!anchor) return 0;
            const roots = [];
            if (anchor.__vue__) roots.push(anchor.__vue__);
            if (anchor.__vueParentComponent) roots.push(anchor.__vueParentComponent.proxy || anchor.__vueParentComponent);
            if (anchor.__vue_app__ && anchor.__vue_app__._instance) roots.push(anchor.__vue_app__._instance.proxy);
            const children = (vm) => {{
                if (vm.$children) return vm.$children;
                const sub = vm.$ && vm.$.subTree;
                if (!sub || !Array.isArray(sub.children)) return [];
                return sub.children.filter((c) => c && c.component).map((c) => c.component.proxy);
            }};
            let queue = roots.map((vm) => [vm, 0]);
            while (queue.length) {{
                const [vm, depth] = queue.shift();
                if (!vm) continue;
                if (candidate.property in vm) {{
                    vm[candidate.property] = value;
                    if (candidate.refresh && typeof vm[candidate.refresh] === 'function') {{
                        try {{ vm[candidate.refresh](value); }} catch (_) {{}}
                    }}
                    return 1;
                }}
                if (depth < candidate.maxDepth) {{
                    for (const child of children(vm)) queue.push([child, depth + 1]);
                }}
            }}
            return 0;
            "#,
            js_literal(candidate),
            js_literal(value)
        ))
        .await
    }

    async fn write_clipboard(&self, text: &str) -> Result<()> {
        let copied: bool = self.eval(&clipboard_script(text)).await?;
        if !copied {
            anyhow::bail!("clipboard write rejected by the page");
        }
        Ok(())
    }
}
