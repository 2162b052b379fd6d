use futures::future::join_all;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::time::Duration;

use super::descriptor::{ContentType, SelectorSpec, SpecialHandling};
use super::models::{Field, ImageAsset};
use crate::browser::{DomEvent, ElementRef, FilePayload, InjectionCandidate};
use crate::context::EngineContext;
use crate::error::{Error, Result};
use crate::scheduler::{poll_until, retry_attempts};

/// Sub-tree recursion limit for shadow-aware queries.
pub const MAX_SHADOW_DEPTH: usize = 8;

// ---------------------------------------------------------------------------
// discovery

/// All matches for `selector`, top-level document first, then each attached
/// sub-tree breadth-first when `shadow` is set.
pub async fn query_deep(ctx: &EngineContext, selector: &str, shadow: bool) -> Result<Vec<ElementRef>> {
    let page = ctx.page();
    let mut found = page.query_all(None, selector).await?;
    if !shadow {
        return Ok(found);
    }
    let mut hosts: VecDeque<(ElementRef, usize)> = page
        .shadow_hosts(None)
        .await?
        .into_iter()
        .map(|host| (host, 1))
        .collect();
    while let Some((host, depth)) = hosts.pop_front() {
        found.extend(page.query_all(Some(host), selector).await?);
        if depth < MAX_SHADOW_DEPTH {
            for inner in page.shadow_hosts(Some(host)).await? {
                hosts.push_back((inner, depth + 1));
            }
        }
    }
    Ok(found)
}

pub async fn is_visible(ctx: &EngineContext, el: ElementRef) -> bool {
    match ctx.page().element_state(el).await {
        Ok(state) => state.is_visible(),
        Err(e) => {
            debug!("[discovery] state of {} unavailable: {:#}", el, e);
            false
        }
    }
}

async fn first_visible_of(ctx: &EngineContext, matches: Vec<ElementRef>) -> Option<ElementRef> {
    for el in matches {
        if is_visible(ctx, el).await {
            return Some(el);
        }
    }
    None
}

/// First visible match, scanning candidates in order.
pub async fn first_visible<S: AsRef<str>>(ctx: &EngineContext, candidates: &[S], shadow: bool) -> Option<ElementRef> {
    for selector in candidates {
        let selector = selector.as_ref();
        match query_deep(ctx, selector, shadow).await {
            Ok(matches) => {
                if let Some(el) = first_visible_of(ctx, matches).await {
                    return Some(el);
                }
            }
            Err(e) => debug!("[discovery] `{}` failed: {}", selector, e),
        }
    }
    None
}

/// The first candidate with any match decides; its first visible element is
/// returned. A candidate matching only hidden elements yields `None`.
async fn first_present<S: AsRef<str>>(ctx: &EngineContext, candidates: &[S], shadow: bool) -> Option<ElementRef> {
    for selector in candidates {
        let selector = selector.as_ref();
        match query_deep(ctx, selector, shadow).await {
            Ok(matches) if matches.is_empty() => continue,
            Ok(matches) => return first_visible_of(ctx, matches).await,
            Err(e) => debug!("[discovery] `{}` failed: {}", selector, e),
        }
    }
    None
}

/// Resolve one selector spec under the descriptor's handling flags.
pub async fn locate(ctx: &EngineContext, spec: &SelectorSpec, flags: &SpecialHandling) -> Result<Option<ElementRef>> {
    let shadow = flags.shadow_dom;
    let el = match spec {
        SelectorSpec::Single(selector) => first_visible(ctx, &[selector], shadow).await,
        SelectorSpec::Alternatives(list) if flags.visible_candidates => first_visible(ctx, list, shadow).await,
        SelectorSpec::Alternatives(list) => first_present(ctx, list, shadow).await,
    };
    Ok(el)
}

pub async fn wait_for_visible<S: AsRef<str>>(
    ctx: &EngineContext,
    candidates: &[S],
    timeout: Duration,
    shadow: bool,
) -> Option<ElementRef> {
    if candidates.is_empty() {
        return None;
    }
    poll_until(ctx.scheduler(), timeout, ctx.config.poll_interval(), move || async move {
        first_visible(ctx, candidates, shadow).await
    })
    .await
}

/// Like [`wait_for_visible`] but accepts hidden elements; file inputs are
/// usually `display:none`.
pub async fn wait_for_present<S: AsRef<str>>(
    ctx: &EngineContext,
    candidates: &[S],
    timeout: Duration,
) -> Option<ElementRef> {
    if candidates.is_empty() {
        return None;
    }
    poll_until(ctx.scheduler(), timeout, ctx.config.poll_interval(), move || async move {
        for selector in candidates {
            if let Ok(matches) = ctx.page().query_all(None, selector.as_ref()).await {
                if let Some(el) = matches.first() {
                    return Some(*el);
                }
            }
        }
        None
    })
    .await
}

/// Re-validate a discovered element right before writing to it.
pub async fn ensure_writable(ctx: &EngineContext, el: ElementRef, field: Field) -> Result<()> {
    let state = ctx.page().element_state(el).await?;
    if state.is_writable() {
        Ok(())
    } else {
        Err(Error::ElementNotFound { field })
    }
}

async fn require_writable(ctx: &EngineContext, el: ElementRef) -> Result<()> {
    let state = ctx.page().element_state(el).await?;
    if !state.is_writable() {
        return Err(Error::Page(format!("{} is detached, hidden or disabled", el)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// fill primitives

/// Controlled-input write: native setter, then `input`/`change`/`blur`.
pub async fn set_input_value(ctx: &EngineContext, el: ElementRef, value: &str) -> Result<()> {
    require_writable(ctx, el).await?;
    let page = ctx.page();
    page.focus(el).await?;
    page.set_native_value(el, "").await?;
    page.set_native_value(el, value).await?;
    for event in [DomEvent::Input, DomEvent::Change, DomEvent::Blur] {
        page.dispatch_event(el, event).await?;
        ctx.pace().await;
    }
    let written = page.value(el).await?;
    if written != value {
        warn!(
            "[fill] {} holds {} chars after write, expected {}",
            el,
            written.chars().count(),
            value.chars().count()
        );
    }
    Ok(())
}

/// How rich-text content ended up in the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorWrite {
    Html,
    InsertText,
    Paste,
    TextContent,
}

pub async fn set_editor_content(
    ctx: &EngineContext,
    el: ElementRef,
    content: &str,
    content_type: ContentType,
) -> Result<EditorWrite> {
    require_writable(ctx, el).await?;
    let page = ctx.page();
    page.focus(el).await?;

    if content_type == ContentType::Html {
        page.set_inner_html(el, content).await?;
        page.dispatch_event(el, DomEvent::Input).await?;
        ctx.pace().await;
        return Ok(EditorWrite::Html);
    }

    clear_region(ctx, el).await?;
    if page.insert_text(el, content).await? && region_contains(ctx, el, content).await? {
        ctx.pace().await;
        return Ok(EditorWrite::InsertText);
    }
    debug!("[fill] insertText not accepted by {}, trying paste", el);

    clear_region(ctx, el).await?;
    if page.dispatch_paste(el, content).await? && region_contains(ctx, el, content).await? {
        ctx.pace().await;
        return Ok(EditorWrite::Paste);
    }
    debug!("[fill] paste not accepted by {}, assigning text", el);

    page.set_text_content(el, content).await?;
    page.dispatch_event(el, DomEvent::Input).await?;
    ctx.pace().await;
    Ok(EditorWrite::TextContent)
}

async fn clear_region(ctx: &EngineContext, el: ElementRef) -> Result<()> {
    if !ctx.page().select_all_and_delete(el).await? {
        ctx.page().set_text_content(el, "").await?;
    }
    Ok(())
}

fn is_value_tag(tag: &str) -> bool {
    tag == "input" || tag == "textarea"
}

/// Text of a region: `value` for form controls, `textContent` otherwise.
pub async fn current_text(ctx: &EngineContext, el: ElementRef) -> Result<String> {
    let page = ctx.page();
    if is_value_tag(&page.tag_name(el).await?) {
        Ok(page.value(el).await?)
    } else {
        Ok(page.text_content(el).await?)
    }
}

/// Plain text into any text element, picking the primitive by element kind:
/// form controls take the native setter, everything else the editor path.
pub async fn write_text(ctx: &EngineContext, el: ElementRef, text: &str, content_type: ContentType) -> Result<()> {
    if is_value_tag(&ctx.page().tag_name(el).await?) {
        set_input_value(ctx, el, text).await
    } else {
        set_editor_content(ctx, el, text, content_type).await.map(|_| ())
    }
}

fn squeeze(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Editors split lines into blocks, so whitespace is ignored.
async fn region_contains(ctx: &EngineContext, el: ElementRef, content: &str) -> Result<bool> {
    let current = current_text(ctx, el).await?;
    Ok(squeeze(&current).contains(&squeeze(content)))
}

/// Append at the caret: insertText, then paste, then text assignment.
async fn type_text(ctx: &EngineContext, el: ElementRef, text: &str) -> Result<()> {
    let page = ctx.page();
    if !page.insert_text(el, text).await? && !page.dispatch_paste(el, text).await? {
        let current = page.text_content(el).await?;
        page.set_text_content(el, &format!("{}{}", current, text)).await?;
        page.dispatch_event(el, DomEvent::Input).await?;
    }
    ctx.pace().await;
    Ok(())
}

fn payload(image: &ImageAsset) -> FilePayload {
    FilePayload {
        file_name: image.file_name.clone(),
        mime_type: image.mime_type.clone(),
        base64: image.data.trim().to_string(),
    }
}

/// Hand `images` to the file input behind the discovered upload area.
pub async fn upload_images(
    ctx: &EngineContext,
    area: ElementRef,
    file_inputs: &[String],
    images: &[ImageAsset],
) -> Result<()> {
    let page = ctx.page();
    let input = if file_inputs.is_empty() {
        area
    } else {
        wait_for_present(ctx, file_inputs, ctx.config.element_wait_timeout())
            .await
            .ok_or_else(|| Error::upload("ui:file-input", "no image file input"))?
    };
    let files: Vec<FilePayload> = images.iter().map(payload).collect();
    page.set_input_files(input, &files).await?;
    page.dispatch_event(input, DomEvent::Change).await?;
    ctx.pace().await;
    info!("[fill] handed {} image(s) to {}", files.len(), input);
    Ok(())
}

// ---------------------------------------------------------------------------
// cover chain: upload -> state injection -> UI simulation

/// Private cover upload endpoint.
#[derive(Debug, Clone)]
pub struct UploadEndpoint {
    pub url: String,
    /// Cookie holding the anti-forgery token.
    pub token_cookie: String,
    pub token_field: String,
    pub file_field: String,
    pub extra_fields: Vec<(String, String)>,
}

/// Selectors for the manual cover dialog.
#[derive(Debug, Clone, Default)]
pub struct CoverUi {
    pub trigger: Vec<String>,
    pub aspect_tab: Vec<String>,
    pub file_input: Vec<String>,
    pub confirm: Vec<String>,
}

/// One cover image the platform keeps, e.g. one aspect ratio.
#[derive(Debug, Clone)]
pub struct CoverSlot {
    pub label: String,
    pub upload: Option<UploadEndpoint>,
    pub injection: Vec<InjectionCandidate>,
    pub ui: CoverUi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverTier {
    Injected { property: String },
    UiSimulated,
}

impl fmt::Display for CoverTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverTier::Injected { property } => write!(f, "injected:{}", property),
            CoverTier::UiSimulated => f.write_str("ui"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoverOutcome {
    pub slot: String,
    pub tier: CoverTier,
    pub hosted_url: Option<String>,
    pub diagnostics: Vec<String>,
}

/// Run the three-tier chain for one slot.
///
/// Without a hosted URL the local data URL is injected instead. UI
/// simulation only runs when injection changed nothing.
pub async fn apply_cover(
    ctx: &EngineContext,
    platform: &str,
    slot: &CoverSlot,
    image: &ImageAsset,
) -> Result<CoverOutcome> {
    let mut diagnostics = Vec::new();

    let hosted_url = match &slot.upload {
        Some(endpoint) => match upload_cover(ctx, endpoint, image).await {
            Ok(url) => {
                info!("[{} cover] {} uploaded: {}", platform, slot.label, url);
                diagnostics.push(format!("upload=ok({})", url));
                Some(url)
            }
            Err(e) => {
                warn!("[{} cover] {} upload failed: {}", platform, slot.label, e);
                diagnostics.push(format!("upload=failed({})", e));
                None
            }
        },
        None => {
            diagnostics.push("upload=none".to_string());
            None
        }
    };

    let value = Value::String(hosted_url.clone().unwrap_or_else(|| image.data_url()));
    match inject_cover(ctx, &slot.injection, &value).await {
        Ok(property) => {
            info!("[{} cover] {} injected into `{}`", platform, slot.label, property);
            diagnostics.push(format!("inject=ok({})", property));
            return Ok(CoverOutcome {
                slot: slot.label.clone(),
                tier: CoverTier::Injected { property },
                hosted_url,
                diagnostics,
            });
        }
        Err(e) => {
            debug!("[{} cover] {} {}", platform, slot.label, e);
            diagnostics.push(format!("inject=failed({})", e));
        }
    }

    match simulate_cover_ui(ctx, &slot.ui, image).await {
        Ok(()) => {
            info!("[{} cover] {} set through the cover dialog", platform, slot.label);
            diagnostics.push("ui=ok".to_string());
            Ok(CoverOutcome {
                slot: slot.label.clone(),
                tier: CoverTier::UiSimulated,
                hosted_url,
                diagnostics,
            })
        }
        Err(e) => {
            diagnostics.push(format!("ui=failed({})", e));
            warn!("[{} cover] {} exhausted: {}", platform, slot.label, diagnostics.join("; "));
            Err(Error::upload(format!("{} cover", slot.label), diagnostics.join("; ")))
        }
    }
}

/// Slots run concurrently, each through its own chain. Succeeds when at
/// least one slot was set.
pub async fn apply_covers(
    ctx: &EngineContext,
    platform: &str,
    slots: &[CoverSlot],
    image: &ImageAsset,
) -> Result<String> {
    let outcomes = join_all(slots.iter().map(|slot| apply_cover(ctx, platform, slot, image))).await;
    let mut applied = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(outcome) => applied.push(format!("{}={}", outcome.slot, outcome.tier)),
            Err(e) => failures.push(e),
        }
    }
    if applied.is_empty() {
        if failures.len() == 1 {
            if let Some(only) = failures.pop() {
                return Err(only);
            }
        }
        let joined: Vec<String> = failures.iter().map(ToString::to_string).collect();
        return Err(Error::upload("cover", joined.join(" | ")));
    }
    for failure in &failures {
        warn!("[{} cover] partial: {}", platform, failure);
    }
    Ok(applied.join(","))
}

async fn upload_cover(ctx: &EngineContext, endpoint: &UploadEndpoint, image: &ImageAsset) -> Result<String> {
    let page = ctx.page();
    let token = page
        .cookie(&endpoint.token_cookie)
        .await
        .map_err(|e| Error::upload("token", format!("{:#}", e)))?
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::upload("token", format!("cookie `{}` missing", endpoint.token_cookie)))?;
    let cookies = page
        .cookie_header()
        .await
        .map_err(|e| Error::upload("token", format!("{:#}", e)))?;

    let mut form = vec![
        (endpoint.file_field.clone(), image.data_url()),
        (endpoint.token_field.clone(), token),
    ];
    form.extend(endpoint.extra_fields.iter().cloned());
    let headers = vec![("cookie".to_string(), cookies)];

    let body = ctx
        .transport
        .post_form(&endpoint.url, &form, &headers)
        .await
        .map_err(|e| Error::upload("upload", format!("{:#}", e)))?;
    parse_upload_response(&body)
}

/// `{code: 0, data: {url}}`; protocol-relative URLs get `https:`.
pub fn parse_upload_response(body: &Value) -> Result<String> {
    let code = body.get("code").and_then(Value::as_i64);
    if code != Some(0) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("no message");
        return Err(Error::upload(
            "response",
            format!("code {}: {}", code.map_or("missing".to_string(), |c| c.to_string()), message),
        ));
    }
    let url = body
        .pointer("/data/url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| Error::upload("response", "no data.url"))?;
    if url.starts_with("//") {
        Ok(format!("https:{}", url))
    } else {
        Ok(url.to_string())
    }
}

/// First candidate that changes at least one property wins.
async fn inject_cover(ctx: &EngineContext, candidates: &[InjectionCandidate], value: &Value) -> Result<String> {
    for candidate in candidates {
        match ctx.page().inject_component_state(candidate, value).await {
            Ok(changed) if changed > 0 => return Ok(candidate.property.clone()),
            Ok(_) => debug!("[cover] {}.{} not found", candidate.anchor, candidate.property),
            Err(e) => debug!("[cover] {}.{} failed: {:#}", candidate.anchor, candidate.property, e),
        }
    }
    let tried: Vec<&str> = candidates.iter().map(|c| c.property.as_str()).collect();
    Err(Error::InjectionFailed {
        property: if tried.is_empty() {
            "<none>".to_string()
        } else {
            tried.join("|")
        },
    })
}

async fn simulate_cover_ui(ctx: &EngineContext, ui: &CoverUi, image: &ImageAsset) -> Result<()> {
    let page = ctx.page();
    let timeout = ctx.config.element_wait_timeout();

    if !ui.trigger.is_empty() {
        let trigger = wait_for_visible(ctx, &ui.trigger, timeout, false)
            .await
            .ok_or_else(|| Error::upload("ui:trigger", "cover trigger not visible"))?;
        page.click(trigger).await?;
        ctx.pace().await;
    }
    if !ui.aspect_tab.is_empty() {
        let tab = wait_for_visible(ctx, &ui.aspect_tab, timeout, false)
            .await
            .ok_or_else(|| Error::upload("ui:aspect-tab", "aspect tab not visible"))?;
        page.pointer_click(tab).await?;
        ctx.pace().await;
    }
    let input = wait_for_present(ctx, &ui.file_input, timeout)
        .await
        .ok_or_else(|| Error::upload("ui:file-input", "cover file input not found"))?;
    page.set_input_files(input, &[payload(image)]).await?;
    page.dispatch_event(input, DomEvent::Change).await?;
    ctx.pace().await;

    if !ui.confirm.is_empty() {
        let confirm = wait_for_visible(ctx, &ui.confirm, timeout, false)
            .await
            .ok_or_else(|| Error::upload("ui:confirm", "confirm button not visible"))?;
        page.click(confirm).await?;
        ctx.pace().await;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// tags and topics

/// How a platform's tag widget behaves.
#[derive(Debug, Clone, Default)]
pub struct TagEntry {
    /// Typed before the tag in rich editors, e.g. `#`.
    pub trigger: Option<char>,
    pub suggestion_container: Vec<String>,
    pub suggestion_items: Vec<String>,
    /// Ready-made tokens shown next to the editor.
    pub recommended: Vec<String>,
    /// Input-field widgets commit with Enter instead of a trailing space.
    pub commit_with_enter: bool,
    pub shadow: bool,
    pub max_tags: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    Reused(String),
    Selected(String),
    Plain(String),
}

#[derive(Debug, Default)]
pub struct TagReport {
    pub entered: Vec<TagOutcome>,
    pub failures: Vec<String>,
}

impl TagReport {
    /// Success when at least one tag went in.
    pub fn into_result(self, platform: &str) -> Result<String> {
        if self.entered.is_empty() {
            return Err(Error::Page(format!(
                "{} accepted no tags: {}",
                platform,
                self.failures.join("; ")
            )));
        }
        let rendered: Vec<String> = self
            .entered
            .iter()
            .map(|outcome| match outcome {
                TagOutcome::Reused(tag) | TagOutcome::Selected(tag) | TagOutcome::Plain(tag) => tag.clone(),
            })
            .collect();
        Ok(rendered.join(","))
    }
}

/// Lower-case, with `#`, punctuation and whitespace removed.
pub fn normalize_tag(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn display_tag(tag: &str) -> &str {
    tag.trim().trim_matches('#').trim()
}

pub async fn enter_tags(ctx: &EngineContext, target: ElementRef, tags: &[String], entry: &TagEntry) -> TagReport {
    let mut report = TagReport::default();
    let mut seen = HashSet::new();
    let limit = entry.max_tags.unwrap_or(usize::MAX);
    for tag in tags {
        let tag = display_tag(tag);
        let key = normalize_tag(tag);
        if key.is_empty() || !seen.insert(key) {
            continue;
        }
        if report.entered.len() >= limit {
            debug!("[tags] limit {} reached, dropping `{}`", limit, tag);
            break;
        }
        match enter_tag(ctx, target, tag, entry).await {
            Ok(outcome) => {
                debug!("[tags] {:?}", outcome);
                report.entered.push(outcome);
            }
            Err(e) => {
                warn!("[tags] `{}` failed: {}", tag, e);
                report.failures.push(format!("{}: {}", tag, e));
            }
        }
    }
    report
}

enum Suggestion {
    Match(ElementRef, String),
    NoMatch,
}

pub async fn enter_tag(ctx: &EngineContext, target: ElementRef, tag: &str, entry: &TagEntry) -> Result<TagOutcome> {
    let page = ctx.page();
    if let Some(token) = find_recommended(ctx, tag, entry).await {
        page.click(token).await?;
        ctx.pace().await;
        return Ok(TagOutcome::Reused(tag.to_string()));
    }

    require_writable(ctx, target).await?;
    page.focus(target).await?;
    let typed = match entry.trigger {
        Some(trigger) => format!("{}{}", trigger, tag),
        None => tag.to_string(),
    };
    if entry.commit_with_enter {
        page.set_native_value(target, &typed).await?;
        page.dispatch_event(target, DomEvent::Input).await?;
        ctx.pace().await;
    } else {
        // a topic glued to the previous word is not recognized
        let existing = page.text_content(target).await.unwrap_or_default();
        if !existing.is_empty() && !existing.ends_with(char::is_whitespace) {
            type_text(ctx, target, " ").await?;
        }
        type_text(ctx, target, &typed).await?;
    }

    let suggestion = retry_attempts(
        ctx.scheduler(),
        ctx.config.tag_poll_attempts,
        ctx.config.tag_poll_delay(),
        move || async move { pick_suggestion(ctx, tag, entry).await },
    )
    .await;
    if let Some(Suggestion::Match(item, text)) = suggestion {
        page.click(item).await?;
        ctx.pace().await;
        return Ok(TagOutcome::Selected(text));
    }

    if entry.commit_with_enter {
        page.dispatch_event(target, DomEvent::KeyDown("Enter".to_string())).await?;
        ctx.pace().await;
    } else {
        type_text(ctx, target, " ").await?;
    }
    Ok(TagOutcome::Plain(typed))
}

async fn find_recommended(ctx: &EngineContext, tag: &str, entry: &TagEntry) -> Option<ElementRef> {
    let wanted = normalize_tag(tag);
    for selector in &entry.recommended {
        let Ok(tokens) = query_deep(ctx, selector, entry.shadow).await else {
            continue;
        };
        for token in tokens {
            if !is_visible(ctx, token).await {
                continue;
            }
            let text = ctx.page().text_content(token).await.unwrap_or_default();
            if normalize_tag(&text) == wanted {
                return Some(token);
            }
        }
    }
    None
}

/// `None` while no suggestion is showing yet.
async fn pick_suggestion(ctx: &EngineContext, tag: &str, entry: &TagEntry) -> Option<Suggestion> {
    if !entry.suggestion_container.is_empty()
        && first_visible(ctx, &entry.suggestion_container, entry.shadow)
            .await
            .is_none()
    {
        return None;
    }

    let mut items = Vec::new();
    for selector in &entry.suggestion_items {
        let Ok(matches) = query_deep(ctx, selector, entry.shadow).await else {
            continue;
        };
        for item in matches {
            if is_visible(ctx, item).await {
                let text = ctx.page().text_content(item).await.unwrap_or_default();
                items.push((item, text));
            }
        }
    }
    // lists often render empty and fill in a moment later
    if items.is_empty() {
        return None;
    }

    let wanted = normalize_tag(tag);
    let exact = items.iter().find(|(_, text)| normalize_tag(text) == wanted);
    let prefix = || items.iter().find(|(_, text)| normalize_tag(text).starts_with(&wanted));
    match exact.or_else(prefix) {
        Some((item, text)) => Some(Suggestion::Match(*item, display_tag(text).to_string())),
        None => Some(Suggestion::NoMatch),
    }
}

// ---------------------------------------------------------------------------
// text helpers

/// Cut `text` to the platform's character limit.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    debug!("[fill] truncating {} chars to {}", text.chars().count(), max);
    text.chars().take(max).collect()
}

fn replace_all(pattern: &str, input: &str, replacement: &str) -> String {
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(input, replacement).into_owned(),
        Err(_) => input.to_string(),
    }
}

/// Plain text for editors that reject markup.
pub fn html_to_text(html: &str) -> String {
    let text = replace_all(r"(?is)<(script|style)[^>]*>.*?</(script|style)>", html, "");
    let text = replace_all(r"(?i)<br\s*/?>", &text, "\n");
    let text = replace_all(r"(?i)</(p|div|h[1-6]|li|blockquote|section)>", &text, "\n");
    let text = replace_all(r"<[^>]+>", &text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let text = replace_all(r"[ \t]+\n", &text, "\n");
    replace_all(r"\n{3,}", &text, "\n\n").trim().to_string()
}
