use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use super::common::{self, CoverSlot, TagEntry};
use super::descriptor::{ContentType, Descriptor};
use super::models::{CopyResult, Field, FieldValue, FillReport, FillRequest, FillResult};
use crate::browser::ElementRef;
use crate::context::EngineContext;
use crate::error::{Error, Result};
use crate::events::{EventBus, LifecycleEvent};
use crate::scheduler::poll_until;

/// Host-facing summary of a registered platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub id: String,
    pub name: String,
    pub url_patterns: Vec<String>,
    pub content_type: ContentType,
    pub priority: i32,
    pub fields: Vec<Field>,
}

impl From<&Descriptor> for PlatformInfo {
    fn from(descriptor: &Descriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.display_name.clone(),
            url_patterns: descriptor.url_patterns.clone(),
            content_type: descriptor.content_type,
            priority: descriptor.priority,
            fields: descriptor.selectors.keys().copied().collect(),
        }
    }
}

/// Per-fill state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPhase {
    #[default]
    Idle,
    Discovering,
    NotFound,
    Found,
    Filling,
    PostProcessing,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredElementSet {
    pub is_editor: bool,
    pub platform_id: String,
    pub elements: BTreeMap<Field, ElementRef>,
    pub url: String,
    pub discovered_at: Instant,
}

impl DiscoveredElementSet {
    pub fn get(&self, field: Field) -> Option<ElementRef> {
        self.elements.get(&field).copied()
    }
}

/// Platform behavior that is data rather than code: tag widgets, cover
/// slots and image upload inputs.
#[derive(Debug, Clone, Default)]
pub struct PlatformExtras {
    pub tag_entry: Option<TagEntry>,
    pub cover_slots: Vec<CoverSlot>,
    /// File inputs reached from the discovered `images` element.
    pub image_inputs: Vec<String>,
}

/// State shared by every adapter: descriptor, context, discovery cache,
/// current phase and the single-flight lock.
pub struct AdapterCore {
    descriptor: Descriptor,
    extras: PlatformExtras,
    ctx: Arc<EngineContext>,
    cache: Mutex<Option<DiscoveredElementSet>>,
    phase: Mutex<FillPhase>,
    in_flight: tokio::sync::Mutex<()>,
}

impl AdapterCore {
    pub fn new(descriptor: Descriptor, extras: PlatformExtras, ctx: Arc<EngineContext>) -> Self {
        Self {
            descriptor,
            extras,
            ctx,
            cache: Mutex::new(None),
            phase: Mutex::new(FillPhase::Idle),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn extras(&self) -> &PlatformExtras {
        &self.extras
    }

    pub fn ctx(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    pub fn phase(&self) -> FillPhase {
        match self.phase.lock() {
            Ok(phase) => *phase,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn set_phase(&self, next: FillPhase) {
        {
            let mut phase = match self.phase.lock() {
                Ok(phase) => phase,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *phase == next {
                return;
            }
            *phase = next;
        }
        debug!("[{} fill] phase -> {:?}", self.descriptor.id, next);
        self.ctx.events.publish(LifecycleEvent::PhaseChanged {
            platform: self.descriptor.id.clone(),
            phase: next,
        });
    }

    /// Cached set if it is still an editor set for `url` and younger than
    /// the descriptor's cache timeout.
    pub fn cached(&self, url: &str) -> Option<DiscoveredElementSet> {
        let now = self.ctx.scheduler.now();
        let guard = self.cache.lock().ok()?;
        guard
            .as_ref()
            .filter(|set| set.is_editor && set.url == url)
            .filter(|set| now.saturating_duration_since(set.discovered_at) < self.descriptor.cache_timeout())
            .cloned()
    }

    pub fn store(&self, set: Option<DiscoveredElementSet>) {
        if let Ok(mut guard) = self.cache.lock() {
            *guard = set;
        }
    }

    pub fn invalidate(&self) {
        self.store(None);
    }
}

/// One platform's editor integration. Everything but [`core`](Self::core)
/// has a default built on the descriptor; adapters override the hooks
/// their editor needs.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn core(&self) -> &AdapterCore;

    fn descriptor(&self) -> &Descriptor {
        self.core().descriptor()
    }

    fn id(&self) -> &str {
        &self.descriptor().id
    }

    fn info(&self) -> PlatformInfo {
        PlatformInfo::from(self.descriptor())
    }

    fn is_editor_page(&self, url: &str) -> bool {
        self.descriptor().matches_url(url)
    }

    /// Default editor predicate: title or content present, or title alone
    /// under `require_title`.
    fn validate(&self, elements: &BTreeMap<Field, ElementRef>) -> bool {
        let has_title = elements.contains_key(&Field::Title);
        if self.descriptor().special_handling.require_title {
            return has_title;
        }
        has_title || elements.contains_key(&Field::Content)
    }

    async fn discover_elements(&self, use_cache: bool) -> Result<DiscoveredElementSet> {
        let core = self.core();
        let ctx = core.ctx();
        let url = ctx.page().current_url().await?;
        if use_cache {
            if let Some(set) = core.cached(&url) {
                debug!("[{} fill] discovery cache hit", self.id());
                return Ok(set);
            }
        }

        let descriptor = self.descriptor();
        let mut elements = BTreeMap::new();
        for (field, spec) in &descriptor.selectors {
            match common::locate(ctx, spec, &descriptor.special_handling).await {
                Ok(Some(el)) => {
                    elements.insert(*field, el);
                }
                Ok(None) => debug!("[{} fill] {}", self.id(), Error::ElementNotFound { field: *field }),
                Err(e) => warn!("[{} fill] query for {} failed: {}", self.id(), field, e),
            }
        }

        let set = DiscoveredElementSet {
            is_editor: self.validate(&elements),
            platform_id: descriptor.id.clone(),
            elements,
            url,
            discovered_at: ctx.scheduler().now(),
        };
        core.store(set.is_editor.then(|| set.clone()));
        Ok(set)
    }

    async fn set_input_value(&self, el: ElementRef, value: &str) -> Result<()> {
        common::set_input_value(self.core().ctx(), el, value).await
    }

    async fn set_editor_content(&self, el: ElementRef, content: &str) -> Result<()> {
        let ctx = self.core().ctx();
        common::set_editor_content(ctx, el, content, self.descriptor().content_type)
            .await
            .map(|_| ())
    }

    /// Text write routed by element kind.
    async fn write_text(&self, el: ElementRef, text: &str) -> Result<()> {
        common::write_text(self.core().ctx(), el, text, self.descriptor().content_type).await
    }

    /// Write one field. Returns the value recorded in the report.
    async fn fill_field(&self, field: Field, el: ElementRef, value: FieldValue<'_>) -> Result<String> {
        fill_field_with(self, field, el, value).await
    }

    /// Cross-field effects after the primitives ran.
    async fn post_fill(
        &self,
        _request: &FillRequest,
        _set: &DiscoveredElementSet,
        _report: &mut FillReport,
    ) -> Result<()> {
        Ok(())
    }

    async fn fill_content(&self, request: &FillRequest) -> Result<FillReport> {
        let core = self.core();
        let _flight = core.in_flight.lock().await;
        let ctx = core.ctx();
        let platform = self.id().to_string();
        core.events().publish(LifecycleEvent::FillStarted {
            platform: platform.clone(),
        });
        core.set_phase(FillPhase::Discovering);

        let set = if self.descriptor().special_handling.wait_for_editor {
            let found = poll_until(
                ctx.scheduler(),
                ctx.config.wait_for_editor_timeout(),
                ctx.config.poll_interval(),
                move || async move {
                    match self.discover_elements(false).await {
                        Ok(set) if set.is_editor => Some(Ok(set)),
                        Ok(_) => None,
                        Err(e) => Some(Err(e)),
                    }
                },
            )
            .await;
            match found {
                Some(result) => Some(result?),
                None => None,
            }
        } else {
            Some(self.discover_elements(false).await?).filter(|set| set.is_editor)
        };

        let Some(set) = set else {
            core.set_phase(FillPhase::NotFound);
            core.invalidate();
            let url = ctx.page().current_url().await.unwrap_or_default();
            warn!("[{} fill] no editor at {}", platform, url);
            let err = Error::NotEditorPage { platform: platform.clone(), url };
            core.events().publish(LifecycleEvent::FillAborted {
                platform,
                reason: err.to_string(),
            });
            return Err(err);
        };
        core.set_phase(FillPhase::Found);
        info!(
            "[{} fill] editor found with {} field(s)",
            platform,
            set.elements.len()
        );

        core.set_phase(FillPhase::Filling);
        let mut report = FillReport::new();
        for field in Field::FILL_ORDER {
            let Some(value) = request.value_for(field) else {
                continue;
            };
            let Some(el) = set.get(field) else {
                debug!("[{} fill] {} has no element, skipped", platform, field);
                continue;
            };
            let result = match common::ensure_writable(ctx, el, field).await {
                Ok(()) => match self.fill_field(field, el, value).await {
                    Ok(recorded) => FillResult::ok(recorded),
                    Err(e) => FillResult::failed(e),
                },
                Err(e) => FillResult::failed(e),
            };
            if let Some(error) = &result.error {
                warn!("[{} fill] {} failed: {}", platform, field, error);
            } else {
                info!("[{} fill] {} filled", platform, field);
            }
            core.events().publish(LifecycleEvent::FieldFilled {
                platform: platform.clone(),
                field,
                success: result.success,
            });
            report.record(field, result);
        }

        core.set_phase(FillPhase::PostProcessing);
        if let Err(e) = self.post_fill(request, &set, &mut report).await {
            warn!("[{} fill] post-fill hook failed: {}", platform, e);
        }
        core.set_phase(FillPhase::Done);
        core.events().publish(LifecycleEvent::FillCompleted {
            platform,
            succeeded: report.succeeded(),
            failed: report.failed(),
        });
        Ok(report)
    }

    async fn copy_article_content(&self, article_id: &str) -> Result<CopyResult> {
        let ctx = self.core().ctx();
        let descriptor = self.descriptor();
        let backend = ctx.backend();
        let result = match descriptor.content_type {
            ContentType::Html => match backend.fetch_raw(article_id).await {
                Ok(article) => {
                    let content = match &ctx.config.preset {
                        Some(preset) => preset.wrap(&article.content),
                        None => article.content,
                    };
                    write_clipboard(ctx, content, "html", &descriptor.display_name).await
                }
                Err(e) => CopyResult::failed("获取文章内容失败", format!("{:#}", e)),
            },
            ContentType::Text => {
                let article = match backend.fetch_prepared(article_id, &descriptor.id).await {
                    Ok(Some(prepared)) => Ok(prepared),
                    Ok(None) => backend.fetch_raw(article_id).await.map(|mut raw| {
                        raw.content = common::html_to_text(&raw.content);
                        raw
                    }),
                    Err(e) => Err(e),
                };
                match article {
                    Ok(article) => {
                        let title = article.title.as_deref().map(str::trim).unwrap_or_default();
                        let text = if descriptor.special_handling.copy_with_title && !title.is_empty() {
                            format!("{}\n\n{}", title, article.content)
                        } else {
                            article.content
                        };
                        write_clipboard(ctx, text, "text", &descriptor.display_name).await
                    }
                    Err(e) => CopyResult::failed("获取文章内容失败", format!("{:#}", e)),
                }
            }
        };
        self.core().events().publish(LifecycleEvent::ContentCopied {
            platform: self.id().to_string(),
            success: result.success,
        });
        Ok(result)
    }
}

/// The stock field writer, callable from adapters that override
/// [`PlatformAdapter::fill_field`] for a few fields only.
pub async fn fill_field_with<A: PlatformAdapter + ?Sized>(
    adapter: &A,
    field: Field,
    el: ElementRef,
    value: FieldValue<'_>,
) -> Result<String> {
    let ctx = adapter.core().ctx();
    let extras = adapter.core().extras();
    match value {
        FieldValue::Text(text) => {
            let tag = ctx.page().tag_name(el).await?;
            if tag == "input" || tag == "textarea" {
                adapter.set_input_value(el, text).await?;
            } else {
                adapter.set_editor_content(el, text).await?;
            }
            Ok(text.to_string())
        }
        FieldValue::Tags(tags) => {
            let entry = extras.tag_entry.as_ref().ok_or_else(|| Error::UnsupportedField {
                platform: adapter.id().to_string(),
                field,
            })?;
            common::enter_tags(ctx, el, tags, entry)
                .await
                .into_result(adapter.id())
        }
        FieldValue::Images(images) => {
            common::upload_images(ctx, el, &extras.image_inputs, images).await?;
            Ok(value.summary())
        }
        FieldValue::Image(image) => {
            if extras.cover_slots.is_empty() {
                return Err(Error::UnsupportedField {
                    platform: adapter.id().to_string(),
                    field,
                });
            }
            common::apply_covers(ctx, adapter.id(), &extras.cover_slots, image).await
        }
    }
}

async fn write_clipboard(ctx: &EngineContext, content: String, format: &str, platform: &str) -> CopyResult {
    match ctx.page().write_clipboard(&content).await {
        Ok(()) => CopyResult::copied(content, format, format!("已复制，可粘贴到{}", platform)),
        Err(e) => CopyResult::failed("写入剪贴板失败", format!("{:#}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MemoryElement, MemoryPage};
    use crate::config::EngineConfig;
    use crate::platforms::descriptor::{SelectorSpec, SpecialHandling};
    use crate::scheduler::VirtualScheduler;
    use crate::transport::ScriptedTransport;
    use std::time::Duration;

    struct Plain {
        core: AdapterCore,
    }

    #[async_trait]
    impl PlatformAdapter for Plain {
        fn core(&self) -> &AdapterCore {
            &self.core
        }
    }

    fn adapter(page: Arc<MemoryPage>, clock: Arc<VirtualScheduler>, flags: SpecialHandling) -> Plain {
        let descriptor = Descriptor::new("cms", "CMS", &["*.example.com/publish/*"])
            .selector(Field::Title, SelectorSpec::one("#title"))
            .selector(Field::Content, SelectorSpec::one(".editor"))
            .special_handling(flags);
        let ctx = EngineContext::new(
            page,
            clock,
            Arc::new(ScriptedTransport::new()),
            EventBus::default(),
            EngineConfig::default(),
        );
        Plain {
            core: AdapterCore::new(descriptor, PlatformExtras::default(), ctx),
        }
    }

    #[tokio::test]
    async fn cache_expires_after_the_descriptor_timeout() {
        let page = Arc::new(MemoryPage::new("https://cms.example.com/publish/1"));
        page.add(MemoryElement::input("#title"));
        let clock = Arc::new(VirtualScheduler::new());
        let plain = adapter(page.clone(), clock.clone(), SpecialHandling::default());

        let first = plain.discover_elements(true).await.unwrap();
        clock.advance(Duration::from_secs(10));
        let cached = plain.discover_elements(true).await.unwrap();
        assert_eq!(first.discovered_at, cached.discovered_at);

        clock.advance(Duration::from_secs(30));
        let fresh = plain.discover_elements(true).await.unwrap();
        assert_ne!(first.discovered_at, fresh.discovered_at);
        assert_eq!(first.elements, fresh.elements);
    }

    #[tokio::test]
    async fn navigation_invalidates_the_cache() {
        let page = Arc::new(MemoryPage::new("https://cms.example.com/publish/1"));
        page.add(MemoryElement::input("#title"));
        let clock = Arc::new(VirtualScheduler::new());
        let plain = adapter(page.clone(), clock.clone(), SpecialHandling::default());

        plain.discover_elements(true).await.unwrap();
        page.navigate("https://cms.example.com/publish/2");
        assert!(plain.core().cached("https://cms.example.com/publish/2").is_none());
        let set = plain.discover_elements(true).await.unwrap();
        assert_eq!(set.url, "https://cms.example.com/publish/2");
    }

    #[tokio::test]
    async fn require_title_rejects_content_only_pages() {
        let page = Arc::new(MemoryPage::new("https://cms.example.com/publish/1"));
        page.add(MemoryElement::editable(".editor"));
        let flags = SpecialHandling {
            require_title: true,
            ..Default::default()
        };
        let plain = adapter(page, Arc::new(VirtualScheduler::new()), flags);
        let set = plain.discover_elements(false).await.unwrap();
        assert!(!set.is_editor);
        assert!(set.elements.contains_key(&Field::Content));
    }

    #[tokio::test]
    async fn phases_end_in_done_or_not_found() {
        let page = Arc::new(MemoryPage::new("https://cms.example.com/publish/1"));
        let clock = Arc::new(VirtualScheduler::new());
        let plain = adapter(page.clone(), clock, SpecialHandling::default());
        assert_eq!(plain.core().phase(), FillPhase::Idle);

        let err = plain.fill_content(&FillRequest::default()).await.unwrap_err();
        assert!(err.is_not_editor_page());
        assert_eq!(plain.core().phase(), FillPhase::NotFound);

        page.add(MemoryElement::input("#title"));
        plain.fill_content(&FillRequest::default()).await.unwrap();
        assert_eq!(plain.core().phase(), FillPhase::Done);
    }

    #[tokio::test]
    async fn waits_for_a_late_editor() {
        let page = Arc::new(MemoryPage::new("https://cms.example.com/publish/1"));
        let title = page.add(MemoryElement::input("#title").hidden());
        let clock = Arc::new(VirtualScheduler::new());
        let flags = SpecialHandling {
            wait_for_editor: true,
            ..Default::default()
        };
        let plain = adapter(page.clone(), clock.clone(), flags);

        let request = FillRequest {
            title: Some("late".into()),
            ..Default::default()
        };
        let fill = plain.fill_content(&request);
        let reveal = async {
            while clock.elapsed() < Duration::from_secs(2) {
                tokio::task::yield_now().await;
            }
            page.set_hidden(title, false);
        };
        let (report, ()) = tokio::join!(fill, reveal);
        assert!(report.unwrap().get(Field::Title).unwrap().success);
        assert_eq!(page.value_of(title), "late");
    }

    #[tokio::test]
    async fn wait_for_editor_gives_up_after_the_timeout() {
        let page = Arc::new(MemoryPage::new("https://cms.example.com/publish/1"));
        let clock = Arc::new(VirtualScheduler::new());
        let flags = SpecialHandling {
            wait_for_editor: true,
            ..Default::default()
        };
        let plain = adapter(page, clock.clone(), flags);
        let err = plain.fill_content(&FillRequest::default()).await.unwrap_err();
        assert!(err.is_not_editor_page());
        assert!(clock.elapsed() >= Duration::from_millis(10_000));
    }
}
