use async_trait::async_trait;
use log::info;
use std::collections::HashSet;
use std::sync::Arc;

use super::common::{self, normalize_tag};
use super::descriptor::{ContentType, Descriptor, SelectorSpec, SpecialHandling};
use super::models::{Field, FillReport, FillRequest, FillResult};
use super::traits::{AdapterCore, DiscoveredElementSet, PlatformAdapter, PlatformExtras};
use crate::context::EngineContext;
use crate::error::Result;

pub const ID: &str = "weibo";

pub fn descriptor() -> Descriptor {
    Descriptor::new(
        ID,
        "微博",
        &["https://weibo.com/*", "https://www.weibo.com/*", "https://m.weibo.cn/compose*"],
    )
    .selector(
        Field::Content,
        SelectorSpec::any(&[
            "textarea[class*='Form_input']",
            "textarea[placeholder*='有什么新鲜事']",
            "textarea.W_input",
        ]),
    )
    .selector(
        Field::Images,
        SelectorSpec::any(&["[class*='Form_upload']", "[class*='picture-uploader']"]),
    )
    .content_type(ContentType::Text)
    .special_handling(SpecialHandling {
        visible_candidates: true,
        ..Default::default()
    })
    // the patterns cover the whole site; more specific platforms win
    .priority(-10)
}

pub fn extras() -> PlatformExtras {
    PlatformExtras {
        tag_entry: None,
        cover_slots: Vec::new(),
        image_inputs: vec!["input[type='file'][accept*='image']".to_string()],
    }
}

/// `#话题#` tokens for every distinct tag.
pub fn topic_suffix(tags: &[String]) -> String {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|tag| tag.trim().trim_matches('#').trim())
        .filter(|tag| !tag.is_empty() && seen.insert(normalize_tag(tag)))
        .map(|tag| format!("#{}#", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct WeiboAdapter {
    core: AdapterCore,
}

impl WeiboAdapter {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self::with_descriptor(ctx, descriptor())
    }

    pub fn with_descriptor(ctx: Arc<EngineContext>, descriptor: Descriptor) -> Self {
        Self {
            core: AdapterCore::new(descriptor, extras(), ctx),
        }
    }
}

#[async_trait]
impl PlatformAdapter for WeiboAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    /// Topics live inline in the post text, so they are appended once the
    /// content is in place.
    async fn post_fill(
        &self,
        request: &FillRequest,
        set: &DiscoveredElementSet,
        report: &mut FillReport,
    ) -> Result<()> {
        let Some(tags) = request.tags.as_deref() else {
            return Ok(());
        };
        let suffix = topic_suffix(tags);
        if suffix.is_empty() {
            return Ok(());
        }
        let Some(el) = set.get(Field::Content) else {
            report.record(Field::Tags, FillResult::failed("no post editor for topics"));
            return Ok(());
        };

        let ctx = self.core().ctx();
        let current = common::current_text(ctx, el).await?;
        let text = if current.trim().is_empty() {
            suffix.clone()
        } else {
            format!("{} {}", current.trim_end(), suffix)
        };
        let result = match self.write_text(el, &text).await {
            Ok(()) => {
                info!("[{} fill] appended topics {}", self.id(), suffix);
                FillResult::ok(suffix)
            }
            Err(e) => FillResult::failed(e),
        };
        report.record(Field::Tags, result);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{MemoryElement, MemoryPage};
    use crate::config::EngineConfig;
    use crate::events::EventBus;
    use crate::scheduler::VirtualScheduler;
    use crate::transport::ScriptedTransport;

    fn adapter(page: Arc<MemoryPage>) -> WeiboAdapter {
        let ctx = EngineContext::new(
            page,
            Arc::new(VirtualScheduler::new()),
            Arc::new(ScriptedTransport::new()),
            EventBus::default(),
            EngineConfig::default(),
        );
        WeiboAdapter::new(ctx)
    }

    #[test]
    fn topic_suffix_wraps_and_dedups() {
        let tags = vec!["#读书".to_string(), "读书".to_string(), " ".to_string(), "Rust".to_string()];
        assert_eq!(topic_suffix(&tags), "#读书# #Rust#");
    }

    #[tokio::test]
    async fn topics_are_appended_after_the_post_text() {
        let page = Arc::new(MemoryPage::new("https://weibo.com/"));
        let textarea = page.add(MemoryElement::textarea("textarea[class*='Form_input']"));
        let weibo = adapter(page.clone());

        let request = FillRequest {
            title: Some("ignored".into()),
            content: Some("今天读完了一本书".into()),
            tags: Some(vec!["读书".into()]),
            ..Default::default()
        };
        let report = weibo.fill_content(&request).await.unwrap();

        assert_eq!(page.value_of(textarea), "今天读完了一本书 #读书#");
        assert_eq!(report.get(Field::Tags).unwrap().value.as_deref(), Some("#读书#"));
        assert!(report.get(Field::Title).is_none());
    }

    #[tokio::test]
    async fn profile_pages_without_a_composer_are_rejected() {
        let page = Arc::new(MemoryPage::new("https://weibo.com/u/123"));
        let weibo = adapter(page);
        assert!(weibo.is_editor_page("https://weibo.com/u/123"));
        let err = weibo.fill_content(&FillRequest::default()).await.unwrap_err();
        assert!(err.is_not_editor_page());
    }
}
