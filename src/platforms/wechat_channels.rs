use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::common::{self, TagEntry};
use super::descriptor::{ContentType, Descriptor, SelectorSpec, SpecialHandling};
use super::models::{Field, FieldValue};
use super::traits::{fill_field_with, AdapterCore, PlatformAdapter, PlatformExtras};
use crate::browser::ElementRef;
use crate::context::EngineContext;
use crate::error::Result;

pub const ID: &str = "wechat_channels";

/// 短标题 is limited to 16 characters.
const SHORT_TITLE_LIMIT: usize = 16;

const DESCRIPTION_EDITOR: [&str; 2] = [".input-editor", "[contenteditable][data-placeholder='添加描述']"];

// The post form is a micro-frontend mounted inside shadow roots.
pub fn descriptor() -> Descriptor {
    Descriptor::new(
        ID,
        "微信视频号",
        &[
            "https://channels.weixin.qq.com/platform/post/create*",
            "https://channels.weixin.qq.com/micro/content/post/create*",
        ],
    )
    .selector(
        Field::VideoTitle,
        SelectorSpec::any(&[".short-title-wrap input", "input[placeholder*='概括视频主要内容']"]),
    )
    .selector(Field::VideoDescription, SelectorSpec::any(&DESCRIPTION_EDITOR))
    .selector(Field::Tags, SelectorSpec::any(&DESCRIPTION_EDITOR))
    .content_type(ContentType::Text)
    .special_handling(SpecialHandling {
        wait_for_editor: true,
        shadow_dom: true,
        visible_candidates: true,
        ..Default::default()
    })
}

pub fn extras() -> PlatformExtras {
    PlatformExtras {
        tag_entry: Some(TagEntry {
            trigger: Some('#'),
            suggestion_container: vec![".topic-suggest-list".to_string(), ".mention-list".to_string()],
            suggestion_items: vec![
                ".topic-suggest-list .topic-item".to_string(),
                ".mention-list .mention-item".to_string(),
            ],
            shadow: true,
            ..Default::default()
        }),
        cover_slots: Vec::new(),
        image_inputs: Vec::new(),
    }
}

pub struct WechatChannelsAdapter {
    core: AdapterCore,
}

impl WechatChannelsAdapter {
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
impl PlatformAdapter for WechatChannelsAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn validate(&self, elements: &BTreeMap<Field, ElementRef>) -> bool {
        elements.contains_key(&Field::VideoDescription)
    }

    async fn fill_field(&self, field: Field, el: ElementRef, value: FieldValue<'_>) -> Result<String> {
        match (field, value) {
            (Field::VideoTitle, FieldValue::Text(title)) => {
                let title = common::truncate_chars(title, SHORT_TITLE_LIMIT);
                self.write_text(el, &title).await?;
                Ok(title)
            }
            _ => fill_field_with(self, field, el, value).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::memory::{Effect, Trigger};
    use crate::browser::{MemoryElement, MemoryPage};
    use crate::config::EngineConfig;
    use crate::events::EventBus;
    use crate::platforms::models::FillRequest;
    use crate::scheduler::VirtualScheduler;
    use crate::transport::ScriptedTransport;

    #[tokio::test]
    async fn fills_inside_the_micro_frontend_shadow_tree() {
        let page = Arc::new(MemoryPage::new("https://channels.weixin.qq.com/platform/post/create"));
        let host = page.add(MemoryElement::new("wujie-app", "wujie-app"));
        let title = page.add_in_shadow(host, MemoryElement::input(".short-title-wrap input"));
        let editor = page.add_in_shadow(host, MemoryElement::editable(".input-editor"));
        let list = page.add_in_shadow(host, MemoryElement::new("div", ".topic-suggest-list").hidden());
        let item = page.add_in_shadow(
            host,
            MemoryElement::new("div", ".topic-suggest-list .topic-item").with_text("#城市漫步"),
        );
        page.on(editor, Trigger::Typing, Effect::Reveal(list));

        let ctx = EngineContext::new(
            page.clone(),
            Arc::new(VirtualScheduler::new()),
            Arc::new(ScriptedTransport::new()),
            EventBus::default(),
            EngineConfig::default(),
        );
        let channels = WechatChannelsAdapter::new(ctx);

        let request = FillRequest {
            video_title: Some("周末在上海的城市漫步路线分享".into()),
            video_description: Some("走了两万步".into()),
            tags: Some(vec!["城市漫步".into()]),
            ..Default::default()
        };
        let report = channels.fill_content(&request).await.unwrap();

        assert!(report.get(Field::VideoTitle).unwrap().success);
        assert_eq!(page.value_of(title), "周末在上海的城市漫步路线分享");
        assert_eq!(report.get(Field::Tags).unwrap().value.as_deref(), Some("城市漫步"));
        assert_eq!(page.clicks_on(item), 1);
    }

    #[tokio::test]
    async fn top_level_document_alone_is_not_an_editor() {
        let page = Arc::new(MemoryPage::new("https://channels.weixin.qq.com/platform/post/create"));
        page.add(MemoryElement::new("wujie-app", "wujie-app"));
        let ctx = EngineContext::new(
            page,
            Arc::new(VirtualScheduler::new()),
            Arc::new(ScriptedTransport::new()),
            EventBus::default(),
            EngineConfig::default(),
        );
        let channels = WechatChannelsAdapter::new(ctx);
        let set = channels.discover_elements(false).await.unwrap();
        assert!(!set.is_editor);
    }
}
