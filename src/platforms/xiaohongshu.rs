use async_trait::async_trait;
use std::sync::Arc;

use super::common::{self, TagEntry};
use super::descriptor::{ContentType, Descriptor, SelectorSpec, SpecialHandling};
use super::models::{Field, FieldValue};
use super::traits::{fill_field_with, AdapterCore, PlatformAdapter, PlatformExtras};
use crate::browser::ElementRef;
use crate::context::EngineContext;
use crate::error::Result;

pub const ID: &str = "xiaohongshu";

/// Note titles are capped at 20 characters.
const TITLE_LIMIT: usize = 20;

const BODY_EDITOR: [&str; 3] = ["#post-textarea", ".ql-editor", ".tiptap.ProseMirror"];

pub fn descriptor() -> Descriptor {
    Descriptor::new(
        ID,
        "小红书",
        &["https://creator.xiaohongshu.com/publish/*"],
    )
    .selector(
        Field::Title,
        SelectorSpec::any(&[
            "input.d-text[placeholder*='填写标题']",
            ".titleInput input",
            "input[placeholder*='标题']",
        ]),
    )
    .selector(Field::Content, SelectorSpec::any(&BODY_EDITOR))
    .selector(Field::Tags, SelectorSpec::any(&BODY_EDITOR))
    .selector(Field::Images, SelectorSpec::any(&[".upload-wrapper", ".drag-over"]))
    .content_type(ContentType::Text)
    .special_handling(SpecialHandling {
        wait_for_editor: true,
        visible_candidates: true,
        copy_with_title: true,
        ..Default::default()
    })
}

pub fn extras() -> PlatformExtras {
    PlatformExtras {
        tag_entry: Some(TagEntry {
            trigger: Some('#'),
            suggestion_container: vec![
                "#creator-editor-topic-container".to_string(),
                ".ql-mention-list-container".to_string(),
            ],
            suggestion_items: vec![
                "#creator-editor-topic-container .item".to_string(),
                ".ql-mention-list .ql-mention-list-item".to_string(),
            ],
            recommended: vec![
                ".recommend-topic-wrapper .tag".to_string(),
                ".topic-container .tag-item".to_string(),
            ],
            max_tags: Some(10),
            ..Default::default()
        }),
        cover_slots: Vec::new(),
        image_inputs: vec![
            "input.upload-input".to_string(),
            "input[type='file'][accept*='image']".to_string(),
        ],
    }
}

pub struct XiaohongshuAdapter {
    core: AdapterCore,
}

impl XiaohongshuAdapter {
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
impl PlatformAdapter for XiaohongshuAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    async fn fill_field(&self, field: Field, el: ElementRef, value: FieldValue<'_>) -> Result<String> {
        match (field, value) {
            (Field::Title, FieldValue::Text(title)) => {
                let title = common::truncate_chars(title, TITLE_LIMIT);
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
    use crate::platforms::models::{FillRequest, ImageAsset};
    use crate::scheduler::VirtualScheduler;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    const PUBLISH_URL: &str = "https://creator.xiaohongshu.com/publish/publish?source=official";

    fn adapter(page: Arc<MemoryPage>, transport: Arc<ScriptedTransport>) -> XiaohongshuAdapter {
        let ctx = EngineContext::new(
            page,
            Arc::new(VirtualScheduler::new()),
            transport,
            EventBus::default(),
            EngineConfig::default(),
        );
        XiaohongshuAdapter::new(ctx)
    }

    #[tokio::test]
    async fn topics_pick_autocomplete_and_reuse_recommendations() {
        let page = Arc::new(MemoryPage::new(PUBLISH_URL));
        page.add(MemoryElement::input(".titleInput input"));
        let body = page.add(MemoryElement::editable("#post-textarea"));
        let list = page.add(MemoryElement::new("div", "#creator-editor-topic-container").hidden());
        let suggestion = page.add(
            MemoryElement::new("div", "#creator-editor-topic-container .item").with_text("#露营装备"),
        );
        let recommended = page.add(MemoryElement::new("span", ".recommend-topic-wrapper .tag").with_text("#周末"));
        page.on(body, Trigger::Typing, Effect::Reveal(list));
        let xhs = adapter(page.clone(), Arc::new(ScriptedTransport::new()));

        let request = FillRequest {
            title: Some("周末露营清单".into()),
            content: Some("带上帐篷".into()),
            tags: Some(vec!["周末".into(), "露营".into()]),
            ..Default::default()
        };
        let report = xhs.fill_content(&request).await.unwrap();

        assert_eq!(report.get(Field::Tags).unwrap().value.as_deref(), Some("周末,露营装备"));
        assert_eq!(page.clicks_on(recommended), 1);
        assert_eq!(page.clicks_on(suggestion), 1);
    }

    #[tokio::test]
    async fn images_go_to_the_hidden_file_input() {
        let page = Arc::new(MemoryPage::new(PUBLISH_URL));
        page.add(MemoryElement::input(".titleInput input"));
        page.add(MemoryElement::new("div", ".upload-wrapper"));
        let input = page.add(MemoryElement::input("input.upload-input").hidden());
        let xhs = adapter(page.clone(), Arc::new(ScriptedTransport::new()));

        let request = FillRequest {
            title: Some("t".into()),
            images: Some(vec![
                ImageAsset::from_bytes("1.jpg", "image/jpeg", b"1"),
                ImageAsset::from_bytes("2.jpg", "image/jpeg", b"2"),
            ]),
            ..Default::default()
        };
        let report = xhs.fill_content(&request).await.unwrap();
        assert_eq!(report.get(Field::Images).unwrap().value.as_deref(), Some("2 image(s)"));
        assert_eq!(page.files_of(input), vec!["1.jpg".to_string(), "2.jpg".to_string()]);
    }

    #[tokio::test]
    async fn copy_prepends_title_to_prepared_content() {
        let page = Arc::new(MemoryPage::new(PUBLISH_URL));
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "http://127.0.0.1:3000/api/articles/5/platform-content?platform=xiaohongshu",
            json!({"success": true, "data": {"title": "露营", "content": "正文 #露营"}}),
        );
        let xhs = adapter(page.clone(), transport);

        let copied = xhs.copy_article_content("5").await.unwrap();
        assert!(copied.success);
        assert_eq!(copied.format.as_deref(), Some("text"));
        assert_eq!(page.clipboard().as_deref(), Some("露营\n\n正文 #露营"));
    }

    #[tokio::test]
    async fn copy_falls_back_to_raw_article_as_plain_text() {
        let page = Arc::new(MemoryPage::new(PUBLISH_URL));
        let transport = Arc::new(ScriptedTransport::new());
        transport.not_found("http://127.0.0.1:3000/api/articles/6/platform-content");
        transport.respond(
            "http://127.0.0.1:3000/api/articles/6?format=raw",
            json!({"success": true, "data": {"title": "标题", "content": "<p>第一段</p><p>第二段</p>"}}),
        );
        let xhs = adapter(page.clone(), transport);

        let copied = xhs.copy_article_content("6").await.unwrap();
        assert_eq!(copied.content.as_deref(), Some("标题\n\n第一段\n第二段"));
    }
}
