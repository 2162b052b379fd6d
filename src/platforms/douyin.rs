use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::common::{self, CoverSlot, CoverUi, TagEntry, UploadEndpoint};
use super::descriptor::{ContentType, Descriptor, SelectorSpec, SpecialHandling};
use super::models::{Field, FieldValue};
use super::traits::{fill_field_with, AdapterCore, PlatformAdapter, PlatformExtras};
use crate::browser::{ElementRef, InjectionCandidate};
use crate::context::EngineContext;
use crate::error::Result;

pub const ID: &str = "douyin";

/// 作品标题 accepts at most 30 characters.
const TITLE_LIMIT: usize = 30;

const DESCRIPTION_EDITOR: [&str; 3] = [
    ".zone-container[contenteditable='true']",
    "[data-slate-editor='true']",
    ".editor-kit-container [contenteditable='true']",
];

pub fn descriptor() -> Descriptor {
    Descriptor::new(
        ID,
        "抖音",
        &[
            "https://creator.douyin.com/creator-micro/content/publish*",
            "https://creator.douyin.com/creator-micro/content/post/video*",
        ],
    )
    .selector(
        Field::VideoTitle,
        SelectorSpec::any(&[
            "input[placeholder*='填写作品标题']",
            ".editor-kit-root-container input[type='text']",
            "[class*='title'] [contenteditable='true']",
        ]),
    )
    .selector(Field::VideoDescription, SelectorSpec::any(&DESCRIPTION_EDITOR))
    .selector(Field::Tags, SelectorSpec::any(&DESCRIPTION_EDITOR))
    .selector(
        Field::CoverImage,
        SelectorSpec::any(&["[class*='coverControl']", "[class*='cover-select']"]),
    )
    .content_type(ContentType::Text)
    .special_handling(SpecialHandling {
        wait_for_editor: true,
        visible_candidates: true,
        ..Default::default()
    })
}

fn cover_slot(label: &str, tab: &str, property: &str) -> CoverSlot {
    CoverSlot {
        label: label.to_string(),
        upload: Some(UploadEndpoint {
            url: "https://creator.douyin.com/web/api/media/upload/cover/".to_string(),
            token_cookie: "passport_csrf_token".to_string(),
            token_field: "csrf_token".to_string(),
            file_field: "cover".to_string(),
            extra_fields: vec![("aspect_ratio".to_string(), label.to_string())],
        }),
        injection: vec![
            InjectionCandidate::new("[class*='coverControl']", property),
            InjectionCandidate::new("#root", property),
        ],
        ui: CoverUi {
            trigger: vec!["[class*='coverControl']".to_string(), "[class*='cover-select']".to_string()],
            aspect_tab: vec![tab.to_string()],
            file_input: vec!["[class*='cover-modal'] input[type='file']".to_string()],
            confirm: vec!["[class*='cover-modal'] button[class*='primary']".to_string()],
        },
    }
}

pub fn extras() -> PlatformExtras {
    PlatformExtras {
        tag_entry: Some(TagEntry {
            trigger: Some('#'),
            suggestion_container: vec!["[class*='mention-suggest']".to_string()],
            suggestion_items: vec!["[class*='mention-suggest'] [class*='tag-item']".to_string()],
            recommended: vec!["[class*='recommend-topic'] [class*='topic-item']".to_string()],
            max_tags: Some(5),
            ..Default::default()
        }),
        cover_slots: vec![
            cover_slot("3:4", "[class*='cover-modal'] [class*='tab-vertical']", "verticalCover"),
            cover_slot("4:3", "[class*='cover-modal'] [class*='tab-horizontal']", "horizontalCover"),
        ],
        image_inputs: Vec::new(),
    }
}

pub struct DouyinAdapter {
    core: AdapterCore,
}

impl DouyinAdapter {
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
impl PlatformAdapter for DouyinAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    fn validate(&self, elements: &BTreeMap<Field, ElementRef>) -> bool {
        elements.contains_key(&Field::VideoTitle) || elements.contains_key(&Field::VideoDescription)
    }

    async fn fill_field(&self, field: Field, el: ElementRef, value: FieldValue<'_>) -> Result<String> {
        match (field, value) {
            (Field::VideoTitle, FieldValue::Text(title)) => {
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
    use crate::browser::{MemoryElement, MemoryPage};
    use crate::config::EngineConfig;
    use crate::events::EventBus;
    use crate::platforms::models::{FillRequest, ImageAsset};
    use crate::scheduler::VirtualScheduler;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    const PUBLISH_URL: &str = "https://creator.douyin.com/creator-micro/content/publish?enter_from=publish_page";

    fn adapter(page: Arc<MemoryPage>, transport: Arc<ScriptedTransport>) -> DouyinAdapter {
        let ctx = EngineContext::new(
            page,
            Arc::new(VirtualScheduler::new()),
            transport,
            EventBus::default(),
            EngineConfig::default(),
        );
        DouyinAdapter::new(ctx)
    }

    #[tokio::test]
    async fn editable_title_goes_through_the_editor_path() {
        let page = Arc::new(MemoryPage::new(PUBLISH_URL));
        let title = page.add(MemoryElement::editable("[class*='title'] [contenteditable='true']"));
        page.add(MemoryElement::editable(".zone-container[contenteditable='true']"));
        let douyin = adapter(page.clone(), Arc::new(ScriptedTransport::new()));

        let request = FillRequest {
            video_title: Some("一".repeat(40)),
            ..Default::default()
        };
        let report = douyin.fill_content(&request).await.unwrap();

        assert!(report.get(Field::VideoTitle).unwrap().success);
        assert_eq!(page.text_of(title), "一".repeat(TITLE_LIMIT));
    }

    #[test]
    fn recognizes_publish_pages_only() {
        let descriptor = descriptor();
        assert!(descriptor.matches_url(PUBLISH_URL));
        assert!(!descriptor.matches_url("https://creator.douyin.com/creator-micro/home"));
        assert!(descriptor.validate().is_ok());
    }

    #[tokio::test]
    async fn fills_title_description_and_topics() {
        let page = Arc::new(MemoryPage::new(PUBLISH_URL));
        let title = page.add(MemoryElement::input("input[placeholder*='填写作品标题']"));
        let editor = page.add(MemoryElement::editable(DESCRIPTION_EDITOR[0]));
        let douyin = adapter(page.clone(), Arc::new(ScriptedTransport::new()));

        let request = FillRequest {
            video_title: Some("一二三四五六七八九十一二三四五六七八九十一二三四五六七八九十多出来".into()),
            video_description: Some("周末去露营".into()),
            tags: Some(vec!["露营".into()]),
            ..Default::default()
        };
        let report = douyin.fill_content(&request).await.unwrap();

        assert_eq!(page.value_of(title).chars().count(), TITLE_LIMIT);
        assert_eq!(page.text_of(editor), "周末去露营 #露营 ");
        assert!(report.get(Field::Tags).unwrap().success);
    }

    #[tokio::test]
    async fn both_cover_slots_fall_back_to_injection_when_upload_fails() {
        let page = Arc::new(MemoryPage::new(PUBLISH_URL));
        page.add(MemoryElement::input("input[placeholder*='填写作品标题']"));
        page.add(MemoryElement::new("div", "[class*='coverControl']"));
        page.add_component("#root", "verticalCover");
        page.add_component("#root", "horizontalCover");
        page.add(MemoryElement::new("div", "#root"));
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "https://creator.douyin.com/web/api/media/upload/cover/",
            json!({"code": 8, "message": "forbidden"}),
        );
        page.set_cookie("passport_csrf_token", "abc");
        let douyin = adapter(page.clone(), transport.clone());

        let request = FillRequest {
            video_title: Some("t".into()),
            cover_image: Some(ImageAsset::from_bytes("c.jpg", "image/jpeg", b"jpg")),
            ..Default::default()
        };
        let report = douyin.fill_content(&request).await.unwrap();

        let cover = report.get(Field::CoverImage).unwrap();
        assert!(cover.success, "{:?}", cover);
        assert_eq!(
            cover.value.as_deref(),
            Some("3:4=injected:verticalCover,4:3=injected:horizontalCover")
        );
        assert_eq!(transport.calls().len(), 2);
        assert!(page
            .component_value("#root", "verticalCover")
            .and_then(|v| v.as_str().map(|s| s.starts_with("data:image/jpeg")))
            .unwrap_or(false));
    }
}
