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

pub const ID: &str = "bilibili";

const TITLE_LIMIT: usize = 80;
const DESCRIPTION_LIMIT: usize = 2000;

pub fn descriptor() -> Descriptor {
    Descriptor::new(
        ID,
        "哔哩哔哩",
        &[
            "https://member.bilibili.com/platform/upload/video/*",
            "https://member.bilibili.com/york/videoup*",
        ],
    )
    .selector(
        Field::VideoTitle,
        SelectorSpec::any(&[".video-title input", "input[placeholder*='请输入稿件标题']"]),
    )
    .selector(
        Field::VideoDescription,
        SelectorSpec::any(&[".desc-container .ql-editor", ".archive-info-editor .ql-editor"]),
    )
    .selector(
        Field::Tags,
        SelectorSpec::any(&[".tag-input-wrp input", "input[placeholder*='按回车键Enter创建标签']"]),
    )
    .selector(Field::CoverImage, SelectorSpec::any(&[".cover-upload", ".cover-v2-preview"]))
    .content_type(ContentType::Text)
    .special_handling(SpecialHandling {
        wait_for_editor: true,
        visible_candidates: true,
        ..Default::default()
    })
}

pub fn extras() -> PlatformExtras {
    PlatformExtras {
        tag_entry: Some(TagEntry {
            suggestion_container: vec![".tag-input-wrp .suggest-list".to_string()],
            suggestion_items: vec![".tag-input-wrp .suggest-item".to_string()],
            recommended: vec![".hot-tag-container .hot-tag-item".to_string()],
            commit_with_enter: true,
            max_tags: Some(10),
            ..Default::default()
        }),
        cover_slots: vec![CoverSlot {
            label: "16:9".to_string(),
            upload: Some(UploadEndpoint {
                url: "https://member.bilibili.com/x/vu/web/cover/up".to_string(),
                token_cookie: "bili_jct".to_string(),
                token_field: "csrf".to_string(),
                file_field: "cover".to_string(),
                extra_fields: Vec::new(),
            }),
            injection: vec![
                InjectionCandidate::new("#video-up-app", "cover"),
                InjectionCandidate::new(".cover-upload", "coverUrl").with_refresh("$forceUpdate"),
            ],
            ui: CoverUi {
                trigger: vec![".cover-upload .edit-text".to_string(), ".cover-v2-preview .cover-edit".to_string()],
                aspect_tab: Vec::new(),
                file_input: vec![
                    ".cover-editor input[type='file']".to_string(),
                    ".bcc-upload input[type='file']".to_string(),
                ],
                confirm: vec![
                    ".cover-editor .button-confirm".to_string(),
                    ".bcc-dialog__footer .bcc-button--primary".to_string(),
                ],
            },
        }],
        image_inputs: Vec::new(),
    }
}

pub struct BilibiliAdapter {
    core: AdapterCore,
}

impl BilibiliAdapter {
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
impl PlatformAdapter for BilibiliAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    /// The upload form only renders its title input once a video is attached.
    fn validate(&self, elements: &BTreeMap<Field, ElementRef>) -> bool {
        elements.contains_key(&Field::VideoTitle)
    }

    async fn fill_field(&self, field: Field, el: ElementRef, value: FieldValue<'_>) -> Result<String> {
        match (field, value) {
            (Field::VideoTitle, FieldValue::Text(title)) => {
                let title = common::truncate_chars(title, TITLE_LIMIT);
                self.write_text(el, &title).await?;
                Ok(title)
            }
            (Field::VideoDescription, FieldValue::Text(description)) => {
                let description = common::truncate_chars(description, DESCRIPTION_LIMIT);
                self.write_text(el, &description).await?;
                Ok(description)
            }
            _ => fill_field_with(self, field, el, value).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::memory::{DomAction, Effect, Trigger};
    use crate::browser::{MemoryElement, MemoryPage};
    use crate::config::EngineConfig;
    use crate::events::EventBus;
    use crate::platforms::models::{FillRequest, ImageAsset};
    use crate::scheduler::VirtualScheduler;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    const UPLOAD_URL: &str = "https://member.bilibili.com/platform/upload/video/frame";

    fn adapter(page: Arc<MemoryPage>, transport: Arc<ScriptedTransport>) -> BilibiliAdapter {
        let ctx = EngineContext::new(
            page,
            Arc::new(VirtualScheduler::new()),
            transport,
            EventBus::default(),
            EngineConfig::default(),
        );
        BilibiliAdapter::new(ctx)
    }

    fn cover_request() -> FillRequest {
        FillRequest {
            video_title: Some("周末 vlog".into()),
            cover_image: Some(ImageAsset::from_bytes("cover.png", "image/png", b"png")),
            ..Default::default()
        }
    }

    fn upload_form(page: &MemoryPage) {
        page.add(MemoryElement::input(".video-title input"));
        page.add(MemoryElement::new("div", ".cover-upload"));
    }

    #[tokio::test]
    async fn uploaded_cover_is_injected_into_vue_state() {
        let page = Arc::new(MemoryPage::new(UPLOAD_URL));
        upload_form(&page);
        page.add(MemoryElement::new("div", "#video-up-app"));
        page.add_component("#video-up-app", "cover");
        page.set_cookie("bili_jct", "csrf-token");
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            "https://member.bilibili.com/x/vu/web/cover/up",
            json!({"code": 0, "data": {"url": "//i0.hdslb.com/bfs/archive/cover.jpg"}}),
        );
        let bilibili = adapter(page.clone(), transport.clone());

        let report = bilibili.fill_content(&cover_request()).await.unwrap();
        assert_eq!(
            report.get(Field::CoverImage).unwrap().value.as_deref(),
            Some("16:9=injected:cover")
        );
        assert_eq!(
            page.component_value("#video-up-app", "cover"),
            Some(json!("https://i0.hdslb.com/bfs/archive/cover.jpg"))
        );
        let form = &transport.calls()[0].form;
        assert!(form.contains(&("csrf".to_string(), "csrf-token".to_string())));
        assert!(form.iter().any(|(k, v)| k == "cover" && v.starts_with("data:image/png;base64,")));
    }

    #[tokio::test]
    async fn cover_dialog_is_used_when_nothing_can_be_injected() {
        let page = Arc::new(MemoryPage::new(UPLOAD_URL));
        upload_form(&page);
        let edit = page.add(MemoryElement::button(".cover-upload .edit-text", "更换封面"));
        let dialog_input = page.add(MemoryElement::input(".cover-editor input[type='file']").hidden());
        let confirm = page.add(MemoryElement::button(".cover-editor .button-confirm", "完成").hidden());
        page.on(edit, Trigger::Click, Effect::Reveal(confirm));
        let bilibili = adapter(page.clone(), Arc::new(ScriptedTransport::new()));

        let report = bilibili.fill_content(&cover_request()).await.unwrap();
        assert_eq!(report.get(Field::CoverImage).unwrap().value.as_deref(), Some("16:9=ui"));
        assert_eq!(page.files_of(dialog_input), vec!["cover.png".to_string()]);
        assert_eq!(page.clicks_on(confirm), 1);
        let actions = page.actions();
        let clicked_edit = actions.iter().position(|a| *a == DomAction::Click(edit));
        let set_files = actions.iter().position(|a| matches!(a, DomAction::SetFiles(..)));
        assert!(clicked_edit < set_files);
    }

    #[tokio::test]
    async fn tags_are_committed_with_enter() {
        let page = Arc::new(MemoryPage::new(UPLOAD_URL));
        upload_form(&page);
        let tag_input = page.add(MemoryElement::input(".tag-input-wrp input"));
        let bilibili = adapter(page.clone(), Arc::new(ScriptedTransport::new()));

        let request = FillRequest {
            video_title: Some("t".into()),
            tags: Some(vec!["vlog".into(), "#旅行".into()]),
            ..Default::default()
        };
        let report = bilibili.fill_content(&request).await.unwrap();
        assert_eq!(report.get(Field::Tags).unwrap().value.as_deref(), Some("vlog,旅行"));
        let enters = page
            .events_on(tag_input)
            .into_iter()
            .filter(|e| e == "keydown")
            .count();
        assert_eq!(enters, 2);
    }

    #[tokio::test]
    async fn missing_title_input_is_not_an_editor() {
        let page = Arc::new(MemoryPage::new(UPLOAD_URL));
        page.add(MemoryElement::new("div", ".cover-upload"));
        let bilibili = adapter(page, Arc::new(ScriptedTransport::new()));
        let err = bilibili.fill_content(&cover_request()).await.unwrap_err();
        assert!(err.is_not_editor_page());
    }
}
