use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use super::common;
use super::descriptor::{ContentType, Descriptor, SelectorSpec, SpecialHandling};
use super::models::{Field, FieldValue, FillReport, FillRequest, FillResult};
use super::traits::{fill_field_with, AdapterCore, DiscoveredElementSet, PlatformAdapter, PlatformExtras};
use crate::browser::ElementRef;
use crate::context::EngineContext;
use crate::error::Result;

pub const ID: &str = "wechat_mp";

const TITLE_LIMIT: usize = 64;
const AUTHOR_LIMIT: usize = 8;
const DIGEST_LIMIT: usize = 120;

pub fn descriptor() -> Descriptor {
    Descriptor::new(
        ID,
        "微信公众号",
        &[
            "https://mp.weixin.qq.com/cgi-bin/appmsg*",
            "https://mp.weixin.qq.com/cgi-bin/operate_appmsg*",
        ],
    )
    .selector(
        Field::Title,
        SelectorSpec::any(&["#title", "textarea.js_title", ".title-editor__input"]),
    )
    .selector(Field::Author, SelectorSpec::any(&["#author", "input.js_author"]))
    .selector(
        Field::Content,
        SelectorSpec::any(&[
            ".ProseMirror",
            "#ueditor_0",
            ".edui-editor-body [contenteditable='true']",
        ]),
    )
    .selector(
        Field::Digest,
        SelectorSpec::any(&["#js_description", "textarea[name='digest']"]),
    )
    .content_type(ContentType::Html)
    .special_handling(SpecialHandling {
        wait_for_editor: true,
        visible_candidates: true,
        require_title: true,
        ..Default::default()
    })
    .priority(10)
}

pub struct WechatMpAdapter {
    core: AdapterCore,
}

impl WechatMpAdapter {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self::with_descriptor(ctx, descriptor())
    }

    pub fn with_descriptor(ctx: Arc<EngineContext>, descriptor: Descriptor) -> Self {
        Self {
            core: AdapterCore::new(descriptor, PlatformExtras::default(), ctx),
        }
    }
}

#[async_trait]
impl PlatformAdapter for WechatMpAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }

    async fn fill_field(&self, field: Field, el: ElementRef, value: FieldValue<'_>) -> Result<String> {
        let limit = match field {
            Field::Title => TITLE_LIMIT,
            Field::Author => AUTHOR_LIMIT,
            Field::Digest => DIGEST_LIMIT,
            _ => return fill_field_with(self, field, el, value).await,
        };
        match value {
            FieldValue::Text(text) => {
                let text = common::truncate_chars(text, limit);
                self.write_text(el, &text).await?;
                Ok(text)
            }
            _ => fill_field_with(self, field, el, value).await,
        }
    }

    /// Without a digest the platform publishes an empty summary; derive one
    /// from the article body.
    async fn post_fill(
        &self,
        request: &FillRequest,
        set: &DiscoveredElementSet,
        report: &mut FillReport,
    ) -> Result<()> {
        if request.value_for(Field::Digest).is_some() {
            return Ok(());
        }
        let content_filled = report.get(Field::Content).is_some_and(|r| r.success);
        let (Some(content), Some(el), true) = (request.content.as_deref(), set.get(Field::Digest), content_filled)
        else {
            debug!("[{} fill] no digest to derive", self.id());
            return Ok(());
        };
        let plain = common::html_to_text(content).replace('\n', " ");
        let digest = common::truncate_chars(plain.trim(), DIGEST_LIMIT);
        if digest.is_empty() {
            return Ok(());
        }
        let result = match self.write_text(el, &digest).await {
            Ok(()) => {
                info!("[{} fill] digest derived from content", self.id());
                FillResult::ok(digest)
            }
            Err(e) => FillResult::failed(e),
        };
        report.record(Field::Digest, result);
        Ok(())
    }
}
