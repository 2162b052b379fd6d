use std::sync::Arc;

use multi_platform_autofill::browser::{MemoryElement, MemoryPage};
use multi_platform_autofill::commands::fill::{copy_for_current_page, fill_current_page};
use multi_platform_autofill::commands::platforms::get_platforms;
use multi_platform_autofill::events::EventBus;
use multi_platform_autofill::scheduler::VirtualScheduler;
use multi_platform_autofill::transport::ScriptedTransport;
use multi_platform_autofill::{EngineConfig, EngineContext, Error, Field, FillRequest, PlatformRegistry};
use serde_json::json;

const OVERRIDES: &str = r##"
[[descriptors]]
id = "cms"
display_name = "CMS"
url_patterns = ["*.example.com/publish/*"]
content_type = "text"

[descriptors.selectors]
title = ["#missing", "#title-2"]
content = "#body"
"##;

fn setup(url: &str, config: EngineConfig) -> (Arc<MemoryPage>, Arc<ScriptedTransport>, Arc<EngineContext>) {
    let page = Arc::new(MemoryPage::new(url));
    let transport = Arc::new(ScriptedTransport::new());
    let ctx = EngineContext::new(
        page.clone(),
        Arc::new(VirtualScheduler::new()),
        transport.clone(),
        EventBus::default(),
        config,
    );
    (page, transport, ctx)
}

#[test]
fn glob_pattern_selects_publish_pages_only() {
    let config = EngineConfig::from_toml_str(OVERRIDES).unwrap();
    let (_, _, ctx) = setup("about:blank", config);
    let registry = PlatformRegistry::with_builtin(ctx);

    let matched = registry.match_url("https://cms.example.com/publish/123");
    assert_eq!(matched.map(|a| a.id().to_string()).as_deref(), Some("cms"));
    assert!(registry.match_url("https://cms.example.com/draft/123").is_none());
    assert_eq!(registry.descriptors().len(), 7);
    assert!(get_platforms(&registry).iter().any(|p| p.id == "cms"));
}

#[tokio::test]
async fn alternatives_fall_through_to_the_selector_that_matches() {
    let config = EngineConfig::from_toml_str(OVERRIDES).unwrap();
    let (page, _, ctx) = setup("https://cms.example.com/publish/9", config);
    let title = page.add(MemoryElement::input("#title-2"));
    let registry = PlatformRegistry::with_builtin(ctx.clone());

    let request = FillRequest {
        title: Some("Hello".into()),
        ..Default::default()
    };
    let outcome = fill_current_page(&ctx, &registry, &request).await.unwrap();
    assert_eq!(outcome.platform, "cms");
    assert!(outcome.report.get(Field::Title).unwrap().success);
    assert_eq!(page.value_of(title), "Hello");
}

#[tokio::test]
async fn unmatched_page_is_reported_as_unknown() {
    let (_, _, ctx) = setup("https://news.example.org/", EngineConfig::default());
    let registry = PlatformRegistry::with_builtin(ctx.clone());

    let err = fill_current_page(&ctx, &registry, &FillRequest::default())
        .await
        .unwrap_err();
    match err {
        Error::NotEditorPage { platform, url } => {
            assert_eq!(platform, "unknown");
            assert_eq!(url, "https://news.example.org/");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn copy_uses_the_platform_of_the_current_page() {
    let (page, transport, ctx) = setup("https://creator.xiaohongshu.com/publish/publish", EngineConfig::default());
    transport.respond(
        "http://127.0.0.1:3000/api/articles/5/platform-content",
        json!({"success": true, "data": {"title": "周末", "content": "去露营"}}),
    );
    let registry = PlatformRegistry::with_builtin(ctx.clone());

    let copied = copy_for_current_page(&ctx, &registry, "5").await.unwrap();
    assert!(copied.success);
    assert_eq!(copied.format.as_deref(), Some("text"));
    assert_eq!(page.clipboard().as_deref(), Some("周末\n\n去露营"));
    assert!(transport.calls()[0].url.ends_with("platform=xiaohongshu"));
}
