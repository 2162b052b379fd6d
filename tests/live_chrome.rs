//! Drives a real Chrome tab. Run with `cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use multi_platform_autofill::browser::{chrome, connect_to_chrome, CdpPage, PageDriver};
use multi_platform_autofill::events::EventBus;
use multi_platform_autofill::platforms::{ContentType, Descriptor, GenericAdapter, PlatformAdapter, SelectorSpec};
use multi_platform_autofill::{EngineConfig, EngineContext, Field, FillRequest};

const FORM: &str = "data:text/html,<input id='title'><div id='body' contenteditable='true'></div>";

#[tokio::test]
#[ignore] // needs a local Chrome
async fn fills_a_live_form() {
    multi_platform_autofill::logging::init_for_tests();
    let path = chrome::detect_chrome().expect("Chrome not installed");
    let profile = std::env::temp_dir().join("multi-platform-autofill-live");
    let (mut child, port) = chrome::launch_chrome_with_debug(&path, &profile, FORM).expect("launch failed");
    chrome::wait_for_chrome_ready(port, Duration::from_secs(30))
        .await
        .expect("Chrome not ready");
    let (_browser, page) = connect_to_chrome(port).await.expect("connect failed");

    let driver = Arc::new(CdpPage::new(page));
    let ctx = EngineContext::live(driver.clone(), EventBus::default(), EngineConfig::default()).unwrap();
    let descriptor = Descriptor::new("live", "Live", &["data:*"])
        .selector(Field::Title, SelectorSpec::one("#title"))
        .selector(Field::Content, SelectorSpec::one("#body"))
        .content_type(ContentType::Text);
    let adapter = GenericAdapter::new(ctx, descriptor);

    let request = FillRequest {
        title: Some("Hello".into()),
        content: Some("World".into()),
        ..Default::default()
    };
    let report = adapter.fill_content(&request).await;
    let _ = child.kill();

    let report = report.unwrap();
    assert!(report.get(Field::Title).unwrap().success);
    assert!(report.get(Field::Content).unwrap().success);
    let title = driver.query_all(None, "#title").await.unwrap();
    assert_eq!(driver.value(title[0]).await.unwrap(), "Hello");
}
