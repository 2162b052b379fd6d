use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::{Error, Result};
use crate::platforms::models::{CopyResult, FillReport, FillRequest};
use crate::platforms::{PlatformAdapter, PlatformRegistry};

#[derive(Debug, Clone, Serialize)]
pub struct FillOutcome {
    pub platform: String,
    pub report: FillReport,
}

async fn adapter_for_current_page(
    ctx: &EngineContext,
    registry: &PlatformRegistry,
) -> Result<Arc<dyn PlatformAdapter>> {
    let url = ctx.page().current_url().await?;
    registry.match_url(&url).ok_or_else(|| {
        warn!("[fill] no platform matches {}", url);
        Error::NotEditorPage {
            platform: "unknown".to_string(),
            url,
        }
    })
}

/// Fill the page the browser is showing with the adapter its URL selects.
pub async fn fill_current_page(
    ctx: &EngineContext,
    registry: &PlatformRegistry,
    request: &FillRequest,
) -> Result<FillOutcome> {
    let adapter = adapter_for_current_page(ctx, registry).await?;
    info!("[fill] {} selected", adapter.id());
    let report = adapter.fill_content(request).await?;
    Ok(FillOutcome {
        platform: adapter.id().to_string(),
        report,
    })
}

/// Copy an article in the format the current page's platform accepts.
pub async fn copy_for_current_page(
    ctx: &EngineContext,
    registry: &PlatformRegistry,
    article_id: &str,
) -> Result<CopyResult> {
    let adapter = adapter_for_current_page(ctx, registry).await?;
    adapter.copy_article_content(article_id).await
}
