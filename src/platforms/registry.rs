use log::{info, warn};
use std::sync::Arc;

use super::descriptor::Descriptor;
use super::generic::GenericAdapter;
use super::traits::{PlatformAdapter, PlatformInfo};
use super::{bilibili, douyin, wechat_channels, wechat_mp, weibo, xiaohongshu};
use crate::context::EngineContext;

/// Adapters by id, matched against page URLs by descending priority.
#[derive(Default)]
pub struct PlatformRegistry {
    adapters: Vec<Arc<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in platforms, with descriptors from `ctx.config` replacing
    /// built-ins of the same id. Unknown ids become generic adapters.
    pub fn with_builtin(ctx: Arc<EngineContext>) -> Self {
        let overrides = &ctx.config.descriptors;
        let pick = |default: Descriptor| -> Descriptor {
            match overrides.iter().find(|d| d.id == default.id) {
                Some(custom) => {
                    info!("[registry] descriptor override for {}", custom.id);
                    custom.clone()
                }
                None => default,
            }
        };

        let builtin: Vec<Arc<dyn PlatformAdapter>> = vec![
            Arc::new(wechat_mp::WechatMpAdapter::with_descriptor(ctx.clone(), pick(wechat_mp::descriptor()))),
            Arc::new(bilibili::BilibiliAdapter::with_descriptor(ctx.clone(), pick(bilibili::descriptor()))),
            Arc::new(douyin::DouyinAdapter::with_descriptor(ctx.clone(), pick(douyin::descriptor()))),
            Arc::new(xiaohongshu::XiaohongshuAdapter::with_descriptor(
                ctx.clone(),
                pick(xiaohongshu::descriptor()),
            )),
            Arc::new(weibo::WeiboAdapter::with_descriptor(ctx.clone(), pick(weibo::descriptor()))),
            Arc::new(wechat_channels::WechatChannelsAdapter::with_descriptor(
                ctx.clone(),
                pick(wechat_channels::descriptor()),
            )),
        ];

        let mut registry = Self::new();
        for adapter in builtin {
            registry.register(adapter);
        }
        for descriptor in overrides {
            if registry.get(&descriptor.id).is_none() {
                registry.register(Arc::new(GenericAdapter::new(ctx.clone(), descriptor.clone())));
            }
        }
        registry
    }

    /// `false` when the id is already taken; the existing adapter stays.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) -> bool {
        if self.get(adapter.id()).is_some() {
            warn!("[registry] {} already registered", adapter.id());
            return false;
        }
        self.adapters.push(adapter);
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.iter().find(|a| a.id() == id).cloned()
    }

    /// Highest priority first; ties keep registration order.
    pub fn match_url(&self, url: &str) -> Option<Arc<dyn PlatformAdapter>> {
        let mut ordered: Vec<&Arc<dyn PlatformAdapter>> = self.adapters.iter().collect();
        ordered.sort_by_key(|a| std::cmp::Reverse(a.descriptor().priority));
        ordered.into_iter().find(|a| a.is_editor_page(url)).cloned()
    }

    pub fn descriptors(&self) -> Vec<&Descriptor> {
        self.adapters.iter().map(|a| a.descriptor()).collect()
    }

    pub fn platforms(&self) -> Vec<PlatformInfo> {
        self.adapters.iter().map(|a| a.info()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
