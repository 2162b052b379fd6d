use async_trait::async_trait;
use std::sync::Arc;

use super::descriptor::Descriptor;
use super::traits::{AdapterCore, PlatformAdapter, PlatformExtras};
use crate::context::EngineContext;

/// Adapter for descriptors that come only from configuration. Everything
/// runs on the default primitives.
pub struct GenericAdapter {
    core: AdapterCore,
}

impl GenericAdapter {
    pub fn new(ctx: Arc<EngineContext>, descriptor: Descriptor) -> Self {
        Self {
            core: AdapterCore::new(descriptor, PlatformExtras::default(), ctx),
        }
    }
}

#[async_trait]
impl PlatformAdapter for GenericAdapter {
    fn core(&self) -> &AdapterCore {
        &self.core
    }
}
