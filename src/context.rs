use std::sync::Arc;

use crate::browser::PageDriver;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::EventBus;
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::transport::{ArticleBackend, HttpTransport, Transport};

/// Everything an adapter talks to, owned by the host and passed in.
pub struct EngineContext {
    pub page: Arc<dyn PageDriver>,
    pub scheduler: Arc<dyn Scheduler>,
    pub transport: Arc<dyn Transport>,
    pub events: EventBus,
    pub config: EngineConfig,
}

impl EngineContext {
    pub fn new(
        page: Arc<dyn PageDriver>,
        scheduler: Arc<dyn Scheduler>,
        transport: Arc<dyn Transport>,
        events: EventBus,
        config: EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            page,
            scheduler,
            transport,
            events,
            config,
        })
    }

    /// Real clock and real HTTP around a live page.
    pub fn live(page: Arc<dyn PageDriver>, events: EventBus, config: EngineConfig) -> Result<Arc<Self>> {
        let transport = HttpTransport::new(config.request_timeout())
            .map_err(|e| Error::Transport(format!("{:#}", e)))?;
        Ok(Self::new(
            page,
            Arc::new(TokioScheduler),
            Arc::new(transport),
            events,
            config,
        ))
    }

    pub fn backend(&self) -> ArticleBackend {
        ArticleBackend::new(&self.config.backend_base_url, self.transport.clone())
    }

    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// Pause between synthetic input events.
    pub async fn pace(&self) {
        self.scheduler.sleep(self.config.event_pacing()).await;
    }
}
