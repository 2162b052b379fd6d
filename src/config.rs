use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::platforms::descriptor::Descriptor;

pub const CONFIG_ENV: &str = "AUTOFILL_CONFIG";

/// Header/footer the user picked in the authoring app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub footer: String,
}

impl Preset {
    pub fn wrap(&self, content: &str) -> String {
        let mut out = String::with_capacity(self.header.len() + content.len() + self.footer.len());
        out.push_str(&self.header);
        out.push_str(content);
        out.push_str(&self.footer);
        out
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Authoring backend base URL
    pub backend_base_url: String,
    /// Upper bound for `wait_for_editor` descriptors
    pub wait_for_editor_timeout_ms: u64,
    /// Poll interval for discovery and element waits
    pub poll_interval_ms: u64,
    /// Pause after each synthetic input event
    pub event_pacing_ms: u64,
    /// Autocomplete polling budget for tag entry
    pub tag_poll_attempts: usize,
    pub tag_poll_delay_ms: u64,
    /// Wait for elements that appear after a click (modals, file inputs)
    pub element_wait_timeout_ms: u64,
    pub request_timeout_secs: u64,
    pub preset: Option<Preset>,
    /// Replace built-in descriptors by id
    pub descriptors: Vec<Descriptor>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_base_url: "http://127.0.0.1:3000".to_string(),
            wait_for_editor_timeout_ms: 10_000,
            poll_interval_ms: 250,
            event_pacing_ms: 50,
            tag_poll_attempts: 8,
            tag_poll_delay_ms: 250,
            element_wait_timeout_ms: 5_000,
            request_timeout_secs: 15,
            preset: None,
            descriptors: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// `$AUTOFILL_CONFIG`, else the user config dir, else defaults; then env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path)
            .filter(|p| p.exists());
        let mut config = match path {
            Some(path) => {
                info!("[config] loading {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("AUTOFILL_BACKEND_URL") {
            self.backend_base_url = url;
        }
        let number = |name: &str| std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok());
        if let Some(v) = number("AUTOFILL_WAIT_TIMEOUT_MS") {
            self.wait_for_editor_timeout_ms = v;
        }
        if let Some(v) = number("AUTOFILL_POLL_INTERVAL_MS") {
            self.poll_interval_ms = v;
        }
        if let Some(v) = number("AUTOFILL_EVENT_PACING_MS") {
            self.event_pacing_ms = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.tag_poll_attempts == 0 {
            return Err(Error::Config("tag_poll_attempts must be positive".into()));
        }
        for descriptor in &self.descriptors {
            descriptor.validate()?;
        }
        Ok(())
    }

    pub fn wait_for_editor_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_for_editor_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn event_pacing(&self) -> Duration {
        Duration::from_millis(self.event_pacing_ms)
    }

    pub fn tag_poll_delay(&self) -> Duration {
        Duration::from_millis(self.tag_poll_delay_ms)
    }

    pub fn element_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.element_wait_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("multi-platform-autofill").join("config.toml"))
}
