//! Fills article and video fields into the native publishing editors of
//! third-party platforms through a Chrome page.

pub mod browser;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod logging;
pub mod platforms;
pub mod scheduler;
pub mod transport;

pub use config::EngineConfig;
pub use context::EngineContext;
pub use error::{Error, Result};
pub use events::{EventBus, LifecycleEvent};
pub use platforms::models::{CopyResult, Field, FillReport, FillRequest, FillResult, ImageAsset};
pub use platforms::{PlatformAdapter, PlatformRegistry};
