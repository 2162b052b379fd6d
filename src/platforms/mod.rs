pub mod common;
pub mod descriptor;
pub mod generic;
pub mod models;
pub mod registry;
pub mod traits;

pub mod bilibili;
pub mod douyin;
pub mod wechat_channels;
pub mod wechat_mp;
pub mod weibo;
pub mod xiaohongshu;

pub use descriptor::{ContentType, Descriptor, SelectorSpec, SpecialHandling};
pub use generic::GenericAdapter;
pub use registry::PlatformRegistry;
pub use traits::{AdapterCore, DiscoveredElementSet, FillPhase, PlatformAdapter, PlatformExtras, PlatformInfo};
