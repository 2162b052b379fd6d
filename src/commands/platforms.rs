use crate::platforms::{PlatformInfo, PlatformRegistry};

/// Every registered platform, highest priority first.
pub fn get_platforms(registry: &PlatformRegistry) -> Vec<PlatformInfo> {
    let mut platforms = registry.platforms();
    platforms.sort_by_key(|p| std::cmp::Reverse(p.priority));
    platforms
}
