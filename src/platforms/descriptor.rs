use log::warn;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::models::Field;
use crate::error::{Error, Result};

/// Prefix marking a URL pattern as a raw regular expression instead of a glob.
pub const REGEX_PATTERN_PREFIX: &str = "re:";

/// One query, or an ordered list of alternative queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    Single(String),
    Alternatives(Vec<String>),
}

impl SelectorSpec {
    pub fn one(selector: &str) -> Self {
        Self::Single(selector.to_string())
    }

    pub fn any(selectors: &[&str]) -> Self {
        Self::Alternatives(selectors.iter().map(|s| s.to_string()).collect())
    }

    pub fn candidates(&self) -> Vec<&str> {
        match self {
            Self::Single(selector) => vec![selector.as_str()],
            Self::Alternatives(list) => list.iter().map(String::as_str).collect(),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            return Err("empty selector list".to_string());
        }
        if candidates.iter().any(|s| s.trim().is_empty()) {
            return Err("blank selector".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Html,
    Text,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Html => "html",
            ContentType::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialHandling {
    /// Poll discovery until the editor renders.
    pub wait_for_editor: bool,
    /// Repeat every query inside attached shadow roots.
    pub shadow_dom: bool,
    /// For alternatives, accept the first *visible* match across candidates.
    pub visible_candidates: bool,
    /// Editor validation requires the title element.
    pub require_title: bool,
    /// Text copy prepends the title.
    pub copy_with_title: bool,
}

fn default_cache_timeout_ms() -> u64 {
    30_000
}

/// Static per-platform configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    pub id: String,
    pub display_name: String,
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub selectors: BTreeMap<Field, SelectorSpec>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub special_handling: SpecialHandling,
    #[serde(default = "default_cache_timeout_ms")]
    pub cache_timeout_ms: u64,
    #[serde(default)]
    pub priority: i32,
}

impl Descriptor {
    pub fn new(id: &str, display_name: &str, url_patterns: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            url_patterns: url_patterns.iter().map(|p| p.to_string()).collect(),
            selectors: BTreeMap::new(),
            content_type: ContentType::Html,
            special_handling: SpecialHandling::default(),
            cache_timeout_ms: default_cache_timeout_ms(),
            priority: 0,
        }
    }

    pub fn selector(mut self, field: Field, spec: SelectorSpec) -> Self {
        self.selectors.insert(field, spec);
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn special_handling(mut self, flags: SpecialHandling) -> Self {
        self.special_handling = flags;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn cache_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.cache_timeout_ms = timeout_ms;
        self
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn selector_for(&self, field: Field) -> Option<&SelectorSpec> {
        self.selectors.get(&field)
    }

    /// Load-time validation. URL patterns are not compiled here; a pattern
    /// that fails to compile only ever acts as a non-match.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidDescriptor {
            id: self.id.clone(),
            reason,
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id".to_string()));
        }
        if self.url_patterns.is_empty() {
            return Err(invalid("no url patterns".to_string()));
        }
        if self.cache_timeout_ms == 0 {
            return Err(invalid("cache timeout must be positive".to_string()));
        }
        for (field, spec) in &self.selectors {
            spec.validate()
                .map_err(|reason| invalid(format!("selector for {}: {}", field, reason)))?;
        }
        Ok(())
    }

    /// True when `url` matches any URL pattern.
    pub fn matches_url(&self, url: &str) -> bool {
        self.url_patterns.iter().any(|pattern| match compile_url_pattern(pattern) {
            Ok(regex) => regex.is_match(url),
            Err(e) => {
                warn!("[{}] {}", self.id, e);
                false
            }
        })
    }
}

/// Compile a URL glob into an anchored, case-insensitive regex.
///
/// `*` matches any sequence; everything else is literal. Patterns prefixed
/// with [`REGEX_PATTERN_PREFIX`] are taken as regex bodies.
pub fn compile_url_pattern(pattern: &str) -> Result<Regex> {
    let body = match pattern.strip_prefix(REGEX_PATTERN_PREFIX) {
        Some(raw) => raw.to_string(),
        None => pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*"),
    };
    RegexBuilder::new(&format!("^(?:{})$", body))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::SelectorCompile {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publish_descriptor() -> Descriptor {
        Descriptor::new("cms", "CMS", &["*.example.com/publish/*"])
    }

    #[test]
    fn glob_matches_publish_but_not_draft() {
        let descriptor = publish_descriptor();
        assert!(descriptor.matches_url("https://cms.example.com/publish/123"));
        assert!(!descriptor.matches_url("https://cms.example.com/draft/123"));
        assert!(!descriptor.matches_url("https://cms.other.org/publish/123"));
    }

    #[test]
    fn glob_is_case_insensitive_and_literal() {
        let descriptor = Descriptor::new("q", "Q", &["https://a.example.com/edit?id=*"]);
        assert!(descriptor.matches_url("HTTPS://A.EXAMPLE.COM/edit?id=9"));
        // `?` and `.` are literal, not regex metacharacters
        assert!(!descriptor.matches_url("https://aXexample.com/edit?id=9"));
        assert!(!descriptor.matches_url("https://a.example.com/editxid=9"));
    }

    #[test]
    fn glob_star_spans_any_segment() {
        let descriptor = publish_descriptor();
        for segment in ["1", "a/b/c", "", "x?y=z"] {
            let url = format!("https://cms.example.com/publish/{}", segment);
            assert!(descriptor.matches_url(&url), "{}", url);
        }
    }

    #[test]
    fn broken_regex_pattern_is_a_non_match() {
        let descriptor = Descriptor::new("bad", "Bad", &["re:(unclosed", "*.good.com/*"]);
        assert!(matches!(
            compile_url_pattern("re:(unclosed"),
            Err(Error::SelectorCompile { .. })
        ));
        assert!(!descriptor.matches_url("https://(unclosed"));
        assert!(descriptor.matches_url("https://www.good.com/x"));
    }

    #[test]
    fn selector_spec_deserializes_from_string_or_list() {
        let single: SelectorSpec = serde_json::from_str(r##""#title""##).unwrap();
        let list: SelectorSpec = serde_json::from_str(r##"["#a", "#b"]"##).unwrap();
        assert_eq!(single, SelectorSpec::one("#title"));
        assert_eq!(list.candidates(), vec!["#a", "#b"]);
    }

    #[test]
    fn validation_rejects_blank_selectors_and_zero_timeout() {
        let blank = publish_descriptor().selector(Field::Title, SelectorSpec::any(&["#a", " "]));
        assert!(blank.validate().is_err());
        let zero = publish_descriptor().cache_timeout_ms(0);
        assert!(zero.validate().is_err());
        assert!(publish_descriptor().validate().is_ok());
    }
}
