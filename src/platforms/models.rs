use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Fillable fields. Declaration order is the fill order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "String")]
pub enum Field {
    Title,
    Author,
    Content,
    Digest,
    VideoTitle,
    VideoDescription,
    Tags,
    Images,
    CoverImage,
}

impl Field {
    pub const FILL_ORDER: [Field; 9] = [
        Field::Title,
        Field::Author,
        Field::Content,
        Field::Digest,
        Field::VideoTitle,
        Field::VideoDescription,
        Field::Tags,
        Field::Images,
        Field::CoverImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Author => "author",
            Field::Content => "content",
            Field::Digest => "digest",
            Field::VideoTitle => "videoTitle",
            Field::VideoDescription => "videoDescription",
            Field::Tags => "tags",
            Field::Images => "images",
            Field::CoverImage => "coverImage",
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::FILL_ORDER
            .iter()
            .copied()
            .find(|f| f.as_str() == s || f.as_str().eq_ignore_ascii_case(&s.replace('_', "")))
            .ok_or_else(|| format!("unknown field `{}`", s))
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image carried inline as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub file_name: String,
    pub mime_type: String,
    /// Base64 payload, without a `data:` prefix.
    pub data: String,
}

impl ImageAsset {
    pub fn from_bytes(file_name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(STANDARD.decode(self.data.trim())?)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data.trim())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FillRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<ImageAsset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<ImageAsset>,
}

/// A borrowed view of one request field.
#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Tags(&'a [String]),
    Images(&'a [ImageAsset]),
    Image(&'a ImageAsset),
}

impl FieldValue<'_> {
    /// Short rendering recorded as `FillResult::value`.
    pub fn summary(&self) -> String {
        match self {
            FieldValue::Text(text) => text.to_string(),
            FieldValue::Tags(tags) => tags.join(","),
            FieldValue::Images(images) => format!("{} image(s)", images.len()),
            FieldValue::Image(image) => image.file_name.clone(),
        }
    }
}

impl FillRequest {
    /// Value for `field`; empty strings and empty lists count as absent.
    pub fn value_for(&self, field: Field) -> Option<FieldValue<'_>> {
        fn text(value: &Option<String>) -> Option<FieldValue<'_>> {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(FieldValue::Text)
        }
        match field {
            Field::Title => text(&self.title),
            Field::Author => text(&self.author),
            Field::Content => text(&self.content),
            Field::Digest => text(&self.digest),
            Field::VideoTitle => text(&self.video_title),
            Field::VideoDescription => text(&self.video_description),
            Field::Tags => self
                .tags
                .as_deref()
                .filter(|tags| tags.iter().any(|t| !t.trim().is_empty()))
                .map(FieldValue::Tags),
            Field::Images => self
                .images
                .as_deref()
                .filter(|images| !images.is_empty())
                .map(FieldValue::Images),
            Field::CoverImage => self.cover_image.as_ref().map(FieldValue::Image),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FillResult {
    pub fn ok(value: impl Into<String>) -> Self {
        Self {
            success: true,
            value: Some(value.into()),
            error: None,
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FillReport(BTreeMap<Field, FillResult>);

impl FillReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, field: Field, result: FillResult) {
        self.0.insert(field, result);
    }

    pub fn get(&self, field: Field) -> Option<&FillResult> {
        self.0.get(&field)
    }

    pub fn get_mut(&mut self, field: Field) -> Option<&mut FillResult> {
        self.0.get_mut(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &FillResult)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.0.values().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.0.values().filter(|r| !r.success).count()
    }

    /// Partial success counts as success.
    pub fn is_success(&self) -> bool {
        self.0.is_empty() || self.succeeded() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CopyResult {
    pub fn copied(content: String, format: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            content: Some(content),
            format: Some(format.to_string()),
            message: message.into(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            success: false,
            content: None,
            format: None,
            message: message.into(),
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_camel_case_extras() {
        let request: FillRequest = serde_json::from_value(serde_json::json!({
            "title": "A",
            "videoTitle": "clip",
            "tags": ["rust", " "],
        }))
        .unwrap();
        assert_eq!(request.video_title.as_deref(), Some("clip"));
        assert!(matches!(request.value_for(Field::Tags), Some(FieldValue::Tags(t)) if t.len() == 2));
        assert!(request.value_for(Field::Content).is_none());
    }

    #[test]
    fn field_names_parse_in_camel_and_snake_case() {
        assert_eq!("videoTitle".parse::<Field>(), Ok(Field::VideoTitle));
        assert_eq!("cover_image".parse::<Field>(), Ok(Field::CoverImage));
        assert!("subtitle".parse::<Field>().is_err());
    }

    #[test]
    fn blank_text_counts_as_absent() {
        let request = FillRequest {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert!(request.value_for(Field::Title).is_none());
    }

    #[test]
    fn report_serializes_in_fill_order() {
        let mut report = FillReport::new();
        report.record(Field::Content, FillResult::ok("B"));
        report.record(Field::Title, FillResult::ok("A"));
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"title":{"success":true,"value":"A"},"content":{"success":true,"value":"B"}}"#
        );
    }

    #[test]
    fn partial_report_is_still_success() {
        let mut report = FillReport::new();
        report.record(Field::Title, FillResult::ok("A"));
        report.record(Field::Tags, FillResult::failed("no tag input"));
        assert!(report.is_success());
        assert_eq!((report.succeeded(), report.failed()), (1, 1));
    }

    #[test]
    fn image_asset_round_trips_through_data_url() {
        let image = ImageAsset::from_bytes("cover.png", "image/png", b"png-bytes");
        assert!(image.data_url().starts_with("data:image/png;base64,"));
        assert_eq!(image.bytes().unwrap(), b"png-bytes");
    }
}
