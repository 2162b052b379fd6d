use thiserror::Error;

use crate::platforms::models::Field;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the autofill engine.
///
/// Only [`Error::NotEditorPage`] escapes `fill_content`; everything else is
/// either captured per field or absorbed by a fallback chain.
#[derive(Error, Debug)]
pub enum Error {
    #[error("NOT_EDITOR_PAGE: no {platform} editor detected at {url}")]
    NotEditorPage { platform: String, url: String },

    #[error("element for field `{field}` not found or not writable")]
    ElementNotFound { field: Field },

    #[error("upload failed at {stage}: {reason}")]
    UploadFailed { stage: String, reason: String },

    #[error("state injection matched no property `{property}`")]
    InjectionFailed { property: String },

    #[error("pattern `{pattern}` failed to compile: {reason}")]
    SelectorCompile { pattern: String, reason: String },

    #[error("invalid descriptor `{id}`: {reason}")]
    InvalidDescriptor { id: String, reason: String },

    #[error("field `{field}` is not supported by {platform}")]
    UnsupportedField { platform: String, field: Field },

    #[error("page error: {0}")]
    Page(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn upload(stage: impl Into<String>, reason: impl ToString) -> Self {
        Self::UploadFailed {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error is the "no editor detected" precondition.
    pub fn is_not_editor_page(&self) -> bool {
        matches!(self, Self::NotEditorPage { .. })
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Page(format!("{:#}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
