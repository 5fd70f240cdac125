//! One decoded line of a pull/push/import/build progress stream

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ErrorDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Progress record as the engine emits it. Fields are only readable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(
        default,
        deserialize_with = "raw_text",
        skip_serializing_if = "Option::is_none"
    )]
    progress_detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_detail: Option<ErrorDetail>,
}

/// The engine sends `progressDetail` as an object; keep it as text.
fn raw_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ProgressEvent {
    pub fn builder() -> ProgressEventBuilder {
        ProgressEventBuilder::default()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn progress_detail(&self) -> Option<&str> {
        self.progress_detail.as_deref()
    }

    pub fn stream(&self) -> Option<&str> {
        self.stream.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_detail(&self) -> Option<&ErrorDetail> {
        self.error_detail.as_ref()
    }

    /// `errorDetail.message` when present, otherwise `error`
    pub fn error_message(&self) -> Option<&str> {
        self.error_detail
            .as_ref()
            .and_then(|detail| non_empty(&detail.message))
            .or_else(|| non_empty(&self.error))
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = non_empty(&self.id) {
            write!(f, "{}:", id)?;
        }
        if let Some(status) = non_empty(&self.status) {
            f.write_str(status)?;
        }
        if let Some(stream) = non_empty(&self.stream) {
            f.write_str(stream)?;
        }
        if let Some(error) = non_empty(&self.error) {
            f.write_str(error)?;
            if let Some(message) = self.error_detail.as_ref().and_then(|d| d.message()) {
                write!(f, ":{}", message)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProgressEventBuilder {
    event: ProgressEvent,
}

impl ProgressEventBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.event.id = Some(id.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.event.status = Some(status.into());
        self
    }

    pub fn progress_detail(mut self, detail: impl Into<String>) -> Self {
        self.event.progress_detail = Some(detail.into());
        self
    }

    pub fn stream(mut self, stream: impl Into<String>) -> Self {
        self.event.stream = Some(stream.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.event.error = Some(error.into());
        self
    }

    pub fn error_detail(mut self, message: impl Into<String>) -> Self {
        self.event.error_detail = Some(ErrorDetail::new(message));
        self
    }

    pub fn build(self) -> ProgressEvent {
        self.event
    }
}
