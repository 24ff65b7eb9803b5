//! Turning Lightdash error payloads into one actionable message.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of every enriched message. Agents key off this literal.
pub const ERROR_PREFIX: &str = "Lightdash API error";

/// Appended when a validation detail says the filters object is required.
pub const FILTERS_SUGGESTION: &str = " Suggestion: include a filters object in the query, even an empty one such as {\"dimensions\": {}, \"metrics\": {}}.";

/// Appended when a validation detail mentions dimensions or metrics.
pub const FIELDS_SUGGESTION: &str = " Suggestion: verify every dimension and metric ID against the explore schema (use get_explore to list the available fields).";

/// Appended when a validation detail mentions the explore.
pub const EXPLORE_SUGGESTION: &str = " Suggestion: verify that the explore (table) name exists in this project (use list_explores).";

/// Failure reported by the Lightdash API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
    /// Error class, e.g. `NotFoundError` or `ParameterError`.
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Per-field validation details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiError {
    /// Error with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach validation data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// One entry of [`ApiError::data`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Text(String),
    Object { message: String },
}

impl ErrorDetail {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Object { message: text } => text,
        }
    }
}

/// Collect `"{field}: {detail}"` strings from the error's validation data.
///
/// Entries whose value is neither a string nor an object with a string
/// `message` are skipped.
pub fn validation_details(error: &ApiError) -> Vec<String> {
    let Some(entries) = error.data.as_ref().and_then(Value::as_object) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|(field, value)| {
            serde_json::from_value::<ErrorDetail>(value.clone())
                .ok()
                .map(|detail| format!("{field}: {}", detail.into_text()))
        })
        .collect()
}

/// Build the diagnostic string for an API error.
///
/// Suggestions are appended for every known pattern found in the
/// validation details, in a fixed order.
pub fn enrich_error(error: &ApiError) -> String {
    let mut out = format!("{ERROR_PREFIX}: {}", error.name);
    if let Some(ref message) = error.message {
        out.push_str(", ");
        out.push_str(message);
    }

    let details = validation_details(error);
    if details.is_empty() {
        return out;
    }

    out.push_str(". Validation errors: ");
    out.push_str(&details.join(", "));

    if details
        .iter()
        .any(|d| d.contains("filters") && d.contains("required"))
    {
        out.push_str(FILTERS_SUGGESTION);
    }
    if details
        .iter()
        .any(|d| d.contains("dimensions") || d.contains("metrics"))
    {
        out.push_str(FIELDS_SUGGESTION);
    }
    if details
        .iter()
        .any(|d| d.contains("exploreId") || d.contains("explore"))
    {
        out.push_str(EXPLORE_SUGGESTION);
    }

    out
}
