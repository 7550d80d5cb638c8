use serde_json::Value;

use super::{error_row, RecordSource, ResponseMeta, RowData};
use crate::dal_util::{ATTR_MESSAGE, TAG_ERROR};

/// A response with no server document, only a synthesized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    meta: ResponseMeta,
    message: String,
}

impl ErrorResponse {
    pub fn new(meta: ResponseMeta, message: impl Into<String>) -> Self {
        Self { meta, message: message.into() }
    }

    /// Precondition failure detected before any request was sent.
    /// Reported as status 200 with `reason` as both reason and raw text.
    pub fn local(
        url: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let reason = reason.into();
        Self::new(
            ResponseMeta::new(url, 200, Some(reason.clone()), reason),
            message,
        )
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl RecordSource for ErrorResponse {
    fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    fn first_record(&self, tag: &str) -> RowData {
        let mut row = RowData::new();
        if tag == TAG_ERROR {
            row.insert(ATTR_MESSAGE.to_string(), Value::String(self.message.clone()));
        }
        row
    }

    fn response_error_message(&self) -> Option<String> {
        Some(self.message.clone())
    }

    fn record_meta_tag_names(&self, _fallback: bool) -> Vec<String> {
        Vec::new()
    }

    fn results(&self, tag: &str) -> Vec<RowData> {
        if tag == TAG_ERROR {
            vec![error_row(&self.message)]
        } else {
            Vec::new()
        }
    }
}
