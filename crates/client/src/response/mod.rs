//! Format-agnostic view of a completed DAL exchange.
//!
//! Every exchange ends in a [`DalResponse`]: an error synthesized locally,
//! an XML document, or a JSON document. All three answer the same
//! [`RecordSource`] contract, so callers read rows the same way whatever
//! the server actually sent.
//!
//! Rows are flat: field name to string or scalar, as the DAL emits them.

mod error;
mod json;
mod reconcile;
mod xml;

pub use error::ErrorResponse;
pub use json::JsonResponse;
pub use reconcile::{build_response, convert_dal_xml_to_json};
pub use xml::{XmlDocument, XmlElement, XmlParseError, XmlResponse};

use dalclient_config::ResponseFormat;
use serde_json::Value;

use crate::dal_util::{ATTR_MESSAGE, TAG_ERROR};

/// One record: field name to value.
pub type RowData = serde_json::Map<String, Value>;

/// Which tags [`RecordSource::visit_results`] walks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagSelection {
    /// Every tag named by the record meta, or every top-level tag present.
    #[default]
    All,
    Tags(Vec<String>),
}

impl From<()> for TagSelection {
    fn from(_: ()) -> Self {
        TagSelection::All
    }
}

impl From<&str> for TagSelection {
    fn from(tag: &str) -> Self {
        TagSelection::Tags(vec![tag.to_string()])
    }
}

impl From<String> for TagSelection {
    fn from(tag: String) -> Self {
        TagSelection::Tags(vec![tag])
    }
}

impl From<Option<&str>> for TagSelection {
    fn from(tag: Option<&str>) -> Self {
        tag.map_or(TagSelection::All, TagSelection::from)
    }
}

impl From<Vec<String>> for TagSelection {
    fn from(tags: Vec<String>) -> Self {
        TagSelection::Tags(tags)
    }
}

impl From<Vec<&str>> for TagSelection {
    fn from(tags: Vec<&str>) -> Self {
        TagSelection::Tags(tags.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for TagSelection {
    fn from(tags: &[&str]) -> Self {
        TagSelection::Tags(tags.iter().map(|t| t.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TagSelection {
    fn from(tags: [&str; N]) -> Self {
        TagSelection::Tags(tags.iter().map(|t| t.to_string()).collect())
    }
}

/// Exchange details carried by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMeta {
    pub url: String,
    pub http_status_code: u16,
    pub http_error_reason: Option<String>,
    pub response_text: String,
}

impl ResponseMeta {
    pub fn new(
        url: impl Into<String>,
        http_status_code: u16,
        http_error_reason: Option<String>,
        response_text: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            http_status_code,
            http_error_reason,
            response_text: response_text.into(),
        }
    }
}

/// The read contract shared by all response variants.
pub trait RecordSource {
    fn meta(&self) -> &ResponseMeta;

    /// First row under `tag`, or an empty row.
    fn first_record(&self, tag: &str) -> RowData;

    /// `None` when the response carries no error.
    fn response_error_message(&self) -> Option<String>;

    /// Tags named by `RecordMeta/TagName`. With `fallback`, an empty list is
    /// replaced by the top-level tags actually present.
    fn record_meta_tag_names(&self, fallback: bool) -> Vec<String>;

    /// All rows under `tag` in document order.
    fn results(&self, tag: &str) -> Vec<RowData>;

    fn url(&self) -> &str {
        &self.meta().url
    }

    fn http_status_code(&self) -> u16 {
        self.meta().http_status_code
    }

    fn http_error_reason(&self) -> Option<&str> {
        self.meta().http_error_reason.as_deref()
    }

    fn response_text(&self) -> &str {
        &self.meta().response_text
    }

    /// Whether the raw body is a DTD (`<!...`) rather than data.
    fn response_is_dtd(&self) -> bool {
        self.meta().response_text.starts_with("<!")
    }

    fn record_field_value(&self, tag: &str, attr: &str) -> Option<Value> {
        self.first_record(tag).remove(attr)
    }

    /// Call `visitor(Some(tag), row)` for every row of the selected tags, in
    /// tag order then document order. Stops as soon as the visitor returns
    /// `false` and reports `false`.
    ///
    /// An error response instead calls `visitor(None, {"Error": message})`
    /// once and returns `false`.
    fn visit_results<F>(&self, mut visitor: F, tags: impl Into<TagSelection>) -> bool
    where
        F: FnMut(Option<&str>, &RowData) -> bool,
        Self: Sized,
    {
        visit_rows(self, &mut visitor, tags.into())
    }

    /// [`RecordSource::visit_results`] with the arguments the other way round.
    fn visit_tags<F>(&self, tags: impl Into<TagSelection>, mut visitor: F) -> bool
    where
        F: FnMut(Option<&str>, &RowData) -> bool,
        Self: Sized,
    {
        visit_rows(self, &mut visitor, tags.into())
    }
}

/// Resolve a selection to concrete tag names.
pub(crate) fn resolve_tags<S: RecordSource + ?Sized>(
    source: &S,
    selection: TagSelection,
) -> Vec<String> {
    match selection {
        TagSelection::Tags(tags) if !tags.is_empty() => tags,
        _ => source.record_meta_tag_names(true),
    }
}

pub(crate) fn error_row(message: &str) -> RowData {
    let mut row = RowData::new();
    row.insert(TAG_ERROR.to_string(), Value::String(message.to_string()));
    row
}

fn visit_error(visitor: &mut dyn FnMut(Option<&str>, &RowData) -> bool, message: &str) -> bool {
    visitor(None, &error_row(message));
    false
}

pub(crate) fn visit_rows<S: RecordSource + ?Sized>(
    source: &S,
    visitor: &mut dyn FnMut(Option<&str>, &RowData) -> bool,
    selection: TagSelection,
) -> bool {
    if let Some(message) = source.response_error_message() {
        return visit_error(visitor, &message);
    }

    for tag in resolve_tags(source, selection) {
        for row in source.results(&tag) {
            if !visitor(Some(tag.as_str()), &row) {
                return false;
            }
        }
    }
    true
}

/// Text of one `Error` record: its `Message` if present, otherwise every
/// field as `name:value`.
pub(crate) fn error_message_parts<'a>(
    fields: impl IntoIterator<Item = (&'a str, String)>,
) -> Vec<String> {
    let fields: Vec<(&str, String)> = fields.into_iter().collect();
    if let Some((_, message)) = fields.iter().find(|(name, _)| *name == ATTR_MESSAGE) {
        return vec![message.clone()];
    }
    fields
        .into_iter()
        .map(|(name, value)| format!("{}:{}", name, value))
        .collect()
}

/// Value as it would appear in an attribute: strings unquoted.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Keep scalars, render nested arrays/objects as compact JSON text.
pub(crate) fn flatten_row(fields: &serde_json::Map<String, Value>) -> RowData {
    fields
        .iter()
        .map(|(k, v)| {
            let v = match v {
                Value::Array(_) | Value::Object(_) => Value::String(v.to_string()),
                scalar => scalar.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

/// A normalized DAL response.
#[derive(Debug, Clone)]
pub enum DalResponse {
    Error(ErrorResponse),
    Xml(XmlResponse),
    Json(JsonResponse),
}

impl DalResponse {
    /// A response for a problem found before any request was sent.
    pub fn local_error(
        url: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DalResponse::Error(ErrorResponse::local(url, reason, message))
    }

    /// Payload format of the parsed document; `None` for the error variant.
    pub fn format(&self) -> Option<ResponseFormat> {
        match self {
            DalResponse::Error(_) => None,
            DalResponse::Xml(_) => Some(ResponseFormat::Xml),
            DalResponse::Json(_) => Some(ResponseFormat::Json),
        }
    }

    pub fn is_error_variant(&self) -> bool {
        matches!(self, DalResponse::Error(_))
    }

    fn source(&self) -> &dyn RecordSource {
        match self {
            DalResponse::Error(r) => r,
            DalResponse::Xml(r) => r,
            DalResponse::Json(r) => r,
        }
    }
}

impl RecordSource for DalResponse {
    fn meta(&self) -> &ResponseMeta {
        self.source().meta()
    }

    fn first_record(&self, tag: &str) -> RowData {
        self.source().first_record(tag)
    }

    fn response_error_message(&self) -> Option<String> {
        self.source().response_error_message()
    }

    fn record_meta_tag_names(&self, fallback: bool) -> Vec<String> {
        self.source().record_meta_tag_names(fallback)
    }

    fn results(&self, tag: &str) -> Vec<RowData> {
        self.source().results(tag)
    }
}
