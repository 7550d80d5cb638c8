use serde_json::{Map, Value};

use super::{error_message_parts, flatten_row, value_text, RecordSource, ResponseMeta, RowData};
use crate::dal_util::{ATTR_TAG_NAME, TAG_ERROR, TAG_RECORD_META};

/// Shown when the DAL sends an `Error` list with nothing readable in it.
pub const ERRMSG_ERROR_WITHOUT_MESSAGE: &str = "Error without message!";

/// Response backed by a JSON object of the shape `{ "Tag": [ {row}, ... ] }`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    meta: ResponseMeta,
    json: Map<String, Value>,
}

impl JsonResponse {
    pub fn new(meta: ResponseMeta, json: Map<String, Value>) -> Self {
        Self { meta, json }
    }

    pub fn json(&self) -> &Map<String, Value> {
        &self.json
    }

    /// Object entries of the array under `tag`. Anything else is skipped.
    fn rows<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
        self.json
            .get(tag)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object)
    }
}

impl RecordSource for JsonResponse {
    fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    fn first_record(&self, tag: &str) -> RowData {
        self.rows(tag).next().map(flatten_row).unwrap_or_default()
    }

    fn response_error_message(&self) -> Option<String> {
        let errors = self.json.get(TAG_ERROR)?.as_array()?;

        let parts: Vec<String> = errors
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|err| error_message_parts(err.iter().map(|(k, v)| (k.as_str(), value_text(v)))))
            .collect();

        if parts.is_empty() {
            Some(ERRMSG_ERROR_WITHOUT_MESSAGE.to_string())
        } else {
            Some(parts.join(", "))
        }
    }

    fn record_meta_tag_names(&self, fallback: bool) -> Vec<String> {
        let tags: Vec<String> = self
            .rows(TAG_RECORD_META)
            .filter_map(|meta| meta.get(ATTR_TAG_NAME).and_then(Value::as_str))
            .map(String::from)
            .collect();

        if tags.is_empty() && fallback {
            return self.json.keys().cloned().collect();
        }
        tags
    }

    fn results(&self, tag: &str) -> Vec<RowData> {
        self.rows(tag).map(flatten_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> JsonResponse {
        JsonResponse::new(
            ResponseMeta::new("http://dal.test/x?ctype=json", 200, None, body),
            serde_json::from_str(body).unwrap(),
        )
    }

    #[test]
    fn test_rows_skip_non_objects() {
        let r = response(r#"{"Genus":[{"GenusId":"1"},"junk",{"GenusId":"2"}],"Info":{"a":1}}"#);
        let rows = r.results("Genus");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["GenusId"], "2");
        assert!(r.results("Info").is_empty());
        assert!(r.first_record("Info").is_empty());
        assert_eq!(r.first_record("Genus")["GenusId"], "1");
    }

    #[test]
    fn test_scalar_values_kept() {
        let r = response(r#"{"User":[{"UserId":5,"Enabled":true,"Note":null}]}"#);
        let row = r.first_record("User");
        assert_eq!(row["UserId"], 5);
        assert_eq!(row["Enabled"], true);
        assert!(row["Note"].is_null());
    }

    #[test]
    fn test_error_messages() {
        let r = response(r#"{"Error":[{"Message":"Unknown genus"}]}"#);
        assert_eq!(r.response_error_message().as_deref(), Some("Unknown genus"));

        let r = response(r#"{"Error":[{"GenusName":"exists","Code":7}]}"#);
        assert_eq!(r.response_error_message().as_deref(), Some("GenusName:exists, Code:7"));

        let r = response(r#"{"Error":[]}"#);
        assert_eq!(r.response_error_message().as_deref(), Some(ERRMSG_ERROR_WITHOUT_MESSAGE));

        let r = response(r#"{"Error":"not a list"}"#);
        assert!(r.response_error_message().is_none());

        let r = response(r#"{"Genus":[]}"#);
        assert!(r.response_error_message().is_none());
    }

    #[test]
    fn test_record_meta_fallback_uses_key_order() {
        let r = response(r#"{"Pagination":[{"Page":"1"}],"Genus":[{"GenusId":"1"}]}"#);
        assert!(r.record_meta_tag_names(false).is_empty());
        assert_eq!(
            r.record_meta_tag_names(true),
            vec!["Pagination".to_string(), "Genus".to_string()]
        );

        let r = response(r#"{"RecordMeta":[{"TagName":"Genus"},{"Other":"x"}],"Genus":[]}"#);
        assert_eq!(r.record_meta_tag_names(true), vec!["Genus".to_string()]);
    }
}
