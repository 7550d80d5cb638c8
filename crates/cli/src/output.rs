// Row printing for query/update results.
// Text mode: one line per row, `<Tag> key=value ...`.
// JSON mode: one object per line, {"tag": ..., "row": {...}}.

use dalclient::{DalResponse, RecordSource, RowData, TagSelection};
use serde_json::Value;

/// Strings unquoted, null as empty, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub fn format_row(tag: &str, row: &RowData) -> String {
    let mut line = tag.to_string();
    for (name, value) in row {
        line.push(' ');
        line.push_str(name);
        line.push('=');
        line.push_str(&display_value(value));
    }
    line
}

pub fn format_row_json(tag: &str, row: &RowData) -> String {
    serde_json::json!({ "tag": tag, "row": row }).to_string()
}

/// Render every row of `response` (restricted to `tags` when non-empty) into
/// lines. Returns the server's error message instead when there is one.
pub fn render_response(response: &DalResponse, tags: &[String], json: bool) -> Result<Vec<String>, String> {
    let mut lines = Vec::new();
    let mut error = None;

    response.visit_results(
        |tag, row| match tag {
            Some(tag) => {
                lines.push(if json { format_row_json(tag, row) } else { format_row(tag, row) });
                true
            }
            None => {
                error = Some(row.values().map(display_value).collect::<Vec<_>>().join(", "));
                false
            }
        },
        TagSelection::from(tags.to_vec()),
    );

    match error {
        Some(message) => Err(message),
        None => Ok(lines),
    }
}

/// Print the rows to stdout; returns the server error message, if any.
pub fn print_response(response: &DalResponse, tags: &[String], json: bool) -> Option<String> {
    match render_response(response, tags, json) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            None
        }
        Err(message) => Some(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dalclient::response::build_response;
    use dalclient::{ResponseFormat, TransportOutcome};

    fn json_response(body: &str) -> DalResponse {
        build_response(
            "http://dal.test/dal/list/genus",
            ResponseFormat::Json,
            TransportOutcome::Success { status: 200, body: body.to_string() },
        )
    }

    #[test]
    fn test_text_rows() {
        let response = json_response(
            r#"{"RecordMeta":[{"TagName":"Genus"}],"Genus":[{"GenusId":"1","GenusName":"Wheat"},{"GenusId":2,"GenusName":null}]}"#,
        );
        let lines = render_response(&response, &[], false).unwrap();
        assert_eq!(lines, vec!["Genus GenusId=1 GenusName=Wheat", "Genus GenusId=2 GenusName="]);
    }

    #[test]
    fn test_json_rows_and_tag_filter() {
        let response = json_response(
            r#"{"Genus":[{"GenusId":"1"}],"Pagination":[{"Page":"1"}]}"#,
        );
        let lines = render_response(&response, &["Pagination".to_string()], true).unwrap();
        assert_eq!(lines.len(), 1);
        let value: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["tag"], "Pagination");
        assert_eq!(value["row"]["Page"], "1");
    }

    #[test]
    fn test_server_error_is_returned() {
        let response = json_response(r#"{"Error":[{"Message":"Unknown genus"}]}"#);
        assert_eq!(render_response(&response, &[], false), Err("Unknown genus".to_string()));
    }
}
