//! Turning a transport outcome into a [`DalResponse`] of the requested format.
//!
//! The DAL does not always honour `ctype=json`, error pages come back as
//! HTML or empty, and connection failures carry no body at all. Each of
//! those cases is one named branch below; none of them raise.

use dalclient_config::ResponseFormat;
use serde_json::{Map, Value};

use super::{DalResponse, ErrorResponse, JsonResponse, ResponseMeta, XmlDocument, XmlParseError, XmlResponse};
use crate::dal_util::{TAG_DATA, TAG_ERROR};
use crate::transport::{TransportOutcome, REASON_TRANSPORT_ERROR};

/// Reason used when a 2xx body does not parse in the requested format.
pub const REASON_PARSER_ERROR: &str = "parsererror";

/// Status 420 carries a DAL error document rather than a generic error page.
const STATUS_DAL_ERROR: u16 = 420;

const REASON_NOT_FOUND: &str = "Not Found";

const ERRMSG_INVALID_XML: &str = "invalid XML in response";
const ERRMSG_INVALID_JSON: &str = "invalid JSON in response";

const XML_DECLARATION: &str = "<?xml";

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Only a body that opens with an XML declaration is taken for a DAL
/// document; HTML error pages and proxy pages are not.
fn has_xml_declaration(body: &str) -> bool {
    body.trim_start_matches('\u{feff}').trim_start().starts_with(XML_DECLARATION)
}

fn parse_json_object(body: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(body.trim_start_matches('\u{feff}')) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn http_error_message(status: u16, reason: &str) -> String {
    format!("HTTP Error: code={} reason={}", status, reason)
}

/// Build the response for `url` from what the transport returned.
pub fn build_response(url: &str, format: ResponseFormat, outcome: TransportOutcome) -> DalResponse {
    match (format, outcome) {
        (ResponseFormat::Xml, TransportOutcome::Success { status, body }) => {
            match XmlDocument::parse(&body) {
                Ok(doc) => DalResponse::Xml(XmlResponse::new(
                    ResponseMeta::new(url, status, None, body),
                    doc,
                )),
                Err(e) => {
                    log::warn!("unparsable XML from {}: {}", url, e);
                    reconcile_xml_failure(url, status, REASON_PARSER_ERROR, body)
                }
            }
        }
        (ResponseFormat::Xml, TransportOutcome::Failure { status, reason, body }) => {
            reconcile_xml_failure(url, status, &reason, body)
        }
        (ResponseFormat::Json, TransportOutcome::Success { status, body }) => {
            match parse_json_object(&body) {
                Some(json) => DalResponse::Json(JsonResponse::new(
                    ResponseMeta::new(url, status, None, body),
                    json,
                )),
                None => reconcile_json_failure(url, status, REASON_PARSER_ERROR, body),
            }
        }
        (ResponseFormat::Json, TransportOutcome::Failure { status, reason, body }) => {
            reconcile_json_failure(url, status, &reason, body)
        }
    }
}

fn reconcile_xml_failure(url: &str, status: u16, reason: &str, body: String) -> DalResponse {
    if body.is_empty() {
        return reconcile_empty_body(url, status, reason);
    }
    if status == STATUS_DAL_ERROR || is_success(status) {
        if let Ok(doc) = XmlDocument::parse(&body) {
            return DalResponse::Xml(XmlResponse::new(
                ResponseMeta::new(url, status, Some(reason.to_string()), body),
                doc,
            ));
        }
    }
    DalResponse::Error(ErrorResponse::new(
        ResponseMeta::new(url, status, Some(reason.to_string()), body),
        http_error_message(status, reason),
    ))
}

fn reconcile_json_failure(url: &str, status: u16, reason: &str, body: String) -> DalResponse {
    if body.is_empty() {
        return reconcile_empty_body(url, status, reason);
    }
    if let Some(json) = parse_json_object(&body) {
        return DalResponse::Json(JsonResponse::new(
            ResponseMeta::new(url, status, Some(reason.to_string()), body),
            json,
        ));
    }
    if has_xml_declaration(&body) {
        return reconcile_xml_as_json(url, status, reason, body);
    }
    reconcile_invalid_body(url, status, reason, body, ERRMSG_INVALID_JSON)
}

/// No body at all: only the status line is left to report.
pub(crate) fn reconcile_empty_body(url: &str, status: u16, reason: &str) -> DalResponse {
    let mut message = http_error_message(status, reason);
    if status == 0 && reason == REASON_TRANSPORT_ERROR {
        message.push_str(" (possibly incorrect URL)");
    }
    DalResponse::Error(ErrorResponse::new(
        ResponseMeta::new(url, status, Some(reason.to_string()), ""),
        message,
    ))
}

/// JSON was requested but the DAL answered in XML.
pub(crate) fn reconcile_xml_as_json(url: &str, status: u16, reason: &str, body: String) -> DalResponse {
    let data = match convert_dal_xml_to_json(&body) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("invalid XML from {}: {}", url, e);
            return reconcile_invalid_body(url, status, reason, body, ERRMSG_INVALID_XML);
        }
    };

    if is_success(status) {
        log::warn!("{} answered XML to a JSON request, converted", url);
        let text = Value::Object(data.clone()).to_string();
        return DalResponse::Json(JsonResponse::new(ResponseMeta::new(url, status, None, text), data));
    }
    if data.contains_key(TAG_ERROR) {
        return DalResponse::Json(JsonResponse::new(
            ResponseMeta::new(url, status, Some(reason.to_string()), body),
            data,
        ));
    }
    reconcile_http_error(url, status, reason, body)
}

/// A body that parses as neither format.
pub(crate) fn reconcile_invalid_body(
    url: &str,
    status: u16,
    reason: &str,
    body: String,
    message: &str,
) -> DalResponse {
    log::warn!("{} from {} (status {}): {}", message, url, status, body);
    DalResponse::Error(ErrorResponse::new(
        ResponseMeta::new(url, status, Some(reason.to_string()), body),
        message,
    ))
}

/// A non-2xx XML page with no DAL error in it, e.g. a web server 404.
pub(crate) fn reconcile_http_error(url: &str, status: u16, reason: &str, body: String) -> DalResponse {
    let mut message = http_error_message(status, reason);
    if reason == REASON_NOT_FOUND {
        message.push_str(" (possibly incorrect URL)");
    } else {
        message.push_str(" response=");
        message.push_str(&body);
    }
    DalResponse::Error(ErrorResponse::new(
        ResponseMeta::new(url, status, Some(reason.to_string()), body),
        message,
    ))
}

/// Group the attributes of each child of the first `DATA` element into rows
/// keyed by tag name: `<DATA><A x="1"/><A x="2"/></DATA>` becomes
/// `{"A":[{"x":"1"},{"x":"2"}]}`. One level deep; grandchildren are ignored.
pub fn convert_dal_xml_to_json(xml: &str) -> Result<Map<String, Value>, XmlParseError> {
    let doc = XmlDocument::parse(xml)?;

    let mut result = Map::new();
    let Some(data) = doc.find_first(TAG_DATA) else {
        return Ok(result);
    };
    for child in &data.children {
        let rows = result
            .entry(child.name.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(rows) = rows {
            rows.push(Value::Object(child.to_row()));
        }
    }
    Ok(result)
}
