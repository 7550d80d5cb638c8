use std::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;

use super::{error_message_parts, RecordSource, ResponseMeta, RowData};
use crate::dal_util::{ATTR_TAG_NAME, TAG_DATA, TAG_ERROR, TAG_RECORD_META};

/// A parsed element: name, attributes in source order, child elements.
/// Text content is not kept; DAL records live entirely in attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attributes as a row, every value a string.
    pub fn to_row(&self) -> RowData {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect()
    }

    fn collect_named<'a>(&'a self, tag: &str, out: &mut Vec<&'a XmlElement>) {
        if self.name == tag {
            out.push(self);
        }
        for child in &self.children {
            child.collect_named(tag, out);
        }
    }

    fn first_named(&self, tag: &str) -> Option<&XmlElement> {
        if self.name == tag {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.first_named(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlParseError(String);

impl fmt::Display for XmlParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid XML: {}", self.0)
    }
}

impl std::error::Error for XmlParseError {}

/// A well-formed XML document with exactly one root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
}

impl XmlDocument {
    pub fn parse(text: &str) -> Result<Self, XmlParseError> {
        let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => stack.push(element_from(e)?),
                Ok(Event::Empty(ref e)) => attach(&mut stack, &mut root, element_from(e)?)?,
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlParseError("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(XmlParseError(e.to_string())),
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(XmlParseError(format!("unclosed element <{}>", open.name)));
        }
        let root = root.ok_or_else(|| XmlParseError("no root element".into()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// Every element named `tag`, root included, in document order.
    pub fn find(&self, tag: &str) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        self.root.collect_named(tag, &mut out);
        out
    }

    pub fn find_first(&self, tag: &str) -> Option<&XmlElement> {
        self.root.first_named(tag)
    }
}

fn element_from(start: &BytesStart) -> Result<XmlElement, XmlParseError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlParseError(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = quick_xml::escape::unescape(&raw)
            .map_err(|e| XmlParseError(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(XmlElement { name, attributes, children: Vec::new() })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlParseError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(XmlParseError("more than one root element".into())),
    }
    Ok(())
}

/// Response backed by an XML document.
#[derive(Debug, Clone)]
pub struct XmlResponse {
    meta: ResponseMeta,
    doc: XmlDocument,
}

impl XmlResponse {
    pub fn new(meta: ResponseMeta, doc: XmlDocument) -> Self {
        Self { meta, doc }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    /// Names of the elements directly under `DATA`, first occurrence order.
    fn top_level_tags(&self) -> Vec<String> {
        let mut containers = self.doc.find(TAG_DATA);
        if containers.is_empty() {
            containers.push(self.doc.root());
        }

        let mut tags: Vec<String> = Vec::new();
        for child in containers.iter().flat_map(|c| c.children.iter()) {
            if !tags.contains(&child.name) {
                tags.push(child.name.clone());
            }
        }
        tags
    }
}

impl RecordSource for XmlResponse {
    fn meta(&self) -> &ResponseMeta {
        &self.meta
    }

    fn first_record(&self, tag: &str) -> RowData {
        self.doc
            .find_first(tag)
            .map(XmlElement::to_row)
            .unwrap_or_default()
    }

    fn response_error_message(&self) -> Option<String> {
        let parts: Vec<String> = self
            .doc
            .find(TAG_ERROR)
            .into_iter()
            .flat_map(|e| {
                error_message_parts(e.attributes.iter().map(|(k, v)| (k.as_str(), v.clone())))
            })
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    fn record_meta_tag_names(&self, fallback: bool) -> Vec<String> {
        let tags: Vec<String> = self
            .doc
            .find(TAG_RECORD_META)
            .into_iter()
            .filter_map(|meta| meta.attribute(ATTR_TAG_NAME).map(String::from))
            .collect();

        if tags.is_empty() && fallback {
            return self.top_level_tags();
        }
        tags
    }

    fn results(&self, tag: &str) -> Vec<RowData> {
        self.doc.find(tag).into_iter().map(XmlElement::to_row).collect()
    }
}
