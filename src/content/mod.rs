//! XHTML content documents.
//!
//! A [`ContentDocument`] is loaded on demand for the lifetime of one operation.
//! It offers a flat, read-only view of the elements and body text, and
//! rewrites itself through [`tag::rewrite_tags`] without touching the bytes
//! an edit does not change.

pub mod tag;

use std::fmt;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::util::{attr_value, decode_text, local_name, resolve_entity};

pub use tag::{RefAttr, Tag, rewrite_tags};

/// Media types treated as content documents.
pub const CONTENT_MEDIA_TYPES: &[&str] = &["application/xhtml+xml", "text/html"];

/// An element as it appears in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written (`svg:image`, `p`).
    pub name: String,
    /// Qualified attribute names with unescaped values.
    pub attrs: Vec<(String, String)>,
    /// First text node directly inside the element.
    pub text: Option<String>,
    /// Whether the element is `body` or one of its descendants.
    pub in_body: bool,
}

impl Element {
    fn from_start(e: &BytesStart<'_>, in_body: bool) -> Self {
        Self {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            attrs: e
                .attributes()
                .with_checks(false)
                .flatten()
                .map(|a| {
                    (
                        String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                        attr_value(&a),
                    )
                })
                .collect(),
            text: None,
            in_body,
        }
    }

    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a namespaced attribute matched by local name (`xlink:href`).
    pub fn prefixed_attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.contains(':') && local_name(k.as_bytes()) == local.as_bytes())
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Element {
    /// Renders the start tag, e.g. `<div id="x" style="display:none">`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.name)?;
        for (k, v) in &self.attrs {
            write!(f, " {}=\"{}\"", k, quick_xml::escape::escape(v.as_str()))?;
        }
        write!(f, ">")
    }
}

/// A parsed XHTML resource.
#[derive(Debug, Clone)]
pub struct ContentDocument {
    path: String,
    source: String,
    elements: Vec<Element>,
    text_nodes: Vec<String>,
}

impl ContentDocument {
    /// Decode and parse raw resource bytes.
    pub fn from_bytes(path: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let source = decode_text(bytes).into_owned();
        Self::parse(path, source)
    }

    /// Parse a document. `path` is the package path it was loaded from.
    ///
    /// Mismatched end tags are tolerated; anything else that is not
    /// well-formed is a [`Error::Parse`].
    pub fn parse(path: impl Into<String>, source: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let source = source.into();

        let mut elements: Vec<Element> = Vec::new();
        let mut text_nodes = Vec::new();
        // Indices into `elements` of currently open elements.
        let mut open: Vec<usize> = Vec::new();
        let mut body_depth: Option<usize> = None;
        let mut pending = String::new();
        let mut saw_root = false;

        {
            let mut reader = Reader::from_str(&source);
            reader.config_mut().check_end_names = false;

            loop {
                let event = reader
                    .read_event()
                    .map_err(|e| Error::parse(path.clone(), e))?;

                match event {
                    Event::Start(_) | Event::Empty(_) | Event::End(_) | Event::Eof => {
                        flush_text(&mut pending, &open, &mut elements, &mut text_nodes);
                    }
                    _ => {}
                }

                match event {
                    Event::Start(e) => {
                        saw_root = true;
                        let is_body = local_name(e.name().as_ref()) == b"body";
                        if is_body && body_depth.is_none() {
                            body_depth = Some(open.len());
                        }
                        elements.push(Element::from_start(&e, body_depth.is_some()));
                        open.push(elements.len() - 1);
                    }
                    Event::Empty(e) => {
                        saw_root = true;
                        let in_body = body_depth.is_some()
                            || local_name(e.name().as_ref()) == b"body";
                        elements.push(Element::from_start(&e, in_body));
                    }
                    Event::End(_) => {
                        open.pop();
                        if body_depth.is_some_and(|d| open.len() <= d) {
                            body_depth = None;
                        }
                    }
                    Event::Text(e) if !open.is_empty() => {
                        pending.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                    Event::CData(e) if !open.is_empty() => {
                        pending.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                    Event::GeneralRef(e) if !open.is_empty() => {
                        if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                            pending.push_str(&resolved);
                        }
                    }
                    Event::Eof => break,
                    _ => {}
                }
            }
        }

        if !saw_root {
            return Err(Error::parse(path, "no root element"));
        }

        Ok(Self {
            path,
            source,
            elements,
            text_nodes,
        })
    }

    /// Package path of the document.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every element in document order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Elements with the given local name.
    pub fn elements_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements.iter().filter(move |e| e.local_name() == local)
    }

    /// `id` of the root content element (`body`).
    pub fn body_id(&self) -> Option<&str> {
        self.elements_named("body").next().and_then(|e| e.attr("id"))
    }

    /// Text nodes under `body`, in document order.
    pub fn text_nodes(&self) -> &[String] {
        &self.text_nodes
    }

    /// All body text nodes joined with single spaces.
    pub fn body_text(&self) -> String {
        self.text_nodes.join(" ")
    }

    /// Rewrite start tags; see [`rewrite_tags`].
    pub fn rewrite<F: FnMut(&mut Tag)>(&self, edit: F) -> Result<Option<String>> {
        rewrite_tags(&self.source, edit).map_err(|e| Error::parse(self.path.clone(), e))
    }
}

/// Close the current text node: record it as the first direct text of the
/// element it belongs to and, under `body`, as a body text node.
fn flush_text(
    pending: &mut String,
    open: &[usize],
    elements: &mut [Element],
    text_nodes: &mut Vec<String>,
) {
    if pending.is_empty() {
        return;
    }
    let text = std::mem::take(pending);
    let Some(&top) = open.last() else {
        return;
    };
    if elements[top].in_body {
        text_nodes.push(text.clone());
    }
    if elements[top].text.is_none() {
        elements[top].text = Some(text);
    }
}
