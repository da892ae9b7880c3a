//! In-place start tag rewriting.
//!
//! Content documents are rewritten by splicing: every byte of the source is
//! copied verbatim except the start tags an edit actually changed, which are
//! re-serialized from their attributes.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::util::{attr_value, local_name, markup_start};

/// The attributes through which a content document references other
/// resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefAttr {
    /// `href` on `a`, `link`, `area`.
    Href,
    /// `src` on `img`, `script`, media elements.
    Src,
    /// Namespaced `xlink:href`, as used by SVG `image`.
    XlinkHref,
}

impl RefAttr {
    pub const ALL: [RefAttr; 3] = [RefAttr::Src, RefAttr::Href, RefAttr::XlinkHref];

    fn matches(self, key: &str) -> bool {
        match self {
            RefAttr::Href => key == "href",
            RefAttr::Src => key == "src",
            RefAttr::XlinkHref => key != "href" && local_name(key.as_bytes()) == b"href",
        }
    }
}

#[derive(Debug, Clone)]
struct TagAttr {
    key: String,
    /// Escaped value exactly as found in the source.
    raw: String,
    value: String,
    dirty: bool,
}

/// A start (or empty-element) tag open for editing.
#[derive(Debug, Clone)]
pub struct Tag {
    name: String,
    attrs: Vec<TagAttr>,
    empty: bool,
    changed: bool,
}

impl Tag {
    fn from_start(e: &BytesStart<'_>, empty: bool) -> Self {
        let attrs = e
            .attributes()
            .with_checks(false)
            .flatten()
            .map(|attr| TagAttr {
                key: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                raw: String::from_utf8_lossy(&attr.value).into_owned(),
                value: attr_value(&attr),
                dirty: false,
            })
            .collect();

        Self {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            attrs,
            empty,
            changed: false,
        }
    }

    /// Qualified element name as written in the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element name without namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// Replace the value of an attribute, adding it when absent.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|a| a.key == key) {
            Some(attr) if attr.value == value => {}
            Some(attr) => {
                attr.value = value;
                attr.dirty = true;
                self.changed = true;
            }
            None => {
                self.attrs.push(TagAttr {
                    key: key.to_string(),
                    raw: String::new(),
                    value,
                    dirty: true,
                });
                self.changed = true;
            }
        }
    }

    /// Value of the given reference attribute.
    pub fn reference(&self, kind: RefAttr) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| kind.matches(&a.key))
            .map(|a| a.value.as_str())
    }

    /// Replace the value of an existing reference attribute.
    ///
    /// Returns false if the tag carries no such attribute.
    pub fn set_reference(&mut self, kind: RefAttr, value: impl Into<String>) -> bool {
        let Some(key) = self
            .attrs
            .iter()
            .find(|a| kind.matches(&a.key))
            .map(|a| a.key.clone())
        else {
            return false;
        };
        self.set_attr(&key, value);
        true
    }

    /// All reference attributes present on this tag, in [`RefAttr::ALL`] order.
    pub fn references(&self) -> Vec<(RefAttr, String)> {
        RefAttr::ALL
            .iter()
            .filter_map(|&kind| self.reference(kind).map(|v| (kind, v.to_string())))
            .collect()
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + 16 * self.attrs.len() + 3);
        out.push('<');
        out.push_str(&self.name);
        for attr in &self.attrs {
            let escaped;
            let value = if attr.dirty {
                escaped = quick_xml::escape::escape(attr.value.as_str()).into_owned();
                escaped.as_str()
            } else {
                attr.raw.as_str()
            };
            let quote = if value.contains('"') { '\'' } else { '"' };
            out.push(' ');
            out.push_str(&attr.key);
            out.push('=');
            out.push(quote);
            out.push_str(value);
            out.push(quote);
        }
        out.push_str(if self.empty { "/>" } else { ">" });
        out
    }
}

/// Run `edit` over every start tag of `source` in document order.
///
/// Returns the rewritten document, or `None` when no tag changed.
pub fn rewrite_tags<F>(source: &str, mut edit: F) -> Result<Option<String>, quick_xml::Error>
where
    F: FnMut(&mut Tag),
{
    let mut reader = Reader::from_str(source);
    reader.config_mut().check_end_names = false;

    let mut out = String::new();
    let mut copied = 0usize;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let end = reader.buffer_position() as usize;

        let mut tag = match event {
            Event::Start(e) => Tag::from_start(&e, false),
            Event::Empty(e) => Tag::from_start(&e, true),
            Event::Eof => break,
            _ => continue,
        };

        edit(&mut tag);

        if tag.changed {
            if out.is_empty() {
                out.reserve(source.len() + 64);
            }
            let start = markup_start(source, before).max(copied);
            out.push_str(&source[copied..start]);
            out.push_str(&tag.render());
            copied = end;
        }
    }

    if copied == 0 {
        return Ok(None);
    }
    out.push_str(&source[copied..]);
    Ok(Some(out))
}
