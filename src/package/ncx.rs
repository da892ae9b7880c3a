//! NCX navigation map.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::content::rewrite_tags;
use crate::error::{Error, Result};
use crate::href;
use crate::util::{attr_value, local_name, resolve_entity};

/// A navigation entry: `navPoint`, `pageTarget` or `navTarget`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavPoint {
    pub id: Option<String>,
    pub label: String,
    /// `content@src`, path percent-decoded, fragment kept.
    pub content: String,
    /// Nesting level, 0 for top-level entries.
    pub depth: usize,
}

/// Parsed NCX document.
#[derive(Debug, Clone)]
pub struct NavigationMap {
    path: String,
    source: String,
    /// `content` of `<meta name="dtb:uid">`.
    pub uid: Option<String>,
    /// Entries flattened in document order.
    pub points: Vec<NavPoint>,
    /// Point owning each `content` element, in document order.
    content_owners: Vec<Option<usize>>,
}

fn is_point(local: &[u8]) -> bool {
    matches!(local, b"navPoint" | b"pageTarget" | b"navTarget")
}

impl NavigationMap {
    /// Parse an NCX document found at package path `path`.
    pub fn parse(path: impl Into<String>, content: &str) -> Result<Self> {
        let path = path.into();
        let mut reader = Reader::from_str(content);
        reader.config_mut().check_end_names = false;

        let mut uid = None;
        let mut points: Vec<NavPoint> = Vec::new();
        let mut content_owners = Vec::new();
        // Indices into `points` of the entries currently open.
        let mut stack: Vec<usize> = Vec::new();
        let mut in_text = false;
        // Points whose first label text is complete.
        let mut labelled: Vec<bool> = Vec::new();
        let mut saw_ncx = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| Error::parse(path.clone(), e))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_start = matches!(event, Event::Start(_));
                    let name = e.name();
                    let local = local_name(name.as_ref());

                    let attr = |key: &[u8]| {
                        e.attributes()
                            .with_checks(false)
                            .flatten()
                            .find(|a| a.key.as_ref() == key)
                            .map(|a| attr_value(&a))
                    };

                    match local {
                        b"ncx" => saw_ncx = true,
                        b"meta" if attr(b"name").as_deref() == Some("dtb:uid") => {
                            uid = attr(b"content");
                        }
                        l if is_point(l) => {
                            points.push(NavPoint {
                                id: attr(b"id"),
                                label: String::new(),
                                content: String::new(),
                                depth: stack.len(),
                            });
                            labelled.push(false);
                            if is_start {
                                stack.push(points.len() - 1);
                            }
                        }
                        b"text" if is_start => in_text = true,
                        b"content" => {
                            let owner = stack.last().copied();
                            if let Some(index) = owner {
                                points[index].content =
                                    href::decode_href(&attr(b"src").unwrap_or_default());
                            }
                            content_owners.push(owner);
                        }
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    if in_text
                        && let Some(&index) = stack.last()
                        && !labelled[index]
                    {
                        points[index].label.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Event::GeneralRef(e) => {
                    if in_text
                        && let Some(&index) = stack.last()
                        && !labelled[index]
                        && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                    {
                        points[index].label.push_str(&resolved);
                    }
                }
                Event::End(e) => {
                    let name = e.name();
                    let local = local_name(name.as_ref());
                    if local == b"text" {
                        in_text = false;
                        if let Some(&index) = stack.last() {
                            labelled[index] = true;
                        }
                    } else if is_point(local) {
                        stack.pop();
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_ncx {
            return Err(Error::parse(path, "no ncx element"));
        }
        for point in &mut points {
            point.label = point.label.trim().to_string();
        }

        Ok(Self {
            path,
            source: content.to_string(),
            uid,
            points,
            content_owners,
        })
    }

    /// Package path the map was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Serialize the map, rewriting only the `content` elements whose point
    /// changed since parsing.
    pub fn to_xml(&self) -> Result<String> {
        let mut ordinal = 0usize;
        let rewritten = rewrite_tags(&self.source, |tag| {
            if tag.local_name() != "content" {
                return;
            }
            let owner = self.content_owners.get(ordinal).copied().flatten();
            ordinal += 1;
            if let Some(point) = owner.and_then(|i| self.points.get(i))
                && tag.attr("src").map(href::decode_href).as_deref() != Some(point.content.as_str())
            {
                tag.set_attr("src", href::encode_href(&point.content));
            }
        })
        .map_err(|e| Error::parse(self.path.clone(), e))?;

        Ok(rewritten.unwrap_or_else(|| self.source.clone()))
    }
}
