//! OPF package document (the descriptor).

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::content::{CONTENT_MEDIA_TYPES, rewrite_tags};
use crate::error::{Error, Result};
use crate::href;
use crate::util::{attr_value, local_name, markup_start, resolve_entity};

/// Media type of the NCX navigation map.
pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// A declared resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Percent-decoded path relative to the descriptor directory.
    pub href: String,
    pub media_type: String,
}

impl ManifestItem {
    pub fn is_content_document(&self) -> bool {
        CONTENT_MEDIA_TYPES.contains(&self.media_type.as_str())
    }
}

/// Semantic role of a guide reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuideRole {
    Cover,
    Toc,
    Text,
    Other(String),
}

impl GuideRole {
    fn parse(value: &str) -> Self {
        match value {
            "cover" => GuideRole::Cover,
            "toc" => GuideRole::Toc,
            "text" => GuideRole::Text,
            other => GuideRole::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideReference {
    pub role: GuideRole,
    /// Percent-decoded path plus optional fragment.
    pub href: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier {
    pub id: Option<String>,
    /// `opf:scheme` attribute.
    pub scheme: Option<String>,
    pub value: String,
}

/// A `<meta>` element of the metadata section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub name: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub titles: Vec<String>,
    pub creators: Vec<String>,
    pub languages: Vec<String>,
    pub identifiers: Vec<Identifier>,
    pub metas: Vec<Meta>,
}

/// Parsed OPF package document.
///
/// The source text is kept so that [`Descriptor::to_xml`] only rewrites the
/// parts of the document that changed.
#[derive(Debug, Clone)]
pub struct Descriptor {
    /// `unique-identifier` attribute of `package`.
    pub unique_identifier: Option<String>,
    pub metadata: Metadata,
    /// Manifest items in document order.
    pub manifest: Vec<ManifestItem>,
    pub guide: Vec<GuideReference>,
    /// `toc` attribute of `spine`.
    pub spine_toc: Option<String>,
    source: String,
}

impl Descriptor {
    /// Parse an OPF document. `path` is only used in error messages.
    pub fn parse(path: &str, content: &str) -> Result<Self> {
        let mut reader = Reader::from_str(content);

        let mut unique_identifier = None;
        let mut metadata = Metadata::default();
        let mut manifest = Vec::new();
        let mut guide = Vec::new();
        let mut spine_toc = None;
        let mut saw_package = false;

        let mut in_metadata = false;
        // Element whose text is being collected, with its identifier attrs.
        let mut current: Option<(Vec<u8>, Identifier)> = None;
        let mut buf_text = String::new();

        loop {
            let event = reader.read_event().map_err(|e| Error::parse(path, e))?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let is_start = matches!(event, Event::Start(_));
                    let name = e.name();
                    let local = local_name(name.as_ref());

                    match local {
                        b"package" => {
                            saw_package = true;
                            unique_identifier = attr(e, b"unique-identifier");
                        }
                        b"metadata" => in_metadata = is_start,
                        b"title" | b"creator" | b"language" | b"identifier"
                            if in_metadata && is_start =>
                        {
                            let ident = Identifier {
                                id: attr(e, b"id"),
                                scheme: prefixed_attr(e, b"scheme"),
                                value: String::new(),
                            };
                            current = Some((local.to_vec(), ident));
                            buf_text.clear();
                        }
                        b"meta" if in_metadata => metadata.metas.push(Meta {
                            name: attr(e, b"name"),
                            content: attr(e, b"content"),
                        }),
                        b"item" => {
                            let id = attr(e, b"id").unwrap_or_default();
                            if !id.is_empty() {
                                manifest.push(ManifestItem {
                                    id,
                                    href: href::decode_href(&attr(e, b"href").unwrap_or_default()),
                                    media_type: attr(e, b"media-type").unwrap_or_default(),
                                });
                            }
                        }
                        b"reference" => guide.push(GuideReference {
                            role: GuideRole::parse(&attr(e, b"type").unwrap_or_default()),
                            href: href::decode_href(&attr(e, b"href").unwrap_or_default()),
                            title: attr(e, b"title"),
                        }),
                        b"spine" => spine_toc = attr(e, b"toc"),
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    if current.is_some() {
                        buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                    }
                }
                Event::GeneralRef(e) => {
                    if current.is_some()
                        && let Some(resolved) = resolve_entity(&String::from_utf8_lossy(e.as_ref()))
                    {
                        buf_text.push_str(&resolved);
                    }
                }
                Event::End(e) => {
                    let name = e.name();
                    let local = local_name(name.as_ref());

                    if local == b"metadata" {
                        in_metadata = false;
                    }

                    if let Some((elem, mut ident)) = current.take() {
                        if elem.as_slice() != local {
                            current = Some((elem, ident));
                            continue;
                        }
                        let text = std::mem::take(&mut buf_text).trim().to_string();
                        match elem.as_slice() {
                            b"title" => metadata.titles.push(text),
                            b"creator" => metadata.creators.push(text),
                            b"language" => metadata.languages.push(text),
                            _ => {
                                ident.value = text;
                                metadata.identifiers.push(ident);
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_package {
            return Err(Error::parse(path, "no package element"));
        }

        Ok(Self {
            unique_identifier,
            metadata,
            manifest,
            guide,
            spine_toc,
            source: content.to_string(),
        })
    }

    pub fn item_by_id(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|i| i.id == id)
    }

    pub fn item_by_href(&self, href: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|i| i.href == href)
    }

    /// Content documents in manifest order.
    pub fn content_items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest.iter().filter(|i| i.is_content_document())
    }

    /// The NCX item: declared by media type, else by the spine `toc` idref.
    pub fn navigation_item(&self) -> Option<&ManifestItem> {
        self.manifest
            .iter()
            .find(|i| i.media_type == NCX_MEDIA_TYPE)
            .or_else(|| self.spine_toc.as_deref().and_then(|id| self.item_by_id(id)))
    }

    pub fn guide_refs(&self, role: &GuideRole) -> impl Iterator<Item = &GuideReference> {
        self.guide.iter().filter(move |r| &r.role == role)
    }

    /// `content` of every `<meta name="cover">`.
    pub fn cover_meta_ids(&self) -> Vec<&str> {
        self.metadata
            .metas
            .iter()
            .filter(|m| m.name.as_deref() == Some("cover"))
            .map(|m| m.content.as_deref().unwrap_or(""))
            .collect()
    }

    /// Text of the identifier named by the package `unique-identifier`.
    pub fn unique_identifier_value(&self) -> Option<&str> {
        let uid = self.unique_identifier.as_deref()?;
        self.metadata
            .identifiers
            .iter()
            .find(|i| i.id.as_deref() == Some(uid))
            .map(|i| i.value.as_str())
    }

    /// Serialize the descriptor, applying the in-memory manifest order and
    /// every item/guide href that changed since parsing.
    pub fn to_xml(&self) -> Result<String> {
        let mut seen_ids: Vec<String> = Vec::new();
        let mut reference_index = 0usize;
        let rewritten = rewrite_tags(&self.source, |tag| match tag.local_name() {
            "item" => {
                let Some(id) = tag.attr("id").filter(|id| !id.is_empty()).map(str::to_string) else {
                    return;
                };
                // Repeated ids pair up with model items by occurrence
                let nth = seen_ids.iter().filter(|seen| **seen == id).count();
                if let Some(item) = self.manifest.iter().filter(|i| i.id == id).nth(nth)
                    && tag.attr("href").map(href::decode_href).as_deref() != Some(item.href.as_str())
                {
                    tag.set_attr("href", href::encode_href(&item.href));
                }
                seen_ids.push(id);
            }
            "reference" => {
                if let Some(reference) = self.guide.get(reference_index)
                    && tag.attr("href").map(href::decode_href).as_deref() != Some(reference.href.as_str())
                {
                    tag.set_attr("href", href::encode_href(&reference.href));
                }
                reference_index += 1;
            }
            _ => {}
        })
        .map_err(|e| Error::parse("descriptor", e))?;

        let source = rewritten.as_deref().unwrap_or(&self.source);
        let order: Vec<&str> = self.manifest.iter().map(|i| i.id.as_str()).collect();
        reorder_items(source, &order)
    }
}

/// An `item` element: byte span and `id` (empty when absent).
struct ItemSlot {
    start: usize,
    end: usize,
    id: String,
}

/// Rearrange the `item` elements to follow the ids in `order`, keeping the
/// whitespace and comments between them in place.
///
/// Each id claims the first unclaimed element carrying it. Elements no id
/// claims (missing `id`) follow the claimed ones in their original order.
/// Fails when an id in `order` has no element left to claim.
fn reorder_items(source: &str, order: &[&str]) -> Result<String> {
    let slots = item_slots(source)?;

    let mut claimed = vec![false; slots.len()];
    let mut sequence = Vec::with_capacity(slots.len());
    for id in order {
        let slot = (0..slots.len())
            .find(|&i| !claimed[i] && slots[i].id == *id)
            .ok_or_else(|| {
                Error::parse("descriptor", format!("manifest item {id:?} has no element to move"))
            })?;
        claimed[slot] = true;
        sequence.push(slot);
    }
    sequence.extend((0..slots.len()).filter(|&i| !claimed[i]));

    if sequence.iter().enumerate().all(|(position, &slot)| position == slot) {
        return Ok(source.to_string());
    }

    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    for (target, &slot) in slots.iter().zip(&sequence) {
        out.push_str(&source[copied..target.start]);
        out.push_str(&source[slots[slot].start..slots[slot].end]);
        copied = target.end;
    }
    out.push_str(&source[copied..]);
    Ok(out)
}

/// Every `item` element of `source` in document order.
fn item_slots(source: &str) -> Result<Vec<ItemSlot>> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().check_end_names = false;

    let mut slots = Vec::new();
    let mut open_item: Option<(usize, String)> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| Error::parse("descriptor", e))?;
        let end = reader.buffer_position() as usize;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) if local_name(e.name().as_ref()) == b"item" => {
                let start = markup_start(source, before);
                let id = attr(e, b"id").unwrap_or_default();
                if matches!(event, Event::Empty(_)) {
                    slots.push(ItemSlot { start, end, id });
                } else {
                    open_item = Some((start, id));
                }
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"item" => {
                if let Some((start, id)) = open_item.take() {
                    slots.push(ItemSlot { start, end, id });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(slots)
}

/// Unescaped value of an unprefixed attribute.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| attr_value(&a))
}

/// Unescaped value of an attribute matched by local name (`opf:scheme`).
fn prefixed_attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|a| local_name(a.key.as_ref()) == local)
        .map(|a| attr_value(&a))
}
