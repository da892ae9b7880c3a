//! Cover normalization and navigation target repairs.
//!
//! [`sanitize`] runs every repair in a fixed order over a loaded
//! [`PackageTree`]. Each repair is idempotent; one that fails is logged and
//! the remaining repairs still run.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::href;
use crate::io::ResourceStore;
use crate::package::{GuideRole, PackageTree};
use crate::patterns::{DISPLAY_NONE_RE, VISIBILITY_HIDDEN};

/// Options for [`sanitize`].
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// Cover document file names left behind by converters.
    pub placeholder_names: Vec<String>,
    /// File name given to a placeholder cover document.
    pub cover_document_name: String,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            placeholder_names: vec!["titlepage.xhtml".to_string()],
            cover_document_name: "cover.html".to_string(),
        }
    }
}

/// Run every repair. Returns one message per applied fix.
///
/// Fails only when the cover image cannot be resolved from metadata, before
/// anything is changed.
pub fn sanitize(
    tree: &mut PackageTree,
    store: &dyn ResourceStore,
    options: &SanitizeOptions,
) -> Result<Vec<String>> {
    let cover_id = resolve_cover(tree)?;
    let mut applied = Vec::new();

    match canonicalize_cover_document_name(tree, store, options) {
        Ok(messages) => applied.extend(messages),
        Err(e) => tracing::warn!(error = %e, "cover document rename skipped"),
    }
    match canonicalize_cover_image_name(tree, store, &cover_id) {
        Ok(message) => applied.extend(message),
        Err(e) => tracing::warn!(error = %e, "cover image rename skipped"),
    }
    applied.extend(normalize_fragment_targets(tree, store));
    match reorder_cover_item_first(tree, &cover_id) {
        Ok(message) => applied.extend(message),
        Err(e) => tracing::warn!(error = %e, "cover item reorder skipped"),
    }
    applied.extend(relax_hidden_navigation_targets(tree, store));

    for message in &applied {
        tracing::info!("{}", message);
    }
    Ok(applied)
}

/// Manifest id of the cover image named by `<meta name="cover">`.
pub fn resolve_cover(tree: &PackageTree) -> Result<String> {
    let id = tree
        .descriptor
        .cover_meta_ids()
        .first()
        .map(|id| id.to_string())
        .ok_or_else(|| Error::Validation("no meta cover image defined".into()))?;
    if tree.descriptor.item_by_id(&id).is_none() {
        return Err(Error::Validation(format!(
            "meta cover names missing manifest item {}",
            id
        )));
    }
    Ok(id)
}

/// Rename placeholder cover documents to the canonical cover document name
/// inside the directory holding most content documents.
pub fn canonicalize_cover_document_name(
    tree: &mut PackageTree,
    store: &dyn ResourceStore,
    options: &SanitizeOptions,
) -> Result<Vec<String>> {
    let placeholders: Vec<String> = tree
        .descriptor
        .guide_refs(&GuideRole::Cover)
        .map(|r| href::split_fragment(&r.href).0.to_string())
        .filter(|path| {
            options
                .placeholder_names
                .iter()
                .any(|name| name == href::file_name(path))
        })
        .collect();

    let mut applied = Vec::new();
    for old in placeholders {
        let target = href::join(&majority_content_dir(tree), &options.cover_document_name);
        if old == target {
            continue;
        }
        tree.rename(store, &old, &target)?;
        applied.push(format!(
            "Renaming cover file {} to '{}'",
            old, options.cover_document_name
        ));
    }
    Ok(applied)
}

/// Most common directory among content documents; ties go to the first one
/// encountered in manifest order.
fn majority_content_dir(tree: &PackageTree) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for item in tree.descriptor.content_items() {
        let dir = href::parent(&item.href);
        match counts.iter_mut().find(|(d, _)| *d == dir) {
            Some((_, n)) => *n += 1,
            None => counts.push((dir, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (dir, n) in counts {
        if best.is_none_or(|(_, m)| n > m) {
            best = Some((dir, n));
        }
    }
    best.map(|(d, _)| d.to_string()).unwrap_or_default()
}

/// Rename the cover image to `cover.<ext>` in its own directory.
pub fn canonicalize_cover_image_name(
    tree: &mut PackageTree,
    store: &dyn ResourceStore,
    cover_id: &str,
) -> Result<Option<String>> {
    let item = tree
        .descriptor
        .item_by_id(cover_id)
        .ok_or_else(|| Error::Validation(format!("no manifest item {}", cover_id)))?;
    if href::file_stem(&item.href) == "cover" {
        return Ok(None);
    }

    let old = item.href.clone();
    let target = href::join(
        href::parent(&old),
        &format!("cover{}", href::extension(&old)),
    );
    tree.rename(store, &old, &target)?;
    Ok(Some(format!("Renaming cover image to: {}", target)))
}

/// Drop `#<body id>` from navigation targets that point at a document's
/// body element, unless another entry already targets the bare document.
pub fn normalize_fragment_targets(tree: &mut PackageTree, store: &dyn ResourceStore) -> Vec<String> {
    let mut body_targets = HashSet::new();
    for doc_href in tree.content_hrefs() {
        match tree.load_document(store, &doc_href) {
            Ok(doc) => {
                if let Some(id) = doc.body_id() {
                    body_targets.insert(format!("{}#{}", href::file_name(&doc_href), id));
                }
            }
            Err(e) => tracing::warn!(document = %doc_href, error = %e, "skipping document"),
        }
    }

    let targets: HashSet<String> = tree
        .navigation
        .points
        .iter()
        .map(|p| p.content.clone())
        .collect();

    let mut applied = Vec::new();
    for point in &mut tree.navigation.points {
        let (bare, fragment) = href::split_fragment(&point.content);
        if fragment.is_none()
            || !body_targets.contains(href::file_name(&point.content))
            || targets.contains(bare)
        {
            continue;
        }
        applied.push(format!("Fixing body_id link: {}", point.content));
        point.content = bare.to_string();
    }
    applied
}

/// Move the cover image item to the start of the manifest.
pub fn reorder_cover_item_first(tree: &mut PackageTree, cover_id: &str) -> Result<Option<String>> {
    let manifest = &mut tree.descriptor.manifest;
    let index = manifest
        .iter()
        .position(|i| i.id == cover_id)
        .ok_or_else(|| Error::Validation(format!("no manifest item {}", cover_id)))?;
    if index == 0 {
        return Ok(None);
    }
    let item = manifest.remove(index);
    manifest.insert(0, item);
    Ok(Some("Make cover image item first".to_string()))
}

/// Replace `display: none` on elements that navigation points target, which
/// some readers refuse to jump to.
pub fn relax_hidden_navigation_targets(
    tree: &mut PackageTree,
    store: &dyn ResourceStore,
) -> Vec<String> {
    let targets: HashSet<String> = tree
        .navigation
        .points
        .iter()
        .map(|p| href::file_name(&p.content).to_string())
        .collect();

    let mut applied = Vec::new();
    for doc_href in tree.content_hrefs() {
        let doc = match tree.load_document(store, &doc_href) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(document = %doc_href, error = %e, "skipping document");
                continue;
            }
        };
        let file_name = href::file_name(&doc_href);

        let rewritten = doc.rewrite(|tag| {
            let Some(id) = tag.attr("id") else { return };
            if !targets.contains(&format!("{}#{}", file_name, id)) {
                return;
            }
            let Some(style) = tag.attr("style") else { return };
            if !DISPLAY_NONE_RE.is_match(style) {
                return;
            }
            let relaxed = DISPLAY_NONE_RE
                .replace_all(style, VISIBILITY_HIDDEN)
                .into_owned();
            applied.push(format!("Replacing display: none on {}#{}", file_name, id));
            tag.set_attr("style", relaxed);
        });

        match rewritten {
            Ok(Some(source)) => tree.stage_document(doc_href, source),
            Ok(None) => {}
            Err(e) => tracing::warn!(document = %doc_href, error = %e, "skipping document"),
        }
    }
    applied
}
