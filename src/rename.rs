//! Renaming a resource while keeping every reference to it valid.

use crate::content::Tag;
use crate::error::{Error, Result};
use crate::href;
use crate::io::ResourceStore;
use crate::package::PackageTree;

impl PackageTree {
    /// Rename the resource at manifest href `old` to `new`.
    ///
    /// Updates the manifest item, guide references and navigation points
    /// naming `old`, and every reference in content documents whose final
    /// path segment matches the final segment of `old`. References inside
    /// the moved document are re-based onto its new directory.
    ///
    /// Nothing changes when this returns an error. The physical move and all
    /// rewritten documents are buffered until [`PackageTree::persist`].
    pub fn rename(&mut self, store: &dyn ResourceStore, old: &str, new: &str) -> Result<()> {
        let old = href::normalize(old);
        let new = href::normalize(new);

        if self.descriptor.manifest.iter().any(|i| i.href == new) {
            return Err(Error::RenameCollision(new));
        }
        let item = self
            .descriptor
            .manifest
            .iter()
            .position(|i| i.href == old)
            .ok_or_else(|| Error::MissingResource(old.clone()))?;

        let guide: Vec<(usize, String)> = self
            .descriptor
            .guide
            .iter()
            .enumerate()
            .filter_map(|(i, r)| retarget(&r.href, &old, &new).map(|h| (i, h)))
            .collect();

        let points: Vec<(usize, String)> = self
            .navigation
            .points
            .iter()
            .enumerate()
            .filter_map(|(i, p)| retarget(&p.content, &old, &new).map(|h| (i, h)))
            .collect();

        let mut staged = Vec::new();
        for doc_href in self.content_hrefs() {
            let doc = match self.load_document(store, &doc_href) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(document = %doc_href, error = %e, "skipping unreadable document");
                    continue;
                }
            };

            let moved = doc_href == old;
            let old_dir = href::parent(&doc_href);
            let new_dir = if moved { href::parent(&new) } else { old_dir };

            let rewritten = doc.rewrite(|tag| {
                rewrite_references(tag, &old, &new, old_dir, new_dir, moved);
            });
            match rewritten {
                Ok(Some(source)) => {
                    tracing::debug!(document = %doc_href, "references rewritten");
                    let key = if moved { new.clone() } else { doc_href };
                    staged.push((key, source));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(document = %doc_href, error = %e, "skipping unparsable document");
                }
            }
        }

        self.descriptor.manifest[item].href = new.clone();
        for (i, h) in guide {
            self.descriptor.guide[i].href = h;
        }
        for (i, h) in points {
            self.navigation.points[i].content = h;
        }
        self.record_move(&old, &new);
        for (key, source) in staged {
            self.stage_document(key, source);
        }

        tracing::info!(from = %old, to = %new, "renamed resource");
        Ok(())
    }
}

/// `new` plus the fragment of `reference` if the path part of `reference`
/// is exactly `old`.
fn retarget(reference: &str, old: &str, new: &str) -> Option<String> {
    let (path, fragment) = href::split_fragment(reference);
    (path == old).then(|| href::with_fragment(new, fragment))
}

fn rewrite_references(tag: &mut Tag, old: &str, new: &str, old_dir: &str, new_dir: &str, moved: bool) {
    for (kind, value) in tag.references() {
        if value.is_empty() || href::is_external(&value) {
            continue;
        }
        let decoded = href::decode_href(&value);
        let (path, fragment) = href::split_fragment(&decoded);
        if path.is_empty() {
            continue;
        }

        let target = if href::file_name(path) == href::file_name(old) {
            href::relative(new, new_dir)
        } else if moved && old_dir != new_dir {
            href::relative(&href::join(old_dir, path), new_dir)
        } else {
            continue;
        };

        tag.set_reference(kind, href::encode_href(&href::with_fragment(&target, fragment)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retarget_keeps_fragment() {
        assert_eq!(
            retarget("Text/a.xhtml#x", "Text/a.xhtml", "Text/b.xhtml").as_deref(),
            Some("Text/b.xhtml#x")
        );
        assert_eq!(retarget("Text/a.xhtml", "a.xhtml", "b.xhtml"), None);
    }

    #[test]
    fn test_rewrite_references_in_moved_document() {
        let src = r##"<html><head><link href="../Styles/s.css"/></head><body><img src="../Images/x.jpg"/><a href="#top">t</a><a href="http://a/b.xhtml">w</a></body></html>"##;
        let out = crate::content::rewrite_tags(src, |tag| {
            rewrite_references(tag, "Text/a.xhtml", "a.xhtml", "Text", "", true);
        })
        .unwrap()
        .unwrap();
        assert!(out.contains(r#"<link href="Styles/s.css"/>"#));
        assert!(out.contains(r#"<img src="Images/x.jpg"/>"#));
        assert!(out.contains("href=\"#top\""));
        assert!(out.contains(r#"href="http://a/b.xhtml""#));
    }
}
