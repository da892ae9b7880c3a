//! Locating the package descriptor inside a store.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::href;
use crate::io::ResourceStore;
use crate::util::{attr_value, decode_text, local_name};

/// Path of the OCF container document.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Where the descriptor lives inside a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRoots {
    /// Directory every manifest href is relative to (`""` at the root).
    pub descriptor_dir: String,
    /// Store path of the OPF document.
    pub descriptor_path: String,
    /// True when the container document named an existing descriptor.
    pub was_normalized: bool,
}

impl PackageRoots {
    pub fn new(descriptor_path: impl Into<String>) -> Self {
        let descriptor_path = href::normalize(&descriptor_path.into());
        Self {
            descriptor_dir: href::parent(&descriptor_path).to_string(),
            descriptor_path,
            was_normalized: false,
        }
    }
}

/// Find the descriptor through `META-INF/container.xml`, falling back to the
/// first `.opf` entry of the store.
pub fn find_roots(store: &dyn ResourceStore) -> Result<PackageRoots> {
    if let Ok(container) = store.read(CONTAINER_PATH) {
        match parse_container(&container) {
            Some(path) if store.exists(&href::normalize(&path)) => {
                let mut roots = PackageRoots::new(path);
                roots.was_normalized = true;
                return Ok(roots);
            }
            Some(path) => {
                tracing::warn!(path = %path, "container rootfile does not exist");
            }
            None => tracing::warn!("container.xml has no rootfile"),
        }
    }

    store
        .entries()
        .into_iter()
        .find(|entry| entry.to_ascii_lowercase().ends_with(".opf"))
        .map(PackageRoots::new)
        .ok_or_else(|| Error::Load("no package descriptor (.opf) found".into()))
}

/// `full-path` of the first `rootfile` element.
fn parse_container(bytes: &[u8]) -> Option<String> {
    let content = decode_text(bytes);
    let mut reader = Reader::from_str(&content);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                if let Some(attr) = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"full-path")
                {
                    return Some(attr_value(&attr));
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStore;

    const CONTAINER: &[u8] = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    #[test]
    fn test_find_roots_from_container() {
        let store = MemoryStore::new()
            .with(CONTAINER_PATH, CONTAINER)
            .with("OEBPS/content.opf", "<package/>");
        let roots = find_roots(&store).unwrap();
        assert_eq!(roots.descriptor_path, "OEBPS/content.opf");
        assert_eq!(roots.descriptor_dir, "OEBPS");
        assert!(roots.was_normalized);
    }

    #[test]
    fn test_find_roots_falls_back_to_first_opf() {
        let store = MemoryStore::new()
            .with(CONTAINER_PATH, CONTAINER)
            .with("book/Package.OPF", "<package/>");
        let roots = find_roots(&store).unwrap();
        assert_eq!(roots.descriptor_path, "book/Package.OPF");
        assert!(!roots.was_normalized);

        let bare = MemoryStore::new().with("content.opf", "<package/>");
        let roots = find_roots(&bare).unwrap();
        assert_eq!(roots.descriptor_dir, "");
    }

    #[test]
    fn test_find_roots_without_descriptor() {
        let store = MemoryStore::new().with("mimetype", "application/epub+zip");
        assert!(matches!(find_roots(&store), Err(Error::Load(_))));
    }
}
