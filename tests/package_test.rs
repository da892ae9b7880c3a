//! Package loading failures.

mod common;

use common::{sample_files, sample_store_with};
use epubq::{Error, MemoryStore, PackageTree, find_roots};

fn load_err(store: &MemoryStore) -> String {
    let roots = find_roots(store).unwrap();
    match PackageTree::load(store, roots) {
        Err(Error::Load(reason)) => reason,
        Err(e) => panic!("expected a load error, got {e:?}"),
        Ok(_) => panic!("expected a load error"),
    }
}

// ============================================================================
// Descriptor
// ============================================================================

#[test]
fn test_descriptor_without_package_element() {
    let store = sample_store_with(|path, text| {
        if path.ends_with(".opf") {
            "<html/>".to_string()
        } else {
            text
        }
    });
    assert!(load_err(&store).contains("no package element"));
}

#[test]
fn test_truncated_descriptor() {
    let store = sample_store_with(|path, text| {
        if path.ends_with(".opf") {
            r#"<package><item id="a""#.to_string()
        } else {
            text
        }
    });
    assert!(load_err(&store).contains("OEBPS/content.opf"));
}

// ============================================================================
// Navigation map
// ============================================================================

#[test]
fn test_undeclared_navigation_map() {
    let store = sample_store_with(|path, text| {
        if path.ends_with(".opf") {
            text.replace(
                r#"<item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>"#,
                "",
            )
            .replace(r#"<spine toc="ncx">"#, "<spine>")
        } else {
            text
        }
    });
    assert_eq!(load_err(&store), "no navigation map (NCX) declared");
}

#[test]
fn test_missing_navigation_map_file() {
    let store = sample_files()
        .into_iter()
        .filter(|(path, _)| *path != "OEBPS/toc.ncx")
        .fold(MemoryStore::new(), |store, (path, data)| store.with(path, data));
    assert!(load_err(&store).starts_with("OEBPS/toc.ncx: "));
}
