//! Sanitizer tests on the sample converter output.

mod common;

use common::{load, read, sample_store, sample_store_with};
use epubq::sanitize::{
    canonicalize_cover_document_name, normalize_fragment_targets, relax_hidden_navigation_targets,
    reorder_cover_item_first,
};
use epubq::{Error, ResourceStore, SanitizeOptions, sanitize};
use regex::Regex;

fn display_none() -> Regex {
    Regex::new(r"display:\s*none").unwrap()
}

// ============================================================================
// Full pass
// ============================================================================

#[test]
fn test_sanitize_sample_package() {
    let mut store = sample_store();
    let mut tree = load(&store);

    let fixes = sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap();
    assert_eq!(fixes.len(), 5, "{fixes:?}");

    // Cover document and image get canonical names
    assert_eq!(tree.descriptor.item_by_id("titlepage").unwrap().href, "Text/cover.html");
    assert_eq!(tree.descriptor.item_by_id("cover-img").unwrap().href, "Images/cover.jpg");
    assert_eq!(tree.descriptor.guide[0].href, "Text/cover.html");
    assert_eq!(tree.descriptor.manifest[0].id, "cover-img");
    assert_eq!(tree.navigation.points[0].content, "Text/chapter1.xhtml");

    tree.persist(&mut store).unwrap();

    let cover = read(&store, "OEBPS/Text/cover.html");
    assert!(cover.contains(r#"xlink:href="../Images/cover.jpg""#));
    assert!(!store.exists("OEBPS/Text/titlepage.xhtml"));

    let chapter2 = read(&store, "OEBPS/Text/chapter 2.xhtml");
    assert!(chapter2.contains(r#"<a href="cover.html">"#));
    assert!(chapter2.contains(r#"<h2 id="hidden" style="visibility: hidden; height: 0">"#));

    let opf = read(&store, "OEBPS/content.opf");
    let first_item = opf.find("<item ").unwrap();
    assert!(opf[first_item..].starts_with(r#"<item id="cover-img" href="Images/cover.jpg""#));
}

#[test]
fn test_sanitize_is_idempotent() {
    let mut store = sample_store();
    let mut tree = load(&store);
    sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap();
    tree.persist(&mut store).unwrap();

    let mut again = load(&store);
    let fixes = sanitize(&mut again, &store, &SanitizeOptions::default()).unwrap();
    assert!(fixes.is_empty(), "{fixes:?}");
    assert!(again.moves().is_empty());
}

#[test]
fn test_missing_cover_meta_is_fatal_before_changes() {
    let store = sample_store_with(|_, text| {
        text.replace(r#"<meta name="cover" content="cover-img"/>"#, "")
    });
    let mut tree = load(&store);
    let before = tree.descriptor.manifest.clone();

    let err = sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(tree.descriptor.manifest, before);
    assert!(tree.moves().is_empty());
}

#[test]
fn test_dangling_cover_meta_is_fatal() {
    let store = sample_store_with(|_, text| {
        text.replace(r#"content="cover-img""#, r#"content="nope""#)
    });
    let mut tree = load(&store);

    let err = sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_failed_rename_does_not_stop_the_pass() {
    // `Images/cover.jpg` is taken, so the cover image cannot be renamed
    let store = sample_store_with(|path, text| {
        if path.ends_with(".opf") {
            text.replace(
                r#"<item id="css""#,
                r#"<item id="other" href="Images/cover.jpg" media-type="image/jpeg"/>
    <item id="css""#,
            )
        } else {
            text
        }
    });
    let mut tree = load(&store);

    let fixes = sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap();
    assert_eq!(fixes.len(), 4, "{fixes:?}");
    assert_eq!(tree.descriptor.item_by_id("cover-img").unwrap().href, "Images/okladka.jpg");
    assert_eq!(tree.descriptor.manifest[0].id, "cover-img");
}

#[test]
fn test_unparsable_document_does_not_stop_the_pass() {
    let mut store = common::store_with_broken_chapter();
    let mut tree = load(&store);

    // Without a parsable chapter 1 its body fragment cannot be collapsed
    let fixes = sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap();
    assert_eq!(fixes.len(), 4, "{fixes:?}");
    assert_eq!(tree.navigation.points[0].content, "Text/chapter1.xhtml#body1");
    tree.persist(&mut store).unwrap();

    let chapter2 = read(&store, "OEBPS/Text/chapter 2.xhtml");
    assert!(chapter2.contains(r#"<a href="cover.html">"#));
    assert!(chapter2.contains(r#"<h2 id="hidden" style="visibility: hidden; height: 0">"#));
    assert!(read(&store, "OEBPS/Text/cover.html").contains(r#"xlink:href="../Images/cover.jpg""#));
    assert_eq!(read(&store, "OEBPS/Text/chapter1.xhtml"), common::BROKEN_CHAPTER);
}

#[test]
fn test_cover_item_moves_first_past_items_without_id() {
    let mut store = sample_store_with(|path, text| {
        if path.ends_with(".opf") {
            text.replace(
                r#"<item id="ncx""#,
                r#"<item href="Fonts/x.ttf" media-type="font/ttf"/>
    <item id="ncx""#,
            )
        } else {
            text
        }
    });
    let mut tree = load(&store);

    sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap();
    tree.persist(&mut store).unwrap();

    let opf = read(&store, "OEBPS/content.opf");
    let first_item = opf.find("<item ").unwrap();
    assert!(opf[first_item..].starts_with(r#"<item id="cover-img""#));
    assert!(opf.contains(r#"<item href="Fonts/x.ttf" media-type="font/ttf"/>"#));
    assert_eq!(load(&store).descriptor.manifest[0].id, "cover-img");
}

// ============================================================================
// Individual repairs
// ============================================================================

#[test]
fn test_cover_document_goes_to_majority_directory() {
    // Two of the three content documents sit at the package root
    let store = sample_store_with(|path, text| {
        if path.ends_with(".opf") {
            text.replace(r#"href="Text/chapter1.xhtml""#, r#"href="chapter1.xhtml""#)
                .replace(r#"href="Text/chapter%202.xhtml""#, r#"href="chapter%202.xhtml""#)
        } else {
            text
        }
    });
    let mut tree = load(&store);
    let options = SanitizeOptions::default();

    let applied = canonicalize_cover_document_name(&mut tree, &store, &options).unwrap();
    assert_eq!(applied, vec!["Renaming cover file Text/titlepage.xhtml to 'cover.html'"]);
    assert_eq!(tree.descriptor.item_by_id("titlepage").unwrap().href, "cover.html");
    assert_eq!(tree.descriptor.guide[0].href, "cover.html");
}

#[test]
fn test_custom_placeholder_names() {
    let store = sample_store();
    let mut tree = load(&store);
    let options = SanitizeOptions {
        placeholder_names: vec!["cover.xhtml".to_string()],
        ..Default::default()
    };

    let applied = canonicalize_cover_document_name(&mut tree, &store, &options).unwrap();
    assert!(applied.is_empty());
}

#[test]
fn test_body_fragment_collapses() {
    let store = sample_store();
    let mut tree = load(&store);

    let applied = normalize_fragment_targets(&mut tree, &store);
    assert_eq!(applied.len(), 1);
    assert_eq!(tree.navigation.points[0].content, "Text/chapter1.xhtml");
    assert_eq!(tree.navigation.points[1].content, "Text/chapter 2.xhtml#hidden");
}

#[test]
fn test_body_fragment_kept_when_bare_target_exists() {
    let store = sample_store_with(|path, text| {
        if path.ends_with(".ncx") {
            text.replace(
                "</navMap>",
                r#"  <navPoint id="np3" playOrder="3">
      <navLabel><text>Całość</text></navLabel>
      <content src="Text/chapter1.xhtml"/>
    </navPoint>
  </navMap>"#,
            )
        } else {
            text
        }
    });
    let mut tree = load(&store);

    assert!(normalize_fragment_targets(&mut tree, &store).is_empty());
    assert_eq!(tree.navigation.points[0].content, "Text/chapter1.xhtml#body1");
}

#[test]
fn test_cover_item_moves_first() {
    let store = sample_store();
    let mut tree = load(&store);

    assert!(reorder_cover_item_first(&mut tree, "cover-img").unwrap().is_some());
    assert_eq!(tree.descriptor.manifest[0].id, "cover-img");
    assert_eq!(tree.descriptor.manifest.len(), 6);
    assert!(reorder_cover_item_first(&mut tree, "cover-img").unwrap().is_none());
    assert!(reorder_cover_item_first(&mut tree, "missing").is_err());
}

#[test]
fn test_hidden_navigation_target_is_relaxed() {
    let mut store = sample_store();
    let mut tree = load(&store);

    let applied = relax_hidden_navigation_targets(&mut tree, &store);
    assert_eq!(applied.len(), 1);
    tree.persist(&mut store).unwrap();

    let chapter2 = read(&store, "OEBPS/Text/chapter 2.xhtml");
    let h2 = chapter2.lines().find(|l| l.contains(r#"id="hidden""#)).unwrap();
    assert!(!display_none().is_match(h2));
    assert!(h2.contains("visibility: hidden"));

    // Elements no navigation point targets keep their style
    assert!(chapter2.contains(r#"<p id="note" style="display:none">"#));
}

