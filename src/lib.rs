//! # epubq
//!
//! Repair and quality checks for EPUB 2 packages mangled by converters.
//!
//! ## Features
//!
//! - Rename a resource and keep every reference to it valid (manifest, guide,
//!   navigation map, `href`/`src`/`xlink:href` in content documents)
//! - Normalize cover metadata: canonical cover document and image names,
//!   cover item first in the manifest
//! - Repair navigation targets: redundant body fragments, hidden targets
//! - Report structural problems: guide roles, language, identifiers,
//!   watermarks, obfuscated fonts
//!
//! ## Quick Start
//!
//! ```no_run
//! use epubq::{MemoryStore, PackageTree, SanitizeOptions, find_roots, sanitize};
//!
//! let mut store = MemoryStore::open("book.epub").unwrap();
//! let roots = find_roots(&store).unwrap();
//! let mut tree = PackageTree::load(&store, roots).unwrap();
//!
//! for fix in sanitize(&mut tree, &store, &SanitizeOptions::default()).unwrap() {
//!     println!("{fix}");
//! }
//! tree.persist(&mut store).unwrap();
//! store.save("book_moh.epub").unwrap();
//! ```
//!
//! ## Checking a Package
//!
//! ```no_run
//! use epubq::{ArchiveScan, MemoryStore, SfntProbe, Validator, find_roots};
//!
//! let store = MemoryStore::open("book.epub").unwrap();
//! let roots = find_roots(&store).unwrap();
//! let validator = Validator::default().with_font_probe(SfntProbe);
//!
//! for finding in validator.validate(&store, &roots, &ArchiveScan::of(&store)).unwrap() {
//!     println!("{finding}");
//! }
//! ```

pub mod batch;
pub mod content;
pub mod error;
pub mod href;
pub mod io;
pub mod package;
mod patterns;
mod rename;
pub mod sanitize;
pub(crate) mod util;
pub mod validate;

pub use content::{ContentDocument, RefAttr};
pub use error::{Error, Result};
pub use io::{DirStore, MemoryStore, ResourceStore};
pub use package::{
    Descriptor, GuideRole, ManifestItem, NavPoint, NavigationMap, PackageRoots, PackageTree,
    find_roots,
};
pub use sanitize::{SanitizeOptions, sanitize};
pub use validate::{
    ArchiveScan, Check, CommandProbe, EpubCheck, Finding, FontProbe, SfntProbe, ValidateOptions,
    Validator,
};
