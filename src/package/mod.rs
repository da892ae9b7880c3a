//! Package loading and persistence.
//!
//! A [`PackageTree`] is built once per invocation from a [`ResourceStore`].
//! Every repair operation mutates it in memory: descriptor and navigation
//! changes live in the parsed models, rewritten content documents are
//! buffered, and resource moves are logged. Nothing reaches the store until
//! [`PackageTree::persist`].

mod ncx;
mod opf;
mod roots;

use std::collections::BTreeMap;

pub use ncx::{NavPoint, NavigationMap};
pub use opf::{
    Descriptor, GuideReference, GuideRole, Identifier, ManifestItem, Meta, Metadata,
    NCX_MEDIA_TYPE,
};
pub use roots::{CONTAINER_PATH, PackageRoots, find_roots};

use crate::content::ContentDocument;
use crate::error::{Error, Result};
use crate::href;
use crate::io::ResourceStore;
use crate::util::decode_text;

/// In-memory view of one package.
#[derive(Debug, Clone)]
pub struct PackageTree {
    roots: PackageRoots,
    pub descriptor: Descriptor,
    pub navigation: NavigationMap,
    /// Rewritten content documents keyed by manifest href.
    pending: BTreeMap<String, String>,
    /// Resource moves `(from, to)` as manifest hrefs, in order.
    moves: Vec<(String, String)>,
}

impl PackageTree {
    /// Load and parse the descriptor and its navigation map.
    ///
    /// Fails with [`Error::Load`] when either is missing or malformed.
    pub fn load(store: &dyn ResourceStore, roots: PackageRoots) -> Result<Self> {
        let descriptor = read_text(store, &roots.descriptor_path)
            .map_err(|e| Error::Load(format!("{}: {}", roots.descriptor_path, e)))?;
        let descriptor = Descriptor::parse(&roots.descriptor_path, &descriptor)
            .map_err(|e| Error::Load(e.to_string()))?;

        let nav_item = descriptor
            .navigation_item()
            .ok_or_else(|| Error::Load("no navigation map (NCX) declared".into()))?;
        let nav_path = href::join(&roots.descriptor_dir, &nav_item.href);
        let navigation = read_text(store, &nav_path)
            .map_err(|e| Error::Load(format!("{}: {}", nav_path, e)))?;
        let navigation =
            NavigationMap::parse(&nav_path, &navigation).map_err(|e| Error::Load(e.to_string()))?;

        tracing::debug!(
            descriptor = %roots.descriptor_path,
            items = descriptor.manifest.len(),
            points = navigation.points.len(),
            "loaded package"
        );

        Ok(Self {
            roots,
            descriptor,
            navigation,
            pending: BTreeMap::new(),
            moves: Vec::new(),
        })
    }

    pub fn roots(&self) -> &PackageRoots {
        &self.roots
    }

    /// Store path of a manifest href.
    pub fn store_path(&self, href: &str) -> String {
        href::join(&self.roots.descriptor_dir, href)
    }

    /// Manifest href the resource at `href` had when the package was loaded.
    fn origin_of(&self, href: &str) -> String {
        self.moves
            .iter()
            .rev()
            .fold(href.to_string(), |current, (from, to)| {
                if &current == to { from.clone() } else { current }
            })
    }

    /// Load a content document by manifest href, preferring its buffered
    /// rewrite over the stored bytes.
    pub fn load_document(&self, store: &dyn ResourceStore, href: &str) -> Result<ContentDocument> {
        if let Some(source) = self.pending.get(href) {
            return ContentDocument::parse(href, source.as_str());
        }
        let bytes = store.read(&self.store_path(&self.origin_of(href)))?;
        ContentDocument::from_bytes(href, &bytes)
    }

    /// Content documents in manifest order, as manifest hrefs.
    pub fn content_hrefs(&self) -> Vec<String> {
        self.descriptor
            .content_items()
            .map(|i| i.href.clone())
            .collect()
    }

    /// Buffer a rewritten content document.
    pub fn stage_document(&mut self, href: impl Into<String>, source: String) {
        self.pending.insert(href.into(), source);
    }

    /// Record a move and re-key its buffered rewrite.
    pub(crate) fn record_move(&mut self, from: &str, to: &str) {
        if let Some(source) = self.pending.remove(from) {
            self.pending.insert(to.to_string(), source);
        }
        self.moves.push((from.to_string(), to.to_string()));
    }

    /// Pending moves, oldest first.
    pub fn moves(&self) -> &[(String, String)] {
        &self.moves
    }

    /// Write every buffered change to the store.
    ///
    /// Moves are applied first, in order; a failed move aborts before any
    /// document is written. Then buffered documents, the descriptor and the
    /// navigation map are written.
    pub fn persist(&mut self, store: &mut dyn ResourceStore) -> Result<()> {
        let descriptor = self.descriptor.to_xml()?;
        let navigation = self.navigation.to_xml()?;

        for (from, to) in &self.moves {
            let (from, to) = (self.store_path(from), self.store_path(to));
            tracing::debug!(%from, %to, "moving resource");
            store.rename(&from, &to)?;
        }
        self.moves.clear();

        for (href, source) in std::mem::take(&mut self.pending) {
            store.write(&self.store_path(&href), source.as_bytes())?;
        }

        store.write(&self.roots.descriptor_path, descriptor.as_bytes())?;
        store.write(self.navigation.path(), navigation.as_bytes())?;

        self.descriptor = Descriptor::parse(&self.roots.descriptor_path, &descriptor)?;
        self.navigation = NavigationMap::parse(self.navigation.path().to_string(), &navigation)?;
        Ok(())
    }
}

fn read_text(store: &dyn ResourceStore, path: &str) -> Result<String> {
    let bytes = store.read(path)?;
    Ok(decode_text(&bytes).into_owned())
}
