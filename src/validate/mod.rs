//! Structural quality checks.
//!
//! The [`Validator`] never modifies a package. It reports conventions that
//! converters commonly break as [`Finding`]s: missing or ambiguous cover and
//! guide metadata, identifier mismatches, watermark leftovers, inline styles
//! that hide navigation targets, and obfuscated fonts.

mod epubcheck;
mod fonts;

use std::fmt;

use memchr::memmem;

pub use epubcheck::EpubCheck;
pub use fonts::{CommandProbe, FontProbe, SfntProbe};

use crate::content::{ContentDocument, Element};
use crate::error::Result;
use crate::href;
use crate::io::ResourceStore;
use crate::package::{Descriptor, GuideRole, NavigationMap, PackageRoots};
use crate::patterns::DISPLAY_NONE_RE;
use crate::util::decode_text;

/// Options for [`Validator`].
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Language every `dc:language` is expected to carry.
    pub expected_language: String,
    /// Substrings marking a JPEG as a cover candidate.
    pub cover_tokens: Vec<String>,
    /// Heading that identifies an undeclared HTML table of contents.
    pub toc_heading: String,
    /// Prefix of text left behind by watermarking.
    pub watermark_marker: String,
    /// Full body text of a watermark notice page.
    pub watermark_notice: String,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            expected_language: "pl".to_string(),
            cover_tokens: vec!["cover".to_string(), "okladka".to_string()],
            toc_heading: "Spis treści".to_string(),
            watermark_marker: "==".to_string(),
            watermark_notice: "Plik jest zabezpieczony znakiem wodnym".to_string(),
        }
    }
}

/// What a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "snake_case"))]
pub enum Check {
    Language,
    CoverMetadata,
    Guide,
    CoverCandidate,
    HtmlCover,
    HtmlToc,
    Watermark,
    MetaCharset,
    LinkType,
    HiddenElement,
    Identifier,
    Encryption,
    Provenance,
    Conformance,
    /// The package could not be processed at all.
    Package,
}

impl Check {
    pub fn label(self) -> &'static str {
        match self {
            Check::Language => "language",
            Check::CoverMetadata => "cover-metadata",
            Check::Guide => "guide",
            Check::CoverCandidate => "cover-candidate",
            Check::HtmlCover => "html-cover",
            Check::HtmlToc => "html-toc",
            Check::Watermark => "watermark",
            Check::MetaCharset => "meta-charset",
            Check::LinkType => "link-type",
            Check::HiddenElement => "hidden-element",
            Check::Identifier => "identifier",
            Check::Encryption => "encryption",
            Check::Provenance => "provenance",
            Check::Conformance => "conformance",
            Check::Package => "package",
        }
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Finding {
    pub check: Check,
    pub message: String,
}

impl Finding {
    pub fn new(check: Check, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.check.label(), self.message)
    }
}

/// Facts about the raw archive gathered before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveScan {
    /// Entry name of an encryption descriptor, if the archive has one.
    pub encryption_descriptor: Option<String>,
}

impl ArchiveScan {
    pub fn of(store: &dyn ResourceStore) -> Self {
        Self {
            encryption_descriptor: store
                .entries()
                .into_iter()
                .find(|entry| entry.contains("encryption.xml")),
        }
    }
}

/// Read-only package checker.
pub struct Validator {
    options: ValidateOptions,
    font_probe: Option<Box<dyn FontProbe>>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidateOptions::default())
    }
}

impl Validator {
    /// A validator without a font probe; the font check is disabled.
    pub fn new(options: ValidateOptions) -> Self {
        Self {
            options,
            font_probe: None,
        }
    }

    pub fn with_font_probe(mut self, probe: impl FontProbe + 'static) -> Self {
        self.font_probe = Some(Box::new(probe));
        self
    }

    pub fn options(&self) -> &ValidateOptions {
        &self.options
    }

    /// Run every check.
    ///
    /// Returns an error only when the descriptor cannot be read or parsed;
    /// everything else is reported as findings.
    pub fn validate(
        &self,
        store: &dyn ResourceStore,
        roots: &PackageRoots,
        scan: &ArchiveScan,
    ) -> Result<Vec<Finding>> {
        let source = store.read(&roots.descriptor_path)?;
        let descriptor = Descriptor::parse(&roots.descriptor_path, &decode_text(&source))?;

        let mut run = Run {
            options: &self.options,
            store,
            roots,
            descriptor: &descriptor,
            findings: Vec::new(),
        };

        run.check_archive_entries(scan, self.font_probe.as_deref());
        run.check_language();
        run.check_cover_metadata();
        run.check_guide();
        run.check_content_documents();
        run.check_identifiers();
        run.check_provenance();
        if scan.encryption_descriptor.is_some() {
            run.check_uuid_identifier();
        }

        Ok(run.findings)
    }
}

/// State of one validation run.
struct Run<'a> {
    options: &'a ValidateOptions,
    store: &'a dyn ResourceStore,
    roots: &'a PackageRoots,
    descriptor: &'a Descriptor,
    findings: Vec<Finding>,
}

impl Run<'_> {
    fn report(&mut self, check: Check, message: impl Into<String>) {
        self.findings.push(Finding::new(check, message));
    }

    fn load(&self, store_path: &str) -> Option<ContentDocument> {
        let bytes = self.store.read(store_path).ok()?;
        match ContentDocument::from_bytes(store_path, &bytes) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!(document = %store_path, error = %e, "skipping document");
                None
            }
        }
    }

    // ========================================================================
    // Archive entries
    // ========================================================================

    fn check_archive_entries(&mut self, scan: &ArchiveScan, font_probe: Option<&dyn FontProbe>) {
        if scan.encryption_descriptor.is_some() {
            self.report(
                Check::Encryption,
                "encryption.xml file found... Embedded fonts probably are encrypted...",
            );
        }

        for entry in self.store.entries() {
            let lower = entry.to_ascii_lowercase();
            if lower.ends_with(".html") || lower.ends_with(".xhtml") || lower.ends_with(".htm") {
                self.check_entry_document(&entry);
            }

            if (lower.ends_with(".otf") || lower.ends_with(".ttf"))
                && scan.encryption_descriptor.is_none()
                && let Some(probe) = font_probe
            {
                match self.store.read(&entry) {
                    Ok(bytes) if !probe.can_decode(&bytes) => {
                        self.report(
                            Check::Encryption,
                            format!("{entry}: probably encrypted font file!"),
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(entry = %entry, error = %e, "cannot read font"),
                }
            }
        }
    }

    fn check_entry_document(&mut self, entry: &str) {
        let Some(doc) = self.load(entry) else {
            return;
        };

        let text = doc.body_text().replace('\u{ad}', "");
        if text.trim() == self.options.watermark_notice {
            self.report(Check::Watermark, format!("WM info file found: {entry}"));
        }

        for element in doc.elements() {
            if element
                .attr("style")
                .is_some_and(|style| DISPLAY_NONE_RE.is_match(style))
            {
                self.report(
                    Check::HiddenElement,
                    format!("Element with display:none style found: {element}"),
                );
            }
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    fn check_language(&mut self) {
        let descriptor = self.descriptor;
        let languages = &descriptor.metadata.languages;
        if languages.is_empty() {
            self.report(Check::Language, "No dc:language defined");
            return;
        }
        if languages.len() > 1 {
            self.report(Check::Language, "Multiple dc:language tags");
        }
        for lang in languages {
            if *lang != self.options.expected_language {
                self.report(
                    Check::Language,
                    format!("Problem with dc:language. Current value: {lang}"),
                );
            }
        }
    }

    fn check_cover_metadata(&mut self) {
        if self.descriptor.cover_meta_ids().len() > 1 {
            self.report(Check::CoverMetadata, "Multiple meta cover images defined.");
        }
    }

    fn check_guide(&mut self) {
        let count = |role: GuideRole| self.descriptor.guide_refs(&role).count();
        let (covers, tocs, texts) = (
            count(GuideRole::Cover),
            count(GuideRole::Toc),
            count(GuideRole::Text),
        );

        match covers {
            0 => self.report(Check::Guide, "No cover guide element defined."),
            1 => {}
            _ => self.report(Check::Guide, "Multiple cover guide elements defined."),
        }
        match tocs {
            0 => self.report(Check::Guide, "No TOC guide element defined."),
            1 => {}
            _ => self.report(Check::Guide, "Multiple TOC guide elements defined."),
        }
        if texts > 1 {
            self.report(Check::Guide, "Multiple text guide elements defined.");
        }

        let metas = self.descriptor.cover_meta_ids().len();
        if metas == 0 && covers == 0 {
            self.find_cover_candidates();
        }
        if metas == 1 && covers == 1 {
            self.check_html_cover();
        }
        self.check_html_toc();
    }

    fn find_cover_candidates(&mut self) {
        let images: Vec<_> = self
            .descriptor
            .manifest
            .iter()
            .filter(|i| i.media_type == "image/jpeg")
            .collect();

        if images.is_empty() {
            self.report(Check::CoverCandidate, "No images in an entire book found...");
            return;
        }

        let candidate = images.iter().find(|image| {
            let lower = image.href.to_lowercase();
            self.options
                .cover_tokens
                .iter()
                .any(|token| lower.contains(token.as_str()))
        });
        let message = match candidate {
            Some(image) => format!(
                "Candidate image for cover found: href={} id={}",
                image.href, image.id
            ),
            None => {
                let hrefs: Vec<&str> = images.iter().map(|i| i.href.as_str()).collect();
                format!(
                    "No candidate cover images found. Check a list of all images: {}",
                    hrefs.join(", ")
                )
            }
        };
        self.report(Check::CoverCandidate, message);
    }

    /// Cross-check the guide cover document against the metadata cover image.
    fn check_html_cover(&mut self) {
        let meta_id = self.descriptor.cover_meta_ids()[0];
        let Some(meta_item) = self.descriptor.item_by_id(meta_id) else {
            self.report(Check::HtmlCover, "Meta cover does not properly defined.");
            return;
        };
        let meta_file = href::file_name(&meta_item.href).to_string();

        let Some(cover_ref) = self.descriptor.guide_refs(&GuideRole::Cover).next() else {
            return;
        };
        let cover_path = href::join(
            &self.roots.descriptor_dir,
            href::split_fragment(&cover_ref.href).0,
        );
        let Some(doc) = self.load(&cover_path) else {
            self.report(
                Check::HtmlCover,
                "Error loading HTML cover... Probably not a html file...",
            );
            return;
        };

        if !doc.body_text().trim().is_empty() {
            self.report(Check::HtmlCover, "HTML cover should not contain any text...");
        }

        let images: Vec<&Element> = doc.elements_named("img").collect();
        let svg_images: Vec<&Element> = doc
            .elements_named("image")
            .filter(|e| e.name.contains(':') || e.prefixed_attr("href").is_some())
            .collect();

        for (images, reference) in [(images, "src"), (svg_images, "href")] {
            if images.len() > 1 {
                self.report(Check::HtmlCover, "HTML cover should have only one image...");
            } else if let Some(image) = images.first() {
                let target = if reference == "src" {
                    image.attr("src")
                } else {
                    image.prefixed_attr("href")
                };
                let target = href::decode(target.unwrap_or(""));
                if !href::file_name(&target).contains(meta_file.as_str()) {
                    self.report(Check::HtmlCover, "Meta cover and HTML cover mismatched.");
                }
            }
        }
    }

    fn check_html_toc(&mut self) {
        let Some(toc) = self.descriptor.guide_refs(&GuideRole::Toc).next() else {
            return;
        };
        let path = href::join(&self.roots.descriptor_dir, href::split_fragment(&toc.href).0);
        if let Ok(raw) = self.store.read(&path)
            && memmem::find(&raw, b"<dl>").is_some()
        {
            self.report(Check::HtmlToc, "Problematic DL tag in HTML TOC found...");
        }
    }

    // ========================================================================
    // Content documents
    // ========================================================================

    fn check_content_documents(&mut self) {
        let has_toc = self.descriptor.guide_refs(&GuideRole::Toc).next().is_some();
        let (mut watermark, mut charset, mut link) = (false, false, false);

        let items: Vec<String> = self
            .descriptor
            .content_items()
            .map(|i| i.href.clone())
            .collect();
        for item in items {
            let Some(doc) = self.load(&href::join(&self.roots.descriptor_dir, &item)) else {
                continue;
            };

            if !watermark
                && doc.elements().iter().any(|e| {
                    e.text
                        .as_deref()
                        .is_some_and(|t| t.starts_with(self.options.watermark_marker.as_str()))
                })
            {
                self.report(Check::Watermark, "Potential problematic WM found");
                watermark = true;
            }

            if !charset
                && doc
                    .elements_named("meta")
                    .any(|e| e.attr("charset").is_some_and(|c| c.eq_ignore_ascii_case("utf-8")))
            {
                self.report(Check::MetaCharset, "Problematic <meta charset=\"utf-8\" /> found.");
                charset = true;
            }

            if !has_toc && doc.body_text().contains(self.options.toc_heading.as_str()) {
                self.report(Check::HtmlToc, format!("Html TOC candidate found: {item}"));
            }

            if !link && doc.elements_named("link").any(|e| e.attr("type").is_none()) {
                self.report(
                    Check::LinkType,
                    "At least one xhtml file has link tag without type attribute defined",
                );
                link = true;
            }
        }
    }

    // ========================================================================
    // Identifiers
    // ========================================================================

    fn check_identifiers(&mut self) {
        let identifier = match self.descriptor.unique_identifier.as_deref() {
            None => {
                self.report(Check::Identifier, "no unique-identifier found");
                String::new()
            }
            Some(_) => match self.descriptor.unique_identifier_value() {
                Some(value) => value.to_string(),
                None => {
                    self.report(Check::Identifier, "dc:identifier with unique-id not found");
                    String::new()
                }
            },
        };

        match self.navigation_uid() {
            Some(uid) if uid != identifier => {
                self.report(Check::Identifier, "dtd:uid and dc:identifier mismatched");
            }
            Some(_) => {}
            None => self.report(Check::Identifier, "dtd:uid not properly defined"),
        }
    }

    fn navigation_uid(&self) -> Option<String> {
        let item = self.descriptor.navigation_item()?;
        let path = href::join(&self.roots.descriptor_dir, &item.href);
        let bytes = self.store.read(&path).ok()?;
        let map = NavigationMap::parse(path, &decode_text(&bytes)).ok()?;
        map.uid
    }

    fn check_uuid_identifier(&mut self) {
        let has_uuid = self
            .descriptor
            .metadata
            .identifiers
            .iter()
            .any(|i| i.value.starts_with("urn:uuid:"));
        if !has_uuid {
            self.report(Check::Encryption, "UUID identifier in content.opf missing");
        }
    }

    fn check_provenance(&mut self) {
        let descriptor = self.descriptor;
        let metadata = &descriptor.metadata;
        if metadata
            .metas
            .iter()
            .any(|m| m.name.as_deref().is_some_and(|n| n.starts_with("calibre")))
        {
            self.report(Check::Provenance, "calibre staff found");
        }
        if metadata
            .identifiers
            .iter()
            .any(|i| i.scheme.as_deref() == Some("calibre"))
        {
            self.report(Check::Provenance, "other calibre staff found");
        }
    }
}
