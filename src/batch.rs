//! Directory-level orchestration.
//!
//! Every archive is processed on its own: a package that fails to load is
//! reported and the batch moves on to the next archive.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;
use crate::io::{MemoryStore, ResourceStore};
use crate::package::{Descriptor, PackageTree, find_roots};
use crate::sanitize::{SanitizeOptions, sanitize};
use crate::util::decode_text;
use crate::validate::{ArchiveScan, Check, EpubCheck, Finding, Validator};

/// Suffix of archives written by fix mode.
pub const FIXED_SUFFIX: &str = "_moh.epub";
/// Suffix of untouched originals kept beside fixed archives.
pub const ORIGINAL_SUFFIX: &str = "_org.epub";
const EPUB_SUFFIX: &str = ".epub";

/// What to do with each archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Repair `X.epub` into `X_moh.epub`.
    Fix,
    /// Check archives; `modified` selects fixed archives instead of originals.
    Validate { modified: bool },
    /// Rename archives to `<creator> - <title>.epub`.
    Rename { modified: bool },
}

impl Mode {
    /// `(suffix, excluded suffix)` of the archives this mode reads.
    fn selection(self) -> (&'static str, &'static str) {
        match self {
            Mode::Fix => (EPUB_SUFFIX, FIXED_SUFFIX),
            Mode::Validate { modified } | Mode::Rename { modified } => {
                if modified {
                    (FIXED_SUFFIX, ORIGINAL_SUFFIX)
                } else {
                    (EPUB_SUFFIX, FIXED_SUFFIX)
                }
            }
        }
    }

    pub fn selects(self, file_name: &str) -> bool {
        let (suffix, excluded) = self.selection();
        file_name.ends_with(suffix) && !file_name.ends_with(excluded)
    }
}

/// Outcome for one archive.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ArchiveReport {
    pub archive: PathBuf,
    /// Applied repairs and renames.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub fixes: Vec<String>,
    pub findings: Vec<Finding>,
}

impl ArchiveReport {
    fn new(archive: &Path) -> Self {
        Self {
            archive: archive.to_path_buf(),
            ..Default::default()
        }
    }

    /// File name used to prefix printed lines.
    pub fn display_name(&self) -> String {
        self.archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.archive.display().to_string())
    }
}

/// Collaborators and options for a batch run.
pub struct Batch {
    pub mode: Mode,
    pub sanitize: SanitizeOptions,
    pub validator: Validator,
    pub epubcheck: Option<EpubCheck>,
}

impl Batch {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            sanitize: SanitizeOptions::default(),
            validator: Validator::default(),
            epubcheck: None,
        }
    }

    /// Process every selected archive below `dir`, in path order.
    pub fn run(&self, dir: &Path) -> Result<Vec<ArchiveReport>> {
        let archives = find_archives(dir, self.mode)?;
        tracing::info!(dir = %dir.display(), count = archives.len(), "processing archives");
        Ok(archives.iter().map(|a| self.process(a)).collect())
    }

    pub fn process(&self, archive: &Path) -> ArchiveReport {
        let mut report = ArchiveReport::new(archive);
        let result = match self.mode {
            Mode::Fix => fix_archive(archive, &self.sanitize).map(|(_, fixes)| {
                report.fixes = fixes;
            }),
            Mode::Validate { .. } => {
                self.validate_archive(archive).map(|findings| report.findings = findings)
            }
            Mode::Rename { .. } => rename_archive(archive).map(|outcome| match outcome {
                RenameOutcome::Renamed(to) => {
                    report.fixes.push(format!("Renamed to {}", to.display()));
                }
                RenameOutcome::Skipped(reason) => {
                    report.findings.push(Finding::new(Check::Package, reason));
                }
            }),
        };
        if let Err(e) = result {
            tracing::warn!(archive = %archive.display(), error = %e, "archive failed");
            report.findings.push(Finding::new(Check::Package, e.to_string()));
        }
        report
    }

    fn validate_archive(&self, archive: &Path) -> Result<Vec<Finding>> {
        let store = MemoryStore::open(archive)?;
        let scan = ArchiveScan::of(&store);
        let roots = find_roots(&store)?;
        let mut findings = self.validator.validate(&store, &roots, &scan)?;

        if let Some(epubcheck) = &self.epubcheck {
            match epubcheck.check(archive) {
                Ok(finding) => findings.extend(finding),
                Err(e) => findings.push(Finding::new(
                    Check::Conformance,
                    format!("epubcheck could not be run: {e}"),
                )),
            }
        }
        Ok(findings)
    }
}

/// Archives below `dir` that `mode` reads, sorted by path.
pub fn find_archives(dir: &Path, mode: Mode) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file()
            && entry.file_name().to_str().is_some_and(|n| mode.selects(n))
        {
            found.push(entry.into_path());
        }
    }
    found.sort();
    Ok(found)
}

/// Path fix mode writes for `archive` (`X.epub` -> `X_moh.epub`).
pub fn fixed_path(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(EPUB_SUFFIX).unwrap_or(&name);
    archive.with_file_name(format!("{stem}{FIXED_SUFFIX}"))
}

/// Sanitize `archive` and write the result beside it. Returns the written
/// path and the applied repairs.
pub fn fix_archive(archive: &Path, options: &SanitizeOptions) -> Result<(PathBuf, Vec<String>)> {
    tracing::info!(archive = %archive.display(), "fixing");
    let mut store = MemoryStore::open(archive)?;
    let roots = find_roots(&store)?;
    let mut tree = PackageTree::load(&store, roots)?;

    let fixes = sanitize(&mut tree, &store, options)?;
    tree.persist(&mut store)?;

    let output = fixed_path(archive);
    store.save(&output)?;
    Ok((output, fixes))
}

/// Result of [`rename_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed(PathBuf),
    Skipped(String),
}

/// Rename `archive` to `<first creator> - <first title>.epub`.
pub fn rename_archive(archive: &Path) -> Result<RenameOutcome> {
    let store = MemoryStore::open(archive)?;
    let roots = find_roots(&store)?;
    let source = store.read(&roots.descriptor_path)?;
    let descriptor = Descriptor::parse(&roots.descriptor_path, &decode_text(&source))?;
    let metadata = &descriptor.metadata;

    let Some(title) = metadata.titles.first().filter(|t| !t.is_empty()) else {
        return Ok(RenameOutcome::Skipped(
            "dc:title not found. Skipping renaming file...".into(),
        ));
    };
    let Some(creator) = metadata.creators.first().filter(|c| !c.is_empty()) else {
        return Ok(RenameOutcome::Skipped(
            "dc:creator not found. Skipping renaming file...".into(),
        ));
    };

    let name = format!("{creator} - {title}.epub").replace(['/', '\\'], "_");
    let target = archive.with_file_name(name);
    if target.exists() {
        let current = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(RenameOutcome::Skipped(format!("File exists: {current}. Skipping...")));
    }

    fs::rename(archive, &target)?;
    tracing::info!(from = %archive.display(), to = %target.display(), "renamed archive");
    Ok(RenameOutcome::Renamed(target))
}
