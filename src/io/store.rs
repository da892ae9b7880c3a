use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::Result;

/// Random-access storage for the resources of one package.
///
/// Paths are `/`-separated and relative to the store root (the directory an
/// archive was extracted into, or the root of the archive itself).
pub trait ResourceStore {
    /// Reads the whole resource at `path`.
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    /// Creates or replaces the resource at `path`.
    fn write(&mut self, path: &str, data: &[u8]) -> io::Result<()>;

    /// Moves a resource. Fails if `from` does not exist.
    fn rename(&mut self, from: &str, to: &str) -> io::Result<()>;

    /// Returns true if a resource exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Lists every resource path in the store.
    fn entries(&self) -> Vec<String>;
}

// --- Implementation: Local Directory ---

/// A store over an extracted package directory.
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl ResourceStore for DirStore {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.full_path(path))
    }

    fn write(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, data)
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let target = self.full_path(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.full_path(from), target)
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }

    fn entries(&self) -> Vec<String> {
        let mut found = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(root = %self.root.display(), error = %e, "skipping unreadable package entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                let parts: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect();
                found.push(parts.join("/"));
            }
        }
        found.sort();
        found
    }
}

// --- Implementation: In-Memory ---

/// An in-memory store, usually filled from an EPUB archive.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource, builder style.
    pub fn with(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), data.into());
        self
    }

    /// Load every file entry of a ZIP archive.
    pub fn from_zip<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut files = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut contents = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut contents)?;
            files.insert(name, contents);
        }

        Ok(Self { files })
    }

    /// Load an EPUB archive from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = fs::File::open(path)?;
        Self::from_zip(io::BufReader::new(file))
    }

    /// Repack the store as an EPUB archive.
    ///
    /// `mimetype` is written first and uncompressed, everything else deflated.
    pub fn write_zip<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        if let Some(mimetype) = self.files.get("mimetype") {
            zip.start_file("mimetype", stored)?;
            zip.write_all(mimetype)?;
        }

        for (name, data) in &self.files {
            if name == "mimetype" {
                continue;
            }
            zip.start_file(name.as_str(), deflated)?;
            zip.write_all(data)?;
        }

        zip.finish()?;
        Ok(())
    }

    /// Write the store as an EPUB archive on disk.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = fs::File::create(path)?;
        self.write_zip(io::BufWriter::new(file))
    }
}

impl ResourceStore for MemoryStore {
    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path))
        })
    }

    fn write(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> io::Result<()> {
        let data = self.files.remove(from).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", from))
        })?;
        self.files.insert(to.to_string(), data);
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn entries(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }
}
