//! External conformance validator.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use super::{Check, Finding};
use crate::error::Result;

/// Runs epubcheck through `java -jar`, with output inherited.
#[derive(Debug, Clone)]
pub struct EpubCheck {
    java: PathBuf,
    jar: PathBuf,
}

impl EpubCheck {
    pub fn new(jar: impl Into<PathBuf>) -> Self {
        Self {
            java: PathBuf::from("java"),
            jar: jar.into(),
        }
    }

    /// Use a specific Java launcher instead of `java` from `PATH`.
    pub fn with_java(mut self, java: impl Into<PathBuf>) -> Self {
        self.java = java.into();
        self
    }

    pub fn jar(&self) -> &Path {
        &self.jar
    }

    pub fn run(&self, archive: &Path) -> Result<ExitStatus> {
        tracing::debug!(archive = %archive.display(), jar = %self.jar.display(), "running epubcheck");
        let status = Command::new(&self.java)
            .arg("-jar")
            .arg(&self.jar)
            .arg(archive)
            .status()?;
        Ok(status)
    }

    /// Run and turn a failing exit status into a finding.
    pub fn check(&self, archive: &Path) -> Result<Option<Finding>> {
        let status = self.run(archive)?;
        if status.success() {
            return Ok(None);
        }
        Ok(Some(Finding::new(
            Check::Conformance,
            format!("epubcheck reported errors ({status})"),
        )))
    }
}
