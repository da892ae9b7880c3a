//! Embedded font decodability checks.

use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Decides whether an embedded font can be read as-is. Obfuscated fonts
/// fail this check.
pub trait FontProbe {
    fn can_decode(&self, bytes: &[u8]) -> bool;
}

/// Built-in check: every face in the file (or the single face of a plain
/// sfnt) must parse with its required tables present.
#[derive(Debug, Clone, Copy, Default)]
pub struct SfntProbe;

impl FontProbe for SfntProbe {
    fn can_decode(&self, bytes: &[u8]) -> bool {
        let count = ttf_parser::fonts_in_collection(bytes).unwrap_or(1);
        count > 0 && (0..count).all(|index| ttf_parser::Face::parse(bytes, index).is_ok())
    }
}

/// Probe delegating to an external program, run as `program [args..] <font>`
/// against a copy of the font in a scoped temporary directory. Exit status
/// zero means decodable.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn run(&self, bytes: &[u8]) -> std::io::Result<bool> {
        let dir = tempfile::tempdir()?;
        let font = dir.path().join("font.bin");
        std::fs::write(&font, bytes)?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&font)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove font check directory");
        }
        Ok(status?.success())
    }
}

impl FontProbe for CommandProbe {
    /// A checker that cannot be run does not flag the font.
    fn can_decode(&self, bytes: &[u8]) -> bool {
        match self.run(bytes) {
            Ok(decodable) => decodable,
            Err(e) => {
                tracing::warn!(program = %self.program.display(), error = %e, "font checker failed to run");
                true
            }
        }
    }
}
