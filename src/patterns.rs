//! Cached regex patterns for inline style handling.

use regex::Regex;
use std::sync::LazyLock;

/// Matches a `display: none` declaration in a `style` attribute.
pub static DISPLAY_NONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"display\s*:\s*none").unwrap());

/// Replacement that keeps a hidden element addressable by readers that skip
/// `display: none` targets.
pub const VISIBILITY_HIDDEN: &str = "visibility: hidden; height: 0";
