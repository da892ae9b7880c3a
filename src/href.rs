//! Package-relative href handling.
//!
//! Every path in this module is `/`-separated. Paths inside a package are
//! relative to the descriptor directory; references found in content documents
//! are relative to the directory of the document that contains them.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// ASCII characters that cannot appear literally in a reference path.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Scheme prefixes that never point into the package.
const EXTERNAL_PREFIXES: &[&str] = &["http://", "https://", "mailto:", "tel:", "data:", "#"];

/// Check whether a reference leaves the package (network, mail, phone,
/// embedded data) or stays inside the current document (pure fragment).
pub fn is_external(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    EXTERNAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Split `path#fragment` at the first `#`.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    }
}

/// Join a path and an optional fragment back into an href.
pub fn with_fragment(path: &str, fragment: Option<&str>) -> String {
    match fragment {
        Some(fragment) => format!("{}#{}", path, fragment),
        None => path.to_string(),
    }
}

/// Percent-decode an href. Invalid UTF-8 sequences are replaced.
pub fn decode(href: &str) -> Cow<'_, str> {
    percent_decode_str(href).decode_utf8_lossy()
}

/// Percent-decode the path part of an href, keeping the fragment verbatim.
pub fn decode_href(href: &str) -> String {
    let (path, fragment) = split_fragment(href);
    with_fragment(&decode(path), fragment)
}

/// Inverse of [`decode_href`]: encode the path part, keep the fragment.
pub fn encode_href(href: &str) -> String {
    let (path, fragment) = split_fragment(href);
    with_fragment(&encode(path), fragment)
}

/// Percent-encode the characters that cannot appear literally in a
/// reference path. Non-ASCII characters are kept as IRI characters.
pub fn encode(path: &str) -> Cow<'_, str> {
    if path.is_ascii() {
        return utf8_percent_encode(path, PATH_ESCAPES).into();
    }
    let mut out = String::with_capacity(path.len() + 8);
    let mut rest = path;
    while !rest.is_empty() {
        let ascii_len = rest.find(|c: char| !c.is_ascii()).unwrap_or(rest.len());
        let (ascii, tail) = rest.split_at(ascii_len);
        out.extend(utf8_percent_encode(ascii, PATH_ESCAPES));
        let wide_len = tail.find(|c: char| c.is_ascii()).unwrap_or(tail.len());
        out.push_str(&tail[..wide_len]);
        rest = &tail[wide_len..];
    }
    Cow::Owned(out)
}

/// Final path segment (`Text/ch1.xhtml` -> `ch1.xhtml`).
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Directory part of a path, without trailing slash (`""` at the root).
pub fn parent(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// File name without its extension (`cover.jpeg` -> `cover`).
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// Extension including the leading dot (`cover.jpeg` -> `.jpeg`), or `""`.
pub fn extension(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(i) => &name[i..],
    }
}

/// Resolve a relative href against a base directory, normalizing `.` and
/// `..` segments. A leading `/` anchors the href at the package root.
pub fn join(base_dir: &str, href: &str) -> String {
    if let Some(rooted) = href.strip_prefix('/') {
        return normalize(rooted);
    }

    let mut parts: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();

    for segment in href.split('/') {
        match segment {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            s => parts.push(s),
        }
    }

    parts.join("/")
}

/// Normalize a package path (`a/./b/../c` -> `a/c`).
pub fn normalize(path: &str) -> String {
    join("", path)
}

/// Path leading from directory `from_dir` to `target`, both package paths.
pub fn relative(target: &str, from_dir: &str) -> String {
    let target = normalize(target);
    let from_dir = normalize(from_dir);

    let target_parts: Vec<&str> = target.split('/').filter(|s| !s.is_empty()).collect();
    let from_parts: Vec<&str> = from_dir.split('/').filter(|s| !s.is_empty()).collect();

    let common = target_parts
        .iter()
        .zip(&from_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::with_capacity(from_parts.len() + target_parts.len());
    parts.extend(std::iter::repeat_n("..", from_parts.len() - common));
    parts.extend(&target_parts[common..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_is_external() {
        assert!(is_external("http://example.com"));
        assert!(is_external("HTTPS://example.com"));
        assert!(is_external("mailto:someone@example.com"));
        assert!(is_external("tel:123"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(is_external("#note-1"));
        assert!(!is_external("Text/ch1.xhtml#note-1"));
        assert!(!is_external("../Images/cover.jpg"));
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(split_fragment("ch1.xhtml#a#b"), ("ch1.xhtml", Some("a#b")));
        assert_eq!(split_fragment("ch1.xhtml"), ("ch1.xhtml", None));
        assert_eq!(split_fragment("ch1.xhtml#"), ("ch1.xhtml", Some("")));
    }

    #[test]
    fn test_decode_and_encode() {
        assert_eq!(decode("Text/chapter%201.xhtml"), "Text/chapter 1.xhtml");
        assert_eq!(decode("ok%C5%82adka.jpg"), "okładka.jpg");
        assert_eq!(encode("Text/chapter 1.xhtml"), "Text/chapter%201.xhtml");
        assert_eq!(encode("okładka.jpg"), "okładka.jpg");
        assert_eq!(encode("100%.xhtml"), "100%25.xhtml");
        assert_eq!(encode("rozdział 2?.xhtml"), "rozdział%202%3F.xhtml");
        assert!(matches!(encode("Text/ch1.xhtml"), Cow::Borrowed(_)));
        assert_eq!(decode_href("a%20b.xhtml#x%20y"), "a b.xhtml#x%20y");
        assert_eq!(encode_href("a b.xhtml#sec"), "a%20b.xhtml#sec");
    }

    #[test]
    fn test_path_parts() {
        assert_eq!(file_name("OEBPS/Text/ch1.xhtml"), "ch1.xhtml");
        assert_eq!(file_name("ch1.xhtml"), "ch1.xhtml");
        assert_eq!(parent("OEBPS/Text/ch1.xhtml"), "OEBPS/Text");
        assert_eq!(parent("ch1.xhtml"), "");
        assert_eq!(file_stem("Images/okladka.jpeg"), "okladka");
        assert_eq!(extension("Images/okladka.jpeg"), ".jpeg");
        assert_eq!(extension("Images/.hidden"), "");
        assert_eq!(file_stem("README"), "README");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("Text", "../Images/cover.jpg"), "Images/cover.jpg");
        assert_eq!(join("", "Text/ch1.xhtml"), "Text/ch1.xhtml");
        assert_eq!(join("Text", "./ch2.xhtml"), "Text/ch2.xhtml");
        assert_eq!(join("Text/sub", "/Images/a.png"), "Images/a.png");
    }

    #[test]
    fn test_relative() {
        assert_eq!(relative("Images/cover.jpg", "Text"), "../Images/cover.jpg");
        assert_eq!(relative("Text/cover.html", "Text"), "cover.html");
        assert_eq!(relative("cover.html", ""), "cover.html");
        assert_eq!(relative("Text/cover.html", ""), "Text/cover.html");
        assert_eq!(relative("a/b/c.xhtml", "a/d/e"), "../../b/c.xhtml");
    }

    proptest! {
        #[test]
        fn relative_then_join_reaches_target(
            target in proptest::collection::vec("[a-z]{1,3}", 1..4),
            from in proptest::collection::vec("[a-z]{1,3}", 0..4),
        ) {
            let target = target.join("/");
            let from_dir = from.join("/");
            let rel = relative(&target, &from_dir);
            prop_assert_eq!(join(&from_dir, &rel), target);
        }
    }
}
