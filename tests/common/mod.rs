//! Shared fixtures: a small converter-produced package.
//!
//! Layout under `OEBPS/`:
//! - `Text/titlepage.xhtml` (guide cover, SVG cover image)
//! - `Text/chapter1.xhtml` (body id `body1`)
//! - `Text/chapter 2.xhtml` (hidden navigation target `#hidden`)
//! - `Images/okladka.jpg` (meta cover), `Styles/style.css`, `toc.ncx`

#![allow(dead_code)]

use epubq::{MemoryStore, PackageTree, ResourceStore, find_roots};

pub const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const OPF: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0" unique-identifier="BookId">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>Pan Tadeusz</dc:title>
    <dc:creator opf:role="aut">Adam Mickiewicz</dc:creator>
    <dc:language>pl</dc:language>
    <dc:identifier id="BookId" opf:scheme="UUID">urn:uuid:ABC</dc:identifier>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="titlepage" href="Text/titlepage.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="Text/chapter1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="Text/chapter%202.xhtml" media-type="application/xhtml+xml"/>
    <item id="css" href="Styles/style.css" media-type="text/css"/>
    <item id="cover-img" href="Images/okladka.jpg" media-type="image/jpeg"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="titlepage"/>
    <itemref idref="ch1"/>
    <itemref idref="ch2"/>
  </spine>
  <guide>
    <reference type="cover" title="Okładka" href="Text/titlepage.xhtml"/>
    <reference type="toc" title="Spis treści" href="Text/chapter1.xhtml#toc"/>
  </guide>
</package>"#;

pub const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="urn:uuid:ABC"/>
  </head>
  <docTitle><text>Pan Tadeusz</text></docTitle>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Księga pierwsza</text></navLabel>
      <content src="Text/chapter1.xhtml#body1"/>
    </navPoint>
    <navPoint id="np2" playOrder="2">
      <navLabel><text>Zamek</text></navLabel>
      <content src="Text/chapter%202.xhtml#hidden"/>
    </navPoint>
  </navMap>
</ncx>"#;

pub const TITLEPAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>Okładka</title>
</head>
<body>
  <div>
    <svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.1" viewBox="0 0 600 800">
      <image width="600" height="800" xlink:href="../Images/okladka.jpg"/>
    </svg>
  </div>
</body>
</html>"#;

pub const CHAPTER1: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>Księga pierwsza</title>
  <link href="../Styles/style.css" rel="stylesheet" type="text/css"/>
</head>
<body id="body1">
  <h1 id="toc">Księga pierwsza</h1>
  <p>Litwo! Ojczyzno moja! <a href="chapter%202.xhtml#s1">dalej</a></p>
  <p><img src="../Images/okladka.jpg" alt="okładka"/></p>
  <p><a href="http://example.com/okladka.jpg">źródło</a></p>
</body>
</html>"#;

pub const CHAPTER2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml">
<head>
  <title>Księga druga</title>
  <link href="../Styles/style.css" rel="stylesheet" type="text/css"/>
</head>
<body id="body2">
  <h2 id="hidden" style="display: none">Zamek</h2>
  <p id="s1">Kto ty jesteś? <a href="titlepage.xhtml">okładka</a></p>
  <p id="note" style="display:none">przypis</p>
</body>
</html>"#;

/// A content document cut off inside a start tag.
pub const BROKEN_CHAPTER: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p class="x""#;

pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00";

/// Every file of the sample package, with store paths.
pub fn sample_files() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("mimetype", b"application/epub+zip".to_vec()),
        ("META-INF/container.xml", CONTAINER.as_bytes().to_vec()),
        ("OEBPS/content.opf", OPF.as_bytes().to_vec()),
        ("OEBPS/toc.ncx", NCX.as_bytes().to_vec()),
        ("OEBPS/Text/titlepage.xhtml", TITLEPAGE.as_bytes().to_vec()),
        ("OEBPS/Text/chapter1.xhtml", CHAPTER1.as_bytes().to_vec()),
        ("OEBPS/Text/chapter 2.xhtml", CHAPTER2.as_bytes().to_vec()),
        ("OEBPS/Styles/style.css", b"p { margin: 0 }".to_vec()),
        ("OEBPS/Images/okladka.jpg", JPEG.to_vec()),
    ]
}

pub fn sample_store() -> MemoryStore {
    sample_store_with(|_, text| text)
}

/// The sample package with text files passed through `edit(path, text)`.
pub fn sample_store_with(edit: impl Fn(&str, String) -> String) -> MemoryStore {
    sample_files()
        .into_iter()
        .fold(MemoryStore::new(), |store, (path, data)| match String::from_utf8(data) {
            Ok(text) => store.with(path, edit(path, text)),
            Err(e) => store.with(path, e.into_bytes()),
        })
}

pub fn load(store: &MemoryStore) -> PackageTree {
    let roots = find_roots(store).unwrap();
    PackageTree::load(store, roots).unwrap()
}

pub fn read(store: &dyn ResourceStore, path: &str) -> String {
    String::from_utf8(store.read(path).unwrap()).unwrap()
}

/// The sample with `Text/chapter1.xhtml` replaced by [`BROKEN_CHAPTER`].
pub fn store_with_broken_chapter() -> MemoryStore {
    sample_store_with(|path, text| {
        if path.ends_with("chapter1.xhtml") {
            BROKEN_CHAPTER.to_string()
        } else {
            text
        }
    })
}
