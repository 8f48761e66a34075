//! Navigation document (NCX) discovery and parsing.

use std::fs;
use std::io;
use std::path::Path;

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::Event;

use super::package::Package;
use crate::error::{Error, Result};
use crate::util::{decode_xml, local_name, resolve_entity, resolve_path};

/// Manifest id conventionally given to the NCX.
pub const DEFAULT_NAV_ID: &str = "ncx";

/// A table of contents entry, flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    /// Archive-relative path of the targeted file.
    pub target_file: String,
    /// Fragment identifier, empty when the entry targets the whole file.
    pub target_anchor: String,
}

impl TocEntry {
    pub fn new(
        title: impl Into<String>,
        target_file: impl Into<String>,
        target_anchor: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            target_file: target_file.into(),
            target_anchor: target_anchor.into(),
        }
    }

    /// Build an entry from a link target relative to `base` (the NCX path).
    ///
    /// `ch1.xhtml#sec2` targets anchor `sec2` in `ch1.xhtml`; a target without
    /// `#` targets the whole file and gets an empty anchor. A bare `#sec2`
    /// names no file, so its `target_file` is empty.
    pub fn from_link(title: impl Into<String>, base: &str, src: &str) -> Self {
        let (file, anchor) = src.split_once('#').unwrap_or((src, ""));
        let target_file = if file.is_empty() {
            String::new()
        } else {
            resolve_path(base, file)
        };
        Self::new(title, target_file, anchor)
    }
}

/// How the navigation document is found in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavDiscovery {
    /// The manifest item whose id equals the given sentinel.
    SentinelId(String),
    /// The manifest item named by the spine's `toc` attribute.
    SpineToc,
}

impl Default for NavDiscovery {
    fn default() -> Self {
        NavDiscovery::SentinelId(DEFAULT_NAV_ID.to_string())
    }
}

/// Archive-relative path of the navigation document.
pub fn locate_navigation(package: &Package, discovery: &NavDiscovery) -> Result<String> {
    let id = match discovery {
        NavDiscovery::SentinelId(id) => id.as_str(),
        NavDiscovery::SpineToc => package
            .toc_id
            .as_deref()
            .ok_or_else(|| Error::MalformedToc("spine has no toc attribute".into()))?,
    };

    let entry = package.manifest.get(id).ok_or_else(|| {
        Error::MalformedToc(format!("no manifest item with id '{id}' for the navigation document"))
    })?;
    Ok(package.resolve(&entry.href))
}

/// Locate, read and parse the navigation document.
pub fn read_navigation(
    root: &Path,
    package: &Package,
    discovery: &NavDiscovery,
) -> Result<Vec<TocEntry>> {
    let path = locate_navigation(package, discovery)?;
    debug!("navigation document: {path}");

    let bytes = fs::read(root.join(&path)).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            Error::MalformedToc(format!("navigation document {path} not found"))
        }
        _ => Error::Io(e),
    })?;
    parse_ncx(&decode_xml(&bytes), &path)
}

/// Parse an NCX navigation map into entries in document order.
///
/// Nested navPoints are flattened: a parent comes before its children.
/// `base` is the NCX's own archive path, used to resolve link targets.
pub fn parse_ncx(content: &str, base: &str) -> Result<Vec<TocEntry>> {
    let mut reader = Reader::from_str(content);

    struct Pending {
        title: Option<String>,
        src: Option<String>,
    }

    let mut pending: Vec<Pending> = Vec::new();
    // Indices into `pending` of the currently open navPoints
    let mut open: Vec<usize> = Vec::new();
    let mut seen_nav_map = false;
    let mut nav_map_depth = 0usize;
    let mut in_text = false;
    let mut buf_text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::MalformedToc(format!("cannot parse navigation document: {e}")))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navMap" => {
                        seen_nav_map = true;
                        if !is_empty {
                            nav_map_depth += 1;
                        }
                    }
                    b"navPoint" if nav_map_depth > 0 => {
                        pending.push(Pending {
                            title: None,
                            src: None,
                        });
                        if !is_empty {
                            open.push(pending.len() - 1);
                        }
                    }
                    b"text" if !is_empty && !open.is_empty() => {
                        in_text = true;
                        buf_text.clear();
                    }
                    b"content" => {
                        if let Some(&idx) = open.last()
                            && pending[idx].src.is_none()
                        {
                            pending[idx].src = e
                                .attributes()
                                .flatten()
                                .find(|attr| attr.key.as_ref() == b"src")
                                .map(|attr| match attr.unescape_value() {
                                    Ok(value) => value.into_owned(),
                                    Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
                                });
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if in_text {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if in_text {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Event::CData(e) => {
                if in_text {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"navMap" => nav_map_depth = nav_map_depth.saturating_sub(1),
                    b"navPoint" if nav_map_depth > 0 => {
                        open.pop();
                    }
                    b"text" if in_text => {
                        in_text = false;
                        if let Some(&idx) = open.last()
                            && pending[idx].title.is_none()
                        {
                            pending[idx].title = Some(buf_text.trim().to_string());
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_nav_map {
        return Err(Error::MalformedToc("navigation document has no navMap".into()));
    }

    let mut entries = Vec::with_capacity(pending.len());
    for point in pending {
        match point.src {
            Some(src) => {
                entries.push(TocEntry::from_link(point.title.unwrap_or_default(), base, &src));
            }
            None => warn!(
                "skipping navPoint '{}' without a content target",
                point.title.unwrap_or_default()
            ),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epub::package::parse_opf;

    const NCX: &str = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <docTitle><text>The Book</text></docTitle>
  <navMap>
    <navPoint id="np1" playOrder="1">
      <navLabel><text>Cover</text></navLabel>
      <content src="cover.xhtml"/>
    </navPoint>
    <navPoint id="np2" playOrder="2">
      <navLabel><text>Part I</text></navLabel>
      <content src="text/part1.xhtml#start"/>
      <navPoint id="np3" playOrder="3">
        <navLabel><text>Chapter 1 &amp; more</text></navLabel>
        <content src="text/ch1.xhtml"/>
      </navPoint>
    </navPoint>
  </navMap>
</ncx>"#;

    #[test]
    fn test_parse_ncx_flattens_in_document_order() {
        let toc = parse_ncx(NCX, "OEBPS/toc.ncx").unwrap();

        assert_eq!(
            toc,
            vec![
                TocEntry::new("Cover", "OEBPS/cover.xhtml", ""),
                TocEntry::new("Part I", "OEBPS/text/part1.xhtml", "start"),
                TocEntry::new("Chapter 1 & more", "OEBPS/text/ch1.xhtml", ""),
            ]
        );
    }

    #[test]
    fn test_doc_title_is_not_an_entry() {
        let toc = parse_ncx(NCX, "toc.ncx").unwrap();
        assert!(toc.iter().all(|e| e.title != "The Book"));
    }

    #[test]
    fn test_empty_nav_map() {
        let ncx = r#"<ncx><navMap></navMap></ncx>"#;
        assert!(parse_ncx(ncx, "toc.ncx").unwrap().is_empty());

        let ncx = r#"<ncx><navMap/></ncx>"#;
        assert!(parse_ncx(ncx, "toc.ncx").unwrap().is_empty());
    }

    #[test]
    fn test_missing_nav_map() {
        let ncx = r#"<ncx><docTitle><text>x</text></docTitle></ncx>"#;
        assert!(matches!(parse_ncx(ncx, "toc.ncx"), Err(Error::MalformedToc(_))));
    }

    #[test]
    fn test_nav_point_without_target_is_skipped() {
        let ncx = r#"<ncx><navMap>
            <navPoint><navLabel><text>Orphan</text></navLabel></navPoint>
            <navPoint><content src="a.xhtml"/></navPoint>
        </navMap></ncx>"#;

        let toc = parse_ncx(ncx, "toc.ncx").unwrap();
        assert_eq!(toc, vec![TocEntry::new("", "a.xhtml", "")]);
    }

    #[test]
    fn test_from_link_splits_on_first_hash() {
        let entry = TocEntry::from_link("T", "OEBPS/toc.ncx", "ch.xhtml#a#b");
        assert_eq!(entry.target_file, "OEBPS/ch.xhtml");
        assert_eq!(entry.target_anchor, "a#b");
    }

    #[test]
    fn test_from_link_bare_anchor_has_no_file() {
        let entry = TocEntry::from_link("T", "OEBPS/toc.ncx", "#notes");
        assert_eq!(entry.target_file, "");
        assert_eq!(entry.target_anchor, "notes");
        assert_eq!(crate::builder::menu_href(&entry), "#notes");
    }

    fn package() -> Package {
        let mut package = parse_opf(
            r#"<package><manifest>
                <item id="ncx" href="toc.ncx"/>
                <item id="toc" href="nav/other.ncx"/>
            </manifest><spine toc="toc"/></package>"#,
        )
        .unwrap();
        package.path = "OEBPS/content.opf".to_string();
        package
    }

    #[test]
    fn test_locate_by_sentinel_id() {
        let path = locate_navigation(&package(), &NavDiscovery::default()).unwrap();
        assert_eq!(path, "OEBPS/toc.ncx");
    }

    #[test]
    fn test_locate_by_spine_toc() {
        let path = locate_navigation(&package(), &NavDiscovery::SpineToc).unwrap();
        assert_eq!(path, "OEBPS/nav/other.ncx");
    }

    #[test]
    fn test_locate_missing_sentinel() {
        let discovery = NavDiscovery::SentinelId("navigation".to_string());
        assert!(matches!(
            locate_navigation(&package(), &discovery),
            Err(Error::MalformedToc(_))
        ));
    }
}
