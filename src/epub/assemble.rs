//! Loading spine chapters in reading order.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use percent_encoding::percent_decode_str;

use super::package::Package;
use crate::dom::{ArenaDom, ArenaNodeId, has_body_element, parse_html, parse_xhtml};
use crate::error::{Error, Result};
use crate::util::{decode_text, extract_xml_encoding};

/// The parsed document of one spine chapter.
///
/// The fragment owns its whole parse tree. Its body nodes are the immediate
/// children of the chapter's `body` element.
#[derive(Debug)]
pub struct ChapterFragment {
    source_path: String,
    dom: ArenaDom,
    head: Option<ArenaNodeId>,
    body: ArenaNodeId,
}

impl ChapterFragment {
    /// Parse chapter bytes. `source_path` is the chapter's archive-relative path.
    ///
    /// Well-formed chapters are read as XML; anything else goes through
    /// html5ever. Fails with [`Error::MalformedChapter`] when the source has
    /// no body element, since html5ever would invent an empty one.
    pub fn parse(source_path: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let source_path = source_path.into();
        let text = decode_text(bytes, extract_xml_encoding(bytes));

        let dom = match parse_xhtml(&text) {
            Ok(dom) => dom,
            Err(e) => {
                debug!("{source_path} is not well-formed XML ({e}), parsing as HTML");
                if !has_body_element(&text) {
                    return Err(Error::MalformedChapter { path: source_path });
                }
                parse_html(&text)
            }
        };

        let body = dom
            .find_by_tag("body")
            .ok_or_else(|| Error::MalformedChapter {
                path: source_path.clone(),
            })?;
        let head = dom.find_by_tag("head");

        Ok(Self {
            source_path,
            dom,
            head,
            body,
        })
    }

    /// Archive-relative path of the chapter file.
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn dom(&self) -> &ArenaDom {
        &self.dom
    }

    /// The chapter's head element, if it has one.
    pub fn head(&self) -> Option<ArenaNodeId> {
        self.head
    }

    /// Body children in document order.
    pub fn body_nodes(&self) -> impl Iterator<Item = ArenaNodeId> + '_ {
        self.dom.children(self.body)
    }
}

/// Filesystem location of an archive-relative path.
///
/// Falls back to the percent-decoded path when the literal one does not exist
/// (hrefs are URLs and may be escaped).
pub fn locate_file(root: &Path, archive_path: &str) -> PathBuf {
    let literal = root.join(archive_path);
    if literal.exists() {
        return literal;
    }
    match percent_decode_str(archive_path).decode_utf8() {
        Ok(decoded) if decoded != archive_path => {
            let decoded = root.join(decoded.as_ref());
            if decoded.exists() { decoded } else { literal }
        }
        _ => literal,
    }
}

/// Load and parse one chapter file.
pub fn load_chapter(root: &Path, archive_path: &str) -> Result<ChapterFragment> {
    let bytes = fs::read(locate_file(root, archive_path))?;
    ChapterFragment::parse(archive_path, &bytes)
}

/// Load every spine chapter in reading order.
///
/// Fails with [`Error::MissingResource`] on the first idref that the manifest
/// does not declare; no chapter is read before the whole spine resolves.
pub fn assemble(root: &Path, package: &Package) -> Result<Vec<ChapterFragment>> {
    let paths = spine_paths(package)?;

    let mut chapters = Vec::with_capacity(paths.len());
    for path in paths {
        let chapter = load_chapter(root, &path)?;
        debug!(
            "loaded chapter {path} ({} body nodes)",
            chapter.body_nodes().count()
        );
        chapters.push(chapter);
    }
    Ok(chapters)
}

/// Archive-relative paths of the spine chapters, in reading order.
///
/// Spine items whose media type is not (X)HTML are still included, with a
/// warning.
pub fn spine_paths(package: &Package) -> Result<Vec<String>> {
    package
        .spine
        .iter()
        .map(|item| {
            let entry = package
                .manifest
                .get(&item.idref)
                .ok_or_else(|| Error::MissingResource {
                    idref: item.idref.clone(),
                })?;
            if !entry.is_document() {
                warn!(
                    "spine item '{}' has media type {}, converting it as a chapter",
                    entry.id, entry.media_type
                );
            }
            Ok(package.resolve(&entry.href))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::dom::serialize_node;
    use crate::epub::package::parse_opf;

    fn chapter(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml"><head><title>t</title></head>
<body>{body}</body></html>"#
        )
    }

    #[test]
    fn test_body_nodes_exclude_body_element() {
        let fragment =
            ChapterFragment::parse("ch1.xhtml", chapter("<h1>One</h1><p>Text</p>").as_bytes())
                .unwrap();

        let dom = fragment.dom();
        let tags: Vec<_> = fragment
            .body_nodes()
            .filter_map(|n| dom.element_name(n).map(|n| n.to_string()))
            .collect();
        assert_eq!(tags, vec!["h1", "p"]);
        assert!(fragment.head().is_some());
    }

    #[test]
    fn test_text_nodes_are_kept() {
        let fragment = ChapterFragment::parse("c.xhtml", b"<body>loose <em>text</em></body>").unwrap();
        let nodes: Vec<_> = fragment.body_nodes().collect();
        assert_eq!(nodes.len(), 2);
        assert_eq!(fragment.dom().text_content(nodes[0]), Some("loose "));
    }

    #[test]
    fn test_missing_body_is_malformed() {
        let result = ChapterFragment::parse(
            "OEBPS/cover.xhtml",
            b"<html><head><title>x</title></head></html>",
        );
        match result {
            Err(Error::MalformedChapter { path }) => assert_eq!(path, "OEBPS/cover.xhtml"),
            other => panic!("expected MalformedChapter, got {other:?}"),
        }
    }

    #[test]
    fn test_commented_out_body_is_malformed() {
        for markup in [
            "<html><head><title>t</title><!-- <body> --></head></html>",
            "<html><head><title>t</title><!-- <body> --><br></head></html>",
            "<html><head><script>document.write('<body>')</script><br></head></html>",
        ] {
            match ChapterFragment::parse("c.xhtml", markup.as_bytes()) {
                Err(Error::MalformedChapter { .. }) => {}
                other => panic!("expected MalformedChapter for {markup}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_self_closing_head_elements_keep_chapter() {
        for head in [
            "<title/>",
            r#"<script type="text/javascript" src="x.js"/>"#,
        ] {
            let source = format!(
                "<html xmlns=\"http://www.w3.org/1999/xhtml\"><head>{head}</head>\
                 <body><p>Chapter text</p></body></html>"
            );
            let fragment = ChapterFragment::parse("c.xhtml", source.as_bytes()).unwrap();
            let dom = fragment.dom();
            let nodes: Vec<_> = fragment.body_nodes().collect();
            assert_eq!(nodes.len(), 1, "body lost after {head}");
            assert_eq!(dom.inner_text(nodes[0]), "Chapter text");
        }
    }

    #[test]
    fn test_empty_anchor_and_div_are_not_restructured() {
        let fragment = ChapterFragment::parse(
            "c.xhtml",
            chapter(r#"<p><a id="page1"/>One</p><p>Two</p><div class="sep"/><p>Three</p>"#)
                .as_bytes(),
        )
        .unwrap();

        let dom = fragment.dom();
        let html: String = fragment
            .body_nodes()
            .map(|n| serialize_node(dom, n))
            .collect();
        assert_eq!(
            html,
            r#"<p><a id="page1"></a>One</p><p>Two</p><div class="sep"></div><p>Three</p>"#
        );
        assert_eq!(html.matches("page1").count(), 1);
    }

    #[test]
    fn test_html_fallback_for_loose_markup() {
        let fragment = ChapterFragment::parse(
            "c.html",
            b"<html><body><p>one<br>two<p>three</body></html>",
        )
        .unwrap();
        let dom = fragment.dom();
        let tags: Vec<_> = fragment
            .body_nodes()
            .filter_map(|n| dom.element_name(n).map(|n| n.to_string()))
            .collect();
        assert_eq!(tags, vec!["p", "p"]);
    }

    #[test]
    fn test_windows_1252_chapter() {
        let mut bytes = b"<html><body><p>".to_vec();
        bytes.push(0x93);
        bytes.extend_from_slice(b"quoted");
        bytes.push(0x94);
        bytes.extend_from_slice(b"</p></body></html>");

        let fragment = ChapterFragment::parse("c.xhtml", &bytes).unwrap();
        let p = fragment.body_nodes().next().unwrap();
        assert_eq!(fragment.dom().inner_text(p), "\u{201C}quoted\u{201D}");
    }

    fn package(spine: &[&str]) -> Package {
        let refs: String = spine
            .iter()
            .map(|id| format!(r#"<itemref idref="{id}"/>"#))
            .collect();
        let mut package = parse_opf(&format!(
            r#"<package><manifest>
                <item id="c1" href="text/one.xhtml"/>
                <item id="c2" href="text/two%20b.xhtml"/>
            </manifest><spine>{refs}</spine></package>"#
        ))
        .unwrap();
        package.path = "OEBPS/content.opf".to_string();
        package
    }

    #[test]
    fn test_assemble_in_spine_order() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("OEBPS/text");
        fs::create_dir_all(&text).unwrap();
        fs::write(text.join("one.xhtml"), chapter("<p>1</p>")).unwrap();
        fs::write(text.join("two b.xhtml"), chapter("<p>2</p>")).unwrap();

        let chapters = assemble(dir.path(), &package(&["c2", "c1"])).unwrap();

        let paths: Vec<_> = chapters.iter().map(|c| c.source_path()).collect();
        assert_eq!(paths, vec!["OEBPS/text/two%20b.xhtml", "OEBPS/text/one.xhtml"]);
    }

    #[test]
    fn test_unknown_idref_is_missing_resource() {
        let dir = TempDir::new().unwrap();
        match assemble(dir.path(), &package(&["c1", "ghost"])) {
            Err(Error::MissingResource { idref }) => assert_eq!(idref, "ghost"),
            other => panic!("expected MissingResource, got {other:?}"),
        }
    }
}
