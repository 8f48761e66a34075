//! Building the single output document.
//!
//! The output has a fixed skeleton:
//!
//! ```text
//! html
//! ├── head   (donor head children, title, stylesheet, two scripts)
//! └── body
//!     ├── div.header   (dropdown menu)
//!     └── div.content  (per chapter: anchor, then the chapter's body nodes)
//! ```

mod menu;
pub mod resources;

pub use menu::{MENU_LABEL, build_menu, menu_href};
pub use resources::{
    HeadResources, LocatedResources, ResourceKind, ResourceLocator, ResourceOverrides,
    default_search_dirs,
};

use log::trace;

use crate::dom::{ArenaDom, ArenaNodeId};
use crate::epub::{ChapterFragment, TocEntry};

/// Which document's head is copied into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadSource {
    /// The file targeted by the TOC entry at this index.
    ///
    /// Falls back to the first TOC entry, then to the first spine chapter.
    NavEntry(usize),
    /// The first spine chapter.
    FirstChapter,
}

impl Default for HeadSource {
    fn default() -> Self {
        HeadSource::NavEntry(1)
    }
}

impl HeadSource {
    /// Archive path of the head donor, or `None` when the book has neither
    /// TOC entries nor chapters.
    pub fn donor_path(&self, toc: &[TocEntry], chapters: &[ChapterFragment]) -> Option<String> {
        let first_chapter = || chapters.first().map(|c| c.source_path().to_string());
        let file_of = |entry: &TocEntry| {
            Some(entry.target_file.clone()).filter(|file| !file.is_empty())
        };
        match self {
            HeadSource::NavEntry(index) => toc
                .get(*index)
                .and_then(file_of)
                .or_else(|| toc.first().and_then(file_of))
                .or_else(first_chapter),
            HeadSource::FirstChapter => first_chapter(),
        }
    }
}

/// Assembles the output document in a fresh arena.
///
/// Nodes from chapter documents are deep-copied in; the chapters themselves
/// are left untouched.
#[derive(Debug)]
pub struct DocumentBuilder {
    dom: ArenaDom,
    head: ArenaNodeId,
    body: ArenaNodeId,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentBuilder {
    /// An empty `html` document with `head` and `body`.
    pub fn new() -> Self {
        let mut dom = ArenaDom::new();
        let html = dom.create_html_element("html", &[]);
        let head = dom.create_html_element("head", &[]);
        let body = dom.create_html_element("body", &[]);
        dom.append(html, head);
        dom.append(html, body);
        let document = dom.document();
        dom.append(document, html);

        Self { dom, head, body }
    }

    /// Fill the head.
    ///
    /// Copies the donor head's children, adds a `title` when the donor has
    /// none and `title` is non-empty, then links the stylesheet and the two
    /// scripts in that order.
    pub fn head(
        &mut self,
        donor: Option<(&ArenaDom, ArenaNodeId)>,
        title: &str,
        resources: &HeadResources,
    ) -> &mut Self {
        let mut has_title = false;
        if let Some((src, donor_head)) = donor {
            for child in src.children(donor_head) {
                has_title |= src.element_name(child).is_some_and(|n| n.as_ref() == "title");
                let copy = self.dom.import_subtree(src, child);
                self.dom.append(self.head, copy);
            }
        }

        if !has_title && !title.is_empty() {
            let title_elem = self.dom.create_html_element("title", &[]);
            self.dom.append_text(title_elem, title);
            self.dom.append(self.head, title_elem);
        }

        let link = self.dom.create_html_element(
            "link",
            &[
                ("type", "text/css"),
                ("href", resources.stylesheet.as_str()),
                ("rel", "stylesheet"),
            ],
        );
        self.dom.append(self.head, link);

        for src in [&resources.primary_script, &resources.dropdown_script] {
            let script = self
                .dom
                .create_html_element("script", &[("type", "text/javascript"), ("src", src.as_str())]);
            self.dom.append(self.head, script);
        }
        self
    }

    /// Fill the body: the menu, then every chapter's content in order.
    ///
    /// Each chapter is preceded by `<a id="<source path>">` so whole-file menu
    /// links land on it. Chapters are consumed and dropped one by one.
    pub fn body(&mut self, toc: &[TocEntry], chapters: Vec<ChapterFragment>) -> &mut Self {
        let header = build_menu(&mut self.dom, toc);
        self.dom.append(self.body, header);

        let content = self.dom.create_html_element("div", &[("class", "content")]);
        self.dom.append(self.body, content);

        for chapter in chapters {
            let anchor = self
                .dom
                .create_html_element("a", &[("id", chapter.source_path())]);
            self.dom.append(content, anchor);

            let mut copied = 0usize;
            for node in chapter.body_nodes() {
                let copy = self.dom.import_subtree(chapter.dom(), node);
                self.dom.append(content, copy);
                copied += 1;
            }
            trace!("appended {copied} nodes from {}", chapter.source_path());
        }
        self
    }

    pub fn finish(self) -> ArenaDom {
        self.dom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_html, serialize_document};

    fn resources() -> HeadResources {
        HeadResources {
            stylesheet: "default.css".to_string(),
            primary_script: "jquery.js".to_string(),
            dropdown_script: "dropdown.js".to_string(),
        }
    }

    fn chapter(path: &str, body: &str) -> ChapterFragment {
        ChapterFragment::parse(
            path,
            format!("<html><head><title>{path}</title></head><body>{body}</body></html>").as_bytes(),
        )
        .unwrap()
    }

    fn head_tags(dom: &ArenaDom) -> Vec<String> {
        let head = dom.find_by_tag("head").unwrap();
        dom.children(head)
            .filter_map(|c| dom.element_name(c).map(|n| n.to_string()))
            .collect()
    }

    #[test]
    fn test_head_order_after_donor() {
        let donor = parse_html(
            "<html><head><meta charset=\"utf-8\"/><title>Ch</title>\
             <link rel=\"stylesheet\" href=\"book.css\"/></head><body></body></html>",
        );
        let donor_head = donor.find_by_tag("head").unwrap();

        let mut builder = DocumentBuilder::new();
        builder.head(Some((&donor, donor_head)), "Book", &resources());
        let dom = builder.finish();

        assert_eq!(
            head_tags(&dom),
            vec!["meta", "title", "link", "link", "script", "script"]
        );
        let titles = dom.elements_by_tag(dom.document(), "title");
        assert_eq!(titles.len(), 1);
        assert_eq!(dom.inner_text(titles[0]), "Ch");

        let scripts = dom.elements_by_tag(dom.document(), "script");
        assert_eq!(dom.get_attr(scripts[0], "src"), Some("jquery.js"));
        assert_eq!(dom.get_attr(scripts[1], "src"), Some("dropdown.js"));
    }

    #[test]
    fn test_head_without_donor_gets_book_title() {
        let mut builder = DocumentBuilder::new();
        builder.head(None, "Tom & Jerry", &resources());
        let html = serialize_document(&builder.finish());

        assert!(html.contains("<head><title>Tom &amp; Jerry</title>"));
        assert!(html.contains(
            "<link type=\"text/css\" href=\"default.css\" rel=\"stylesheet\"/>\
             <script type=\"text/javascript\" src=\"jquery.js\"></script>\
             <script type=\"text/javascript\" src=\"dropdown.js\"></script></head>"
        ));
    }

    #[test]
    fn test_donor_is_not_modified() {
        let donor = parse_html("<html><head><title>Ch</title></head><body></body></html>");
        let donor_head = donor.find_by_tag("head").unwrap();
        let before = donor.len();

        let mut builder = DocumentBuilder::new();
        builder.head(Some((&donor, donor_head)), "", &resources());

        assert_eq!(donor.len(), before);
        assert_eq!(donor.children(donor_head).count(), 1);
    }

    #[test]
    fn test_body_anchors_precede_chapters() {
        let chapters = vec![
            chapter("OEBPS/a.xhtml", "<h1>A</h1><p>one</p>"),
            chapter("OEBPS/b.xhtml", "<p>two</p>"),
        ];
        let toc = vec![TocEntry::new("A", "OEBPS/a.xhtml", "")];

        let mut builder = DocumentBuilder::new();
        builder.body(&toc, chapters);
        let dom = builder.finish();

        let content = dom
            .elements_by_tag(dom.document(), "div")
            .into_iter()
            .find(|&d| dom.get_attr(d, "class") == Some("content"))
            .unwrap();
        let summary: Vec<String> = dom
            .children(content)
            .map(|c| match dom.element_id(c) {
                Some(id) => format!("#{id}"),
                None => dom.element_name(c).map(|n| n.to_string()).unwrap_or_default(),
            })
            .collect();
        assert_eq!(summary, vec!["#OEBPS/a.xhtml", "h1", "p", "#OEBPS/b.xhtml", "p"]);
    }

    #[test]
    fn test_body_skeleton() {
        let mut builder = DocumentBuilder::new();
        builder.head(None, "", &resources()).body(&[], Vec::new());
        let dom = builder.finish();

        let body = dom.find_by_tag("body").unwrap();
        let classes: Vec<_> = dom
            .children(body)
            .filter_map(|c| dom.get_attr(c, "class"))
            .collect();
        assert_eq!(classes, vec!["header", "content"]);
        assert!(dom.elements_by_tag(dom.document(), "title").is_empty());
    }

    #[test]
    fn test_donor_nav_entry_fallbacks() {
        let toc = vec![
            TocEntry::new("Cover", "cover.xhtml", ""),
            TocEntry::new("One", "one.xhtml", "top"),
        ];
        let chapters = vec![chapter("first.xhtml", "")];

        assert_eq!(
            HeadSource::default().donor_path(&toc, &chapters).as_deref(),
            Some("one.xhtml")
        );
        assert_eq!(
            HeadSource::default().donor_path(&toc[..1], &chapters).as_deref(),
            Some("cover.xhtml")
        );
        assert_eq!(
            HeadSource::default().donor_path(&[], &chapters).as_deref(),
            Some("first.xhtml")
        );
        assert_eq!(
            HeadSource::FirstChapter.donor_path(&toc, &chapters).as_deref(),
            Some("first.xhtml")
        );
        assert_eq!(HeadSource::NavEntry(0).donor_path(&[], &[]), None);
    }

    #[test]
    fn test_donor_skips_entries_without_file() {
        let toc = vec![
            TocEntry::new("Cover", "cover.xhtml", ""),
            TocEntry::new("Notes", "", "notes"),
        ];
        let chapters = vec![chapter("first.xhtml", "")];

        assert_eq!(
            HeadSource::default().donor_path(&toc, &chapters).as_deref(),
            Some("cover.xhtml")
        );
        assert_eq!(
            HeadSource::NavEntry(0).donor_path(&toc[1..], &chapters).as_deref(),
            Some("first.xhtml")
        );
    }
}
