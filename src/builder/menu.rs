//! The dropdown table-of-contents menu.

use crate::dom::{ArenaDom, ArenaNodeId};
use crate::epub::TocEntry;

/// Label of the menu's top-level item.
pub const MENU_LABEL: &str = "Contents";

/// In-page href for a TOC entry.
///
/// Entries with an anchor link to that anchor. Entries that target a whole
/// file link to the file path used as a fragment, which matches the anchor
/// inserted before that chapter's content.
pub fn menu_href(entry: &TocEntry) -> String {
    if entry.target_anchor.is_empty() {
        format!("#{}", entry.target_file)
    } else {
        format!("#{}", entry.target_anchor)
    }
}

/// Build the header block holding the menu. The result is detached.
///
/// ```text
/// div.header > div.header-cont > ul.dropdown > li
///     > a[href="#"] "Contents"
///     > ul.sub_menu > li > a[href] "title"   (one per entry)
/// ```
pub fn build_menu(dom: &mut ArenaDom, toc: &[TocEntry]) -> ArenaNodeId {
    let header = dom.create_html_element("div", &[("class", "header")]);
    let header_cont = dom.create_html_element("div", &[("class", "header-cont")]);
    let dropdown = dom.create_html_element("ul", &[("class", "dropdown")]);
    let top = dom.create_html_element("li", &[]);
    let label = dom.create_html_element("a", &[("href", "#")]);
    dom.append_text(label, MENU_LABEL);
    let sub_menu = dom.create_html_element("ul", &[("class", "sub_menu")]);

    for entry in toc {
        let href = menu_href(entry);
        let item = dom.create_html_element("li", &[]);
        let link = dom.create_html_element("a", &[("href", href.as_str())]);
        dom.append_text(link, &entry.title);
        dom.append(item, link);
        dom.append(sub_menu, item);
    }

    dom.append(top, label);
    dom.append(top, sub_menu);
    dom.append(dropdown, top);
    dom.append(header_cont, dropdown);
    dom.append(header, header_cont);
    header
}
