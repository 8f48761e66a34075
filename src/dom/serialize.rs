//! XHTML serialization of an [`ArenaDom`].
//!
//! Output is polyglot markup: void elements self-close, every other element
//! gets an explicit end tag, so the file opens both as HTML and as XML.

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Elements followed by a newline to keep the generated skeleton readable.
const LINE_BREAK_AFTER: &[&str] = &["html", "head", "body"];

/// Serialize a whole document, prefixed with an HTML5 doctype.
pub fn serialize_document(dom: &ArenaDom) -> String {
    let mut out = String::from("<!DOCTYPE html>\n");
    for child in dom.children(dom.document()) {
        // The doctype is always written above
        if matches!(dom.get(child).map(|n| &n.data), Some(ArenaNodeData::Doctype { .. })) {
            continue;
        }
        write_node(dom, child, false, &mut out);
    }
    out
}

/// Serialize a single node and its subtree.
pub fn serialize_node(dom: &ArenaDom, id: ArenaNodeId) -> String {
    let mut out = String::new();
    write_node(dom, id, false, &mut out);
    out
}

fn write_node(dom: &ArenaDom, id: ArenaNodeId, raw_text: bool, out: &mut String) {
    let Some(node) = dom.get(id) else {
        return;
    };

    match &node.data {
        ArenaNodeData::Document => {
            for child in dom.children(id) {
                write_node(dom, child, false, out);
            }
        }
        ArenaNodeData::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        ArenaNodeData::Comment(text) => {
            // "--" is not allowed inside an XML comment
            out.push_str("<!--");
            out.push_str(&text.replace("--", "- -"));
            out.push_str("-->");
        }
        ArenaNodeData::Doctype { name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        ArenaNodeData::Element { name, attrs } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            for attr in attrs {
                out.push(' ');
                if let Some(prefix) = &attr.name.prefix {
                    out.push_str(prefix.as_ref());
                    out.push(':');
                }
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                out.push_str(&escape_attr(&attr.value));
                out.push('"');
            }

            if VOID_ELEMENTS.contains(&tag) {
                out.push_str("/>");
            } else {
                out.push('>');
                let raw = RAW_TEXT_ELEMENTS.contains(&tag);
                for child in dom.children(id) {
                    write_node(dom, child, raw, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }

            if LINE_BREAK_AFTER.contains(&tag) {
                out.push('\n');
            }
        }
    }
}

/// Escape text content.
pub fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '\u{a0}' => result.push_str("&#160;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape an attribute value for a double-quoted attribute.
pub fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;

    #[test]
    fn test_void_elements_self_close() {
        let mut dom = ArenaDom::new();
        let p = dom.create_html_element("p", &[]);
        let br = dom.create_html_element("br", &[]);
        dom.append(dom.document(), p);
        dom.append(p, br);

        assert_eq!(serialize_node(&dom, p), "<p><br/></p>");
    }

    #[test]
    fn test_empty_element_gets_end_tag() {
        let mut dom = ArenaDom::new();
        let a = dom.create_html_element("a", &[("id", "OEBPS/ch1.xhtml")]);
        assert_eq!(serialize_node(&dom, a), r#"<a id="OEBPS/ch1.xhtml"></a>"#);
    }

    #[test]
    fn test_escaping() {
        let mut dom = ArenaDom::new();
        let a = dom.create_html_element("a", &[("title", "\"Q\" & <A>")]);
        dom.append_text(a, "1 < 2 & 3 > 2");
        assert_eq!(
            serialize_node(&dom, a),
            r#"<a title="&quot;Q&quot; &amp; &lt;A&gt;">1 &lt; 2 &amp; 3 &gt; 2</a>"#
        );
    }

    #[test]
    fn test_script_text_is_raw() {
        let dom = parse_html("<head><script>if (a < b && c) {}</script></head>");
        let script = dom.find_by_tag("script").unwrap();
        assert_eq!(
            serialize_node(&dom, script),
            "<script>if (a < b && c) {}</script>"
        );
    }

    #[test]
    fn test_document_has_doctype_and_structure() {
        let dom = parse_html("<!DOCTYPE html><html><head></head><body><p>x</p></body></html>");
        let html = serialize_document(&dom);
        assert!(html.starts_with("<!DOCTYPE html>\n<html>"));
        assert_eq!(html.matches("<!DOCTYPE").count(), 1);
        assert!(html.contains("<body><p>x</p></body>\n"));
    }

    #[test]
    fn test_comment_double_dash() {
        let mut dom = ArenaDom::new();
        let c = dom.create_comment("a--b".to_string());
        assert_eq!(serialize_node(&dom, c), "<!--a- -b-->");
    }
}
