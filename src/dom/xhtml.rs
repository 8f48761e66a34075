//! Well-formed XHTML parsing into an [`ArenaDom`].
//!
//! Chapters are XML, where `<title/>`, `<a id="p1"/>` and `<div/>` are empty
//! elements. The HTML tree builder reads those as start tags, so this parser
//! runs first and html5ever only sees documents that are not well-formed.

use std::fmt;

use html5ever::{LocalName, Prefix, QualName, ns};
use quick_xml::Reader;
use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};

use super::arena::{ArenaDom, ArenaNodeId, Attribute};
use crate::util::{html_entity, local_name, resolve_entity};

/// Why a document could not be read as XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XhtmlError(String);

impl fmt::Display for XhtmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for XhtmlError {}

fn err(msg: impl fmt::Display) -> XhtmlError {
    XhtmlError(msg.to_string())
}

/// Parse a well-formed XHTML document.
///
/// Element names lose their namespace prefix; attributes keep theirs
/// (`xml:lang`). Declarations, processing instructions and the doctype are
/// dropped. Named entities beyond the XML ones are resolved from the HTML
/// set; an unknown one is an error.
pub fn parse_xhtml(text: &str) -> Result<ArenaDom, XhtmlError> {
    let mut reader = Reader::from_str(text);
    let mut dom = ArenaDom::new();
    let document = dom.document();
    let mut open: Vec<ArenaNodeId> = vec![document];
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(err)?;
        let top = open.last().copied().unwrap_or(document);
        let in_root = open.len() > 1;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if !in_root {
                    if seen_root {
                        return Err(err("more than one root element"));
                    }
                    seen_root = true;
                }
                let element = create_element(&mut dom, e)?;
                dom.append(top, element);
                if matches!(event, Event::Start(_)) {
                    open.push(element);
                }
            }
            Event::End(_) => {
                if !in_root {
                    return Err(err("end tag without a matching start tag"));
                }
                open.pop();
            }
            Event::Text(e) => {
                let content = String::from_utf8_lossy(e.as_ref());
                if in_root {
                    dom.append_text(top, &content);
                } else if !content.trim().is_empty() {
                    return Err(err("text outside the root element"));
                }
            }
            Event::CData(e) => {
                if in_root {
                    dom.append_text(top, &String::from_utf8_lossy(&e));
                }
            }
            Event::GeneralRef(e) => {
                let name = String::from_utf8_lossy(e.as_ref());
                let resolved =
                    resolve_entity(&name).ok_or_else(|| err(format!("unknown entity &{name};")))?;
                if in_root {
                    dom.append_text(top, &resolved);
                }
            }
            Event::Comment(e) => {
                let comment = dom.create_comment(String::from_utf8_lossy(e.as_ref()).into_owned());
                dom.append(top, comment);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if open.len() > 1 {
        return Err(err("unclosed element at end of document"));
    }
    if !seen_root {
        return Err(err("no root element"));
    }
    Ok(dom)
}

fn create_element(dom: &mut ArenaDom, e: &BytesStart) -> Result<ArenaNodeId, XhtmlError> {
    let name = e.name();
    let local = std::str::from_utf8(local_name(name.as_ref())).map_err(err)?;

    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(err)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(err)?;
        let raw = std::str::from_utf8(&attr.value).map_err(err)?;
        let value = unescape_with(raw, html_entity).map_err(err)?;
        attrs.push(attribute(key, value.into_owned()));
    }

    let name = QualName::new(None, ns!(html), LocalName::from(local));
    Ok(dom.create_element(name, attrs))
}

fn attribute(key: &str, value: String) -> Attribute {
    let name = match key.split_once(':') {
        Some((prefix, local)) => {
            QualName::new(Some(Prefix::from(prefix)), ns!(), LocalName::from(local))
        }
        None => QualName::new(None, ns!(), LocalName::from(key)),
    };
    Attribute { name, value }
}

/// Whether markup that is not well-formed still has a `body` start tag.
///
/// Tags inside comments, CDATA sections and `script`/`style` content do not
/// count. Markup the lenient scan cannot read is left to the HTML parser.
pub fn has_body_element(markup: &str) -> bool {
    let mut reader = Reader::from_str(markup);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut raw_text: Option<Vec<u8>> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if raw_text.is_some() {
                    continue;
                }
                let name = e.name();
                let local = local_name(name.as_ref()).to_ascii_lowercase();
                if local == b"body" {
                    return true;
                }
                if local == b"script" || local == b"style" {
                    raw_text = Some(local);
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let local = local_name(name.as_ref()).to_ascii_lowercase();
                if raw_text.as_deref() == Some(local.as_slice()) {
                    raw_text = None;
                }
            }
            Ok(Event::Eof) => return false,
            Ok(_) => {}
            Err(_) => return true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::serialize_node;

    fn body_markup(dom: &ArenaDom) -> String {
        let body = dom.find_by_tag("body").unwrap();
        dom.children(body).map(|c| serialize_node(dom, c)).collect()
    }

    #[test]
    fn test_empty_elements_stay_empty() {
        let dom = parse_xhtml(
            r#"<html><body><p><a id="page1"/>One</p><p>Two</p><div class="sep"/><p>Three</p></body></html>"#,
        )
        .unwrap();

        assert_eq!(
            body_markup(&dom),
            "<p><a id=\"page1\"></a>One</p><p>Two</p><div class=\"sep\"></div><p>Three</p>"
        );
    }

    #[test]
    fn test_empty_title_and_script_in_head() {
        let dom = parse_xhtml(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml">
<head><title/><script type="text/javascript" src="x.js"/></head>
<body><p>Chapter text</p></body>
</html>"#,
        )
        .unwrap();

        let head = dom.find_by_tag("head").unwrap();
        let tags: Vec<_> = dom
            .children(head)
            .filter_map(|c| dom.element_name(c).map(|n| n.to_string()))
            .collect();
        assert_eq!(tags, vec!["title", "script"]);
        assert_eq!(body_markup(&dom), "<p>Chapter text</p>");
    }

    #[test]
    fn test_entities_and_cdata() {
        let dom = parse_xhtml(
            "<html><body><p title=\"a&amp;b&nbsp;c\">x&mdash;y &#8217;</p>\
             <script><![CDATA[if (a < b) {}]]></script></body></html>",
        )
        .unwrap();

        let p = dom.find_by_tag("p").unwrap();
        assert_eq!(dom.get_attr(p, "title"), Some("a&b\u{a0}c"));
        assert_eq!(dom.inner_text(p), "x\u{2014}y \u{2019}");
        let script = dom.find_by_tag("script").unwrap();
        assert_eq!(dom.inner_text(script), "if (a < b) {}");
    }

    #[test]
    fn test_prefixed_attributes_keep_prefix() {
        let dom = parse_xhtml(r#"<html><body><p xml:lang="fr">Oui</p></body></html>"#).unwrap();
        let p = dom.find_by_tag("p").unwrap();
        assert_eq!(serialize_node(&dom, p), "<p xml:lang=\"fr\">Oui</p>");
    }

    #[test]
    fn test_not_well_formed() {
        for markup in [
            "<html><body><p>one<br>two</p></body></html>",
            "<html><body><p>unclosed</body></html>",
            "<html><body>&bogus;</body></html>",
            "<html/><html/>",
            "just text",
        ] {
            assert!(parse_xhtml(markup).is_err(), "expected an error for {markup}");
        }
    }

    #[test]
    fn test_commented_body_has_no_body_element() {
        let dom =
            parse_xhtml("<html><head><title>t</title><!-- <body> --></head></html>").unwrap();
        assert!(dom.find_by_tag("body").is_none());
    }

    #[test]
    fn test_has_body_element_scan() {
        assert!(has_body_element("<html><BODY class=x><p>a<br>b</body></html>"));
        assert!(!has_body_element("<html><head><!-- <body> --></head><br></html>"));
        assert!(!has_body_element("<html><![CDATA[<body>]]><br></html>"));
        assert!(!has_body_element(
            "<html><head><script>var s = '<body>';</script></head><br></html>"
        ));
        assert!(!has_body_element("<bodyguard><br></bodyguard>"));
    }
}
