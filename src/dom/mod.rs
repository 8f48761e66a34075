//! Arena DOM, XHTML and HTML parsers, and the XHTML serializer.

mod arena;
mod serialize;
mod tree_sink;
mod xhtml;

pub use arena::{ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute};
pub use serialize::{escape_attr, escape_text, serialize_document, serialize_node};
pub use xhtml::{XhtmlError, has_body_element, parse_xhtml};

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

use tree_sink::ArenaSink;

/// Parse an HTML or XHTML document into an [`ArenaDom`].
///
/// Parsing never fails: html5ever repairs malformed markup the way a browser
/// would, synthesizing `html`, `head` and `body` when they are missing.
pub fn parse_html(html: &str) -> ArenaDom {
    let sink = ArenaSink::new();
    parse_document(sink, ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
        .into_dom()
}

/// Parse chapter markup: as XML when it is well-formed, otherwise as HTML.
pub fn parse_markup(text: &str) -> ArenaDom {
    parse_xhtml(text).unwrap_or_else(|_| parse_html(text))
}
