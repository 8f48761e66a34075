//! The OPF package document: manifest, spine and basic metadata.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::util::{decode_xml, local_name, parent_dir, resolve_entity, resolve_path};

/// One resource declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    /// Path relative to the package document, as written in the OPF.
    pub href: String,
    pub media_type: String,
}

impl ManifestEntry {
    /// Whether the entry declares an XHTML or HTML document. An entry
    /// without a media type counts as one.
    pub fn is_document(&self) -> bool {
        matches!(
            self.media_type.as_str(),
            "" | "application/xhtml+xml" | "text/html"
        )
    }
}

/// Manifest id -> resource mapping.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: HashMap<String, ManifestEntry>,
}

impl Manifest {
    /// Insert an entry. A duplicate id replaces the earlier entry.
    pub fn insert(&mut self, entry: ManifestEntry) -> Option<ManifestEntry> {
        self.entries.insert(entry.id.clone(), entry)
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An item in the reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineEntry {
    pub idref: String,
    /// `false` for `linear="no"`; such items are still converted.
    pub linear: bool,
}

/// Dublin Core metadata used for the output title and `--info`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: String,
    pub authors: Vec<String>,
    pub language: String,
}

/// A parsed package document.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Archive-relative path of the OPF file.
    pub path: String,
    pub metadata: Metadata,
    pub manifest: Manifest,
    pub spine: Vec<SpineEntry>,
    /// Manifest id named by the spine's `toc` attribute (EPUB 2 NCX pointer).
    pub toc_id: Option<String>,
}

impl Package {
    /// Archive-relative directory containing the package document.
    pub fn dir(&self) -> &str {
        parent_dir(&self.path)
    }

    /// Resolve an href relative to the package document to an archive path.
    pub fn resolve(&self, href: &str) -> String {
        resolve_path(&self.path, href)
    }
}

/// Read and parse the package document at `path` (archive-relative) below `root`.
pub fn read_package(root: &Path, path: &str) -> Result<Package> {
    let bytes = fs::read(root.join(path)).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            Error::MalformedArchive(format!("package document {path} not found"))
        }
        _ => Error::Io(e),
    })?;
    let mut package = parse_opf(&decode_xml(&bytes))?;
    package.path = path.to_string();
    if package.manifest.is_empty() {
        warn!("package document {path} declares no resources");
    }
    Ok(package)
}

/// Parse OPF package document content.
///
/// The returned package has an empty `path`; [`read_package`] fills it in.
pub fn parse_opf(content: &str) -> Result<Package> {
    let mut reader = Reader::from_str(content);

    let mut package = Package::default();
    let mut seen_package = false;
    let mut seen_manifest = false;
    let mut seen_spine = false;

    let mut in_metadata = false;
    let mut in_manifest = false;
    let mut in_spine = false;
    let mut current_element: Option<&'static str> = None;
    let mut buf_text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| Error::MalformedPackage(format!("cannot parse package document: {e}")))?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"package" => seen_package = true,
                    b"metadata" => in_metadata = !is_empty,
                    b"manifest" => {
                        seen_manifest = true;
                        in_manifest = !is_empty;
                    }
                    b"spine" => {
                        seen_spine = true;
                        in_spine = !is_empty;
                        package.toc_id = attr_value(e, b"toc");
                    }
                    b"item" if in_manifest => {
                        if let Some(entry) = manifest_entry(e) {
                            let id = entry.id.clone();
                            if package.manifest.insert(entry).is_some() {
                                warn!("duplicate manifest id '{id}', keeping the last one");
                            }
                        }
                    }
                    b"itemref" if in_spine => {
                        if let Some(idref) = attr_value(e, b"idref") {
                            let linear = attr_value(e, b"linear").as_deref() != Some("no");
                            package.spine.push(SpineEntry { idref, linear });
                        }
                    }
                    local if in_metadata && !is_empty => {
                        current_element = match local {
                            b"title" => Some("title"),
                            b"creator" => Some("creator"),
                            b"language" => Some("language"),
                            _ => None,
                        };
                        buf_text.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if current_element.is_some() {
                    buf_text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if current_element.is_some() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    if let Some(resolved) = resolve_entity(&entity) {
                        buf_text.push_str(&resolved);
                    }
                }
            }
            Event::End(e) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"metadata" => in_metadata = false,
                    b"manifest" => in_manifest = false,
                    b"spine" => in_spine = false,
                    _ => {}
                }

                if let Some(elem) = current_element.take() {
                    let text = buf_text.trim().to_string();
                    let metadata = &mut package.metadata;
                    match elem {
                        "title" if metadata.title.is_empty() => metadata.title = text,
                        "creator" => metadata.authors.push(text),
                        "language" if metadata.language.is_empty() => metadata.language = text,
                        _ => {}
                    }
                    buf_text.clear();
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_package {
        return Err(Error::MalformedPackage("no <package> element".into()));
    }
    if !seen_manifest {
        return Err(Error::MalformedPackage("no <manifest> element".into()));
    }
    if !seen_spine {
        return Err(Error::MalformedPackage("no <spine> element".into()));
    }

    Ok(package)
}

fn manifest_entry(e: &BytesStart) -> Option<ManifestEntry> {
    let id = attr_value(e, b"id").filter(|id| !id.is_empty())?;
    Some(ManifestEntry {
        id,
        href: attr_value(e, b"href").unwrap_or_default(),
        media_type: attr_value(e, b"media-type").unwrap_or_default(),
    })
}

/// Unescaped value of the first attribute with the given name.
fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}
