//! `META-INF/container.xml`: where the package document lives.

use std::fs;
use std::io;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::util::{decode_xml, local_name};

/// Fixed location of the container descriptor inside the archive.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Read the container descriptor below `root` and return the package path.
pub fn locate_package(root: &Path) -> Result<String> {
    let bytes = fs::read(root.join(CONTAINER_PATH)).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            Error::MalformedArchive(format!("{CONTAINER_PATH} not found"))
        }
        _ => Error::Io(e),
    })?;
    parse_container_xml(&bytes)
}

/// Parse container.xml and return the `full-path` of the first rootfile.
pub fn parse_container_xml(bytes: &[u8]) -> Result<String> {
    let content = decode_xml(bytes);
    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e))
                if local_name(e.name().as_ref()) == b"rootfile" =>
            {
                let full_path = e
                    .attributes()
                    .flatten()
                    .find(|attr| attr.key.as_ref() == b"full-path")
                    .map(|attr| String::from_utf8_lossy(&attr.value).into_owned());

                return match full_path {
                    Some(path) if !path.is_empty() => Ok(path),
                    _ => Err(Error::MalformedArchive(
                        "rootfile in container.xml has no full-path".into(),
                    )),
                };
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::MalformedArchive(format!(
                    "cannot parse container.xml: {e}"
                )));
            }
            _ => {}
        }
    }

    Err(Error::MalformedArchive(
        "No rootfile found in container.xml".into(),
    ))
}
