//! # epub2html
//!
//! Flatten an EPUB into a single HTML file that opens in any browser, with a
//! dropdown table-of-contents menu at the top of the page.
//!
//! The archive is extracted into a working directory named after the SHA-1
//! of its content. The chapters listed in the spine are merged, in reading
//! order, into `book.html` next to the first chapter, so relative links to
//! images and stylesheets inside the book keep working.
//!
//! ## Quick Start
//!
//! ```no_run
//! use epub2html::{ConvertOptions, convert};
//! use std::path::Path;
//!
//! let conversion = convert(Path::new("book.epub"), &ConvertOptions::default()).unwrap();
//! println!("open {}", conversion.output.display());
//! ```
//!
//! ## Pipeline
//!
//! 1. [`epub::extract`] unpacks the archive.
//! 2. [`epub::locate_package`] reads `META-INF/container.xml`.
//! 3. [`epub::read_package`] parses the manifest and spine.
//! 4. [`epub::read_navigation`] flattens the NCX navigation map.
//! 5. [`epub::assemble`] parses every spine chapter.
//! 6. [`builder::DocumentBuilder`] builds the output tree, which
//!    [`dom::serialize_document`] writes out.

pub mod builder;
mod convert;
pub mod dom;
pub mod epub;
mod error;
pub(crate) mod util;

pub use builder::{HeadSource, ResourceKind, ResourceOverrides};
pub use convert::{
    BookInfo, Conversion, ConvertOptions, DEFAULT_OUTPUT_NAME, convert, convert_extracted,
    inspect, inspect_extracted, launch_viewer,
};
pub use epub::{Metadata, NavDiscovery, TocEntry};
pub use error::{Error, Result};
pub use util::resolve_path;
