//! EPUB structure extraction: archive, container, package, navigation, chapters.

pub mod archive;
pub mod assemble;
pub mod container;
pub mod nav;
pub mod package;

pub use archive::{extract, extract_from_reader, work_dir_name};
pub use assemble::{ChapterFragment, assemble, load_chapter, locate_file, spine_paths};
pub use container::{CONTAINER_PATH, locate_package, parse_container_xml};
pub use nav::{DEFAULT_NAV_ID, NavDiscovery, TocEntry, locate_navigation, parse_ncx, read_navigation};
pub use package::{Manifest, ManifestEntry, Metadata, Package, SpineEntry, parse_opf, read_package};
