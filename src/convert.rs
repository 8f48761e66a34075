//! The end-to-end pipeline: archive in, single HTML file out.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};

use crate::builder::{
    DocumentBuilder, HeadSource, ResourceLocator, ResourceOverrides, default_search_dirs,
};
use crate::dom::{ArenaDom, parse_markup, serialize_document};
use crate::epub::{
    self, Metadata, NavDiscovery, Package, TocEntry, assemble, locate_file,
    locate_navigation, locate_package, read_navigation, read_package, spine_paths,
};
use crate::error::Result;
use crate::util::{decode_text, extract_xml_encoding};

/// File name of the generated document.
pub const DEFAULT_OUTPUT_NAME: &str = "book.html";

/// Knobs for [`convert`] and [`inspect`].
///
/// ```
/// use epub2html::{ConvertOptions, HeadSource};
///
/// let options = ConvertOptions::default()
///     .with_work_parent("/tmp")
///     .with_head_source(HeadSource::FirstChapter)
///     .with_keep_chapters(true);
/// assert_eq!(options.output_name, "book.html");
/// ```
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub overrides: ResourceOverrides,
    /// Directories searched for resources without an override.
    pub search_dirs: Vec<PathBuf>,
    pub nav_discovery: NavDiscovery,
    pub head_source: HeadSource,
    /// Directory the working directory is created in.
    pub work_parent: PathBuf,
    pub output_name: String,
    /// Leave the extracted chapter files in place after writing the output.
    pub keep_chapters: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            overrides: ResourceOverrides::default(),
            search_dirs: default_search_dirs(),
            nav_discovery: NavDiscovery::default(),
            head_source: HeadSource::default(),
            work_parent: PathBuf::from("."),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            keep_chapters: false,
        }
    }
}

impl ConvertOptions {
    pub fn with_overrides(mut self, overrides: ResourceOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    pub fn with_nav_discovery(mut self, discovery: NavDiscovery) -> Self {
        self.nav_discovery = discovery;
        self
    }

    pub fn with_head_source(mut self, source: HeadSource) -> Self {
        self.head_source = source;
        self
    }

    pub fn with_work_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_parent = dir.into();
        self
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    pub fn with_keep_chapters(mut self, keep: bool) -> Self {
        self.keep_chapters = keep;
        self
    }
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// Directory the archive was extracted into.
    pub work_dir: PathBuf,
    /// The generated HTML file.
    pub output: PathBuf,
    pub chapters: usize,
    pub toc_entries: usize,
    /// Chapter files deleted after the output was written.
    pub removed: usize,
}

/// Structure of a book, without converting it.
#[derive(Debug, Clone)]
pub struct BookInfo {
    pub work_dir: PathBuf,
    pub package_path: String,
    pub navigation_path: String,
    pub metadata: Metadata,
    /// Number of manifest entries.
    pub resources: usize,
    /// Archive paths of the spine chapters in reading order.
    pub chapters: Vec<String>,
    pub toc: Vec<TocEntry>,
}

/// Extract `epub` and flatten it into one HTML file inside the working directory.
pub fn convert(epub: &Path, options: &ConvertOptions) -> Result<Conversion> {
    let root = epub::extract(epub, &options.work_parent)?;
    convert_extracted(&root, options)
}

/// Flatten an already extracted book rooted at `root`.
///
/// Nothing is written until the whole book has parsed and every resource
/// has been located.
pub fn convert_extracted(root: &Path, options: &ConvertOptions) -> Result<Conversion> {
    let (package, toc) = load_structure(root, options)?;
    let chapters = assemble(root, &package)?;
    debug!(
        "{} chapters, {} TOC entries in {}",
        chapters.len(),
        toc.len(),
        package.path
    );

    let out_dir = match chapters.first() {
        Some(first) => locate_file(root, first.source_path())
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf()),
        None => root.join(package.dir()),
    };
    let output = out_dir.join(&options.output_name);

    let located =
        ResourceLocator::new(&options.overrides, &options.search_dirs).locate_all()?;
    let resources = located.install(&out_dir)?;

    let chapter_files: Vec<PathBuf> = chapters
        .iter()
        .map(|c| locate_file(root, c.source_path()))
        .collect();
    let chapter_count = chapters.len();

    let mut builder = DocumentBuilder::new();
    {
        let donor_path = options.head_source.donor_path(&toc, &chapters);
        let loaded: Option<ArenaDom>;
        let donor = match donor_path {
            Some(path) => match chapters.iter().find(|c| c.source_path() == path) {
                Some(chapter) => chapter.head().map(|head| (chapter.dom(), head)),
                None => {
                    loaded = load_head_donor(root, &path);
                    loaded
                        .as_ref()
                        .and_then(|dom| dom.find_by_tag("head").map(|head| (dom, head)))
                }
            },
            None => None,
        };
        builder.head(donor, &package.metadata.title, &resources);
    }
    builder.body(&toc, chapters);

    let html = serialize_document(&builder.finish());
    fs::write(&output, html)?;
    info!("wrote {}", output.display());

    let removed = if options.keep_chapters {
        0
    } else {
        remove_chapters(&chapter_files, &output)
    };

    Ok(Conversion {
        work_dir: root.to_path_buf(),
        output,
        chapters: chapter_count,
        toc_entries: toc.len(),
        removed,
    })
}

/// Extract `epub` and report its structure.
pub fn inspect(epub: &Path, options: &ConvertOptions) -> Result<BookInfo> {
    let root = epub::extract(epub, &options.work_parent)?;
    inspect_extracted(&root, options)
}

/// Report the structure of an already extracted book.
pub fn inspect_extracted(root: &Path, options: &ConvertOptions) -> Result<BookInfo> {
    let (package, toc) = load_structure(root, options)?;
    let navigation_path = locate_navigation(&package, &options.nav_discovery)?;
    let chapters = spine_paths(&package)?;

    Ok(BookInfo {
        work_dir: root.to_path_buf(),
        package_path: package.path,
        navigation_path,
        resources: package.manifest.len(),
        metadata: package.metadata,
        chapters,
        toc,
    })
}

/// Open `path` with an external viewer command.
pub fn launch_viewer(viewer: &str, path: &Path) -> io::Result<()> {
    let status = Command::new(viewer).arg(path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{viewer} exited with {status}")))
    }
}

fn load_structure(root: &Path, options: &ConvertOptions) -> Result<(Package, Vec<TocEntry>)> {
    let package_path = locate_package(root)?;
    let package = read_package(root, &package_path)?;
    let toc = read_navigation(root, &package, &options.nav_discovery)?;
    Ok((package, toc))
}

/// Parse a non-chapter head donor. A missing or unreadable file means no donor.
fn load_head_donor(root: &Path, archive_path: &str) -> Option<ArenaDom> {
    match fs::read(locate_file(root, archive_path)) {
        Ok(bytes) => Some(parse_markup(&decode_text(&bytes, extract_xml_encoding(&bytes)))),
        Err(e) => {
            warn!("cannot read head source {archive_path}: {e}");
            None
        }
    }
}

/// Delete chapter files, never the output itself. Failures are only logged.
fn remove_chapters(files: &[PathBuf], output: &Path) -> usize {
    let mut removed = 0;
    for file in files {
        if file == output {
            continue;
        }
        match fs::remove_file(file) {
            Ok(()) => removed += 1,
            Err(e) => debug!("cannot remove {}: {e}", file.display()),
        }
    }
    removed
}
