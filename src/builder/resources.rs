//! Locating and installing the stylesheet and scripts injected into the head.
//!
//! Lookup precedence for each file: an explicit override, then the user
//! config directory, then the system-wide directory, then the directory of
//! the running executable.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};

const APP_NAME: &str = "epub2html";
const LEGACY_DIR_NAME: &str = ".epub2html";
const SYSTEM_DIR: &str = "/usr/share/epub2html";

/// The three files every output document references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Stylesheet,
    /// Script library the dropdown depends on.
    PrimaryScript,
    DropdownScript,
}

impl ResourceKind {
    /// Injection order in the head.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Stylesheet,
        ResourceKind::PrimaryScript,
        ResourceKind::DropdownScript,
    ];

    /// File name looked up in the search directories.
    pub fn file_name(self) -> &'static str {
        match self {
            ResourceKind::Stylesheet => "default.css",
            ResourceKind::PrimaryScript => "jquery.js",
            ResourceKind::DropdownScript => "dropdown.js",
        }
    }
}

/// Explicit paths that bypass the search directories.
///
/// An override naming a directory is searched for the default file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceOverrides {
    pub stylesheet: Option<PathBuf>,
    pub primary_script: Option<PathBuf>,
    pub dropdown_script: Option<PathBuf>,
}

impl ResourceOverrides {
    pub fn get(&self, kind: ResourceKind) -> Option<&Path> {
        match kind {
            ResourceKind::Stylesheet => self.stylesheet.as_deref(),
            ResourceKind::PrimaryScript => self.primary_script.as_deref(),
            ResourceKind::DropdownScript => self.dropdown_script.as_deref(),
        }
    }
}

/// The default search directories, most specific first.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut search = Vec::new();
    if let Some(config) = dirs::config_dir() {
        search.push(config.join(APP_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        search.push(home.join(LEGACY_DIR_NAME));
    }
    search.push(PathBuf::from(SYSTEM_DIR));
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        search.push(dir.to_path_buf());
    }
    search
}

/// Resolves [`ResourceKind`]s to files on disk.
#[derive(Debug, Clone)]
pub struct ResourceLocator<'a> {
    overrides: &'a ResourceOverrides,
    search_dirs: &'a [PathBuf],
}

impl<'a> ResourceLocator<'a> {
    pub fn new(overrides: &'a ResourceOverrides, search_dirs: &'a [PathBuf]) -> Self {
        Self {
            overrides,
            search_dirs,
        }
    }

    /// Find the file for `kind`.
    pub fn locate(&self, kind: ResourceKind) -> Result<PathBuf> {
        let name = kind.file_name();

        if let Some(path) = self.overrides.get(kind) {
            let candidate = if path.is_dir() {
                path.join(name)
            } else {
                path.to_path_buf()
            };
            if candidate.is_file() {
                return Ok(candidate);
            }
            return Err(Error::ResourceNotFound {
                name: name.to_string(),
                searched: vec![candidate],
            });
        }

        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| Error::ResourceNotFound {
                name: name.to_string(),
                searched: self.search_dirs.to_vec(),
            })
    }

    /// Find all three files, failing on the first miss.
    pub fn locate_all(&self) -> Result<LocatedResources> {
        Ok(LocatedResources {
            stylesheet: self.locate(ResourceKind::Stylesheet)?,
            primary_script: self.locate(ResourceKind::PrimaryScript)?,
            dropdown_script: self.locate(ResourceKind::DropdownScript)?,
        })
    }
}

/// Source files found by [`ResourceLocator::locate_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedResources {
    pub stylesheet: PathBuf,
    pub primary_script: PathBuf,
    pub dropdown_script: PathBuf,
}

/// Relative hrefs of the installed files, as referenced from the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadResources {
    pub stylesheet: String,
    pub primary_script: String,
    pub dropdown_script: String,
}

impl LocatedResources {
    /// Copy every file into `out_dir` and return their basenames.
    pub fn install(&self, out_dir: &Path) -> Result<HeadResources> {
        Ok(HeadResources {
            stylesheet: install_file(&self.stylesheet, out_dir)?,
            primary_script: install_file(&self.primary_script, out_dir)?,
            dropdown_script: install_file(&self.dropdown_script, out_dir)?,
        })
    }
}

fn install_file(source: &Path, out_dir: &Path) -> Result<String> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::ResourceNotFound {
            name: source.display().to_string(),
            searched: vec![source.to_path_buf()],
        })?;
    let dest = out_dir.join(&name);

    // Copying a file onto itself would truncate it
    let same_file = match (fs::canonicalize(source), fs::canonicalize(&dest)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if !same_file {
        fs::copy(source, &dest)?;
        debug!("installed {} -> {}", source.display(), dest.display());
    }
    Ok(name)
}
