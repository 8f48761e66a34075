//! Unpacking the EPUB zip container into a working directory.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use zip::ZipArchive;

use crate::error::Result;

/// Name of the working directory for an archive: `epub-` plus the first
/// 16 hex digits of the SHA-1 of its bytes.
///
/// The name depends on content only, so converting the same book twice
/// reuses (and overwrites) the same directory.
pub fn work_dir_name(archive_bytes: &[u8]) -> String {
    let digest = sha1_smol::Sha1::from(archive_bytes).digest().to_string();
    format!("epub-{}", &digest[..16])
}

/// Extract the archive at `epub` into a content-named directory under `parent`.
///
/// Returns the directory. It is never removed by this crate.
pub fn extract(epub: &Path, parent: &Path) -> Result<PathBuf> {
    let bytes = fs::read(epub)?;
    let dest = parent.join(work_dir_name(&bytes));
    fs::create_dir_all(&dest)?;

    let count = extract_from_reader(Cursor::new(bytes), &dest)?;
    debug!("extracted {count} files from {} into {}", epub.display(), dest.display());
    Ok(dest)
}

/// Extract every file of a zip archive below `dest`, overwriting existing files.
///
/// Entries whose names would escape `dest` (absolute paths, `..`) are skipped.
/// Returns the number of files written.
pub fn extract_from_reader<R: Read + Seek>(reader: R, dest: &Path) -> Result<usize> {
    let mut archive = ZipArchive::new(reader)?;
    let mut count = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("skipping archive entry with unsafe path: {}", entry.name());
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        count += 1;
    }

    Ok(count)
}
