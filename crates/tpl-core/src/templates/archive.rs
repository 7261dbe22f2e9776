//! Archive extraction into a destination directory
//!
//! Supports `.tar`, `.tar.gz`/`.tgz`, `.tar.bz2`, `.tar.xz` and `.zip`,
//! selected by file suffix only. Every entry's destination is checked for
//! containment before anything is written; the first escaping entry aborts
//! the extraction. Entries written before that point are left in place.

use crate::error::{Error, IoResultExt, Result};
use crate::paths;
use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// Archive suffixes probed by the resolver, in probe order
pub const ARCHIVE_SUFFIXES: &[&str] = &[".tar", ".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".zip"];

const DEFAULT_FILE_MODE: u32 = 0o644;
const DEFAULT_DIR_MODE: u32 = 0o755;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Container/compression combination, derived from the file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from the file name suffix
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Whether `path` carries one of the supported archive suffixes
pub fn is_archive(path: &Path) -> bool {
    ArchiveFormat::from_path(path).is_some()
}

/// One archive member, read lazily while unpacking
struct ArchiveEntry<R> {
    name: PathBuf,
    is_dir: bool,
    mode: u32,
    content: R,
}

/// Unpack `archive` into `dest_root`, creating `dest_root` if needed
pub fn extract(archive: &Path, dest_root: &Path) -> Result<()> {
    let format = ArchiveFormat::from_path(archive).ok_or_else(|| Error::UnsupportedFormat {
        path: archive.to_path_buf(),
    })?;

    info!(
        "Extracting {} ({:?}) into {}",
        archive.display(),
        format,
        dest_root.display()
    );

    fs::create_dir_all(dest_root).at(dest_root)?;
    let file = File::open(archive).at(archive)?;

    match format {
        ArchiveFormat::Tar => unpack_tar(file, archive, dest_root),
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(file), archive, dest_root),
        ArchiveFormat::TarBz2 => unpack_tar(BzDecoder::new(file), archive, dest_root),
        ArchiveFormat::TarXz => unpack_tar(XzDecoder::new(file), archive, dest_root),
        ArchiveFormat::Zip => unpack_zip(file, archive, dest_root),
    }
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, dest_root: &Path) -> Result<()> {
    let mut tar = tar::Archive::new(reader);

    for entry in tar.entries().at(archive)? {
        let entry = entry.at(archive)?;
        let header = entry.header();
        let name = entry.path().at(archive)?.into_owned();
        let mode = header.mode().at(archive)?;
        let entry_type = header.entry_type();

        if !entry_type.is_dir() && !entry_type.is_file() {
            // still reject escaping names, even for entries we never write
            check_destination(dest_root, &name, false)?;
            warn!(
                "Skipping {:?} entry {} in {}",
                entry_type,
                name.display(),
                archive.display()
            );
            continue;
        }

        write_entry(
            dest_root,
            ArchiveEntry {
                name,
                is_dir: entry_type.is_dir(),
                mode,
                content: entry,
            },
        )?;
    }

    Ok(())
}

fn unpack_zip(file: File, archive: &Path, dest_root: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(file).map_err(|e| zip_error(archive, e))?;

    for i in 0..zip.len() {
        let member = zip.by_index(i).map_err(|e| zip_error(archive, e))?;
        let name = PathBuf::from(member.name());
        let is_dir = member.is_dir();
        let raw_mode = member.unix_mode();

        if raw_mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            check_destination(dest_root, &name, false)?;
            warn!(
                "Skipping symlink entry {} in {}",
                name.display(),
                archive.display()
            );
            continue;
        }

        let mode = raw_mode.unwrap_or(if is_dir {
            DEFAULT_DIR_MODE
        } else {
            DEFAULT_FILE_MODE
        });

        write_entry(
            dest_root,
            ArchiveEntry {
                name,
                is_dir,
                mode,
                content: member,
            },
        )?;
    }

    Ok(())
}

fn zip_error(archive: &Path, err: zip::result::ZipError) -> Error {
    Error::io(archive, io::Error::other(err))
}

/// Destination for an entry, or `None` for a directory entry naming the root
/// itself (`./`), which needs no work.
fn check_destination(dest_root: &Path, name: &Path, is_dir: bool) -> Result<Option<PathBuf>> {
    match paths::contained_join(dest_root, name) {
        Ok(dest) => Ok(Some(dest)),
        Err(_)
            if is_dir
                && !name.has_root()
                && paths::normalize(&dest_root.join(name)) == paths::normalize(dest_root) =>
        {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn write_entry<R: Read>(dest_root: &Path, mut entry: ArchiveEntry<R>) -> Result<()> {
    let Some(dest) = check_destination(dest_root, &entry.name, entry.is_dir)? else {
        return Ok(());
    };
    let mode = entry.mode & 0o7777;

    if entry.is_dir {
        debug!("  dir  {} ({:o})", entry.name.display(), mode);
        fs::create_dir_all(&dest).at(&dest)?;
        return set_mode(&dest, mode);
    }

    debug!("  file {} ({:o})", entry.name.display(), mode);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }

    let mut out = File::create(&dest).at(&dest)?;
    io::copy(&mut entry.content, &mut out).at(&dest)?;
    set_mode(&dest, mode)?;
    drop(out);

    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).at(path)
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    let mut perms = fs::metadata(path).at(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms).at(path)
}
