//! Materialises a single executable out of a downloaded asset.
//!
//! Output lands in the caller's scratch directory and is never removed here;
//! the caller owns that directory and cleans it up once the file has been
//! placed.

use crate::error::{InstallError, Result};
use crate::package::ArchiveKind;
use flate2::read::GzDecoder;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tar::Archive;

/// Any of the owner/group/other execute bits.
const EXECUTABLE_BITS: u32 = 0o111;

/// Extracts `expected_name` from `file_path` into `scratch_dir`, returning
/// the path of the executable copy.
///
/// Archives are scanned in their stored order and the first regular,
/// executable entry whose base name equals or starts with `expected_name`
/// wins. Non-archives are copied as-is.
pub fn extract(file_path: &Path, expected_name: &str, scratch_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(scratch_dir)?;
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    tracing::info!("Extracting {}...", file_name);

    let extracted = match ArchiveKind::detect(&file_name) {
        None => copy_standalone(file_path, expected_name, scratch_dir)?,
        Some(ArchiveKind::TarGz) => {
            let decoder = GzDecoder::new(fs::File::open(file_path)?);
            extract_from_tar(Archive::new(decoder), file_path, expected_name, scratch_dir)?
        }
        Some(ArchiveKind::TarXz) => {
            let decoder = xz2::read::XzDecoder::new(fs::File::open(file_path)?);
            extract_from_tar(Archive::new(decoder), file_path, expected_name, scratch_dir)?
        }
        Some(ArchiveKind::Zip) => extract_from_zip(file_path, expected_name, scratch_dir)?,
        Some(ArchiveKind::Gz) => {
            let mut decoder = GzDecoder::new(fs::File::open(file_path)?);
            write_executable(&mut decoder, &scratch_dir.join(expected_name))?
        }
    };

    tracing::info!(
        "Successfully extracted and found executable: {}",
        extracted.display()
    );
    Ok(extracted)
}

fn copy_standalone(file_path: &Path, expected_name: &str, scratch_dir: &Path) -> Result<PathBuf> {
    let dest = scratch_dir.join(expected_name);
    if dest == file_path {
        return Err(InstallError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "download and extraction paths must differ",
        )));
    }
    let mut source = fs::File::open(file_path)?;
    write_executable(&mut source, &dest)
}

fn entry_matches(base_name: &str, expected_name: &str) -> bool {
    base_name == expected_name || base_name.starts_with(expected_name)
}

fn extract_from_tar<R: Read>(
    mut archive: Archive<R>,
    archive_path: &Path,
    expected_name: &str,
    scratch_dir: &Path,
) -> Result<PathBuf> {
    for entry in archive.entries()? {
        let mut entry = entry?;

        let (is_file, mode) = {
            let header = entry.header();
            (header.entry_type().is_file(), header.mode().unwrap_or(0))
        };
        if !is_file || mode & EXECUTABLE_BITS == 0 {
            continue;
        }

        let base_name = match entry.path()?.file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        tracing::trace!("Archive entry '{}' mode {:o}", base_name, mode);

        if entry_matches(&base_name, expected_name) {
            return write_executable(&mut entry, &scratch_dir.join(expected_name));
        }
    }

    Err(not_found(archive_path, expected_name))
}

fn extract_from_zip(archive_path: &Path, expected_name: &str, scratch_dir: &Path) -> Result<PathBuf> {
    let mut archive = zip::ZipArchive::new(fs::File::open(archive_path)?)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let mode = entry.unix_mode().unwrap_or(0);
        if mode & EXECUTABLE_BITS == 0 {
            continue;
        }

        let base_name = match Path::new(entry.name()).file_name() {
            Some(name) => name.to_string_lossy().to_string(),
            None => continue,
        };
        tracing::trace!("Zip entry '{}' mode {:o}", base_name, mode);

        if entry_matches(&base_name, expected_name) {
            return write_executable(&mut entry, &scratch_dir.join(expected_name));
        }
    }

    Err(not_found(archive_path, expected_name))
}

fn not_found(archive_path: &Path, expected_name: &str) -> InstallError {
    InstallError::ArchiveBinaryNotFound {
        binary: expected_name.to_string(),
        archive: archive_path.to_path_buf(),
    }
}

fn write_executable<R: Read + ?Sized>(reader: &mut R, dest: &Path) -> Result<PathBuf> {
    let mut out = fs::File::create(dest)?;
    io::copy(reader, &mut out)?;
    out.sync_all()?;
    drop(out);
    set_executable(dest)?;
    Ok(dest.to_path_buf())
}

pub fn set_executable(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
