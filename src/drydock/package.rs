//! Packs a working directory into a deterministic `.tar.gz` snapshot.
//!
//! Entries are sorted and their timestamps zeroed so identical trees produce
//! identical bytes, and therefore identical checksums.

use crate::error::{DrydockError, Result};
use crate::model::{Checksum, ChecksumAlgorithm};
use flate2::write::GzEncoder;
use flate2::Compression;
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

const ARCHIVE_ROOT: &str = "package";
const EXCLUDED: &[&str] = &[".git", ".hg", ".svn", ".drydockconf"];

#[derive(Debug, Clone)]
pub struct Archive {
    pub bytes: Vec<u8>,
    pub checksum: String,
}

impl Archive {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let checksum = checksum(&bytes);
        Self { bytes, checksum }
    }

    /// Whether `remote` is a digest of these bytes, in whichever algorithm the
    /// platform reported.
    pub fn matches(&self, remote: &Checksum) -> bool {
        let local = match remote.algorithm {
            ChecksumAlgorithm::Sha256 => self.checksum.clone(),
            ChecksumAlgorithm::Md5 => md5_hex(&self.bytes),
        };
        local.eq_ignore_ascii_case(&remote.value)
    }
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex-encoded MD5 of `bytes`.
pub fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

pub fn pack<P: AsRef<Path>>(dir: P) -> Result<Archive> {
    let dir = dir.as_ref();
    let mut buf = Vec::new();
    write_archive(&mut buf, dir)?;
    Ok(Archive::from_bytes(buf))
}

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| EXCLUDED.contains(&name))
            .unwrap_or(false)
}

fn write_archive<W: Write>(writer: W, dir: &Path) -> Result<()> {
    let enc = GzEncoder::new(writer, Compression::default());
    let mut tar = tar::Builder::new(enc);

    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(e));

    for entry in walker {
        let entry = entry.map_err(|e| DrydockError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| DrydockError::Manifest(e.to_string()))?;
        let name = Path::new(ARCHIVE_ROOT).join(rel);
        let content = fs::read(entry.path())?;

        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(file_mode(&entry)?);
        header.set_mtime(0);
        header.set_cksum();

        tar.append_data(&mut header, name, content.as_slice())?;
    }

    tar.into_inner()?.finish()?;
    Ok(())
}

#[cfg(unix)]
fn file_mode(entry: &DirEntry) -> Result<u32> {
    use std::os::unix::fs::PermissionsExt;
    let mode = entry
        .metadata()
        .map_err(|e| DrydockError::Io(e.into()))?
        .permissions()
        .mode();
    Ok(if mode & 0o111 != 0 { 0o755 } else { 0o644 })
}

#[cfg(not(unix))]
fn file_mode(_entry: &DirEntry) -> Result<u32> {
    Ok(0o644)
}
