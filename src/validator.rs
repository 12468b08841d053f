// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Validates annotation files before ingestion (type, magic, digest)
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// Security: Magic number verification, SHA-256 digest recorded per run
// ==============================================================================

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Gzip member header
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Extension written by the Nirvana annotator
const EXPECTED_EXTENSION: &str = ".json.gz";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Input file not found: {0}")]
    NotFound(PathBuf),

    #[error("Input path is not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("Input file is empty: {0}")]
    Empty(PathBuf),

    #[error("Input file is not gzip-compressed: {0}")]
    NotGzip(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Facts about an input file that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedInput {
    pub path: PathBuf,
    pub size: u64,
    pub hash_sha256: String,
}

/// Validate a gzipped Nirvana JSON file
///
/// Checks presence, size, and gzip magic, then hashes the whole file.
pub fn validate_input(path: impl AsRef<Path>) -> Result<ValidatedInput, ValidationError> {
    let path = path.as_ref();
    info!("Validating input file: {:?}", path);

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ValidationError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(ValidationError::NotAFile(path.to_path_buf()));
    }
    if metadata.len() == 0 {
        return Err(ValidationError::Empty(path.to_path_buf()));
    }
    debug!("Size check passed: {} bytes", metadata.len());

    let name = path.to_string_lossy();
    if !name.ends_with(EXPECTED_EXTENSION) {
        warn!("Unexpected extension for {:?} (expected {})", path, EXPECTED_EXTENSION);
    }

    if !has_gzip_magic(path)? {
        return Err(ValidationError::NotGzip(path.to_path_buf()));
    }
    debug!("Magic number check passed");

    let hash = compute_sha256(path)?;
    debug!("SHA-256: {}", hash);

    Ok(ValidatedInput {
        path: path.to_path_buf(),
        size: metadata.len(),
        hash_sha256: hash,
    })
}

fn has_gzip_magic(path: &Path) -> Result<bool, ValidationError> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..])?;
        if n == 0 {
            return Ok(false);
        }
        filled += n;
    }
    Ok(buffer == GZIP_MAGIC)
}

fn compute_sha256(path: &Path) -> Result<String, ValidationError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_gzip;
    use tempfile::tempdir;

    #[test]
    fn test_valid_gzip_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.json.gz");
        write_gzip(&path, r#"{"positions":[]}"#);

        let validated = validate_input(&path).unwrap();
        assert_eq!(validated.path, path);
        assert!(validated.size > 0);
        assert_eq!(validated.hash_sha256.len(), 64);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = validate_input(dir.path().join("nope.json.gz"));
        assert!(matches!(result, Err(ValidationError::NotFound(_))));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            validate_input(dir.path()),
            Err(ValidationError::NotAFile(_))
        ));
    }

    #[test]
    fn test_empty_and_plain_files() {
        let dir = tempdir().unwrap();

        let empty = dir.path().join("empty.json.gz");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(validate_input(&empty), Err(ValidationError::Empty(_))));

        let plain = dir.path().join("plain.json.gz");
        std::fs::write(&plain, br#"{"positions":[]}"#).unwrap();
        assert!(matches!(validate_input(&plain), Err(ValidationError::NotGzip(_))));

        let tiny = dir.path().join("tiny.json.gz");
        std::fs::write(&tiny, [0x1f]).unwrap();
        assert!(matches!(validate_input(&tiny), Err(ValidationError::NotGzip(_))));
    }

    #[test]
    fn test_digest_is_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.json.gz");
        std::fs::write(&path, [0x1f, 0x8b, b'a', b'b', b'c']).unwrap();

        let first = validate_input(&path).unwrap().hash_sha256;
        let second = validate_input(&path).unwrap().hash_sha256;
        assert_eq!(first, second);
    }
}
