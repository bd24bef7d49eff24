//! Checksum and verification functionality.
//!
//! This module provides:
//! - The digest algorithms a deployment can choose from (MD5, SHA-256, BLAKE3)
//! - Streaming checksum computation over any reader
//! - Verification of an input data file against its stored `.md5` companion
//!
//! Digests are always rendered as uppercase hex, which is also the form
//! written to result checksum files.

use std::fmt;
use std::fmt::Write as _;
use std::io::Read;

use crate::error::EngineError;
use crate::fs_ops::{FileStore, Folder};
use crate::model::{FileHandle, BYTE_ORDER_MARK};

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    /// MD5 (128-bit, the format of existing `.md5` files)
    #[default]
    Md5,
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl ChecksumAlgorithm {
    /// Parse algorithm from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }

    /// Length of the digest in hex characters
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 | Self::Blake3 => 64,
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    /// Create a checksum value from raw digest bytes
    pub fn from_bytes(algorithm: ChecksumAlgorithm, bytes: &[u8]) -> Self {
        let mut hex = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            let _ = write!(hex, "{:02X}", byte);
        }
        ChecksumValue { algorithm, hex }
    }

    /// Get the algorithm
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Uppercase hex representation
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Trait for computing checksums
pub trait ChecksumHasher {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the checksum value
    fn finalize(self: Box<Self>) -> ChecksumValue;
}

/// MD5 hasher (backed by md5 crate)
struct Md5Hasher {
    context: md5::Context,
}

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.context.compute();
        ChecksumValue::from_bytes(ChecksumAlgorithm::Md5, &digest.0)
    }
}

/// SHA-256 hasher (backed by sha2 crate)
struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl ChecksumHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        use sha2::Digest;
        let digest = self.hasher.finalize();
        ChecksumValue::from_bytes(ChecksumAlgorithm::Sha256, digest.as_slice())
    }
}

/// BLAKE3 hasher (backed by blake3 crate)
struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl ChecksumHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.hasher.finalize();
        ChecksumValue::from_bytes(ChecksumAlgorithm::Blake3, digest.as_bytes())
    }
}

/// Create a new hasher for the given algorithm
pub fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Md5 => Box::new(Md5Hasher {
            context: md5::Context::new(),
        }),
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Hasher {
            hasher: sha2::Sha256::default(),
        }),
        ChecksumAlgorithm::Blake3 => Box::new(Blake3Hasher {
            hasher: blake3::Hasher::new(),
        }),
    }
}

/// Compute the checksum of everything `reader` yields.
pub fn compute_checksum(
    reader: &mut dyn Read,
    algorithm: ChecksumAlgorithm,
) -> std::io::Result<ChecksumValue> {
    let mut hasher = create_hasher(algorithm);
    let mut buffer = [0u8; 65536]; // 64 KB buffer

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(hasher.finalize())
}

/// Compute the checksum of a file held by `store`.
pub fn compute_file_checksum(
    store: &dyn FileStore,
    folder: Folder,
    name: &str,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, EngineError> {
    let mut reader = store.open_read(folder, name)?;
    compute_checksum(&mut reader, algorithm).map_err(|e| EngineError::ReadError {
        path: store.root().join(folder.dir_name()).join(name),
        source: e,
    })
}

/// Normalize the text of a stored checksum file.
///
/// A leading byte-order mark is ignored. Returns `None` when the trimmed
/// text is not exactly one digest of the expected length made of hex
/// digits.
pub fn normalize_stored_digest(text: &str, algorithm: ChecksumAlgorithm) -> Option<String> {
    let trimmed = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text).trim();
    if trimmed.len() != algorithm.hex_len() || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}

/// Check an input data file against its stored checksum.
///
/// A mismatch or a malformed stored digest yields `Ok(false)`; failing to
/// read either file is an error.
pub fn verify(
    store: &dyn FileStore,
    file: &FileHandle,
    algorithm: ChecksumAlgorithm,
) -> Result<bool, EngineError> {
    let actual = compute_file_checksum(store, Folder::Input, &file.data_file_name(), algorithm)?;
    let stored = store.read_to_string(Folder::Input, &file.checksum_file_name())?;

    match normalize_stored_digest(&stored, algorithm) {
        Some(expected) => Ok(expected == actual.hex()),
        None => {
            tracing::debug!(file_id = %file.file_id, "Stored checksum is malformed");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::LocalFileStore;
    use std::fs;

    fn digest_of(data: &[u8], algorithm: ChecksumAlgorithm) -> ChecksumValue {
        let mut hasher = create_hasher(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!(ChecksumAlgorithm::from_str("MD5"), Some(ChecksumAlgorithm::Md5));
        assert_eq!(ChecksumAlgorithm::from_str("sha256"), Some(ChecksumAlgorithm::Sha256));
        assert_eq!(ChecksumAlgorithm::from_str("blake3"), Some(ChecksumAlgorithm::Blake3));
        assert_eq!(ChecksumAlgorithm::from_str("crc32"), None);
        assert_eq!(ChecksumAlgorithm::default(), ChecksumAlgorithm::Md5);
    }

    #[test]
    fn test_md5_hasher_is_uppercase() {
        let checksum = digest_of(b"hello", ChecksumAlgorithm::Md5);
        assert_eq!(checksum.algorithm(), ChecksumAlgorithm::Md5);
        assert_eq!(checksum.hex(), "5D41402ABC4B2A76B9719D911017C592");
    }

    #[test]
    fn test_sha256_hasher() {
        let checksum = digest_of(b"hello", ChecksumAlgorithm::Sha256);
        assert_eq!(
            checksum.hex(),
            "2CF24DBA5FB0A30E26E83B2AC5B9E29E1B161E5C1FA7425E73043362938B9824"
        );
    }

    #[test]
    fn test_blake3_hasher_length() {
        let checksum = digest_of(b"hello", ChecksumAlgorithm::Blake3);
        assert_eq!(checksum.hex().len(), ChecksumAlgorithm::Blake3.hex_len());
        assert_eq!(checksum, digest_of(b"hello", ChecksumAlgorithm::Blake3));
    }

    #[test]
    fn test_compute_checksum_streams_reader() {
        let data = vec![7u8; 200_000];
        let streamed = compute_checksum(&mut data.as_slice(), ChecksumAlgorithm::Md5)
            .expect("Failed to hash");
        assert_eq!(streamed, digest_of(&data, ChecksumAlgorithm::Md5));
    }

    #[test]
    fn test_normalize_stored_digest() {
        let md5 = ChecksumAlgorithm::Md5;
        assert_eq!(
            normalize_stored_digest("  5d41402abc4b2a76b9719d911017c592\r\n", md5).as_deref(),
            Some("5D41402ABC4B2A76B9719D911017C592")
        );
        assert_eq!(
            normalize_stored_digest("\u{FEFF}5D41402ABC4B2A76B9719D911017C592\r\n", md5).as_deref(),
            Some("5D41402ABC4B2A76B9719D911017C592")
        );
        assert_eq!(normalize_stored_digest("\u{FEFF}", md5), None);
        assert_eq!(normalize_stored_digest("", md5), None);
        assert_eq!(normalize_stored_digest("5d41402abc4b2a76", md5), None);
        assert_eq!(normalize_stored_digest("zz41402abc4b2a76b9719d911017c592", md5), None);
    }

    fn store_with(data: &[u8], stored: &str) -> (tempfile::TempDir, LocalFileStore) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let store = LocalFileStore::new(temp_dir.path());
        store.ensure_layout().expect("Failed to create layout");
        fs::write(temp_dir.path().join("Input/A.dat"), data).expect("Failed to write data");
        fs::write(temp_dir.path().join("Input/A.md5"), stored).expect("Failed to write md5");
        (temp_dir, store)
    }

    #[test]
    fn test_verify_matching_lowercase_digest() {
        let (temp_dir, store) = store_with(b"hello", "5d41402abc4b2a76b9719d911017c592\n");
        let file = FileHandle::new(temp_dir.path(), "A", 0);
        assert!(verify(&store, &file, ChecksumAlgorithm::Md5).expect("Verification failed"));
    }

    #[test]
    fn test_verify_digest_with_byte_order_mark() {
        let (temp_dir, store) = store_with(b"hello", "\u{FEFF}5D41402ABC4B2A76B9719D911017C592");
        let file = FileHandle::new(temp_dir.path(), "A", 0);
        assert!(verify(&store, &file, ChecksumAlgorithm::Md5).expect("Verification failed"));
    }

    #[test]
    fn test_verify_mismatch_is_false() {
        let (temp_dir, store) = store_with(b"hello!", "5D41402ABC4B2A76B9719D911017C592");
        let file = FileHandle::new(temp_dir.path(), "A", 0);
        assert!(!verify(&store, &file, ChecksumAlgorithm::Md5).expect("Verification failed"));
    }

    #[test]
    fn test_verify_malformed_digest_is_false() {
        let (temp_dir, store) = store_with(b"hello", "not a digest");
        let file = FileHandle::new(temp_dir.path(), "A", 0);
        assert!(!verify(&store, &file, ChecksumAlgorithm::Md5).expect("Verification failed"));
    }

    #[test]
    fn test_verify_missing_checksum_file_is_error() {
        let (temp_dir, store) = store_with(b"hello", "");
        fs::remove_file(temp_dir.path().join("Input/A.md5")).expect("Failed to remove md5");
        let file = FileHandle::new(temp_dir.path(), "A", 0);
        assert!(matches!(
            verify(&store, &file, ChecksumAlgorithm::Md5),
            Err(EngineError::ReadError { .. })
        ));
    }
}
