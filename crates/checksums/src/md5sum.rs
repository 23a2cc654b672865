use digest::Digest;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Number of bytes in an MD5 digest.
pub const DIGEST_LENGTH: usize = 16;

/// Chunk size used when streaming file contents through the hasher.
const STREAM_CHUNK_SIZE: usize = 8 * 1024;

/// Error produced when a content digest cannot be computed.
#[derive(Debug, thiserror::Error)]
#[error("failed to hash '{path}': {source}")]
pub struct ChecksumError {
    path: PathBuf,
    source: io::Error,
}

impl ChecksumError {
    fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the path of the file that failed to hash.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the underlying [`io::Error`].
    #[must_use]
    pub fn source_error(&self) -> &io::Error {
        &self.source
    }
}

/// Streaming MD5 hasher.
#[derive(Clone, Default)]
pub struct Md5 {
    inner: md5::Md5,
}

impl fmt::Debug for Md5 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Md5")
    }
}

impl Md5 {
    /// Creates a hasher with an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: md5::Md5::new(),
        }
    }

    /// Feeds a chunk of data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Consumes the hasher and returns the digest bytes.
    #[must_use]
    pub fn finalize(self) -> [u8; DIGEST_LENGTH] {
        self.inner.finalize().into()
    }
}

/// Computes the MD5 digest of a file's contents.
///
/// The file is streamed in fixed 8 KiB chunks so memory use is bounded
/// regardless of file size. Any read failure, including the file
/// vanishing mid-stream, is surfaced as a [`ChecksumError`].
pub fn digest_file(path: &Path) -> Result<[u8; DIGEST_LENGTH], ChecksumError> {
    let mut file = File::open(path).map_err(|error| ChecksumError::new(path, error))?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; STREAM_CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|error| ChecksumError::new(path, error))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    // RFC 1321 test vectors.
    #[test]
    fn empty_input_matches_rfc_vector() {
        let digest = Md5::new().finalize();
        assert_eq!(
            digest,
            [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec,
                0xf8, 0x42, 0x7e
            ]
        );
    }

    #[test]
    fn abc_matches_rfc_vector() {
        let mut hasher = Md5::new();
        hasher.update(b"abc");
        assert_eq!(
            hasher.finalize(),
            [
                0x90, 0x01, 0x50, 0x98, 0x3c, 0xd2, 0x4f, 0xb0, 0xd6, 0x96, 0x3f, 0x7d, 0x28,
                0xe1, 0x7f, 0x72
            ]
        );
    }

    #[test]
    fn incremental_updates_match_single_update() {
        let mut split = Md5::new();
        split.update(b"hello ");
        split.update(b"world");

        let mut whole = Md5::new();
        whole.update(b"hello world");

        assert_eq!(split.finalize(), whole.finalize());
    }

    #[test]
    fn digest_file_streams_large_content() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("large.bin");
        // Larger than one chunk so the streaming loop iterates.
        let data = vec![0xabu8; 3 * super::STREAM_CHUNK_SIZE + 17];
        fs::write(&path, &data).expect("write");

        let mut hasher = Md5::new();
        hasher.update(&data);
        assert_eq!(digest_file(&path).expect("digest"), hasher.finalize());
    }

    #[test]
    fn digest_file_missing_path_errors() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent.bin");
        let error = digest_file(&path).expect_err("missing file");
        assert_eq!(error.path(), path);
        assert_eq!(error.source_error().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn identical_content_identical_digest() {
        let temp = tempfile::tempdir().expect("tempdir");
        let a = temp.path().join("a.bin");
        let b = temp.path().join("b.bin");
        fs::write(&a, b"same bytes").expect("write a");
        fs::write(&b, b"same bytes").expect("write b");
        assert_eq!(
            digest_file(&a).expect("digest a"),
            digest_file(&b).expect("digest b")
        );
    }
}
