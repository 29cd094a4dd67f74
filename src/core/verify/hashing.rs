// ─── Hash Verification ───
// Incremental digests over byte streams, checked once when the stream closes.

use std::fmt;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use tokio::io::{AsyncRead, ReadBuf};

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Md5,
}

impl HashAlgorithm {
    /// Length of the hex-encoded digest.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Md5 => 32,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HashAlgorithm::Sha1 => "SHA-1",
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Md5 => "MD5",
        })
    }
}

enum DigestState {
    Sha1(Sha1),
    Sha256(Sha256),
    Md5(Md5),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => DigestState::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            HashAlgorithm::Md5 => DigestState::Md5(Md5::new()),
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        match self {
            DigestState::Sha1(h) => h.update(bytes),
            DigestState::Sha256(h) => h.update(bytes),
            DigestState::Md5(h) => h.update(bytes),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            DigestState::Sha1(h) => hex::encode(h.finalize()),
            DigestState::Sha256(h) => hex::encode(h.finalize()),
            DigestState::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

/// Expected digest for one artifact.
///
/// `label` identifies the origin (usually the download URL) in mismatch errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashVerifier {
    pub algorithm: HashAlgorithm,
    pub expected: String,
    pub label: String,
}

impl HashVerifier {
    pub fn new(
        algorithm: HashAlgorithm,
        expected: &str,
        label: impl Into<String>,
    ) -> LauncherResult<Self> {
        let expected = expected.trim().to_ascii_lowercase();
        if expected.len() != algorithm.hex_len() || hex::decode(&expected).is_err() {
            return Err(LauncherError::InvalidDigest {
                algorithm: algorithm.to_string(),
                digest: expected,
            });
        }
        Ok(Self {
            algorithm,
            expected,
            label: label.into(),
        })
    }

    pub fn sha1(expected: &str, label: impl Into<String>) -> LauncherResult<Self> {
        Self::new(HashAlgorithm::Sha1, expected, label)
    }

    /// Wrap a reader so every byte read feeds this verifier's digest.
    pub fn wrap<R: AsyncRead + Unpin>(&self, inner: R) -> HashVerifyingReader<R> {
        HashVerifyingReader {
            inner,
            digest: Some(DigestState::new(self.algorithm)),
            expected: self.expected.clone(),
            label: self.label.clone(),
        }
    }

    /// Stream an existing file through the verifier.
    pub async fn verify_file(&self, path: &Path) -> LauncherResult<()> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        let mut reader = self.wrap(file);
        tokio::io::copy(&mut reader, &mut tokio::io::sink())
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        reader.close()
    }
}

/// Reader that hashes everything passing through it.
///
/// Not seekable: the digest only makes sense over a single forward pass.
pub struct HashVerifyingReader<R> {
    inner: R,
    /// `None` once [`HashVerifyingReader::close`] has run.
    digest: Option<DigestState>,
    expected: String,
    label: String,
}

impl<R> HashVerifyingReader<R> {
    /// Finish the digest and compare it. Only the first call checks;
    /// later calls return `Ok(())`.
    pub fn close(&mut self) -> LauncherResult<()> {
        let Some(digest) = self.digest.take() else {
            return Ok(());
        };
        let actual = digest.finalize_hex();
        if actual != self.expected {
            return Err(LauncherError::HashMismatch {
                url: self.label.clone(),
                expected: self.expected.clone(),
                actual,
            });
        }
        Ok(())
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashVerifyingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if let Some(digest) = this.digest.as_mut() {
                    digest.update(&buf.filled()[before..]);
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

/// Hex SHA-256 of a string, used for stable cache file names.
pub fn compute_sha256_hex(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}
