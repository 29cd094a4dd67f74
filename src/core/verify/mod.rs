mod hashing;

pub use hashing::{compute_sha256_hex, HashAlgorithm, HashVerifier, HashVerifyingReader};
