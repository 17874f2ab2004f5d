//! Streaming content fingerprints.
//!
//! A fingerprint is the 128-bit MD5 digest of a file's bytes, encoded as a
//! fixed-length (24 character) base64 string. It is used as a proxy for
//! "has this exact content already been uploaded" — collision resistance in
//! the cryptographic sense is not required, stability is.

use std::io::Read;
use std::path::Path;

use base64::Engine;
use md5::{Digest, Md5};

/// Computes the fingerprint of a file by streaming it in fixed-size reads.
///
/// Never loads the whole file into memory. I/O errors (file vanished,
/// permission denied) propagate untouched — retry policy belongs to the
/// caller, not the hashing primitive.
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(encode(hasher.finalize().as_slice()))
}

/// Fingerprint of an in-memory byte slice, same encoding as
/// [`fingerprint_file`].
pub fn fingerprint_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    encode(hasher.finalize().as_slice())
}

fn encode(digest: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(digest)
}
