//! Utility functions and helpers

mod cache;

use sha2::{Digest, Sha256};

pub use cache::DerivedCache;

/// Incremental content hasher used for module and chunk hashes
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a length-prefixed string so adjacent fields cannot collide
    pub fn update_str(&mut self, value: &str) {
        self.inner.update((value.len() as u64).to_le_bytes());
        self.inner.update(value.as_bytes());
    }

    /// Full hex digest
    pub fn digest(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Order-independent combination of hex digests
#[derive(Debug, Clone, Default)]
pub struct XorDigest {
    bytes: Vec<u8>,
}

impl XorDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one hex digest in; non-hex input is hashed first
    pub fn add(&mut self, digest: &str) {
        let decoded = match hex::decode(digest) {
            Ok(bytes) => bytes,
            Err(_) => Sha256::digest(digest.as_bytes()).to_vec(),
        };
        if self.bytes.len() < decoded.len() {
            self.bytes.resize(decoded.len(), 0);
        }
        for (acc, byte) in self.bytes.iter_mut().zip(decoded) {
            *acc ^= byte;
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// Shorten a digest to `len` characters
pub fn shorten_hash(hash: &str, len: usize) -> String {
    hash.chars().take(len).collect()
}

/// Render a filename template with `[name]`, `[id]` and `[hash]` placeholders
pub fn render_filename(template: &str, name: &str, id: &str, hash: &str) -> String {
    template
        .replace("[name]", name)
        .replace("[id]", id)
        .replace("[hash]", hash)
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
