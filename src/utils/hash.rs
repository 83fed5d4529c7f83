//! Content digests for change detection using blake3.

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash page text.
    #[inline]
    pub fn of(text: &str) -> Self {
        Self(*blake3::hash(text.as_bytes()).as_bytes())
    }

    /// Convert to hex string, the form stored in node records.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

/// Hex digest of page text.
#[inline]
pub fn digest(text: &str) -> String {
    ContentHash::of(text).to_hex()
}
