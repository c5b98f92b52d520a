//! Content fingerprints for fast table equality.
//!
//! A fingerprint is a SHA-256 digest over a snapshot's row and cell
//! contents only - never over capture or modification timestamps - so two
//! reads of identical data always hash identically, whichever store they
//! came from and whenever they happened.

use crate::cell::Normalization;
use crate::snapshot::TableSnapshot;
use sha2::{Digest, Sha256};
use std::fmt;

/// A 256-bit content hash of one table snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering of the digest.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars identify a digest well enough in logs.
        write!(f, "Fingerprint({}..)", &self.to_hex()[..8])
    }
}

/// Computes content fingerprints under a fixed normalization rule.
///
/// Pure: no IO, no clock, no environment dependence. The same snapshot
/// contents produce the same fingerprint across calls and across process
/// restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fingerprinter {
    normalization: Normalization,
}

impl Fingerprinter {
    /// Create a fingerprinter with the given normalization rule.
    pub fn new(normalization: Normalization) -> Self {
        Self { normalization }
    }

    /// Hash a snapshot's contents.
    ///
    /// The byte stream fed to the hash is injective over (rows, cells,
    /// canonical text): each cell contributes a type tag, a length prefix,
    /// and its canonical bytes; each row contributes a terminator. Row and
    /// cell order are significant - no implicit sorting.
    pub fn fingerprint(&self, snapshot: &TableSnapshot) -> Fingerprint {
        let mut hasher = Sha256::new();
        for row in snapshot.rows() {
            for cell in row {
                let (tag, text) = cell.canonical_parts(self.normalization);
                hasher.update([tag]);
                hasher.update((text.len() as u64).to_le_bytes());
                hasher.update(text.as_bytes());
            }
            hasher.update(b"#");
        }
        Fingerprint(hasher.finalize().into())
    }
}
