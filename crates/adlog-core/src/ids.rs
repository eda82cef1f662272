//! Identifier types
//!
//! All identifiers are string newtypes: they cross process boundaries
//! (ledger, cache keys, CLI arguments) and are opaque to the coordinator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of hex characters of the record digest kept in a [`RecordId`]
const RECORD_DIGEST_HEX_LEN: usize = 16;

/// Address of a blob in the content store
///
/// Lowercase hex BLAKE3 digest of the stored bytes, so identical content
/// always maps to the same address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    /// Length of a well-formed address in hex characters
    pub const HEX_LEN: usize = 64;

    /// Compute the address of some content
    pub fn from_content(data: &[u8]) -> Self {
        Self(hex::encode(blake3::hash(data).as_bytes()))
    }

    /// Wrap an address received from elsewhere without validation
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Whether this is a 64-char lowercase hex digest
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == Self::HEX_LEN
            && self
                .0
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Check that `data` hashes to this address
    pub fn matches(&self, data: &[u8]) -> bool {
        *self == Self::from_content(data)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for logs (first 8 chars)
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by the ledger to an appended record
///
/// Ledgers in this workspace produce `{position:016x}-{digest}`, which
/// sorts lexicographically in submission order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wrap an identifier received from a caller or another system
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the identifier for the record at `position` with the given digest
    pub fn assign(position: u64, digest: &blake3::Hash) -> Self {
        let digest = hex::encode(&digest.as_bytes()[..RECORD_DIGEST_HEX_LEN / 2]);
        Self(format!("{position:016x}-{digest}"))
    }

    /// Ledger position encoded in the identifier, if it has the assigned shape
    pub fn position(&self) -> Option<u64> {
        let (position, digest) = self.0.split_once('-')?;
        if position.len() != 16 || digest.len() != RECORD_DIGEST_HEX_LEN {
            return None;
        }
        u64::from_str_radix(position, 16).ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Signing identity used for ledger appends
///
/// Each signer has its own sequence (nonce) counter on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignerId(String);

impl SignerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owning account of an event, resolved by the caller's auth layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_address_is_deterministic() {
        let a = ContentAddress::from_content(b"metadata");
        let b = ContentAddress::from_content(b"metadata");
        let c = ContentAddress::from_content(b"other metadata");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.is_well_formed());
        assert!(a.matches(b"metadata"));
        assert!(!a.matches(b"tampered"));
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_malformed_address() {
        assert!(!ContentAddress::new("../../etc/passwd").is_well_formed());
        assert!(!ContentAddress::new("ABCD").is_well_formed());
        assert_eq!(ContentAddress::new("ab").short(), "ab");
    }

    #[test]
    fn test_record_id_orders_by_position() {
        let digest = blake3::hash(b"x");
        let first = RecordId::assign(9, &digest);
        let second = RecordId::assign(10, &digest);
        let later = RecordId::assign(0x1_0000, &digest);

        assert!(first < second);
        assert!(second < later);
        assert_eq!(first.position(), Some(9));
        assert_eq!(later.position(), Some(0x1_0000));
    }

    #[test]
    fn test_foreign_record_id_has_no_position() {
        assert_eq!(RecordId::new("0xdeadbeef").position(), None);
        assert_eq!(RecordId::from("nothing-here").position(), None);
    }
}
