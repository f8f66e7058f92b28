//! Content identifiers.
//!
//! A [`Cid`] wraps a SHA-256 digest behind a small multihash-style prefix
//! (`0x12` = sha2-256, followed by the digest length) and renders as a
//! lower-case, unpadded base32 string prefixed with `b` — the same shape as
//! a real CIDv1, without pulling in the full `cid`/`multihash` crate stack.

use std::fmt;
use std::str::FromStr;

use data_encoding::BASE32_NOPAD;

const SHA2_256_CODE: u8 = 0x12;
const DIGEST_LEN: u8 = 32;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    /// `[multihash-code, length, digest...]`
    bytes: Vec<u8>,
}

impl Cid {
    /// Wrap a raw 32-byte SHA-256 digest as a `Cid`.
    pub fn from_sha256(digest: [u8; 32]) -> Self {
        let mut bytes = Vec::with_capacity(2 + 32);
        bytes.push(SHA2_256_CODE);
        bytes.push(DIGEST_LEN);
        bytes.extend_from_slice(&digest);
        Self { bytes }
    }

    /// The raw 32-byte digest, stripped of the multihash prefix.
    pub fn digest(&self) -> &[u8] {
        &self.bytes[2..]
    }

    pub fn as_multihash_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lower-case base32 (RFC4648, no padding) with a `b` multibase prefix.
    pub fn to_encoded(&self) -> String {
        format!("b{}", BASE32_NOPAD.encode(&self.bytes).to_lowercase())
    }

    /// Parse a `Cid` from its encoded string form. Returns `None` if the
    /// string is not a well-formed CID (wrong prefix, bad base32, wrong
    /// digest length, unsupported multihash code).
    pub fn parse(s: &str) -> Option<Self> {
        let body = s.strip_prefix('b')?;
        let bytes = BASE32_NOPAD.decode(body.to_uppercase().as_bytes()).ok()?;
        if bytes.len() != 2 + DIGEST_LEN as usize {
            return None;
        }
        if bytes[0] != SHA2_256_CODE || bytes[1] != DIGEST_LEN {
            return None;
        }
        Some(Self { bytes })
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_encoded())
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.to_encoded();
        write!(f, "Cid({}…)", &s[..s.len().min(12)])
    }
}

impl FromStr for Cid {
    type Err = CidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::parse(s).ok_or(CidParseError)
    }
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("invalid CID string")]
pub struct CidParseError;

impl serde::Serialize for Cid {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_encoded())
    }
}

impl<'de> serde::Deserialize<'de> for Cid {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Cid::parse(&s).ok_or_else(|| serde::de::Error::custom("invalid CID string"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encoded_string() {
        let cid = Cid::from_sha256([7u8; 32]);
        let encoded = cid.to_encoded();
        assert_eq!(Cid::parse(&encoded).as_ref(), Some(&cid));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Cid::parse("not-a-cid").is_none());
        assert!(Cid::parse("bnotbase32!!!").is_none());
    }

    #[test]
    fn encoded_form_is_lower_case() {
        let cid = Cid::from_sha256([255u8; 32]);
        let s = cid.to_encoded();
        assert_eq!(s, s.to_lowercase());
        assert!(s.starts_with('b'));
    }
}
