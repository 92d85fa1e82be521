// infohash.rs
use std::fmt;

use crate::bencode::{encode_dict, BDict};
use crate::utils::url_encode_bytes;

use sha1::{Digest, Sha1};

/// SHA-1 of the canonical encoding of an info dictionary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    pub fn new(bytes: [u8; 20]) -> Self {
        InfoHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Percent-encoded form used in tracker query strings.
    pub fn url_encoded(&self) -> String {
        url_encode_bytes(&self.0)
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl AsRef<[u8]> for InfoHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

pub fn calculate_info_hash(info: &BDict) -> InfoHash {
    let encoded = encode_dict(info);

    let mut hasher = Sha1::new();
    hasher.update(&encoded);
    InfoHash(hasher.finalize().into())
}
