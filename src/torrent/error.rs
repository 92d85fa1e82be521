use thiserror::Error;

use crate::bencode::BencodeError;

/// Reasons a buffer could not be turned into a [`Torrent`](super::Torrent).
#[derive(Debug, Error)]
pub enum TorrentError {
    /// The buffer is not valid bencode.
    #[error("bencode error: {0}")]
    Format(#[from] BencodeError),

    /// A required key is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A key is present but has the wrong type or an out-of-range value.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// `pieces` is not a whole number of 20-byte digests.
    #[error("piece table of {0} bytes is not a multiple of 20")]
    CorruptPieceTable(usize),

    /// The info dictionary uses the merkle-tree (`file tree`) layout.
    #[error("unsupported torrent version (file tree)")]
    UnsupportedVersion,

    /// The info dictionary has neither `pieces` nor `file tree`.
    #[error("unknown torrent version")]
    UnknownVersion,

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TorrentError {
    /// Only reading the torrent file itself can succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TorrentError::Io(_))
    }
}
