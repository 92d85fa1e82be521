// lib.rs - .torrent parsing and on-disk piece verification
//
// Decode a torrent, derive its info hash, then check prepared payload files
// against the piece digests:
//
//     let mut torrent = Torrent::from_file("example.torrent")?;
//     let mut files = open_sources("downloads", &torrent)?;
//     PieceVerifier::default().verify(&mut torrent, &mut files, None)?;
//     println!("{} {:.1}%", torrent.info_hash(), torrent.completion_percent());

pub mod bencode;
pub mod config;
pub mod file_io;
pub mod piece_manager;
pub mod progress;
pub mod torrent;
pub mod utils;

// Re-export commonly used types
pub use bencode::{decode, encode_bvalue, BDict, BValue, BencodeError};
pub use config::{Config, DecoderConfig, VerifierConfig};
pub use file_io::{open_sources, PayloadStream};
pub use piece_manager::{verify_piece, PieceVerifier, VerifyError, VerifySummary};
pub use progress::PieceValidityMap;
pub use torrent::{piece_size, FileEntry, FileSpan, InfoHash, Torrent, TorrentError, TorrentInfo};
