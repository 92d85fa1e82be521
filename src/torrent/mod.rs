pub mod error;
pub mod infohash;
pub mod layout;
pub mod metadata;

pub use error::TorrentError;
pub use infohash::{calculate_info_hash, InfoHash};
pub use layout::{piece_size, FileSpan};
pub use metadata::{FileEntry, Torrent, TorrentInfo};
