use std::{fs, path::{Component, Path, PathBuf}};

use log::{info, warn};

use crate::bencode::{decode_with, encode_dict, BDict, BValue};
use crate::config::Config;
use crate::progress::PieceValidityMap;
use crate::torrent::{calculate_info_hash, InfoHash, TorrentError};

/// A parsed v1 .torrent file.
///
/// Everything except the piece validity map is fixed at construction.
#[derive(Debug, Clone)]
pub struct Torrent {
    pub(crate) announce: Option<String>,
    pub(crate) announce_list: Vec<Vec<String>>,
    pub(crate) comment: Option<String>,
    pub(crate) created_by: Option<String>,
    pub(crate) creation_date: Option<i64>,
    pub(crate) info: TorrentInfo,
    pub(crate) info_hash: InfoHash,
    // kept verbatim so the info hash can always be reproduced
    pub(crate) info_dict: BDict,
    pub(crate) validity: PieceValidityMap,
}

/// Payload layout taken from the info dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentInfo {
    pub(crate) name: String,
    pub(crate) piece_length: u64,
    pub(crate) pieces: Vec<[u8; 20]>,
    pub(crate) is_multi_file: bool,
    pub(crate) files: Vec<FileEntry>,
    pub(crate) private: bool,
}

/// One file of the payload. Entries are kept in the order the info
/// dictionary lists them, which is also their order in the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub path_segments: Vec<String>,
    pub length: u64,
    /// Position of the file's first byte in the concatenated payload.
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaVersion {
    V1,
    V2,
}

impl Torrent {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TorrentError> {
        Self::from_bytes_with(bytes, &Config::default())
    }

    pub fn from_bytes_with(bytes: &[u8], config: &Config) -> Result<Self, TorrentError> {
        let bvalue = decode_with(bytes, &config.decoder)?;
        Self::from_bvalue(bvalue)
    }

    /// Reads a .torrent file from disk and parses it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TorrentError> {
        Self::from_file_with(path, &Config::default())
    }

    pub fn from_file_with<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self, TorrentError> {
        let buf = fs::read(path)?;
        Self::from_bytes_with(&buf, config)
    }

    /// Creates a `Torrent` from an already decoded top-level value.
    pub fn from_bvalue(value: BValue) -> Result<Self, TorrentError> {
        let mut root_dict = match value {
            BValue::Dict(m) => m,
            _ => return Err(TorrentError::MissingField("info")),
        };

        let info_dict = match root_dict.remove(b"info".as_slice()) {
            Some(BValue::Dict(dict)) => dict,
            _ => return Err(TorrentError::MissingField("info")),
        };

        let info = TorrentInfo::from_bvalue(&info_dict)?;
        let info_hash = calculate_info_hash(&info_dict);

        let torrent = Torrent {
            announce: optional_string(&root_dict, "announce"),
            announce_list: announce_tiers(&root_dict),
            comment: optional_string(&root_dict, "comment"),
            created_by: optional_string(&root_dict, "created by"),
            creation_date: optional_integer(&root_dict, "creation date"),
            info,
            info_hash,
            info_dict,
            validity: PieceValidityMap::new(),
        };

        let expected = torrent.expected_piece_count();
        if expected != torrent.piece_count() as u64 {
            warn!(
                "{}: {} piece digests for {} bytes, layout needs {}",
                torrent.info.name,
                torrent.piece_count(),
                torrent.total_size(),
                expected
            );
        }

        info!(
            "parsed torrent {} ({}): {} files, {} bytes, {} pieces",
            torrent.info.name,
            torrent.info_hash,
            torrent.info.files.len(),
            torrent.total_size(),
            torrent.piece_count()
        );
        Ok(torrent)
    }

    pub fn announce(&self) -> Option<&str> {
        self.announce.as_deref()
    }

    pub fn announce_list(&self) -> &[Vec<String>] {
        &self.announce_list
    }

    /// Primary tracker followed by every announce-list entry, without repeats.
    pub fn trackers(&self) -> Vec<String> {
        let mut trackers: Vec<String> = Vec::new();
        let all = self.announce.iter().chain(self.announce_list.iter().flatten());
        for url in all {
            if !trackers.contains(url) {
                trackers.push(url.clone());
            }
        }
        trackers
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn creation_date(&self) -> Option<i64> {
        self.creation_date
    }

    pub fn info(&self) -> &TorrentInfo {
        &self.info
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// The info dictionary exactly as decoded.
    pub fn info_dict(&self) -> &BDict {
        &self.info_dict
    }

    /// Canonical encoding of the info dictionary; its SHA-1 is the info hash.
    pub fn info_bytes(&self) -> Vec<u8> {
        encode_dict(&self.info_dict)
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn piece_length(&self) -> u64 {
        self.info.piece_length
    }

    pub fn piece_digests(&self) -> &[[u8; 20]] {
        &self.info.pieces
    }

    pub fn is_multi_file(&self) -> bool {
        self.info.is_multi_file
    }

    pub fn is_private(&self) -> bool {
        self.info.private
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.info.files
    }

    pub fn validity(&self) -> &PieceValidityMap {
        &self.validity
    }
}

impl TorrentInfo {
    pub fn from_bvalue(info_dict: &BDict) -> Result<Self, TorrentError> {
        match detect_version(info_dict) {
            Some(MetaVersion::V1) => {}
            Some(MetaVersion::V2) => {
                warn!("rejecting merkle-tree torrent (file tree present)");
                return Err(TorrentError::UnsupportedVersion);
            }
            None => return Err(TorrentError::UnknownVersion),
        }

        let piece_length = match info_dict.get(b"piece length".as_slice()) {
            Some(BValue::Integer(n)) if *n > 0 => *n as u64,
            Some(other) => {
                return Err(TorrentError::Configuration(format!(
                    "'piece length' must be a positive integer, got {:?}",
                    other
                )))
            }
            None => return Err(TorrentError::Configuration("'piece length' is missing".to_string())),
        };

        let pieces_bytes = lookup_bytestring(info_dict, "pieces")?;
        if pieces_bytes.len() % 20 != 0 {
            return Err(TorrentError::CorruptPieceTable(pieces_bytes.len()));
        }

        // Chunk the pieces bytes into 20-byte pieces.
        let pieces = pieces_bytes
            .chunks_exact(20)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let name = get_bytestring(info_dict, "name")?;
        check_path_segment("name", &name)?;

        if info_dict.contains_key(b"files".as_slice()) && info_dict.contains_key(b"length".as_slice()) {
            return Err(TorrentError::InvalidField(
                "info has both 'files' and 'length'".to_string(),
            ));
        }

        let files = match info_dict.get(b"files".as_slice()) {
            Some(BValue::List(entries)) => multi_file_entries(&name, entries)?,
            Some(_) => return Err(TorrentError::InvalidField("'files' must be a List".to_string())),
            None => {
                let length = get_length(info_dict)?;
                vec![FileEntry {
                    path: PathBuf::from(&name),
                    path_segments: Vec::new(),
                    length,
                    offset: 0,
                }]
            }
        };

        Ok(TorrentInfo {
            is_multi_file: info_dict.contains_key(b"files".as_slice()),
            private: optional_integer(info_dict, "private") == Some(1),
            name,
            piece_length,
            pieces,
            files,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn piece_length(&self) -> u64 {
        self.piece_length
    }

    pub fn pieces(&self) -> &[[u8; 20]] {
        &self.pieces
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }
}

fn detect_version(info_dict: &BDict) -> Option<MetaVersion> {
    if info_dict.contains_key(b"file tree".as_slice()) {
        Some(MetaVersion::V2)
    } else if info_dict.contains_key(b"pieces".as_slice()) {
        Some(MetaVersion::V1)
    } else {
        None
    }
}

fn multi_file_entries(name: &str, entries: &[BValue]) -> Result<Vec<FileEntry>, TorrentError> {
    let mut files = Vec::with_capacity(entries.len());
    let mut offset: u64 = 0;

    for entry in entries {
        let dict = entry
            .as_dict()
            .ok_or_else(|| TorrentError::InvalidField("'files' entries must be Dicts".to_string()))?;

        let length = get_length(dict)?;

        let segments = match dict.get(b"path".as_slice()) {
            Some(BValue::List(segments)) if !segments.is_empty() => segments,
            Some(_) => {
                return Err(TorrentError::InvalidField(
                    "'path' must be a non-empty List".to_string(),
                ))
            }
            None => return Err(TorrentError::MissingField("path")),
        };

        let path_segments = segments
            .iter()
            .map(|segment| {
                segment.as_str().map(str::to_string).ok_or_else(|| {
                    TorrentError::InvalidField("'path' segments must be UTF-8 strings".to_string())
                })
            })
            .collect::<Result<Vec<String>, _>>()?;
        for segment in &path_segments {
            check_path_segment("path", segment)?;
        }

        let mut path = PathBuf::from(name);
        path.extend(&path_segments);

        files.push(FileEntry {
            path,
            path_segments,
            length,
            offset,
        });

        offset = offset
            .checked_add(length)
            .ok_or_else(|| TorrentError::InvalidField("total length overflows".to_string()))?;
    }

    Ok(files)
}

// Each piece of a payload path must be one plain component, so joining
// them can never leave the torrent's own directory.
fn check_path_segment(key: &str, segment: &str) -> Result<(), TorrentError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == segment => Ok(()),
        _ => Err(TorrentError::InvalidField(format!(
            "'{}' segment {:?} is not a plain file name",
            key, segment
        ))),
    }
}

fn get_length(dict: &BDict) -> Result<u64, TorrentError> {
    let length = get_integer(dict, "length")?;
    u64::try_from(length)
        .map_err(|_| TorrentError::InvalidField(format!("'length' must not be negative, got {}", length)))
}

/// Looks up a key in the dictionary and returns a byte slice if the value is a ByteString.
pub fn lookup_bytestring<'a>(dict: &'a BDict, key: &'static str) -> Result<&'a [u8], TorrentError> {
    let val = dict
        .get(key.as_bytes())
        .ok_or(TorrentError::MissingField(key))?;

    val.as_bytes()
        .ok_or_else(|| TorrentError::InvalidField(format!("'{}' must be ByteString", key)))
}

/// Gets a ByteString from the dictionary and converts it into a UTF-8 String.
pub fn get_bytestring(dict: &BDict, key: &'static str) -> Result<String, TorrentError> {
    let bytes = lookup_bytestring(dict, key)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| TorrentError::InvalidField(format!("'{}' value not valid UTF-8", key)))
}

/// Retrieves an integer value from the dictionary.
pub fn get_integer(dict: &BDict, key: &'static str) -> Result<i64, TorrentError> {
    let val = dict
        .get(key.as_bytes())
        .ok_or(TorrentError::MissingField(key))?;

    val.as_integer()
        .ok_or_else(|| TorrentError::InvalidField(format!("'{}' must be a Number", key)))
}

// Optional metadata never fails the parse; a bad value is logged and dropped.
fn optional_string(dict: &BDict, key: &'static str) -> Option<String> {
    match get_bytestring(dict, key) {
        Ok(s) => Some(s),
        Err(TorrentError::MissingField(_)) => None,
        Err(e) => {
            warn!("ignoring {}", e);
            None
        }
    }
}

fn optional_integer(dict: &BDict, key: &'static str) -> Option<i64> {
    match get_integer(dict, key) {
        Ok(n) => Some(n),
        Err(TorrentError::MissingField(_)) => None,
        Err(e) => {
            warn!("ignoring {}", e);
            None
        }
    }
}

fn announce_tiers(dict: &BDict) -> Vec<Vec<String>> {
    let Some(tiers) = dict.get(b"announce-list".as_slice()) else {
        return Vec::new();
    };
    let Some(tiers) = tiers.as_list() else {
        warn!("ignoring invalid field: 'announce-list' must be a List");
        return Vec::new();
    };

    tiers
        .iter()
        .filter_map(|tier| {
            let urls: Vec<String> = tier
                .as_list()?
                .iter()
                .filter_map(|url| url.as_str().map(str::to_string))
                .collect();
            (!urls.is_empty()).then_some(urls)
        })
        .collect()
}
