// layout.rs
use crate::torrent::Torrent;

/// Length of piece `index` when `total_bytes` are cut into `piece_length` chunks.
///
/// Every piece is full-sized except possibly the last. Indices past the
/// last piece (and a zero piece length) give 0.
pub fn piece_size(piece_length: u64, index: u64, total_bytes: u64) -> u64 {
    if piece_length == 0 {
        return 0;
    }
    let full = total_bytes / piece_length;
    let remainder = total_bytes % piece_length;

    if index < full {
        piece_length
    } else if index == full {
        if remainder == 0 { piece_length } else { remainder }
    } else {
        0
    }
}

/// The part of one file that a piece covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSpan {
    pub file_index: usize,
    /// Offset inside the file.
    pub file_offset: u64,
    pub length: u64,
}

impl Torrent {
    pub fn total_size(&self) -> u64 {
        self.info.files.iter().map(|file| file.length).sum()
    }

    pub fn piece_count(&self) -> usize {
        self.info.pieces.len()
    }

    /// Number of pieces the file lengths call for.
    pub fn expected_piece_count(&self) -> u64 {
        if self.info.piece_length == 0 {
            return 0;
        }
        self.total_size().div_ceil(self.info.piece_length)
    }

    pub fn piece_size(&self, index: usize, total_bytes: u64) -> u64 {
        piece_size(self.info.piece_length, index as u64, total_bytes)
    }

    /// Size of piece `index` within this torrent's payload.
    pub fn piece_len(&self, index: usize) -> u64 {
        self.piece_size(index, self.total_size())
    }

    /// Payload offset of piece `index`, saturating at `u64::MAX`.
    pub fn piece_offset(&self, index: usize) -> u64 {
        (index as u64).saturating_mul(self.info.piece_length)
    }

    /// Which files, and which bytes of them, make up piece `index`.
    /// Empty for indices past the end of the payload.
    pub fn files_for_piece(&self, index: usize) -> Vec<FileSpan> {
        if index as u64 >= self.expected_piece_count() {
            return Vec::new();
        }
        let start = self.piece_offset(index);
        let end = start.saturating_add(self.piece_len(index));

        self.info
            .files
            .iter()
            .enumerate()
            .filter_map(|(file_index, file)| {
                let file_end = file.offset + file.length;
                let from = start.max(file.offset);
                let to = end.min(file_end);
                (from < to).then(|| FileSpan {
                    file_index,
                    file_offset: from - file.offset,
                    length: to - from,
                })
            })
            .collect()
    }
}
