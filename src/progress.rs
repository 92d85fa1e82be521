use std::collections::BTreeMap;

use crate::torrent::Torrent;

/// Per-piece verification results. A piece with no entry has not been checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PieceValidityMap {
    pieces: BTreeMap<usize, bool>,
}

impl PieceValidityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.pieces.get(&index).copied()
    }

    /// Records a result, replacing whatever an earlier run stored.
    pub fn set(&mut self, index: usize, valid: bool) {
        self.pieces.insert(index, valid);
    }

    pub fn clear(&mut self) {
        self.pieces.clear();
    }

    /// Number of pieces with a recorded result.
    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Recorded results in ascending piece order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.pieces.iter().map(|(&index, &valid)| (index, valid))
    }

    pub fn valid_count(&self) -> usize {
        self.pieces.values().filter(|&&valid| valid).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.pieces.values().filter(|&&valid| !valid).count()
    }
}

impl Torrent {
    /// Bytes covered by pieces recorded as valid.
    pub fn valid_bytes(&self) -> u64 {
        let total = self.total_size();
        self.validity
            .iter()
            .filter(|&(_, valid)| valid)
            .map(|(index, _)| self.piece_size(index, total))
            .sum()
    }

    pub fn left_bytes(&self) -> u64 {
        self.total_size().saturating_sub(self.valid_bytes())
    }

    /// Share of the payload verified so far, 0.0 to 100.0.
    pub fn completion_percent(&self) -> f64 {
        let total = self.total_size();
        if total == 0 {
            return 0.0;
        }
        100.0 * self.valid_bytes() as f64 / total as f64
    }

    pub fn valid_piece_count(&self) -> usize {
        self.validity.valid_count()
    }

    pub fn invalid_piece_count(&self) -> usize {
        self.validity.invalid_count()
    }

    /// True once every piece has been recorded as valid.
    pub fn is_complete(&self) -> bool {
        self.valid_piece_count() == self.piece_count()
    }
}
