// piece_manager.rs
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::config::VerifierConfig;
use crate::file_io::PayloadStream;
use crate::torrent::Torrent;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("expected {expected} sources, got {actual}")]
    SourceCountMismatch { expected: usize, actual: usize },

    #[error("read failed at piece {piece}: {source}")]
    Io {
        piece: usize,
        #[source]
        source: io::Error,
    },

    #[error("cancelled before piece {piece}")]
    Cancelled { piece: usize },
}

impl VerifyError {
    /// Whether running the verifier again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VerifyError::Io { .. } | VerifyError::Cancelled { .. })
    }
}

/// Outcome of one complete verification run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifySummary {
    pub pieces_checked: usize,
    pub valid_pieces: usize,
    pub invalid_pieces: usize,
    pub valid_bytes: u64,
}

/// Hashes every piece of a torrent's payload and records the results in
/// the torrent's validity map.
#[derive(Debug, Clone, Default)]
pub struct PieceVerifier {
    config: VerifierConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl PieceVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Stops the run at the next piece boundary once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Verifies all pieces, reading `sources` as one stream in file order.
    ///
    /// `sources[i]` must hold the bytes of `torrent.files()[i]`. Pieces may
    /// span any number of sources. `on_piece` is called with
    /// `(index, valid)` after each piece, in ascending index order.
    ///
    /// On error the results recorded before the failing piece are kept.
    pub fn verify<R: Read>(
        &self,
        torrent: &mut Torrent,
        sources: &mut [R],
        mut on_piece: Option<&mut dyn FnMut(usize, bool)>,
    ) -> Result<VerifySummary, VerifyError> {
        let piece_length = torrent.piece_length();
        if piece_length == 0 {
            return Err(VerifyError::Configuration(
                "piece length must be positive".to_string(),
            ));
        }
        if sources.len() != torrent.files().len() {
            return Err(VerifyError::SourceCountMismatch {
                expected: torrent.files().len(),
                actual: sources.len(),
            });
        }

        let total = torrent.total_size();
        let piece_count = torrent.piece_count();
        let lengths = torrent.files().iter().map(|file| file.length).collect();
        let mut stream = PayloadStream::new(sources, lengths);
        let mut summary = VerifySummary::default();

        info!("verifying {} pieces of {}", piece_count, torrent.name());

        for index in 0..piece_count {
            if self.is_cancelled() {
                info!("verification of {} cancelled at piece {}", torrent.name(), index);
                return Err(VerifyError::Cancelled { piece: index });
            }

            let size = torrent.piece_size(index, total);
            let digest = hash_next_piece(&mut stream, size).map_err(|source| {
                warn!("piece {} of {}: {}", index, torrent.name(), source);
                VerifyError::Io { piece: index, source }
            })?;

            let valid = digest == torrent.info.pieces[index];
            torrent.validity.set(index, valid);

            summary.pieces_checked += 1;
            if valid {
                summary.valid_pieces += 1;
                summary.valid_bytes += size;
            } else {
                summary.invalid_pieces += 1;
            }
            debug!("piece {} ({} bytes) valid: {}", index, size, valid);

            if let Some(callback) = on_piece.as_deref_mut() {
                callback(index, valid);
            }

            let interval = self.config.progress_interval;
            if interval > 0 && (index + 1) % interval == 0 {
                info!(
                    "Progress: {}/{} pieces ({:.1}%)",
                    index + 1,
                    piece_count,
                    (index + 1) as f64 / piece_count as f64 * 100.0
                );
            }
        }

        info!(
            "{}: {} valid, {} invalid of {} pieces",
            torrent.name(),
            summary.valid_pieces,
            summary.invalid_pieces,
            piece_count
        );
        Ok(summary)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}

/// Hashes the next `size` bytes of the payload.
fn hash_next_piece<R: Read>(stream: &mut R, size: u64) -> io::Result<[u8; 20]> {
    let mut hasher = Sha1::new();
    let copied = io::copy(&mut stream.by_ref().take(size), &mut hasher)?;
    if copied != size {
        return Err(io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("payload ended {} bytes short of the piece", size - copied),
        ));
    }
    Ok(hasher.finalize().into())
}

/// Verifies the SHA-1 hash of the piece against the expected hash.
pub fn verify_piece(piece_data: &[u8], expected_hash: &[u8; 20]) -> bool {
    let actual: [u8; 20] = Sha1::digest(piece_data).into();
    actual == *expected_hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn sha1(data: &[u8]) -> [u8; 20] {
        Sha1::digest(data).into()
    }

    /// Multi-file torrent over `files`, with piece digests computed from `payload`.
    fn torrent_for(files: &[&[u8]], piece_length: usize, payload: &[u8]) -> Torrent {
        let mut info = b"d5:filesl".to_vec();
        for (i, file) in files.iter().enumerate() {
            info.extend_from_slice(format!("d6:lengthi{}e4:pathl1:{}ee", file.len(), i).as_bytes());
        }
        let digests: Vec<u8> = payload.chunks(piece_length).flat_map(sha1).collect();
        info.extend_from_slice(
            format!("e4:name1:t12:piece lengthi{}e6:pieces{}:", piece_length, digests.len()).as_bytes(),
        );
        info.extend_from_slice(&digests);

        let mut buf = b"d4:info".to_vec();
        buf.extend_from_slice(&info);
        buf.extend_from_slice(b"ee");
        Torrent::from_bytes(&buf).unwrap()
    }

    fn cursors(files: &[&[u8]]) -> Vec<Cursor<Vec<u8>>> {
        files.iter().map(|f| Cursor::new(f.to_vec())).collect()
    }

    #[test]
    fn test_verify_piece() {
        let data = b"Hello, World!";
        assert!(verify_piece(data, &sha1(data)));
        assert!(!verify_piece(data, &[0u8; 20]));
        assert!(verify_piece(b"", &sha1(b"")));
    }

    #[test]
    fn test_pieces_straddle_file_boundary() {
        init_logger();
        let a: &[u8] = &[1u8; 10];
        let b: &[u8] = &[2u8; 20];
        let payload = [a, b].concat();
        let mut torrent = torrent_for(&[a, b], 16, &payload);
        assert_eq!(torrent.piece_count(), 2);

        let mut seen = Vec::new();
        let mut callback = |index: usize, valid: bool| seen.push((index, valid));
        let summary = PieceVerifier::default()
            .verify(&mut torrent, &mut cursors(&[a, b]), Some(&mut callback))
            .unwrap();

        assert_eq!(seen, vec![(0, true), (1, true)]);
        assert_eq!(
            summary,
            VerifySummary { pieces_checked: 2, valid_pieces: 2, invalid_pieces: 0, valid_bytes: 30 }
        );
        assert_eq!(torrent.validity().len(), 2);
        assert_eq!(torrent.valid_bytes(), 30);
        assert_eq!(torrent.completion_percent(), 100.0);
    }

    #[test]
    fn test_corrupt_byte_fails_only_its_piece() {
        let a: &[u8] = &[1u8; 10];
        let b: &[u8] = &[2u8; 20];
        let payload = [a, b].concat();
        let mut torrent = torrent_for(&[a, b], 16, &payload);

        let mut damaged = b.to_vec();
        damaged[19] ^= 0xff;
        let summary = PieceVerifier::default()
            .verify(&mut torrent, &mut cursors(&[a, &damaged]), None)
            .unwrap();

        assert_eq!(torrent.validity().get(0), Some(true));
        assert_eq!(torrent.validity().get(1), Some(false));
        assert_eq!(summary.invalid_pieces, 1);
        assert_eq!(torrent.valid_bytes(), 16);
        assert_eq!(torrent.left_bytes(), 14);
    }

    #[test]
    fn test_rerun_overwrites_previous_results() {
        let a: &[u8] = b"0123456789abcdef0123";
        let mut torrent = torrent_for(&[a], 8, a);

        let bad = vec![0u8; a.len()];
        PieceVerifier::default().verify(&mut torrent, &mut cursors(&[&bad]), None).unwrap();
        assert_eq!(torrent.invalid_piece_count(), 3);

        PieceVerifier::default().verify(&mut torrent, &mut cursors(&[a]), None).unwrap();
        assert_eq!(torrent.validity().len(), 3);
        assert_eq!((torrent.valid_piece_count(), torrent.invalid_piece_count()), (3, 0));
    }

    #[test]
    fn test_short_source_keeps_earlier_results() {
        let a: &[u8] = &[7u8; 40];
        let mut torrent = torrent_for(&[a], 16, a);

        let mut sources = vec![Cursor::new(vec![7u8; 20])];
        let err = PieceVerifier::default().verify(&mut torrent, &mut sources, None).unwrap_err();

        assert!(matches!(err, VerifyError::Io { piece: 1, .. }));
        assert!(err.is_retryable());
        assert_eq!(torrent.validity().get(0), Some(true));
        assert_eq!(torrent.validity().get(1), None);
        assert_eq!(torrent.validity().len(), 1);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "disconnected"))
        }
    }

    #[test]
    fn test_read_failure_is_io_error() {
        let a: &[u8] = &[1u8; 4];
        let mut torrent = torrent_for(&[a], 16, a);
        let err = PieceVerifier::default()
            .verify(&mut torrent, &mut [FailingReader], None)
            .unwrap_err();

        match err {
            VerifyError::Io { piece, source } => {
                assert_eq!(piece, 0);
                assert_eq!(source.kind(), ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(torrent.validity().is_empty());
    }

    #[test]
    fn test_zero_piece_length_is_configuration_error() {
        let a: &[u8] = &[1u8; 4];
        let mut torrent = torrent_for(&[a], 16, a);
        torrent.info.piece_length = 0;

        let err = PieceVerifier::default()
            .verify(&mut torrent, &mut cursors(&[a]), None)
            .unwrap_err();
        assert!(matches!(err, VerifyError::Configuration(_)));
        assert!(!err.is_retryable());
        assert!(torrent.validity().is_empty());
    }

    #[test]
    fn test_source_count_mismatch() {
        let a: &[u8] = &[1u8; 4];
        let mut torrent = torrent_for(&[a, a], 16, &[a, a].concat());
        let err = PieceVerifier::default()
            .verify(&mut torrent, &mut cursors(&[a]), None)
            .unwrap_err();
        assert!(matches!(err, VerifyError::SourceCountMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_cancel_at_piece_boundary() {
        let a: &[u8] = &[3u8; 64];
        let mut torrent = torrent_for(&[a], 16, a);

        let flag = Arc::new(AtomicBool::new(false));
        let verifier = PieceVerifier::default().with_cancel_flag(flag.clone());
        let mut callback = |index: usize, _valid: bool| {
            if index == 1 {
                flag.store(true, Ordering::SeqCst);
            }
        };
        let err = verifier
            .verify(&mut torrent, &mut cursors(&[a]), Some(&mut callback))
            .unwrap_err();

        assert!(matches!(err, VerifyError::Cancelled { piece: 2 }));
        assert_eq!(torrent.validity().len(), 2);
    }

    #[test]
    fn test_progress_logging_interval() {
        init_logger();
        let a: &[u8] = &[5u8; 100];
        let mut torrent = torrent_for(&[a], 10, a);
        let verifier = PieceVerifier::new(VerifierConfig { progress_interval: 3 });
        let summary = verifier.verify(&mut torrent, &mut cursors(&[a]), None).unwrap();
        assert_eq!(summary.valid_pieces, 10);
        assert!(torrent.is_complete());
    }
}
