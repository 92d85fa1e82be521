// src/file_io.rs
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;

use log::{debug, warn};

use crate::torrent::Torrent;

/// Opens every payload file of `torrent` under `base_dir` for reading.
///
/// The files must already exist; nothing is created, resized or renamed.
pub fn open_sources<P: AsRef<Path>>(base_dir: P, torrent: &Torrent) -> io::Result<Vec<File>> {
	let base_dir = base_dir.as_ref();
	let mut sources = Vec::with_capacity(torrent.files().len());

	for entry in torrent.files() {
		let path = base_dir.join(&entry.path);
		let file = File::open(&path)?;

		let on_disk = file.metadata()?.len();
		if on_disk != entry.length {
			warn!(
				"{} is {} bytes, torrent expects {}",
				path.display(),
				on_disk,
				entry.length
			);
		}
		debug!("opened {}", path.display());
		sources.push(file);
	}

	Ok(sources)
}

/// Reads a run of sources back to back as one continuous payload.
///
/// Each source contributes exactly its declared length; bytes past that
/// are never read. A source that ends early is an `UnexpectedEof` error
/// rather than a silent shift of every later byte.
pub struct PayloadStream<'a, R> {
	sources: &'a mut [R],
	lengths: Vec<u64>,
	current: usize,
	remaining: u64,
}

impl<'a, R: Read> PayloadStream<'a, R> {
	pub fn new(sources: &'a mut [R], lengths: Vec<u64>) -> Self {
		let remaining = if sources.is_empty() {
			0
		} else {
			lengths.first().copied().unwrap_or(0)
		};
		Self {
			sources,
			lengths,
			current: 0,
			remaining,
		}
	}

	/// Index of the source the next byte will come from.
	pub fn current_source(&self) -> usize {
		self.current
	}
}

impl<R: Read> Read for PayloadStream<'_, R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		while self.remaining == 0 {
			if self.current + 1 >= self.lengths.len().min(self.sources.len()) {
				return Ok(0);
			}
			self.current += 1;
			self.remaining = self.lengths[self.current];
		}
		if buf.is_empty() {
			return Ok(0);
		}

		let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
		let read = self.sources[self.current].read(&mut buf[..want])?;
		if read == 0 {
			return Err(io::Error::new(
				ErrorKind::UnexpectedEof,
				format!(
					"source {} ended {} bytes before its declared length",
					self.current, self.remaining
				),
			));
		}

		self.remaining -= read as u64;
		Ok(read)
	}
}
