use thiserror::Error;

/// Malformed bencode input. Every variant is a format error: the bytes
/// are not a valid (or not an acceptable) bencoded value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
	#[error("Unexpected end of input")]
	UnexpectedEnd,

	#[error("Invalid Integer {0}")]
	InvalidInteger(String),

	#[error("Invalid Format {0}")]
	InvalidFormat(String),

	#[error("Nesting deeper than {0} levels")]
	NestingTooDeep(usize),

	#[error("Duplicate dictionary key {0:?}")]
	DuplicateKey(String),

	#[error("{0} trailing bytes after value")]
	TrailingData(usize),
}
