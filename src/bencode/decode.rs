use super::bvalue::{BDict, BValue};
use super::error::BencodeError;
use crate::config::DecoderConfig;

/// Decodes a complete bencoded buffer with the default limits.
pub fn decode(input: &[u8]) -> Result<BValue, BencodeError> {
	decode_with(input, &DecoderConfig::default())
}

/// Decodes a complete bencoded buffer.
///
/// Bytes left over after the top-level value are an error unless
/// `config.reject_trailing_data` is off.
pub fn decode_with(input: &[u8], config: &DecoderConfig) -> Result<BValue, BencodeError> {
	let (consumed, value) = decode_prefix(input, config)?;
	if config.reject_trailing_data && consumed != input.len() {
		return Err(BencodeError::TrailingData(input.len() - consumed));
	}
	Ok(value)
}

/// Decodes one value from the front of `input`, returning how many bytes it used.
pub fn decode_prefix(input: &[u8], config: &DecoderConfig) -> Result<(usize, BValue), BencodeError> {
	decode_value(input, config, 0)
}

fn decode_value(
	input: &[u8],
	config: &DecoderConfig,
	depth: usize,
) -> Result<(usize, BValue), BencodeError> {
	let first = *input.first().ok_or(BencodeError::UnexpectedEnd)?;

	match first {
		b'i' => decode_integer(input),
		b'l' => decode_list(input, config, enter(depth, config)?),
		b'd' => decode_dict(input, config, enter(depth, config)?),
		c if c.is_ascii_digit() => decode_string(input),
		c => Err(BencodeError::InvalidFormat(format!(
			"Unexpected byte: {}",
			c
		))),
	}
}

// `depth` counts the containers already open around the value.
fn enter(depth: usize, config: &DecoderConfig) -> Result<usize, BencodeError> {
	let nested = depth + 1;
	if nested > config.max_depth {
		return Err(BencodeError::NestingTooDeep(config.max_depth));
	}
	Ok(nested)
}

/// Decodes a Bencoded integer of the form `i<digits>e`.
fn decode_integer(input: &[u8]) -> Result<(usize, BValue), BencodeError> {
	let end_pos = input
		.iter()
		.position(|&b| b == b'e')
		.ok_or(BencodeError::UnexpectedEnd)?;

	let body = &input[1..end_pos];
	let digits = body.strip_prefix(b"-").unwrap_or(body);

	if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
		return Err(BencodeError::InvalidInteger(format!(
			"Not a decimal number: {:?}",
			String::from_utf8_lossy(body)
		)));
	}

	// Only the literal `0` may start with a zero; that also rules out `-0`.
	if digits[0] == b'0' && (digits.len() > 1 || digits.len() != body.len()) {
		return Err(BencodeError::InvalidInteger(format!(
			"Leading zeros are not allowed: {}",
			String::from_utf8_lossy(body)
		)));
	}

	// body is ASCII at this point
	let num_str = std::str::from_utf8(body)
		.map_err(|_| BencodeError::InvalidInteger("Non-ASCII data in integer".to_string()))?;

	let parsed = num_str.parse::<i64>().map_err(|e| {
		BencodeError::InvalidInteger(format!("Failed to parse integer '{}': {}", num_str, e))
	})?;

	// add 1 to account for 'e'
	Ok((end_pos + 1, BValue::Integer(parsed)))
}

/// Decodes a Bencoded string of the form `<length>:<bytes>`.
fn decode_string(encoded: &[u8]) -> Result<(usize, BValue), BencodeError> {
	let (consumed, data) = split_string(encoded)?;
	Ok((consumed, BValue::ByteString(data.to_vec())))
}

fn split_string(encoded: &[u8]) -> Result<(usize, &[u8]), BencodeError> {
	let colon_index = encoded
		.iter()
		.position(|b| !b.is_ascii_digit())
		.ok_or(BencodeError::UnexpectedEnd)?;

	if encoded[colon_index] != b':' {
		return Err(BencodeError::InvalidFormat(format!(
			"Expected ':' after string length, found byte {}",
			encoded[colon_index]
		)));
	}

	let str_length = std::str::from_utf8(&encoded[..colon_index])
		.map_err(|e| BencodeError::InvalidFormat(format!("Invalid string length: {}", e)))?;

	let length = str_length.parse::<usize>().map_err(|e| {
		BencodeError::InvalidFormat(format!("Invalid String Length:{} err: {}", str_length, e))
	})?;

	let start_data = colon_index + 1;
	let end_data = start_data
		.checked_add(length)
		.ok_or(BencodeError::UnexpectedEnd)?;

	if end_data > encoded.len() {
		return Err(BencodeError::UnexpectedEnd);
	}

	Ok((end_data, &encoded[start_data..end_data]))
}

/// Decodes a Bencoded list of the form `l<items>e`.
fn decode_list(
	encoded: &[u8],
	config: &DecoderConfig,
	depth: usize,
) -> Result<(usize, BValue), BencodeError> {
	let mut idx = 1; // skip 'l'
	let mut items = Vec::new();

	while idx < encoded.len() && encoded[idx] != b'e' {
		let (consumed, val) = decode_value(&encoded[idx..], config, depth)?;
		idx += consumed;
		items.push(val);
	}

	// If we've run out of input, the list is unclosed
	if idx >= encoded.len() {
		return Err(BencodeError::UnexpectedEnd);
	}

	// add 1 to account for 'e'
	Ok((idx + 1, BValue::List(items)))
}

/// Decodes a Bencoded dictionary of the form `d<key><value>...e`.
fn decode_dict(
	encoded: &[u8],
	config: &DecoderConfig,
	depth: usize,
) -> Result<(usize, BValue), BencodeError> {
	let mut idx = 1; // skip 'd'
	let mut map = BDict::new();

	while idx < encoded.len() && encoded[idx] != b'e' {
		if !encoded[idx].is_ascii_digit() {
			return Err(BencodeError::InvalidFormat(
				"Dict key must be a ByteString".to_string(),
			));
		}

		let (key_length, key) = split_string(&encoded[idx..])?;
		let key = key.to_vec();
		idx += key_length;

		let (consumed_val, value) = decode_value(&encoded[idx..], config, depth)?;
		idx += consumed_val;

		if config.reject_duplicate_keys && map.contains_key(&key) {
			return Err(BencodeError::DuplicateKey(
				String::from_utf8_lossy(&key).into_owned(),
			));
		}
		map.insert(key, value);
	}

	if idx >= encoded.len() {
		return Err(BencodeError::UnexpectedEnd);
	}

	// add 1 to account for 'e'
	Ok((idx + 1, BValue::Dict(map)))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bytes(s: &str) -> BValue {
		BValue::ByteString(s.as_bytes().to_vec())
	}

	#[test]
	fn test_decode_integer() {
		assert_eq!(decode(b"i42e").unwrap(), BValue::Integer(42));
		assert_eq!(decode(b"i-5e").unwrap(), BValue::Integer(-5));
		assert_eq!(decode(b"i0e").unwrap(), BValue::Integer(0));
	}

	#[test]
	fn test_decode_integer_limits() {
		assert_eq!(
			decode(b"i9223372036854775807e").unwrap(),
			BValue::Integer(i64::MAX)
		);
		assert_eq!(
			decode(b"i-9223372036854775808e").unwrap(),
			BValue::Integer(i64::MIN)
		);
		assert!(matches!(
			decode(b"i9223372036854775808e"),
			Err(BencodeError::InvalidInteger(_))
		));
	}

	#[test]
	fn test_decode_integer_rejects_bad_syntax() {
		let cases: [&[u8]; 8] = [b"i-0e", b"i04e", b"i-04e", b"ie", b"i-e", b"i1x2e", b"i+3e", b"i 3e"];
		for input in cases {
			assert!(
				matches!(decode(input), Err(BencodeError::InvalidInteger(_))),
				"{:?} should be rejected",
				String::from_utf8_lossy(input)
			);
		}
	}

	#[test]
	fn test_decode_integer_missing_e() {
		assert_eq!(decode(b"i42"), Err(BencodeError::UnexpectedEnd));
	}

	#[test]
	fn test_decode_string() {
		assert_eq!(decode(b"5:hello").unwrap(), bytes("hello"));
		assert_eq!(decode(b"0:").unwrap(), bytes(""));
	}

	#[test]
	fn test_decode_string_keeps_raw_bytes() {
		let value = decode(b"3:\x00\xff:").unwrap();
		assert_eq!(value, BValue::ByteString(vec![0x00, 0xff, b':']));
	}

	#[test]
	fn test_decode_string_length_with_leading_zero() {
		assert_eq!(decode(b"03:abc").unwrap(), bytes("abc"));
	}

	#[test]
	fn test_decode_string_truncated() {
		assert_eq!(decode(b"4:ab"), Err(BencodeError::UnexpectedEnd));
		assert_eq!(decode(b"12"), Err(BencodeError::UnexpectedEnd));
	}

	#[test]
	fn test_decode_string_missing_colon() {
		assert!(matches!(decode(b"5hello"), Err(BencodeError::InvalidFormat(_))));
	}

	#[test]
	fn test_decode_list() {
		assert_eq!(
			decode(b"l4:spami42ee").unwrap(),
			BValue::List(vec![bytes("spam"), BValue::Integer(42)])
		);
		assert_eq!(
			decode(b"l4:spaml3:eggi3eee").unwrap(),
			BValue::List(vec![
				bytes("spam"),
				BValue::List(vec![bytes("egg"), BValue::Integer(3)]),
			])
		);
	}

	#[test]
	fn test_decode_dict() {
		let value = decode(b"d3:bar4:spam3:fooi42ee").unwrap();
		let mut expected = BDict::new();
		expected.insert(b"bar".to_vec(), bytes("spam"));
		expected.insert(b"foo".to_vec(), BValue::Integer(42));
		assert_eq!(value, BValue::Dict(expected));

		assert_eq!(decode(b"de").unwrap(), BValue::Dict(BDict::new()));
	}

	#[test]
	fn test_decode_dict_accepts_unsorted_keys() {
		let value = decode(b"d3:fooi1e3:bari2ee").unwrap();
		assert_eq!(value.get(b"foo"), Some(&BValue::Integer(1)));
		assert_eq!(value.get(b"bar"), Some(&BValue::Integer(2)));
	}

	#[test]
	fn test_decode_unclosed_containers() {
		assert_eq!(decode(b"l4:spam"), Err(BencodeError::UnexpectedEnd));
		assert_eq!(decode(b"d3:foo4:spam"), Err(BencodeError::UnexpectedEnd));
		assert_eq!(decode(b"d"), Err(BencodeError::UnexpectedEnd));
		assert_eq!(decode(b""), Err(BencodeError::UnexpectedEnd));
	}

	#[test]
	fn test_decode_dict_key_not_string() {
		assert!(matches!(decode(b"di42e4:spame"), Err(BencodeError::InvalidFormat(_))));
	}

	#[test]
	fn test_decode_dict_missing_value() {
		assert_eq!(decode(b"d3:fooe"), Err(BencodeError::InvalidFormat("Unexpected byte: 101".to_string())));
	}

	#[test]
	fn test_duplicate_keys() {
		let input = b"d3:fooi1e3:fooi2ee";
		assert_eq!(decode(input), Err(BencodeError::DuplicateKey("foo".to_string())));

		let permissive = DecoderConfig {
			reject_duplicate_keys: false,
			..DecoderConfig::default()
		};
		let value = decode_with(input, &permissive).unwrap();
		assert_eq!(value.get(b"foo"), Some(&BValue::Integer(2)));
	}

	#[test]
	fn test_trailing_data() {
		assert_eq!(decode(b"i1ei2e"), Err(BencodeError::TrailingData(3)));

		let config = DecoderConfig::default();
		let (consumed, value) = decode_prefix(b"i1ei2e", &config).unwrap();
		assert_eq!(consumed, 3);
		assert_eq!(value, BValue::Integer(1));
	}

	#[test]
	fn test_nesting_limit() {
		let config = DecoderConfig {
			max_depth: 3,
			..DecoderConfig::default()
		};
		assert!(decode_with(b"llleee", &config).is_ok());
		assert_eq!(
			decode_with(b"lllleeee", &config),
			Err(BencodeError::NestingTooDeep(3))
		);
		assert_eq!(
			decode_with(b"d1:ad1:bd1:cd1:di1eeeee", &config),
			Err(BencodeError::NestingTooDeep(3))
		);
	}

	#[test]
	fn test_deep_nesting_does_not_overflow_stack() {
		let mut input = vec![b'l'; 1_000_000];
		input.extend(std::iter::repeat(b'e').take(1_000_000));
		assert_eq!(decode(&input), Err(BencodeError::NestingTooDeep(64)));
	}

	#[test]
	fn test_unexpected_leading_byte() {
		assert!(matches!(decode(b"x"), Err(BencodeError::InvalidFormat(_))));
	}
}
