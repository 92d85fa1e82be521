use serde_json::{json, Value};
use super::{BDict, BValue};

/// Encode a `BValue` into its canonical bencoded form.
///
/// Dictionary keys come out in ascending unsigned byte order whatever
/// order they were inserted in, so equal trees always encode to equal bytes.
pub fn encode_bvalue(value: &BValue) -> Vec<u8> {
	let mut out: Vec<u8> = Vec::new();
	encode_into(value, &mut out);
	out
}

/// Canonical encoding of a bare dictionary.
pub fn encode_dict(dict: &BDict) -> Vec<u8> {
	let mut out: Vec<u8> = Vec::new();
	encode_dict_into(dict, &mut out);
	out
}

/// Appends the canonical encoding of `value` to `out`.
pub fn encode_into(value: &BValue, out: &mut Vec<u8>) {
	match value {
		BValue::Integer(i) => {
			out.push(b'i');
			out.extend_from_slice(i.to_string().as_bytes());
			out.push(b'e');
		}
		BValue::ByteString(bytes) => encode_bytes(bytes, out),
		BValue::List(items) => {
			out.push(b'l');
			for item in items {
				encode_into(item, out);
			}
			out.push(b'e');
		}
		BValue::Dict(dict) => encode_dict_into(dict, out),
	}
}

fn encode_dict_into(dict: &BDict, out: &mut Vec<u8>) {
	out.push(b'd');
	// BTreeMap<Vec<u8>, _> iterates in byte-lexicographic key order
	for (key, val) in dict {
		encode_bytes(key, out);
		encode_into(val, out);
	}
	out.push(b'e');
}

fn encode_bytes(bytes: &[u8], out: &mut Vec<u8>) {
	out.extend_from_slice(bytes.len().to_string().as_bytes());
	out.push(b':');
	out.extend_from_slice(bytes);
}

/// Convert a `BValue` into JSON (using Serde JSON `Value`).
///
/// - `Integer(i)` => JSON number
/// - `ByteString(bytes)` => Attempt UTF-8; if invalid, store hex in `\"_bytes_hex\"`.
/// - `List(...)` => JSON array
/// - `Dict(...)` => JSON object (keys converted lossily)
pub fn bvalue_to_json(bv: &BValue) -> Value {
	match bv {
		BValue::Integer(i) => json!(i),

		BValue::ByteString(bytes) => match std::str::from_utf8(bytes) {
			Ok(utf8_str) => Value::String(utf8_str.to_string()),
			Err(_) => json!({ "_bytes_hex": hex::encode(bytes) }),
		},

		BValue::List(list_items) => {
			Value::Array(list_items.iter().map(bvalue_to_json).collect())
		}

		BValue::Dict(map) => {
			let mut json_map = serde_json::Map::new();
			for (k, v) in map {
				json_map.insert(String::from_utf8_lossy(k).into_owned(), bvalue_to_json(v));
			}
			Value::Object(json_map)
		}
	}
}
