/// Percent-encodes arbitrary bytes, keeping only the RFC 3986 "unreserved"
/// characters. Info hashes are raw bytes, not UTF-8, so every other byte
/// becomes `%XX`.
///
/// This will produce uppercase hex (e.g. "%3A" not "%3a").
pub fn url_encode_bytes(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        if is_unreserved(b) {
            // "Safe" character: add as-is
            encoded.push(b as char);
        } else {
            // Percent-encode everything else as %XX
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    encoded
}

/// Defines which characters should remain unencoded. For standard "unreserved"
/// = ALPHA / DIGIT / "-" / "." / "_" / "~"
/// https://datatracker.ietf.org/doc/html/rfc3986
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'-' | b'_' | b'~')
}
