//! Charset-normalization heuristic for binlog row-image payloads.
//!
//! A column value arrives from the replication stream as a raw byte buffer
//! whose actual encoding (UTF-8, UTF-16LE, UTF-32BE) depends on the source
//! column's charset and is not reliably recoverable from metadata alone.
//! `decode` applies a priority heuristic rather than a single authoritative
//! decode. It is intentionally only ever called on byte-valued binlog
//! fields, never on values that are already typed as strings -- applying it
//! to an already-decoded `String` would make the UTF-32 density check fire
//! on text that merely happens to contain many ASCII-range bytes.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Text(String),
    Raw(Vec<u8>),
}

/// Priority: UTF-8 fast path -> UTF-32BE by null-byte density -> UTF-16LE
/// -> raw bytes. Never fails; an ambiguous or invalid buffer falls through
/// to the next step rather than erroring.
pub fn decode(bytes: &[u8]) -> Decoded {
    if bytes.is_empty() {
        return Decoded::Text(String::new());
    }
    if is_utf8_fast_path(bytes) {
        return Decoded::Text(
            std::str::from_utf8(bytes)
                .expect("validated by is_utf8_fast_path")
                .to_string(),
        );
    }
    if let Some(s) = try_decode_utf32be(bytes) {
        return Decoded::Text(s);
    }
    if let Some(s) = try_decode_utf16le(bytes) {
        return Decoded::Text(s);
    }
    Decoded::Raw(bytes.to_vec())
}

fn null_density(bytes: &[u8], window: usize) -> f64 {
    let slice = &bytes[..bytes.len().min(window)];
    if slice.is_empty() {
        return 0.0;
    }
    let nulls = slice.iter().filter(|&&b| b == 0).count();
    nulls as f64 / slice.len() as f64
}

fn is_utf8_fast_path(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok() && null_density(bytes, 100) < 0.10
}

fn try_decode_utf32be(bytes: &[u8]) -> Option<String> {
    let len = bytes.len();
    if len == 0 || len % 4 != 0 {
        return None;
    }
    if null_density(bytes, 64) <= 0.25 {
        return None;
    }

    let mut out = String::new();
    let mut produced = 0usize;
    for chunk in bytes.chunks_exact(4) {
        let cp = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if cp == 0 {
            break; // null code point terminates the string
        }
        if cp > 0x10FFFF || (0xD800..=0xDFFF).contains(&cp) {
            return None;
        }
        let c = char::from_u32(cp)?;
        out.push(c);
        produced += 1;
    }

    (produced > 0).then_some(out)
}

fn try_decode_utf16le(bytes: &[u8]) -> Option<String> {
    let len = bytes.len();
    if len == 0 || len % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_short_ascii_as_utf8_fast_path() {
        let s = "hello world, this is ascii text under 64 bytes";
        match decode(s.as_bytes()) {
            Decoded::Text(t) => assert_eq!(t, s),
            Decoded::Raw(_) => panic!("expected UTF-8 fast path"),
        }
    }

    #[test]
    fn utf32be_with_trailing_null_truncates() {
        // "Hi" followed by a null code point and padding garbage.
        let mut bytes = vec![0, 0, 0, b'H', 0, 0, 0, b'i', 0, 0, 0, 0];
        bytes.extend_from_slice(&[0, 0, 0, 0]); // trailing garbage after terminator
        match decode(&bytes) {
            Decoded::Text(t) => assert_eq!(t, "Hi"),
            Decoded::Raw(_) => panic!("expected UTF-32BE decode"),
        }
    }

    #[test]
    fn utf32be_without_terminator_decodes_fully() {
        let bytes = vec![0, 0, 0, b'H', 0, 0, 0, b'i'];
        match decode(&bytes) {
            Decoded::Text(t) => assert_eq!(t, "Hi"),
            Decoded::Raw(_) => panic!("expected UTF-32BE decode"),
        }
    }

    #[test]
    fn utf16le_ascii_round_trips() {
        let original = "abcxyz";
        let mut bytes = Vec::new();
        for unit in original.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        // Not valid UTF-8 (interleaved nulls), not a multiple of 4 with
        // sufficient null density for UTF-32 (6 chars -> 12 bytes, density
        // over the 64-byte window is 50% but 12 % 4 == 0 too; UTF-32BE
        // would try first and fail validation because many code points
        // would exceed the ascii range or include nulls as separators).
        match decode(&bytes) {
            Decoded::Text(t) => assert_eq!(t, original),
            Decoded::Raw(_) => panic!("expected UTF-16LE decode"),
        }
    }

    #[test]
    fn unrecognized_buffer_returned_unchanged() {
        // Odd length, not valid UTF-8, not a multiple of 4 or 2.
        let bytes = vec![0xff, 0x00, 0xfe];
        match decode(&bytes) {
            Decoded::Raw(raw) => assert_eq!(raw, bytes),
            Decoded::Text(_) => panic!("expected raw fallback"),
        }
    }
}
