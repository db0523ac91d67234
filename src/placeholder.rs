//! Placeholder codec (C2) — the 49-byte blob committed to Git in place of
//! binary content.
//!
//! The on-disk (and in-blob) form is exactly `git-lob: <40-hex>` with no
//! trailing newline — 49 bytes total. That exactness is load-bearing: the
//! history scanner's snapshot scan (C4) narrows candidate blobs by exact
//! object size 49 before paying for a `cat-file` round trip, so the encoded
//! form must never be 50 bytes (i.e. must not carry a trailing `\n`).
//! Diff-scan matching instead works line-by-line against `git log -p`
//! output, where the line content (sans its own delimiter) is this same
//! 49-byte string prefixed with `+` or `-`.

pub const PREFIX: &str = "git-lob: ";
pub const LINE_LEN: usize = 49;
const SHA_LEN: usize = 40;

/// Encode a 40-hex SHA-1 into the fixed-width placeholder blob content.
///
/// Returns `None` if `sha` isn't a 40-char hex string.
pub fn encode(sha: &str) -> Option<String> {
    if !is_hex_sha(sha) {
        return None;
    }
    let line = format!("{PREFIX}{}", sha.to_lowercase());
    debug_assert_eq!(line.len(), LINE_LEN);
    Some(line)
}

/// Decode placeholder blob content. Accepts only inputs of length exactly
/// 49 bytes starting with `git-lob: ` and containing a hex SHA — longer or
/// shorter inputs are never recognized.
pub fn decode(bytes: &[u8]) -> Option<String> {
    if bytes.len() != LINE_LEN {
        return None;
    }
    let text = std::str::from_utf8(bytes).ok()?;
    let sha = text.strip_prefix(PREFIX)?;
    if is_hex_sha(sha) { Some(sha.to_lowercase()) } else { None }
}

fn is_hex_sha(s: &str) -> bool {
    s.len() == SHA_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn test_encode_produces_49_bytes() {
        let line = encode(SHA).unwrap();
        assert_eq!(line.len(), 49);
        assert_eq!(line, format!("git-lob: {SHA}"));
    }

    #[test]
    fn test_decode_recognizes_encoded_line() {
        let line = encode(SHA).unwrap();
        assert_eq!(decode(line.as_bytes()).as_deref(), Some(SHA));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let mut line = encode(SHA).unwrap();
        line.push('x');
        assert_eq!(decode(line.as_bytes()), None);
        let short = &encode(SHA).unwrap()[..48];
        assert_eq!(decode(short.as_bytes()), None);
    }

    #[test]
    fn test_decode_rejects_bad_prefix() {
        let bogus = format!("GIT-LOB: {SHA}");
        assert_eq!(decode(bogus.as_bytes()), None);
    }

    #[test]
    fn test_decode_rejects_non_hex() {
        let bogus = format!("git-lob: {}", "g".repeat(40));
        assert_eq!(decode(bogus.as_bytes()), None);
    }

    #[test]
    fn test_encode_rejects_bad_sha() {
        assert!(encode("too-short").is_none());
        assert!(encode(&"a".repeat(41)).is_none());
    }

    #[test]
    fn test_decode_case_insensitive_hex() {
        let upper = SHA.to_uppercase();
        let line = format!("git-lob: {upper}");
        assert_eq!(decode(line.as_bytes()).as_deref(), Some(SHA));
    }

    proptest::proptest! {
        #[test]
        fn prop_decode_recognizes_exactly_produced_strings(
            sha in "[a-f0-9]{40}"
        ) {
            let line = encode(&sha).unwrap();
            proptest::prop_assert_eq!(decode(line.as_bytes()).as_deref(), Some(sha.as_str()));
        }

        #[test]
        fn prop_decode_rejects_non_49_byte_inputs(
            data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..80)
        ) {
            if data.len() != 49 {
                proptest::prop_assert_eq!(decode(&data), None);
            }
        }
    }
}
