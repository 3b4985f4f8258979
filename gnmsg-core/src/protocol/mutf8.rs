//! Modified UTF-8 codec.
//!
//! Strings on the wire use the JVM "modified UTF-8" form:
//!
//! ```text
//! U+0000            C0 80                     (overlong, never a raw 00)
//! U+10000..U+10FFFF ED Ax xx ED Bx xx         (surrogate pair, 3 bytes each)
//! everything else   same as standard UTF-8
//! ```
//!
//! [`to_standard`] and [`to_modified`] convert between the two byte forms;
//! [`decode_string`] goes straight to a Rust `String`.

use crate::error::DecodeError;

/// Convert modified UTF-8 bytes to standard UTF-8 bytes.
///
/// Sequences other than surrogate pairs and `C0 80` pass through unchanged,
/// so invalid input stays invalid and is caught by the caller's UTF-8 check.
pub fn to_standard(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == 0xC0 && input.get(i + 1) == Some(&0x80) {
            out.push(0);
            i += 2;
            continue;
        }
        if is_high_surrogate(&input[i..]) && is_low_surrogate(&input[(i + 3).min(input.len())..]) {
            let high = surrogate_value(&input[i..i + 3]);
            let low = surrogate_value(&input[i + 3..i + 6]);
            let cp = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            out.extend_from_slice(&[
                0xF0 | (cp >> 18) as u8,
                0x80 | ((cp >> 12) & 0x3F) as u8,
                0x80 | ((cp >> 6) & 0x3F) as u8,
                0x80 | (cp & 0x3F) as u8,
            ]);
            i += 6;
            continue;
        }
        out.push(b);
        i += 1;
    }
    out
}

/// Convert standard UTF-8 bytes to modified UTF-8 bytes.
pub fn to_modified(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + 4);
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == 0 {
            out.extend_from_slice(&[0xC0, 0x80]);
            i += 1;
            continue;
        }
        if let Some(v) = supplementary(&input[i..]) {
            push_surrogate(&mut out, 0xD800 + (v >> 10));
            push_surrogate(&mut out, 0xDC00 + (v & 0x3FF));
            i += 4;
            continue;
        }
        out.push(b);
        i += 1;
    }
    out
}

/// Decode modified UTF-8 into a `String`. `offset` is reported on failure.
pub fn decode_string(input: &[u8], offset: usize) -> Result<String, DecodeError> {
    String::from_utf8(to_standard(input)).map_err(|_| DecodeError::InvalidString { offset })
}

/// Offset of a well-formed 4-byte sequence above U+FFFF from 0x10000.
/// Overlong or truncated sequences yield `None` and pass through as bytes.
fn supplementary(bytes: &[u8]) -> Option<u32> {
    let [lead, rest @ ..] = bytes else {
        return None;
    };
    if lead & 0xF8 != 0xF0 || rest.len() < 3 || rest[..3].iter().any(|c| c & 0xC0 != 0x80) {
        return None;
    }
    let cp = (u32::from(lead & 0x07) << 18)
        | (u32::from(rest[0] & 0x3F) << 12)
        | (u32::from(rest[1] & 0x3F) << 6)
        | u32::from(rest[2] & 0x3F);
    if cp > 0x10FFFF {
        return None;
    }
    cp.checked_sub(0x10000)
}

fn is_high_surrogate(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0] == 0xED && (0xA0..=0xAF).contains(&bytes[1])
}

fn is_low_surrogate(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0] == 0xED && (0xB0..=0xBF).contains(&bytes[1])
}

fn surrogate_value(bytes: &[u8]) -> u32 {
    (u32::from(bytes[0] & 0x0F) << 12) | (u32::from(bytes[1] & 0x3F) << 6) | u32::from(bytes[2] & 0x3F)
}

fn push_surrogate(out: &mut Vec<u8>, unit: u32) {
    out.extend_from_slice(&[
        0xE0 | ((unit >> 12) & 0x0F) as u8,
        0x80 | ((unit >> 6) & 0x3F) as u8,
        0x80 | (unit & 0x3F) as u8,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    // U+1F600 as a surrogate pair D83D DE00
    const MODIFIED_EMOJI: [u8; 6] = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];

    #[test]
    fn test_ascii_passes_through() {
        assert_eq!(to_standard(b"region1"), b"region1".to_vec());
        assert_eq!(to_modified(b"region1"), b"region1".to_vec());
    }

    #[test]
    fn test_nul_decodes_to_zero_byte() {
        assert_eq!(to_standard(&[b'a', 0xC0, 0x80, b'b']), vec![b'a', 0, b'b']);
    }

    #[test]
    fn test_surrogate_pair_fuses() {
        assert_eq!(to_standard(&MODIFIED_EMOJI), "😀".as_bytes().to_vec());
        assert_eq!(decode_string(&MODIFIED_EMOJI, 0).unwrap(), "😀");
    }

    #[test]
    fn test_lone_surrogate_passes_through() {
        let lone = [0xED, 0xA0, 0xBD, b'x'];
        assert_eq!(to_standard(&lone), lone.to_vec());
        assert!(decode_string(&lone, 7).is_err());
    }

    #[test]
    fn test_bmp_three_byte_unchanged() {
        let euro = "€".as_bytes();
        assert_eq!(to_standard(euro), euro.to_vec());
        assert_eq!(to_modified(euro), euro.to_vec());
    }

    #[test]
    fn test_overlong_four_byte_passes_through() {
        let overlong = [0xF0, 0x80, 0x80, 0x80];
        assert_eq!(to_modified(&overlong), overlong.to_vec());

        let bad_continuation = [0xF0, 0x9F, b'a', 0x80];
        assert_eq!(to_modified(&bad_continuation), bad_continuation.to_vec());

        let truncated = [b'x', 0xF0, 0x9F];
        assert_eq!(to_modified(&truncated), truncated.to_vec());
    }

    #[test]
    fn test_supplementary_becomes_surrogate_pair() {
        assert_eq!(to_modified("😀".as_bytes()), MODIFIED_EMOJI.to_vec());
    }

    #[test]
    fn test_round_trip() {
        let mut modified = b"key".to_vec();
        modified.extend_from_slice(&[0xC0, 0x80]);
        modified.extend_from_slice(&MODIFIED_EMOJI);
        modified.extend_from_slice("é".as_bytes());

        let standard = to_standard(&modified);
        assert_eq!(
            String::from_utf8(standard.clone()).unwrap(),
            "key\u{0}😀é"
        );
        assert_eq!(to_modified(&standard), modified);
    }
}
