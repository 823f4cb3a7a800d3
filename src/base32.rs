//! Bit-addressable base32 codec for challenge and authcode text
//!
//! The alphabet drops `I`, `O`, `0` and `1` so codes survive being read
//! aloud or copied off a screen. Input is addressed in bits, MSB first, so a
//! record whose length is not a multiple of 5 bits simply zero-fills the
//! final character.
//!
//! Both directions check lengths up front and fail without touching the
//! destination.

use crate::error::CodecError;

/// Encoding alphabet (32 symbols, index = 5-bit value)
pub const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Padding character
pub const PAD_CHAR: u8 = b'=';

const BITS_PER_CHAR: usize = 5;

/// Number of characters `encode` produces for the given input.
///
/// Returns `None` if the count does not fit in a `usize`.
pub fn encoded_len(src_bits: usize, pad_chars: usize) -> Option<usize> {
    src_bits.div_ceil(BITS_PER_CHAR).checked_add(pad_chars)
}

/// Encode `src_bits` bits of `src` into `dest`, followed by `pad_chars`
/// padding characters.
///
/// Returns the number of characters written. Nothing is written on error.
pub fn encode(
    dest: &mut [u8],
    src: &[u8],
    src_bits: usize,
    pad_chars: usize,
) -> Result<usize, CodecError> {
    let available_bits = src.len().saturating_mul(8);
    if src_bits > available_bits {
        return Err(CodecError::SourceTooShort {
            needed_bits: src_bits,
            available_bits,
        });
    }

    let needed = encoded_len(src_bits, pad_chars).ok_or(CodecError::DestinationTooSmall {
        needed: usize::MAX,
        capacity: dest.len(),
    })?;
    if needed > dest.len() {
        return Err(CodecError::DestinationTooSmall {
            needed,
            capacity: dest.len(),
        });
    }

    let symbols = src_bits.div_ceil(BITS_PER_CHAR);
    for (i, out) in dest[..symbols].iter_mut().enumerate() {
        let value = read_bits(src, i * BITS_PER_CHAR, src_bits);
        *out = ALPHABET[value as usize];
    }
    dest[symbols..needed].fill(PAD_CHAR);

    Ok(needed)
}

/// Decode base32 `text` into the first `dest_bits` bits of `dest`.
///
/// Lowercase input is accepted and trailing padding is ignored. Characters
/// beyond those needed for `dest_bits` are validated but otherwise unused.
pub fn decode(dest: &mut [u8], text: &[u8], dest_bits: usize) -> Result<(), CodecError> {
    let dest_bytes = dest_bits.div_ceil(8);
    if dest_bytes > dest.len() {
        return Err(CodecError::DestinationTooSmall {
            needed: dest_bytes,
            capacity: dest.len(),
        });
    }

    let end = text
        .iter()
        .rposition(|&c| c != PAD_CHAR)
        .map_or(0, |last| last + 1);
    let symbols = &text[..end];

    let available_bits = symbols.len().saturating_mul(BITS_PER_CHAR);
    if available_bits < dest_bits {
        return Err(CodecError::SourceTooShort {
            needed_bits: dest_bits,
            available_bits,
        });
    }

    // Validate everything before writing anything.
    for &c in symbols {
        symbol_value(c)?;
    }

    dest[..dest_bytes].fill(0);
    for (i, &c) in symbols.iter().enumerate() {
        let value = symbol_value(c)?;
        for k in 0..BITS_PER_CHAR {
            let pos = i * BITS_PER_CHAR + k;
            if pos >= dest_bits {
                return Ok(());
            }
            if value & (0x10 >> k) != 0 {
                dest[pos / 8] |= 0x80 >> (pos % 8);
            }
        }
    }

    Ok(())
}

/// Read 5 bits starting at `offset`; bits at or past `limit` read as zero.
fn read_bits(src: &[u8], offset: usize, limit: usize) -> u8 {
    let mut value = 0u8;
    for k in 0..BITS_PER_CHAR {
        let pos = offset + k;
        let bit = if pos < limit {
            (src[pos / 8] >> (7 - pos % 8)) & 1
        } else {
            0
        };
        value = (value << 1) | bit;
    }
    value
}

fn symbol_value(c: u8) -> Result<u8, CodecError> {
    let upper = c.to_ascii_uppercase();
    ALPHABET
        .iter()
        .position(|&a| a == upper)
        .map(|i| i as u8)
        .ok_or(CodecError::InvalidCharacter(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_whole_bytes() {
        let mut out = [0u8; 8];
        assert_eq!(encode(&mut out, &[0x00], 8, 0), Ok(2));
        assert_eq!(&out[..2], b"AA");

        assert_eq!(encode(&mut out, &[0xff], 8, 2), Ok(4));
        assert_eq!(&out[..4], b"96==");
    }

    #[test]
    fn test_encode_partial_bits() {
        let mut out = [0u8; 4];
        // 1010 1011 1100 -> 10101 01111 00(000)
        assert_eq!(encode(&mut out, &[0xab, 0xcd], 12, 0), Ok(3));
        assert_eq!(&out[..3], b"XRA");
    }

    #[test]
    fn test_encode_zero_bits_writes_only_padding() {
        let mut out = [0u8; 1];
        assert_eq!(encode(&mut out, &[], 0, 0), Ok(0));
        assert_eq!(out, [0]);

        let mut out = [0u8; 4];
        assert_eq!(encode(&mut out, &[], 0, 3), Ok(3));
        assert_eq!(&out, b"===\0");
    }

    #[test]
    fn test_encode_destination_too_small_leaves_dest_untouched() {
        let mut out = [b'x'; 3];
        let err = encode(&mut out, &[0xde, 0xad], 16, 0).unwrap_err();
        assert_eq!(
            err,
            CodecError::DestinationTooSmall {
                needed: 4,
                capacity: 3
            }
        );
        assert_eq!(&out, b"xxx");

        // Padding counts against capacity too.
        let mut out = [b'x'; 4];
        assert!(encode(&mut out, &[0xde, 0xad], 16, 1).is_err());
        assert_eq!(&out, b"xxxx");
    }

    #[test]
    fn test_encode_rejects_short_source() {
        let mut out = [0u8; 8];
        assert_eq!(
            encode(&mut out, &[0x01], 9, 0),
            Err(CodecError::SourceTooShort {
                needed_bits: 9,
                available_bits: 8
            })
        );
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0, 0), Some(0));
        assert_eq!(encoded_len(1, 0), Some(1));
        assert_eq!(encoded_len(40, 0), Some(8));
        assert_eq!(encoded_len(360, 8), Some(80));
        assert_eq!(encoded_len(usize::MAX, usize::MAX), None);
    }

    #[test]
    fn test_decode_ignores_padding() {
        let mut out = [0u8; 1];
        decode(&mut out, b"96==", 8).unwrap();
        assert_eq!(out, [0xff]);
    }

    #[test]
    fn test_decode_inverts_encode() {
        let src = [0x12, 0x34, 0x56, 0x78, 0x9a];
        let mut text = [0u8; 10];
        let n = encode(&mut text, &src, 40, 2).unwrap();

        let mut back = [0u8; 5];
        decode(&mut back, &text[..n], 40).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let mut a = [0u8; 2];
        let mut b = [0u8; 2];
        decode(&mut a, b"XRA", 12).unwrap();
        decode(&mut b, b"xra", 12).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, [0xab, 0xc0]);
    }

    #[test]
    fn test_decode_rejects_confusable_characters() {
        let mut out = [0u8; 1];
        assert_eq!(
            decode(&mut out, b"A0", 8),
            Err(CodecError::InvalidCharacter(b'0'))
        );
        assert_eq!(
            decode(&mut out, b"IA", 8),
            Err(CodecError::InvalidCharacter(b'I'))
        );
    }

    #[test]
    fn test_decode_rejects_short_text() {
        let mut out = [0u8; 2];
        assert!(matches!(
            decode(&mut out, b"AA==", 16),
            Err(CodecError::SourceTooShort { .. })
        ));
    }
}
