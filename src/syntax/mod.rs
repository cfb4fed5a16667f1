//! Pattern-side building blocks: compile options, character classes,
//! Unicode categories and case folding.

use bitflags::bitflags;

pub mod casefold;
pub mod category;
pub mod charclass;

pub use category::{PropertyResolver, UnsupportedProperties};
pub use charclass::CharSet;

/// Largest code point a range may reach.
pub const MAX_RUNE: u32 = char::MAX as u32;

/// Symbol substituted for every byte that is not part of valid UTF-8.
pub const REPLACEMENT: char = char::REPLACEMENT_CHARACTER;

bitflags! {
    /// Options fixed at compile time.
    #[derive(Default)]
    pub struct RegexOptions: u16 {
        const NONE        = 0;
        /// Compare lowercased symbols.
        const IGNORE_CASE = 0x0001;
        /// `^` and `$` also match next to `\n`.
        const MULTILINE   = 0x0002;
        /// `.` also matches `\n`.
        const SINGLELINE  = 0x0010;
        /// `\d`, `\w` and `\s` use the ECMAScript ranges instead of Unicode categories.
        const ECMASCRIPT  = 0x0100;
        /// Every byte of the pattern is one symbol in 0x00..=0xFF, so `b"\xca"`
        /// means the byte 0xCA and not an invalid UTF-8 unit.
        const BYTE_RUNES  = 0x1000;
    }
}

/// Decodes `bytes` as UTF-8. Every byte that is not part of a valid sequence
/// becomes its own U+FFFD, so each one is still a position a scan can stop at.
pub fn decode_runes(bytes: &[u8]) -> Vec<char> {
    let mut runes = Vec::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        runes.extend(chunk.valid().chars());
        runes.extend(chunk.invalid().iter().map(|_| REPLACEMENT));
    }
    runes
}

/// Splits pattern text into the symbols the parser reads.
pub(crate) fn pattern_symbols(pattern: &[u8], options: RegexOptions) -> Vec<char> {
    if options.contains(RegexOptions::BYTE_RUNES) {
        pattern.iter().map(|&b| char::from(b)).collect()
    } else {
        decode_runes(pattern)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_runes_substitutes_each_invalid_byte() {
        let runes = decode_runes(&[0x65, 0xff, 0x15, 0xef, 0x65, 0xcd, 0x50]);
        assert_eq!(runes, vec!['e', REPLACEMENT, '\u{15}', REPLACEMENT, 'e', REPLACEMENT, 'P']);

        // a truncated three byte sequence is two positions, not one
        assert_eq!(decode_runes(&[0xe2, 0x82, 0x41]), vec![REPLACEMENT, REPLACEMENT, 'A']);
        assert_eq!(decode_runes("ʯé".as_bytes()), vec!['ʯ', 'é']);
        assert!(decode_runes(&[]).is_empty());
    }

    #[test]
    fn test_pattern_symbols_modes() {
        let pattern = b"\xca[\x00-\xff]";
        assert_eq!(
            pattern_symbols(pattern, RegexOptions::BYTE_RUNES),
            vec!['\u{ca}', '[', '\0', '-', '\u{ff}', ']']
        );
        assert_eq!(
            pattern_symbols(pattern, RegexOptions::NONE),
            vec![REPLACEMENT, '[', '\0', '-', REPLACEMENT, ']']
        );
    }
}
