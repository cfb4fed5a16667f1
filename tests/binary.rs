use binexp::{Regex, RegexOptions, SymbolMode};

const OPCODES: &[u8] = b"\x65\xff\x15\xef\x65\x15\xcd\x50\x65\xff\x15\x25";
const BLOB: &[u8] = b"\x65\xca\x05\xf4\x65\xca\xaf\xca\x65\xff\x15\x25";

fn text_index(re: &Regex, input: &[u8], start: usize) -> Option<(usize, usize)> {
    re.find_text_match_starting_at(input, start)
        .unwrap()
        .map(|m| (m.index(), m.length()))
}

fn byte_index(re: &Regex, input: &[u8], start: usize) -> Option<(usize, usize)> {
    re.find_bytes_match_starting_at(input, start)
        .unwrap()
        .map(|m| (m.index(), m.length()))
}

#[test]
fn invalid_bytes_are_single_symbols_in_text_mode() {
    let re = Regex::new(b"\x65\xff\x15", RegexOptions::NONE).unwrap();
    assert_eq!(text_index(&re, OPCODES, 0), Some((0, 3)));
    assert_eq!(text_index(&re, OPCODES, 1), Some((8, 3)));
    assert_eq!(text_index(&re, OPCODES, 8), Some((8, 3)));
    assert_eq!(text_index(&re, OPCODES, 9), None);
    // the pattern's middle symbol is U+FFFD, which no single byte equals
    assert_eq!(byte_index(&re, OPCODES, 0), None);
    assert!(!re.is_match_bytes(OPCODES).unwrap());
}

#[test]
fn default_mode_pattern_misses_raw_bytes() {
    let re = Regex::new(b"\xca[\x00-\xff]{2}", RegexOptions::NONE).unwrap();
    assert_eq!(byte_index(&re, BLOB, 1), None);
}

#[test]
fn byte_runes_pattern_finds_raw_bytes() {
    let re = Regex::new(b"\xca[\x00-\xff]{2}", RegexOptions::BYTE_RUNES).unwrap();
    assert_eq!(byte_index(&re, BLOB, 1), Some((1, 3)));
    assert_eq!(byte_index(&re, BLOB, 2), Some((5, 3)));
    assert_eq!(byte_index(&re, BLOB, 6), Some((7, 3)));
    // decoded text has U+FFFD where the raw pattern wants 0xCA
    assert_eq!(text_index(&re, BLOB, 1), None);
}

#[test]
fn non_overlapping_resume() {
    let re = Regex::new(b"\xca[\x00-\xff]{2}", RegexOptions::BYTE_RUNES).unwrap();
    let mut found = Vec::new();
    let mut current = re.find_bytes_match_starting_at(BLOB, 0).unwrap();
    while let Some(m) = current {
        assert_eq!(m.mode(), SymbolMode::RawByte);
        found.push(m.index());
        current = re.find_next_match(&m).unwrap();
    }
    assert_eq!(found, vec![1, 5]);
}

#[test]
fn overlapping_resume() {
    let re = Regex::new(b"\xca[\x00-\xff]{2}", RegexOptions::BYTE_RUNES).unwrap();
    let mut found = Vec::new();
    let mut current = re.find_bytes_match_starting_at(BLOB, 0).unwrap();
    while let Some(m) = current {
        found.push(m.index());
        current = re.find_next_overlapping_match(&m).unwrap();
    }
    assert_eq!(found, vec![1, 5, 7]);

    let indexes: Vec<usize> = re
        .find_bytes_iter(BLOB)
        .overlapping()
        .map(|m| m.unwrap().index())
        .collect();
    assert_eq!(indexes, vec![1, 5, 7]);
}

#[test]
fn matched_bytes_are_borrowed_from_the_input() {
    let re = Regex::new(b"\xca[\x00-\xff]{2}", RegexOptions::BYTE_RUNES).unwrap();
    let m = re.find_bytes_match_starting_at(BLOB, 0).unwrap().unwrap();
    assert_eq!(m.as_bytes(), Some(&b"\xca\x05\xf4"[..]));
    assert_eq!(m.range(), 1..4);
}

#[test]
fn opcode_sequences() {
    // call rel32 followed by ret, anywhere in a blob
    let re = Regex::new(b"\xe8[\x00-\xff]{4}\xc3", RegexOptions::BYTE_RUNES).unwrap();
    let code = b"\x90\x90\xe8\x10\x00\x00\x00\xc3\x90";
    assert_eq!(byte_index(&re, code, 0), Some((2, 6)));

    // a NOP sled of at least four bytes
    let re = Regex::new(b"\x90{4,}", RegexOptions::BYTE_RUNES).unwrap();
    assert_eq!(byte_index(&re, b"\x00\x90\x90\x90\x90\x90\xcc", 0), Some((1, 5)));
    assert_eq!(byte_index(&re, b"\x90\x90\x90\xcc", 0), None);

    // escapes in the pattern text name bytes too
    let re = Regex::new(r"\x0f\x05", RegexOptions::BYTE_RUNES).unwrap();
    assert_eq!(byte_index(&re, b"\x48\x0f\x05", 0), Some((1, 2)));
}

#[test]
fn escaped_byte_ranges_work_without_byte_runes() {
    let re = Regex::new(r"\xca[\x00-\xff]{2}", RegexOptions::NONE).unwrap();
    assert_eq!(byte_index(&re, BLOB, 0), Some((1, 3)));
}
