use std::{sync::Arc, thread};

use binexp::{CharSet, Error, PropertyResolver, Regex, RegexOptions, ScanLimits};

fn first(pattern: &str, options: RegexOptions, text: &str) -> Option<(usize, usize)> {
    Regex::new(pattern, options)
        .unwrap()
        .find_text_match_starting_at(text, 0)
        .unwrap()
        .map(|m| (m.index(), m.length()))
}

#[test]
fn offset_equal_to_length_is_no_match() {
    for pattern in ["a", "", "x*", "^", "$"] {
        let re = Regex::new(pattern, RegexOptions::NONE).unwrap();
        assert!(re.find_bytes_match_starting_at(b"abc", 3).unwrap().is_none(), "{}", pattern);
        assert!(re.find_text_match_starting_at("abc", 3).unwrap().is_none(), "{}", pattern);
    }
}

#[test]
fn empty_input_never_matches() {
    for pattern in ["", "a*", "^$", "\\z"] {
        let re = Regex::new(pattern, RegexOptions::NONE).unwrap();
        assert!(!re.is_match_bytes(b"").unwrap(), "{}", pattern);
        assert!(!re.is_match_text("").unwrap(), "{}", pattern);
    }
}

#[test]
fn offset_past_the_end_is_an_error() {
    let re = Regex::new("a", RegexOptions::NONE).unwrap();
    assert_eq!(
        re.find_bytes_match_starting_at(b"abc", 4).unwrap_err(),
        Error::InvalidOffset { offset: 4, len: 3 }
    );
    // the regex is still usable afterwards
    assert!(re.is_match_bytes(b"abc").unwrap());
}

#[test]
fn zero_length_matches_advance() {
    let re = Regex::new("b*", RegexOptions::NONE).unwrap();
    let spans: Vec<(usize, usize)> = re
        .find_text_iter("abba")
        .map(|m| m.map(|m| (m.index(), m.length())).unwrap())
        .collect();
    assert_eq!(spans, vec![(0, 0), (1, 2), (3, 0)]);

    let overlapping: Vec<usize> = re
        .find_text_iter("abba")
        .overlapping()
        .map(|m| m.unwrap().index())
        .collect();
    assert_eq!(overlapping, vec![0, 1, 2, 3]);
}

#[test]
fn leftmost_match_wins() {
    assert_eq!(first("b+|ab", RegexOptions::NONE, "xabbb"), Some((1, 2)));
    assert_eq!(first("ab|b+", RegexOptions::NONE, "xbbab"), Some((1, 2)));
}

#[test]
fn offsets_count_code_points_in_text_mode() {
    let re = Regex::new("ж+", RegexOptions::NONE).unwrap();
    let m = re.find_text_match_starting_at("ѣѣжжa", 0).unwrap().unwrap();
    assert_eq!((m.index(), m.length()), (2, 2));
    assert_eq!(m.as_text().as_deref(), Some("жж"));

    let m = re.find_bytes_match_starting_at("ѣѣжжa".as_bytes(), 0).unwrap();
    assert!(m.is_none());
}

#[test]
fn ignore_case() {
    let ci = RegexOptions::IGNORE_CASE;
    assert_eq!(first("hello", ci, "say HeLLo"), Some((4, 5)));
    assert_eq!(first("[А-Я]+", ci, "12 привет"), Some((3, 6)));
    assert_eq!(first("\\p{Lu}", ci, "123a"), Some((3, 1)));
    assert_eq!(first("\\p{Lu}", RegexOptions::NONE, "123a"), None);
    assert_eq!(first("ΣΑ", ci, "xσα"), Some((1, 2)));
}

#[test]
fn ignore_case_class_members_match_themselves() {
    let ci = RegexOptions::IGNORE_CASE;
    assert_eq!(first("[Ѐ-Я]", ci, "Ѐ"), Some((0, 1)));
    assert_eq!(first("[\\u10A0-\\u10C5]", ci, "\u{10A0}"), Some((0, 1)));
    assert_eq!(first("[\\u0370-\\u0373]", ci, "\u{0370}"), Some((0, 1)));
    for ch in (0x0400..=0x042F).chain(0x10A0..=0x10C5).chain(0x1E00..=0x1EFF) {
        let Some(ch) = char::from_u32(ch) else { continue };
        let text = ch.to_string();
        assert_eq!(first(&format!("[{}]", ch), ci, &text), Some((0, 1)), "U+{:04X}", ch as u32);
        assert_eq!(first(&text, ci, &text), Some((0, 1)), "U+{:04X}", ch as u32);
    }
}

#[test]
fn class_subtraction() {
    let consonant = "[a-z-[aeiou]]+";
    assert_eq!(first(consonant, RegexOptions::NONE, "aestrong"), Some((2, 3)));
    let nested = "[a-z-[aeiou-[e]]]+";
    assert_eq!(first(nested, RegexOptions::NONE, "aaeb"), Some((2, 2)));
}

#[test]
fn unicode_classes() {
    assert_eq!(first("\\d+", RegexOptions::NONE, "x٣٤5"), Some((1, 3)));
    assert_eq!(first("\\d+", RegexOptions::ECMASCRIPT, "x٣٤5"), Some((3, 1)));
    assert_eq!(first("\\w+", RegexOptions::NONE, "--héllo_1--"), Some((2, 7)));
    assert_eq!(first("\\s", RegexOptions::NONE, "a\u{3000}b"), Some((1, 1)));
    assert_eq!(first("\\p{Nd}\\P{Nd}", RegexOptions::NONE, "12a"), Some((1, 2)));
}

#[test]
fn unknown_property_fails_loudly() {
    let err = Regex::new("\\p{IsGreek}", RegexOptions::NONE).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature(_)));
    let err = Regex::new("[\\P{IsGreek}]", RegexOptions::NONE).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature(_)));
}

struct Greek;

impl PropertyResolver for Greek {
    fn resolve(&self, name: &str, _negate: bool) -> Result<CharSet, Error> {
        if name != "IsGreek" {
            return Err(Error::UnsupportedFeature(name.to_string()));
        }
        let mut set = CharSet::new();
        set.add_range(0x370, 0x3FF);
        Ok(set)
    }
}

#[test]
fn custom_property_resolver() {
    let re = Regex::with_resolver("\\p{IsGreek}+", RegexOptions::NONE, &Greek).unwrap();
    let m = re.find_text_match_starting_at("abc αβγ", 0).unwrap().unwrap();
    assert_eq!((m.index(), m.length()), (4, 3));
    assert!(Regex::with_resolver("\\p{IsCoptic}", RegexOptions::NONE, &Greek).is_err());
}

#[test]
fn syntax_errors() {
    for pattern in ["(", ")", "a**", "[b-a]", "x{3,1}", "*", "\\", "[abc", "(a|)+"] {
        match Regex::new(pattern, RegexOptions::NONE) {
            Err(Error::InvalidRegex(_, _)) => {}
            other => panic!("{:?} compiled to {:?}", pattern, other.map(|_| ())),
        }
    }
}

#[test]
fn pathological_patterns_hit_the_step_budget() {
    let re = Regex::new("(a|a)*b", RegexOptions::NONE)
        .unwrap()
        .with_limits(ScanLimits {
            max_steps: 100_000,
            ..ScanLimits::default()
        });
    let input = "a".repeat(64);
    assert_eq!(re.is_match_text(&input), Err(Error::BacktrackLimit(100_000)));
}

#[test]
fn deep_repetition_hits_the_depth_budget() {
    let re = Regex::new("(ab)+c", RegexOptions::NONE)
        .unwrap()
        .with_limits(ScanLimits {
            max_depth: 50,
            ..ScanLimits::default()
        });
    let input = "ab".repeat(200);
    assert_eq!(re.is_match_text(&input), Err(Error::RecursionLimit(50)));
    // shallow inputs still work under the same limits
    assert_eq!(re.is_match_text("ababc"), Ok(true));
}

#[test]
fn long_inputs_fit_the_default_limits() {
    let re = Regex::new("(ab)+", RegexOptions::NONE).unwrap();
    let text = "ab".repeat(50_000);
    let m = re.find_text_match_starting_at(&text, 0).unwrap().unwrap();
    assert_eq!((m.index(), m.length()), (0, 100_000));

    let re = Regex::new(b"(?:\x90\x90)+\xc3", RegexOptions::BYTE_RUNES).unwrap();
    let mut blob = vec![0x90u8; 64 * 1024];
    blob.push(0xc3);
    let m = re.find_bytes_match_starting_at(&blob, 0).unwrap().unwrap();
    assert_eq!((m.index(), m.length()), (0, blob.len()));
}

#[test]
fn shared_across_threads() {
    let re = Arc::new(Regex::new(b"\xca[\x00-\xff]{2}", RegexOptions::BYTE_RUNES).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let re = Arc::clone(&re);
            thread::spawn(move || {
                let mut blob = vec![0u8; i * 10];
                blob.extend_from_slice(b"\xca\x01\x02");
                re.find_bytes_match_starting_at(&blob, 0)
                    .unwrap()
                    .map(|m| m.index())
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Some(i * 10));
    }
}
