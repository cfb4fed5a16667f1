use std::{
    fmt::{self, Write},
    hash::{Hash, Hasher},
    sync::LazyLock,
};

use itertools::Itertools;

use super::{
    casefold::{lowercase_ranges, to_lower},
    category::{Category, CategoryKind, PropertyResolver, UnsupportedProperties},
    MAX_RUNE,
};
use crate::Error;

/// A closed interval of code points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SingleRange {
    pub first: u32,
    pub last: u32,
}

impl SingleRange {
    pub fn new(first: u32, last: u32) -> SingleRange {
        SingleRange { first, last }
    }

    fn contains(&self, ch: u32) -> bool {
        self.first <= ch && ch <= self.last
    }
}

/// A character class: ranges and Unicode categories, an overall negation
/// and an optional subtracted class.
///
/// The range list is kept canonical after every mutation: sorted, with no
/// two ranges overlapping or touching. Two sets are equal when their
/// [`hash_key`](CharSet::hash_key) is.
#[derive(Debug, Clone, Default)]
pub struct CharSet {
    negate: bool,
    ranges: Vec<SingleRange>,
    categories: Vec<Category>,
    sub: Option<Box<CharSet>>,
}

pub static ANY_CLASS: LazyLock<CharSet> = LazyLock::new(|| CharSet::from_old_string(&[0x00], false));
pub static ECMA_WORD_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_old_string(ECMA_WORD_SET, false));
pub static NOT_ECMA_WORD_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_old_string(ECMA_WORD_SET, true));
pub static ECMA_SPACE_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_old_string(ECMA_SPACE_SET, false));
pub static NOT_ECMA_SPACE_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_old_string(ECMA_SPACE_SET, true));
pub static ECMA_DIGIT_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_old_string(ECMA_DIGIT_SET, false));
pub static NOT_ECMA_DIGIT_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_old_string(ECMA_DIGIT_SET, true));

pub static WORD_CLASS: LazyLock<CharSet> = LazyLock::new(|| CharSet::from_categories(false, WORD_SET));
pub static NOT_WORD_CLASS: LazyLock<CharSet> = LazyLock::new(|| CharSet::from_categories(true, WORD_SET));
pub static SPACE_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_categories(false, &[CategoryKind::Space]));
pub static NOT_SPACE_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_categories(true, &[CategoryKind::Space]));
pub static DIGIT_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_categories(false, &[CategoryKind::Unicode("Nd")]));
pub static NOT_DIGIT_CLASS: LazyLock<CharSet> =
    LazyLock::new(|| CharSet::from_categories(true, &[CategoryKind::Unicode("Nd")]));

// Range boundaries: each pair is [start, end), a trailing start runs to MAX_RUNE.
const ECMA_WORD_SET: &[u32] = &[0x30, 0x3A, 0x41, 0x5B, 0x5F, 0x60, 0x61, 0x7B, 0x130, 0x131];
const ECMA_SPACE_SET: &[u32] = &[0x09, 0x0E, 0x20, 0x21];
const ECMA_DIGIT_SET: &[u32] = &[0x30, 0x3A];

const WORD_SET: &[CategoryKind] = &[
    CategoryKind::Unicode("L"),
    CategoryKind::Unicode("Mn"),
    CategoryKind::Unicode("Nd"),
    CategoryKind::Unicode("Pc"),
];

impl CharSet {
    pub fn new() -> CharSet {
        CharSet::default()
    }

    fn from_old_string(set: &[u32], negate: bool) -> CharSet {
        let ranges = set
            .chunks(2)
            .map(|pair| SingleRange::new(pair[0], pair.get(1).map_or(MAX_RUNE, |&end| end - 1)))
            .collect();
        CharSet {
            negate,
            ranges,
            ..CharSet::default()
        }
    }

    fn from_categories(negate: bool, kinds: &[CategoryKind]) -> CharSet {
        CharSet {
            negate,
            categories: kinds.iter().map(|kind| Category::new(kind.clone(), false)).collect(),
            ..CharSet::default()
        }
    }

    pub fn ranges(&self) -> &[SingleRange] {
        &self.ranges
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn subtraction(&self) -> Option<&CharSet> {
        self.sub.as_deref()
    }

    pub fn is_negated(&self) -> bool {
        self.negate
    }

    pub fn has_subtraction(&self) -> bool {
        self.sub.is_some()
    }

    pub fn set_negate(&mut self, negate: bool) {
        self.negate = negate;
    }

    /// Whether `ch` is in the set.
    ///
    /// Ranges are tried first, then categories; the first category whose
    /// membership differs from its own negation accepts `ch`. The set-level
    /// negation applies to that combined result, and a subtracted set then
    /// removes its own members.
    pub fn char_in(&self, ch: u32) -> bool {
        let mut val = self.ranges.iter().any(|r| r.contains(ch));

        if !val {
            val = self.categories.iter().any(|cat| cat.contains(ch) != cat.negate);
        }

        if self.negate {
            val = !val;
        }

        if val {
            if let Some(sub) = &self.sub {
                val = !sub.char_in(ch);
            }
        }
        val
    }

    /// True if the set is exactly one code point.
    pub fn is_singleton(&self) -> bool {
        !self.negate && self.is_single_range_of_one()
    }

    /// True if the set is everything but one code point.
    pub fn is_singleton_inverse(&self) -> bool {
        self.negate && self.is_single_range_of_one()
    }

    fn is_single_range_of_one(&self) -> bool {
        self.categories.is_empty()
            && self.sub.is_none()
            && self.ranges.len() == 1
            && self.ranges[0].first == self.ranges[0].last
    }

    /// The code point of a singleton set.
    ///
    /// Callers must check [`is_singleton`](CharSet::is_singleton) or
    /// [`is_singleton_inverse`](CharSet::is_singleton_inverse) first. On any
    /// other set this panics in debug builds and returns the lower bound of
    /// the first range (or panics on an empty set) in release builds.
    pub fn singleton_char(&self) -> u32 {
        debug_assert!(
            self.is_single_range_of_one(),
            "singleton_char on a non-singleton set {}",
            self
        );
        self.ranges[0].first
    }

    pub fn add_char(&mut self, ch: u32) {
        self.add_range(ch, ch);
    }

    pub fn add_range(&mut self, min: u32, max: u32) {
        self.ranges.push(SingleRange::new(min, max));
        self.canonicalize();
    }

    pub fn add_ranges(&mut self, ranges: &[SingleRange]) {
        self.ranges.extend_from_slice(ranges);
        self.canonicalize();
    }

    /// Adds the ranges and categories of `set`. Its negation and subtraction
    /// are not carried over.
    pub fn add_set(&mut self, set: &CharSet) {
        self.categories.extend(set.categories.iter().cloned());
        self.add_ranges(&set.ranges);
    }

    pub fn add_subtraction(&mut self, sub: CharSet) {
        self.sub = Some(Box::new(sub));
    }

    /// Adds `\d` (`negate` for `\D`).
    ///
    /// In ECMAScript mode only the ranges of the built-in class are copied,
    /// and those are the same for `\d` and `\D`, so inside a class `\D`
    /// currently behaves like `\d`. The same holds for `\W` and `\S`.
    pub fn add_digit(&mut self, ecma: bool, negate: bool) {
        if ecma {
            let class = if negate { &NOT_ECMA_DIGIT_CLASS } else { &ECMA_DIGIT_CLASS };
            self.add_ranges(&class.ranges);
        } else {
            self.categories
                .push(Category::new(CategoryKind::Unicode("Nd"), negate));
        }
    }

    pub fn add_space(&mut self, ecma: bool, negate: bool) {
        if ecma {
            let class = if negate { &NOT_ECMA_SPACE_CLASS } else { &ECMA_SPACE_CLASS };
            self.add_ranges(&class.ranges);
        } else {
            self.categories.push(Category::new(CategoryKind::Space, negate));
        }
    }

    pub fn add_word(&mut self, ecma: bool, negate: bool) {
        if ecma {
            let class = if negate { &NOT_ECMA_WORD_CLASS } else { &ECMA_WORD_CLASS };
            self.add_ranges(&class.ranges);
        } else {
            self.categories.push(Category::new(CategoryKind::Word, negate));
        }
    }

    /// Adds the category or property `name`; names that are not general
    /// categories fail with [`Error::UnsupportedFeature`].
    pub fn add_category(
        &mut self,
        name: &str,
        negate: bool,
        case_insensitive: bool,
    ) -> Result<(), Error> {
        self.add_category_with(name, negate, case_insensitive, &UnsupportedProperties)
    }

    /// Like [`add_category`](CharSet::add_category), resolving unknown names
    /// through `resolver`.
    pub fn add_category_with(
        &mut self,
        name: &str,
        negate: bool,
        case_insensitive: bool,
        resolver: &dyn PropertyResolver,
    ) -> Result<(), Error> {
        match CategoryKind::from_property(name) {
            CategoryKind::Unicode(cat) => {
                if case_insensitive && matches!(cat, "Ll" | "Lu" | "Lt") {
                    // any case category matches all three when ignoring case
                    for case_cat in ["Ll", "Lu", "Lt"] {
                        self.categories
                            .push(Category::new(CategoryKind::Unicode(case_cat), negate));
                    }
                } else {
                    self.categories.push(Category::new(CategoryKind::Unicode(cat), negate));
                }
                self.canonicalize();
            }
            _ => {
                let set = resolver.resolve(name, negate)?;
                self.add_ranges(&set.ranges);
            }
        }
        Ok(())
    }

    /// Sorts the ranges and merges the ones that overlap or touch, leaving
    /// the unique minimal form of the set.
    pub fn canonicalize(&mut self) {
        if self.ranges.len() <= 1 {
            return;
        }
        self.ranges.sort_unstable_by_key(|r| r.first);
        // a range ending at MAX_RUNE swallows everything after it
        self.ranges = self
            .ranges
            .drain(..)
            .coalesce(|prev, cur| {
                if cur.first <= prev.last.saturating_add(1) {
                    Ok(SingleRange::new(prev.first, prev.last.max(cur.last)))
                } else {
                    Err((prev, cur))
                }
            })
            .collect();
    }

    /// Adds the lowercase form of every member, for case-insensitive matching.
    ///
    /// A single code point is replaced by its lowercase. A wider range is
    /// kept and the ranges its members lowercase to are added next to it.
    pub fn add_lowercase(&mut self) {
        let original = std::mem::take(&mut self.ranges);
        for r in original {
            if r.first == r.last {
                let lower = to_lower(r.first);
                self.ranges.push(SingleRange::new(lower, lower));
            } else {
                self.ranges.push(r);
                self.ranges.extend(
                    lowercase_ranges(r.first, r.last)
                        .into_iter()
                        .map(|(lo, hi)| SingleRange::new(lo, hi)),
                );
            }
        }
        self.canonicalize();
    }

    /// Canonical byte form: negation, ranges, categories with their
    /// negation, then the subtracted set.
    pub fn hash_key(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.map_hash_fill(&mut buf);
        buf
    }

    fn map_hash_fill(&self, buf: &mut Vec<u8>) {
        buf.push(if self.negate { 0 } else { 1 });
        buf.extend_from_slice(&(self.ranges.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.categories.len() as u32).to_le_bytes());
        for r in &self.ranges {
            buf.extend_from_slice(&r.first.to_le_bytes());
            buf.extend_from_slice(&r.last.to_le_bytes());
        }
        for cat in &self.categories {
            let key = cat.kind.key();
            buf.push(key.len() as u8);
            buf.extend_from_slice(key.as_bytes());
            buf.push(cat.negate as u8);
        }
        match &self.sub {
            Some(sub) => {
                buf.push(1);
                sub.map_hash_fill(buf);
            }
            None => buf.push(0),
        }
    }
}

impl PartialEq for CharSet {
    fn eq(&self, other: &CharSet) -> bool {
        self.hash_key() == other.hash_key()
    }
}

impl Eq for CharSet {}

impl Hash for CharSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.hash_key());
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('[')?;
        if self.negate {
            f.write_char('^')?;
        }
        for r in &self.ranges {
            f.write_str(&char_description(r.first))?;
            if r.first != r.last {
                f.write_char('-')?;
                f.write_str(&char_description(r.last))?;
            }
        }
        for cat in &self.categories {
            write!(f, "{}", cat)?;
        }
        if let Some(sub) = &self.sub {
            write!(f, "-{}", sub)?;
        }
        f.write_char(']')
    }
}

/// Human-readable form of a single code point.
pub fn char_description(ch: u32) -> String {
    match ch {
        0x5C => "\\\\".to_string(),
        0x21..=0x7E => char::from(ch as u8).to_string(),
        0x0A => "\\n".to_string(),
        0x20 => "\\ ".to_string(),
        0x00..=0xFF => format!("\\x{:02X}", ch),
        0x100..=0xFFFF => format!("\\u{:04X}", ch),
        _ => format!("\\x{{{:X}}}", ch),
    }
}

/// ASCII word characters, used by `\b` and `\B`.
pub fn is_word_char(ch: u32) -> bool {
    char::from_u32(ch).is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}
