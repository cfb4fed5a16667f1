//! Interval-driven lowercase mapping used for case-insensitive classes.
//!
//! Let `L` be the lowercase function on code points. To match a class
//! case-insensitively an interval `I = [min, max]` has to be mapped to a set
//! `A` with `L(I) ⊆ A ⊆ I ∪ L(I)`.
//!
//! [`LOWERCASE_TABLE`] partitions the code points that have a lowercase
//! mapping into intervals on which `L` is non-decreasing, so for any
//! `J = [a, b]` inside one entry `L(J) ⊆ [L(a), L(b)]`. On each entry `L` has
//! one of four forms ([`LowercaseOp`]), and for each of them
//! `[L(a), L(b)] ⊆ J ∪ L(J)`. Mapping the clipped bounds of every overlapping
//! entry therefore never adds a code point outside `I ∪ L(I)`.

/// How the lowercase mapping behaves on one table interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowercaseOp {
    /// `L(ch) = constant`
    Set(u32),
    /// `L(ch) = ch + offset`
    Add(i32),
    /// `L(ch) = ch | 1`
    Bor,
    /// `L(ch) = ch + (ch & 1)`
    Bad,
}

#[derive(Debug, Clone, Copy)]
pub struct LowercaseMap {
    pub min: u32,
    pub max: u32,
    pub op: LowercaseOp,
}

impl LowercaseMap {
    fn apply(&self, ch: u32) -> u32 {
        match self.op {
            LowercaseOp::Set(to) => to,
            LowercaseOp::Add(offset) => ch.wrapping_add_signed(offset),
            LowercaseOp::Bor => ch | 1,
            LowercaseOp::Bad => ch + (ch & 1),
        }
    }
}

const fn lc(min: u32, max: u32, op: LowercaseOp) -> LowercaseMap {
    LowercaseMap { min, max, op }
}

use LowercaseOp::{Add, Bad, Bor, Set};

/// Sorted by `min`, intervals pairwise disjoint.
pub static LOWERCASE_TABLE: &[LowercaseMap] = &[
    lc(0x0041, 0x005A, Add(32)),
    lc(0x00C0, 0x00DE, Add(32)),
    lc(0x0100, 0x012E, Bor),
    lc(0x0130, 0x0130, Set(0x0069)),
    lc(0x0132, 0x0136, Bor),
    lc(0x0139, 0x0147, Bad),
    lc(0x014A, 0x0176, Bor),
    lc(0x0178, 0x0178, Set(0x00FF)),
    lc(0x0179, 0x017D, Bad),
    lc(0x0181, 0x0181, Set(0x0253)),
    lc(0x0182, 0x0184, Bor),
    lc(0x0186, 0x0186, Set(0x0254)),
    lc(0x0187, 0x0187, Set(0x0188)),
    lc(0x0189, 0x018A, Add(205)),
    lc(0x018B, 0x018B, Set(0x018C)),
    lc(0x018E, 0x018E, Set(0x01DD)),
    lc(0x018F, 0x018F, Set(0x0259)),
    lc(0x0190, 0x0190, Set(0x025B)),
    lc(0x0191, 0x0191, Set(0x0192)),
    lc(0x0193, 0x0193, Set(0x0260)),
    lc(0x0194, 0x0194, Set(0x0263)),
    lc(0x0196, 0x0196, Set(0x0269)),
    lc(0x0197, 0x0197, Set(0x0268)),
    lc(0x0198, 0x0198, Set(0x0199)),
    lc(0x019C, 0x019C, Set(0x026F)),
    lc(0x019D, 0x019D, Set(0x0272)),
    lc(0x019F, 0x019F, Set(0x0275)),
    lc(0x01A0, 0x01A4, Bor),
    lc(0x01A7, 0x01A7, Set(0x01A8)),
    lc(0x01A9, 0x01A9, Set(0x0283)),
    lc(0x01AC, 0x01AC, Set(0x01AD)),
    lc(0x01AE, 0x01AE, Set(0x0288)),
    lc(0x01AF, 0x01AF, Set(0x01B0)),
    lc(0x01B1, 0x01B2, Add(217)),
    lc(0x01B3, 0x01B5, Bad),
    lc(0x01B7, 0x01B7, Set(0x0292)),
    lc(0x01B8, 0x01B8, Set(0x01B9)),
    lc(0x01BC, 0x01BC, Set(0x01BD)),
    lc(0x01C4, 0x01C5, Set(0x01C6)),
    lc(0x01C7, 0x01C8, Set(0x01C9)),
    lc(0x01CA, 0x01CB, Set(0x01CC)),
    lc(0x01CD, 0x01DB, Bad),
    lc(0x01DE, 0x01EE, Bor),
    lc(0x01F1, 0x01F2, Set(0x01F3)),
    lc(0x01F4, 0x01F4, Set(0x01F5)),
    lc(0x01FA, 0x0216, Bor),
    lc(0x0386, 0x0386, Set(0x03AC)),
    lc(0x0388, 0x038A, Add(37)),
    lc(0x038C, 0x038C, Set(0x03CC)),
    lc(0x038E, 0x038F, Add(63)),
    lc(0x0391, 0x03AB, Add(32)),
    lc(0x03E2, 0x03EE, Bor),
    lc(0x0401, 0x040F, Add(80)),
    lc(0x0410, 0x042F, Add(32)),
    lc(0x0460, 0x0480, Bor),
    lc(0x0490, 0x04BE, Bor),
    lc(0x04C1, 0x04C3, Bad),
    lc(0x04C7, 0x04C7, Set(0x04C8)),
    lc(0x04CB, 0x04CB, Set(0x04CC)),
    lc(0x04D0, 0x04EA, Bor),
    lc(0x04EE, 0x04F4, Bor),
    lc(0x04F8, 0x04F8, Set(0x04F9)),
    lc(0x0531, 0x0556, Add(48)),
    lc(0x10A0, 0x10C5, Add(48)),
    lc(0x1E00, 0x1EF8, Bor),
    lc(0x1F08, 0x1F0F, Add(-8)),
    lc(0x1F18, 0x1F1F, Add(-8)),
    lc(0x1F28, 0x1F2F, Add(-8)),
    lc(0x1F38, 0x1F3F, Add(-8)),
    lc(0x1F48, 0x1F4D, Add(-8)),
    lc(0x1F59, 0x1F59, Set(0x1F51)),
    lc(0x1F5B, 0x1F5B, Set(0x1F53)),
    lc(0x1F5D, 0x1F5D, Set(0x1F55)),
    lc(0x1F5F, 0x1F5F, Set(0x1F57)),
    lc(0x1F68, 0x1F6F, Add(-8)),
    lc(0x1F88, 0x1F8F, Add(-8)),
    lc(0x1F98, 0x1F9F, Add(-8)),
    lc(0x1FA8, 0x1FAF, Add(-8)),
    lc(0x1FB8, 0x1FB9, Add(-8)),
    lc(0x1FBA, 0x1FBB, Add(-74)),
    lc(0x1FBC, 0x1FBC, Set(0x1FB3)),
    lc(0x1FC8, 0x1FCB, Add(-86)),
    lc(0x1FCC, 0x1FCC, Set(0x1FC3)),
    lc(0x1FD8, 0x1FD9, Add(-8)),
    lc(0x1FDA, 0x1FDB, Add(-100)),
    lc(0x1FE8, 0x1FE9, Add(-8)),
    lc(0x1FEA, 0x1FEB, Add(-112)),
    lc(0x1FEC, 0x1FEC, Set(0x1FE5)),
    lc(0x1FF8, 0x1FF9, Add(-128)),
    lc(0x1FFA, 0x1FFB, Add(-126)),
    lc(0x1FFC, 0x1FFC, Set(0x1FF3)),
    lc(0x2160, 0x216F, Add(16)),
    lc(0x24B6, 0x24D0, Add(26)),
    lc(0xFF21, 0xFF3A, Add(32)),
];

/// Lowercase intervals that `[min, max]` reaches through the table and that
/// are not already inside `[min, max]`.
pub fn lowercase_ranges(min: u32, max: u32) -> Vec<(u32, u32)> {
    // first entry whose upper bound can reach `min`
    let start = LOWERCASE_TABLE.partition_point(|lc| lc.max < min);

    LOWERCASE_TABLE[start..]
        .iter()
        .take_while(|lc| lc.min <= max)
        .filter_map(|lc| {
            let lo = lc.apply(lc.min.max(min));
            let hi = lc.apply(lc.max.min(max));
            (lo < min || hi > max).then_some((lo, hi))
        })
        .collect()
}

/// Single code point lowercase mapping through [`LOWERCASE_TABLE`]. Code
/// points outside every entry map to themselves.
///
/// Input symbols, pattern literals and class expansion all fold through
/// this one function, so a class member always matches itself.
pub fn to_lower(ch: u32) -> u32 {
    let at = LOWERCASE_TABLE.partition_point(|lc| lc.max < ch);
    match LOWERCASE_TABLE.get(at) {
        Some(lc) if lc.min <= ch => lc.apply(ch),
        _ => ch,
    }
}
