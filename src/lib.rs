//! binexp - backtracking regular expressions over text and raw binary data
//!
//! ## Usage
//!
//! ```
//! use binexp::{Regex, RegexOptions};
//!
//! let re = Regex::new(b"\xca[\x00-\xff]{2}", RegexOptions::BYTE_RUNES).unwrap();
//! let blob = b"\x00\xca\x01\x02\xca";
//! let m = re.find_bytes_match_starting_at(blob, 0).unwrap().unwrap();
//! assert_eq!((m.index(), m.length()), (1, 3));
//! assert!(re.find_next_match(&m).unwrap().is_none());
//! ```
//!
//! A compiled [`Regex`] scans either decoded text (one symbol per code point,
//! one U+FFFD per invalid byte) or raw bytes (one symbol per byte). Offsets
//! and lengths always count symbols of the scanned mode.
//!
//! ## Regular Expressions:
//!
//! ```text
//!     char        match itself, emit code 'EXACTLY char'
//!
//!      .          match any symbol but '\n' (any symbol under SINGLELINE).
//!                 emit code 'ANY'
//!
//!      \          escapes: \xHH \x{H..} \uHHHH \0oo \cX \n \t \r \f \v \e \a,
//!                 or any punctuation for itself. emit code 'EXACTLY char'
//!
//!     \d \w \s    digit, word and space classes, plus \D \W \S.
//!                 ECMASCRIPT narrows them to ASCII ranges. emit code 'ANYOF set'
//!
//!     \p{Lu}      a Unicode general category, \P{..} its complement
//!
//!     [set]       matches one of the characters in the set.
//!                 If the first character in the set is "^",
//!                 it matches a character NOT in the set.
//!                 A trailing -[set] subtracts another set.
//!                 emit code 'ANYOF set', 'EXACTLY char' or 'ANYBUT char'
//!
//!       *         zero or more. emit code "STAR node" for one-symbol
//!                 operands, BRANCH/BACK loops otherwise
//!
//!       +         same as '*', except it matches one or more.
//!                 emit code "PLUS node" or a BRANCH/BACK loop
//!
//!       ?         zero or one. emit code 'BRANCH node BRANCH NOTHING'
//!
//!     {n,m}       counted repeat, also {n} and {n,}. emit code 'CURLY min max node'
//!                 for one-symbol operands, copies of the operand otherwise
//!
//!     *? +? ?? {n,m}?   lazy forms. emit code 'MINCURLY' or swapped branches
//!
//!     (x) (?:x)   grouping. There are no captures.
//!
//!       ^ $       beginning / end of line. emit code "BOL" / "EOL"
//!
//!     \A \z \Z    beginning of input, end of input, end before a final '\n'
//!
//!     \b \B       ASCII word boundary and its negation
//! ```
//!
//! ## Code emit example
//! ```text
//!     '()' contain the position of next node
//! ```
//! ```plain
//!     Regex::new("a")
//!     result :
//!         BEGIN
//!           1:BRANCH(13)
//!           4:EXACTLY(13)a
//!          13:END(0)
//!
//!     Regex::new("a*")
//!     result :
//!         BEGIN
//!           1:BRANCH(16)
//!           4:STAR(16)
//!           7:EXACTLY(0)a
//!          16:END(0)
//!
//!     Regex::new("a?")
//!     result :
//!         BEGIN
//!           1:BRANCH(22)
//!           4:BRANCH(16)
//!           7:EXACTLY(19)a
//!          16:BRANCH(19)
//!          19:NOTHING(22)
//!          22:END(0)
//! ```
//!
#[macro_use]
extern crate enum_display_derive;

mod compile;
mod error;
mod exec;
mod program;
mod regex;
pub mod syntax;

pub use error::Error;
pub use regex::{compile, Match, Matches, Regex, ScanLimits, SymbolMode};
pub use syntax::{CharSet, PropertyResolver, RegexOptions, UnsupportedProperties};
