use std::{fmt, ops::Range, sync::Arc};

use crate::{
    compile::{Comp, Regexp},
    exec::{Exec, Haystack},
    syntax::{decode_runes, PropertyResolver, RegexOptions, UnsupportedProperties},
    Error,
};

/// Budgets that bound a single scan, so hostile patterns fail instead of
/// hanging or eating memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Program nodes one start position may visit before the scan gives up
    /// with [`Error::BacktrackLimit`].
    pub max_steps: usize,
    /// Open backtracking points (untried alternatives and repeat counts)
    /// one start position may hold before the scan gives up with
    /// [`Error::RecursionLimit`]. They live on the heap, a few dozen bytes
    /// each; a wide atom repeated `n` times holds about `n` of them.
    pub max_depth: usize,
}

impl Default for ScanLimits {
    fn default() -> ScanLimits {
        ScanLimits {
            max_steps: 1_000_000,
            max_depth: 1 << 20,
        }
    }
}

/// What one symbol of a scanned input is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolMode {
    /// A Unicode scalar value, or U+FFFD for each invalid byte.
    CodePoint,
    /// A raw byte.
    RawByte,
}

/// A compiled pattern. Immutable once built, so one value can serve any
/// number of threads.
#[derive(Debug, Clone)]
pub struct Regex {
    pattern: Vec<u8>,
    options: RegexOptions,
    limits: ScanLimits,
    regexp: Regexp,
}

/// Compiles `pattern` with the default resolver and limits.
pub fn compile(pattern: impl AsRef<[u8]>, options: RegexOptions) -> Result<Regex, Error> {
    Regex::new(pattern, options)
}

impl Regex {
    /// Compiles `pattern`. Under [`RegexOptions::BYTE_RUNES`] every pattern
    /// byte is one symbol; otherwise the pattern is decoded as UTF-8.
    pub fn new(pattern: impl AsRef<[u8]>, options: RegexOptions) -> Result<Regex, Error> {
        Regex::with_resolver(pattern, options, &UnsupportedProperties)
    }

    /// Compiles `pattern`, looking up `\p{..}` names that are not general
    /// categories through `resolver`.
    pub fn with_resolver(
        pattern: impl AsRef<[u8]>,
        options: RegexOptions,
        resolver: &dyn PropertyResolver,
    ) -> Result<Regex, Error> {
        let pattern = pattern.as_ref();
        let regexp = Comp::regcomp(pattern, options, resolver)?;
        log::debug!(
            "compiled {:?} ({:?}) regstart={:?} reganch={}\n{}",
            String::from_utf8_lossy(pattern),
            options,
            regexp.regstart,
            regexp.reganch,
            regexp.program
        );
        Ok(Regex {
            pattern: pattern.to_vec(),
            options,
            limits: ScanLimits::default(),
            regexp,
        })
    }

    /// Replaces the default [`ScanLimits`] for every later scan.
    pub fn with_limits(mut self, limits: ScanLimits) -> Regex {
        self.limits = limits;
        self
    }

    /// The pattern bytes as given to the constructor.
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Options the pattern was compiled with.
    pub fn options(&self) -> RegexOptions {
        self.options
    }

    /// Limits applied to each scan.
    pub fn limits(&self) -> ScanLimits {
        self.limits
    }

    /// Leftmost match in `text` that starts at or after symbol `start`.
    ///
    /// `text` is decoded as UTF-8 with one U+FFFD per invalid byte, and
    /// offsets count those symbols. `start` equal to the symbol count finds
    /// nothing; anything larger is [`Error::InvalidOffset`].
    pub fn find_text_match_starting_at(
        &self,
        text: impl AsRef<[u8]>,
        start: usize,
    ) -> Result<Option<Match<'_, 'static>>, Error> {
        let runes: Arc<[char]> = decode_runes(text.as_ref()).into();
        self.scan(Haystack::Runes(runes), start)
    }

    /// Leftmost match in `bytes` that starts at or after byte `start`, one
    /// symbol per byte.
    pub fn find_bytes_match_starting_at<'h>(
        &self,
        bytes: &'h [u8],
        start: usize,
    ) -> Result<Option<Match<'_, 'h>>, Error> {
        self.scan(Haystack::Bytes(bytes), start)
    }

    /// The next match after `previous` over the same input and in the same
    /// mode, resuming at its end (one past its index when it was empty).
    pub fn find_next_match<'h>(&self, previous: &Match<'_, 'h>) -> Result<Option<Match<'_, 'h>>, Error> {
        let start = if previous.length == 0 {
            previous.index + 1
        } else {
            previous.end()
        };
        self.resume(previous, start)
    }

    /// Like [`find_next_match`](Regex::find_next_match) but resumes one past
    /// the previous index, so matches may overlap.
    pub fn find_next_overlapping_match<'h>(
        &self,
        previous: &Match<'_, 'h>,
    ) -> Result<Option<Match<'_, 'h>>, Error> {
        self.resume(previous, previous.index + 1)
    }

    /// Whether decoded `text` holds a match anywhere.
    pub fn is_match_text(&self, text: impl AsRef<[u8]>) -> Result<bool, Error> {
        Ok(self.find_text_match_starting_at(text, 0)?.is_some())
    }

    /// Whether raw `bytes` hold a match anywhere.
    pub fn is_match_bytes(&self, bytes: &[u8]) -> Result<bool, Error> {
        Ok(self.find_bytes_match_starting_at(bytes, 0)?.is_some())
    }

    /// Successive non-overlapping matches over decoded `text`.
    pub fn find_text_iter(&self, text: impl AsRef<[u8]>) -> Matches<'_, 'static> {
        let runes: Arc<[char]> = decode_runes(text.as_ref()).into();
        Matches::new(self, Haystack::Runes(runes))
    }

    /// Successive non-overlapping matches over raw `bytes`.
    pub fn find_bytes_iter<'h>(&self, bytes: &'h [u8]) -> Matches<'_, 'h> {
        Matches::new(self, Haystack::Bytes(bytes))
    }

    fn resume<'h>(&self, previous: &Match<'_, 'h>, start: usize) -> Result<Option<Match<'_, 'h>>, Error> {
        // running off the end is just the end of the matches
        if start > previous.haystack.len() {
            return Ok(None);
        }
        self.scan(previous.haystack.clone(), start)
    }

    fn scan<'h>(&self, haystack: Haystack<'h>, start: usize) -> Result<Option<Match<'_, 'h>>, Error> {
        let len = haystack.len();
        if start > len {
            return Err(Error::InvalidOffset { offset: start, len });
        }
        log::trace!(
            "scan {:?} from {} over {} symbols",
            String::from_utf8_lossy(&self.pattern),
            start,
            len
        );
        let found = Exec::new(&self.regexp, &haystack, self.options, self.limits).regexec(start)?;
        log::trace!("scan result {:?}", found);
        Ok(found.map(|(index, end)| Match {
            regex: self,
            haystack,
            index,
            length: end - index,
        }))
    }
}

/// One match: where it starts and how many symbols it spans.
#[derive(Clone)]
pub struct Match<'r, 'h> {
    regex: &'r Regex,
    haystack: Haystack<'h>,
    index: usize,
    length: usize,
}

impl<'r, 'h> Match<'r, 'h> {
    /// Symbol offset of the first matched symbol.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of matched symbols, possibly zero.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Offset one past the last matched symbol.
    pub fn end(&self) -> usize {
        self.index + self.length
    }

    /// `index..end` in the symbols of the scanned mode.
    pub fn range(&self) -> Range<usize> {
        self.index..self.end()
    }

    /// A zero-length match, such as `x*` finding nothing.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The pattern that produced this match.
    pub fn regex(&self) -> &'r Regex {
        self.regex
    }

    /// Whether offsets count code points or bytes.
    pub fn mode(&self) -> SymbolMode {
        match self.haystack {
            Haystack::Bytes(_) => SymbolMode::RawByte,
            Haystack::Runes(_) => SymbolMode::CodePoint,
        }
    }

    /// The matched bytes of a byte scan.
    pub fn as_bytes(&self) -> Option<&'h [u8]> {
        match self.haystack {
            Haystack::Bytes(bytes) => Some(&bytes[self.range()]),
            Haystack::Runes(_) => None,
        }
    }

    /// The matched symbols of a text scan.
    pub fn as_text(&self) -> Option<String> {
        match &self.haystack {
            Haystack::Runes(runes) => Some(runes[self.range()].iter().collect()),
            Haystack::Bytes(_) => None,
        }
    }
}

impl fmt::Debug for Match<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("index", &self.index)
            .field("length", &self.length)
            .field("mode", &self.mode())
            .finish()
    }
}

/// Iterator over the matches of one input, built by
/// [`Regex::find_text_iter`] or [`Regex::find_bytes_iter`].
///
/// A scan error is yielded once and ends the iteration.
#[derive(Debug)]
pub struct Matches<'r, 'h> {
    regex: &'r Regex,
    haystack: Haystack<'h>,
    last: Option<Match<'r, 'h>>,
    overlapping: bool,
    done: bool,
}

impl<'r, 'h> Matches<'r, 'h> {
    fn new(regex: &'r Regex, haystack: Haystack<'h>) -> Matches<'r, 'h> {
        Matches {
            regex,
            haystack,
            last: None,
            overlapping: false,
            done: false,
        }
    }

    /// Resume one past each match's index instead of at its end.
    pub fn overlapping(mut self) -> Matches<'r, 'h> {
        self.overlapping = true;
        self
    }
}

impl<'r, 'h> Iterator for Matches<'r, 'h> {
    type Item = Result<Match<'r, 'h>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let found = match &self.last {
            None => self.regex.scan(self.haystack.clone(), 0),
            Some(last) if self.overlapping => self.regex.find_next_overlapping_match(last),
            Some(last) => self.regex.find_next_match(last),
        };
        match found {
            Ok(Some(found)) => {
                self.last = Some(found.clone());
                Some(Ok(found))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
