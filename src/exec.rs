use std::sync::Arc;

use crate::{
    compile::Regexp,
    program::{Opcode, ProgramCounter, INFINITE, PC},
    regex::ScanLimits,
    syntax::{casefold::to_lower, charclass::is_word_char, RegexOptions},
    Error,
};

const NEWLINE: u32 = '\n' as u32;

/// The symbols a scan walks over.
#[derive(Debug, Clone)]
pub(crate) enum Haystack<'h> {
    /// One symbol per byte.
    Bytes(&'h [u8]),
    /// Decoded text, one symbol per code point or invalid byte.
    Runes(Arc<[char]>),
}

impl Haystack<'_> {
    pub fn len(&self) -> usize {
        match self {
            Haystack::Bytes(bytes) => bytes.len(),
            Haystack::Runes(runes) => runes.len(),
        }
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        match self {
            Haystack::Bytes(bytes) => bytes.get(index).map(|&b| u32::from(b)),
            Haystack::Runes(runes) => runes.get(index).map(|&c| u32::from(c)),
        }
    }
}

// A place the matcher can go back to when the path it took fails.
#[derive(Debug, Clone, Copy)]
enum Backtrack {
    // try the BRANCH node `alt` from `pos`
    Branch { alt: PC, pos: usize },
    // greedy repeat: `count` copies is the next candidate, then fewer
    Greedy {
        next: PC,
        nextch: Option<u32>,
        save: usize,
        min: usize,
        count: usize,
    },
    // lazy repeat: `count` copies were tried, one more may be taken
    Lazy {
        node: PC,
        next: PC,
        nextch: Option<u32>,
        save: usize,
        count: usize,
        max: u16,
    },
}

/*
 * Work-variable struct for vm execute.
 */
pub(crate) struct Exec<'a, 'h> {
    regexp: &'a Regexp,
    input: &'a Haystack<'h>,
    options: RegexOptions,
    limits: ScanLimits,
    reginput: usize, // current position in input
    steps: usize,    // nodes visited from the current start position
    stack: Vec<Backtrack>,
}

impl<'a, 'h> Exec<'a, 'h> {
    pub fn new(
        regexp: &'a Regexp,
        input: &'a Haystack<'h>,
        options: RegexOptions,
        limits: ScanLimits,
    ) -> Exec<'a, 'h> {
        Exec {
            regexp,
            input,
            options,
            limits,
            reginput: 0,
            steps: 0,
            stack: Vec::new(),
        }
    }

    /*
     - regexec - leftmost match starting in start..len
     *
     * Returns the (index, end) of the match. A position equal to the input
     * length is never tried, so empty input never matches.
     */
    pub fn regexec(&mut self, start: usize) -> Result<Option<(usize, usize)>, Error> {
        let len = self.input.len();
        for pos in start..len {
            if self.regexp.reganch && pos != 0 {
                break;
            }
            if let Some(first) = self.regexp.regstart {
                if self.symbol(pos) != Some(first) {
                    continue;
                }
            }
            if self.regtry(pos)? {
                return Ok(Some((pos, self.reginput)));
            }
        }
        Ok(None)
    }

    // try match at specific point
    fn regtry(&mut self, pos: usize) -> Result<bool, Error> {
        self.reginput = pos;
        self.steps = 0;
        self.stack.clear();
        self.regmatch(ProgramCounter(1))
    }

    /*
     - regmatch - run the program from `start` until END or exhaustion
     *
     * Every open choice (a BRANCH with alternatives left, a repeat whose
     * count could still change) is kept on `stack`. When the current path
     * fails the newest one is resumed, so long inputs cost heap rather than
     * native stack.
     */
    fn regmatch(&mut self, start: PC) -> Result<bool, Error> {
        let mut scan = start;
        loop {
            if self.regmatch_chain(scan)? {
                return Ok(true);
            }
            scan = loop {
                let Some(point) = self.stack.pop() else {
                    return Ok(false);
                };
                if let Some(resume) = self.resume(point)? {
                    break resume;
                }
            };
        }
    }

    /*
     - regmatch_chain - follow one path through the program
     *
     * Ordinary nodes are checked in a loop. A node with alternatives
     * records the ones not taken and carries on with the first, so a
     * failure here only means this path is dead.
     */
    fn regmatch_chain(&mut self, mut scan: PC) -> Result<bool, Error> {
        let regexp = self.regexp;
        let program = &regexp.program;
        loop {
            self.tick()?;
            let opcode = program.opcode_at(scan)?;
            let next = program.next_at(scan);
            match opcode {
                Opcode::BOL => {
                    if !self.at_bol() {
                        return Ok(false);
                    }
                }
                Opcode::EOL => {
                    if !self.at_eol() {
                        return Ok(false);
                    }
                }
                Opcode::BOT => {
                    if self.reginput != 0 {
                        return Ok(false);
                    }
                }
                Opcode::EOT => {
                    if self.reginput != self.input.len() {
                        return Ok(false);
                    }
                }
                Opcode::EOTZ => {
                    let len = self.input.len();
                    let before_final_newline =
                        self.reginput + 1 == len && self.input.get(self.reginput) == Some(NEWLINE);
                    if self.reginput != len && !before_final_newline {
                        return Ok(false);
                    }
                }
                Opcode::BOUND => {
                    if !self.at_boundary() {
                        return Ok(false);
                    }
                }
                Opcode::NOTBOUND => {
                    if self.at_boundary() {
                        return Ok(false);
                    }
                }
                Opcode::ANY | Opcode::ANYOF | Opcode::ANYBUT => {
                    if !self.single_matches(scan, self.reginput)? {
                        return Ok(false);
                    }
                    self.reginput += 1;
                }
                Opcode::EXACTLY => {
                    for (i, expected) in program.literal_at(scan)?.enumerate() {
                        if self.symbol(self.reginput + i) != Some(expected) {
                            return Ok(false);
                        }
                    }
                    self.reginput += program.literal_len(scan)?;
                }
                Opcode::NOTHING | Opcode::BACK => {}
                Opcode::BRANCH => {
                    let operand = program.operand_at(scan).ok_or(Error::InvalidOperand)?;
                    if let Some(alt) = next {
                        if program.opcode_at(alt)? == Opcode::BRANCH {
                            self.push(Backtrack::Branch {
                                alt,
                                pos: self.reginput,
                            })?;
                        }
                    }
                    scan = operand;
                    continue;
                }
                Opcode::STAR | Opcode::PLUS | Opcode::CURLY | Opcode::MINCURLY => {
                    let next =
                        next.ok_or(Error::ExecuteFailed(scan.0, "loop without a successor"))?;
                    let (min, max) = match opcode {
                        Opcode::STAR => (0, INFINITE),
                        Opcode::PLUS => (1, INFINITE),
                        _ => program.bounds_at(scan)?,
                    };
                    let node = program.operand_at(scan).ok_or(Error::InvalidOperand)?;
                    let nextch = self.next_literal(next)?;
                    let save = self.reginput;
                    let min = usize::from(min);
                    let taken = if opcode == Opcode::MINCURLY {
                        let mut count = 0;
                        while count < min {
                            if !self.single_matches(node, save + count)? {
                                return Ok(false);
                            }
                            count += 1;
                        }
                        self.lazy_repeat(node, next, nextch, save, count, max)?
                    } else {
                        let count = self.regrepeat(node, max)?;
                        self.greedy_repeat(next, nextch, save, min, count)?
                    };
                    match taken {
                        Some(next) => {
                            scan = next;
                            continue;
                        }
                        None => return Ok(false),
                    }
                }
                Opcode::END => return Ok(true), /* Success! */
                Opcode::BEGIN => {
                    return Err(Error::ExecuteFailed(scan.0, "BEGIN inside program"));
                }
            }
            scan = next.ok_or(Error::ExecuteFailed(scan.0, "corrupted pointers"))?;
        }
    }

    // pick up a path that was left open
    fn resume(&mut self, point: Backtrack) -> Result<Option<PC>, Error> {
        match point {
            Backtrack::Branch { alt, pos } => {
                let regexp = self.regexp;
                let program = &regexp.program;
                self.reginput = pos;
                if let Some(further) = program.next_at(alt) {
                    if program.opcode_at(further)? == Opcode::BRANCH {
                        self.push(Backtrack::Branch { alt: further, pos })?;
                    }
                }
                program
                    .operand_at(alt)
                    .map(Some)
                    .ok_or(Error::InvalidOperand)
            }
            Backtrack::Greedy {
                next,
                nextch,
                save,
                min,
                count,
            } => self.greedy_repeat(next, nextch, save, min, count),
            Backtrack::Lazy {
                node,
                next,
                nextch,
                save,
                count,
                max,
            } => {
                if self.take_one_more(node, save, count, max)? {
                    self.lazy_repeat(node, next, nextch, save, count + 1, max)
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn push(&mut self, point: Backtrack) -> Result<(), Error> {
        if self.stack.len() >= self.limits.max_depth {
            return Err(Error::RecursionLimit(self.limits.max_depth));
        }
        self.stack.push(point);
        Ok(())
    }

    // Largest count first; the smaller ones wait on the stack.
    fn greedy_repeat(
        &mut self,
        next: PC,
        nextch: Option<u32>,
        save: usize,
        min: usize,
        mut count: usize,
    ) -> Result<Option<PC>, Error> {
        while count >= min {
            let pos = save + count;
            /* If it could work, try it. */
            if self.could_follow(nextch, pos) {
                if count > min {
                    self.push(Backtrack::Greedy {
                        next,
                        nextch,
                        save,
                        min,
                        count: count - 1,
                    })?;
                }
                self.reginput = pos;
                return Ok(Some(next));
            }
            if count == 0 {
                break;
            }
            count -= 1;
            self.tick()?;
        }
        Ok(None)
    }

    // Smallest count first, taking one more each time the rest fails.
    fn lazy_repeat(
        &mut self,
        node: PC,
        next: PC,
        nextch: Option<u32>,
        save: usize,
        mut count: usize,
        max: u16,
    ) -> Result<Option<PC>, Error> {
        loop {
            let pos = save + count;
            if self.could_follow(nextch, pos) {
                self.push(Backtrack::Lazy {
                    node,
                    next,
                    nextch,
                    save,
                    count,
                    max,
                })?;
                self.reginput = pos;
                return Ok(Some(next));
            }
            if !self.take_one_more(node, save, count, max)? {
                return Ok(None);
            }
            count += 1;
        }
    }

    fn take_one_more(&mut self, node: PC, save: usize, count: usize, max: u16) -> Result<bool, Error> {
        self.tick()?;
        if max != INFINITE && count >= usize::from(max) {
            return Ok(false);
        }
        self.single_matches(node, save + count)
    }

    // the literal after a repeat must start at `pos`
    fn could_follow(&self, nextch: Option<u32>, pos: usize) -> bool {
        nextch.map_or(true, |ch| self.symbol(pos) == Some(ch))
    }

    // first symbol the node at `next` demands, if it is a literal
    fn next_literal(&self, next: PC) -> Result<Option<u32>, Error> {
        let program = &self.regexp.program;
        if program.opcode_at(next)? == Opcode::EXACTLY {
            Ok(program.literal_at(next)?.next())
        } else {
            Ok(None)
        }
    }

    // repeatedly match a one-symbol node, at most `max` times
    fn regrepeat(&mut self, node: PC, max: u16) -> Result<usize, Error> {
        let mut count = 0;
        while max == INFINITE || count < usize::from(max) {
            if !self.single_matches(node, self.reginput + count)? {
                break;
            }
            count += 1;
            self.tick()?;
        }
        Ok(count)
    }

    // does the one-symbol node at `node` accept the symbol at `pos`?
    fn single_matches(&self, node: PC, pos: usize) -> Result<bool, Error> {
        let program = &self.regexp.program;
        let Some(raw) = self.input.get(pos) else {
            return Ok(false);
        };
        let ch = self.fold(raw);
        Ok(match program.opcode_at(node)? {
            Opcode::ANY => self.options.contains(RegexOptions::SINGLELINE) || raw != NEWLINE,
            Opcode::ANYOF => program.set_at(node)?.char_in(ch),
            Opcode::ANYBUT => program.symbol_at(node)? != ch,
            Opcode::EXACTLY => program.literal_at(node)?.next() == Some(ch),
            _ => return Err(Error::ExecuteFailed(node.0, "not a single symbol node")),
        })
    }

    fn symbol(&self, pos: usize) -> Option<u32> {
        self.input.get(pos).map(|raw| self.fold(raw))
    }

    fn fold(&self, raw: u32) -> u32 {
        if self.options.contains(RegexOptions::IGNORE_CASE) {
            to_lower(raw)
        } else {
            raw
        }
    }

    fn at_bol(&self) -> bool {
        self.reginput == 0
            || (self.options.contains(RegexOptions::MULTILINE)
                && self.input.get(self.reginput - 1) == Some(NEWLINE))
    }

    fn at_eol(&self) -> bool {
        let len = self.input.len();
        if self.reginput == len {
            return true;
        }
        self.input.get(self.reginput) == Some(NEWLINE)
            && (self.options.contains(RegexOptions::MULTILINE) || self.reginput + 1 == len)
    }

    fn at_boundary(&self) -> bool {
        let before = self.reginput > 0
            && self
                .input
                .get(self.reginput - 1)
                .is_some_and(is_word_char);
        let after = self.input.get(self.reginput).is_some_and(is_word_char);
        before != after
    }

    fn tick(&mut self) -> Result<(), Error> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(Error::BacktrackLimit(self.limits.max_steps));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{compile::Comp, syntax::UnsupportedProperties};

    fn run(pattern: &str, options: RegexOptions, input: &[u8], start: usize) -> Option<(usize, usize)> {
        let regexp = Comp::regcomp(pattern.as_bytes(), options, &UnsupportedProperties).unwrap();
        let haystack = Haystack::Bytes(input);
        Exec::new(&regexp, &haystack, options, ScanLimits::default())
            .regexec(start)
            .unwrap()
    }

    fn find(pattern: &str, input: &str) -> Option<(usize, usize)> {
        run(pattern, RegexOptions::NONE, input.as_bytes(), 0)
    }

    #[test]
    fn test_literals_and_alternation() {
        assert_eq!(find("abc", "xxabcx"), Some((2, 5)));
        assert_eq!(find("abc", "ab"), None);
        assert_eq!(find("cat|dog", "hotdog"), Some((3, 6)));
        assert_eq!(find("a(b|c)d", "xacd"), Some((1, 4)));
        assert_eq!(find("(?:ab|a)c", "abc"), Some((0, 3)));
    }

    #[test]
    fn test_greedy_and_lazy() {
        assert_eq!(find("a*", "aaab"), Some((0, 3)));
        assert_eq!(find("a*?", "aaab"), Some((0, 0)));
        assert_eq!(find("a+?", "aaab"), Some((0, 1)));
        assert_eq!(find("a??b", "ab"), Some((0, 2)));
        assert_eq!(find("<.+>", "<a><b>"), Some((0, 6)));
        assert_eq!(find("<.+?>", "<a><b>"), Some((0, 3)));
        assert_eq!(find("(ab)+", "ababx"), Some((0, 4)));
        assert_eq!(find("(ab)+?", "ababx"), Some((0, 2)));
        assert_eq!(find("(ab)*?x", "ababx"), Some((0, 5)));
        assert_eq!(find("(ab)??", "ab"), Some((0, 0)));
        assert_eq!(find("(ab)?", "ab"), Some((0, 2)));
    }

    #[test]
    fn test_counted_repeats() {
        assert_eq!(find("a{2}", "aaaa"), Some((0, 2)));
        assert_eq!(find("a{2,3}", "aaaa"), Some((0, 3)));
        assert_eq!(find("a{2,}", "aaaa"), Some((0, 4)));
        assert_eq!(find("a{2,3}?", "aaaa"), Some((0, 2)));
        assert_eq!(find("a{3}", "aa"), None);
        assert_eq!(find("(ab){2}", "abababab"), Some((0, 4)));
        assert_eq!(find("(ab){1,3}", "abababab"), Some((0, 6)));
        assert_eq!(find("(ab){2,}", "ababab"), Some((0, 6)));
        assert_eq!(find("(ab){0,2}c", "ababc"), Some((0, 5)));
        assert_eq!(find("x(ab){0}y", "xy"), Some((0, 2)));
    }

    #[test]
    fn test_anchors() {
        assert_eq!(find("^b", "ab"), None);
        assert_eq!(find("b$", "ab\n"), Some((1, 2)));
        assert_eq!(find("b$", "ab\nc"), None);
        assert_eq!(run("^c", RegexOptions::MULTILINE, b"ab\ncd", 0), Some((3, 4)));
        assert_eq!(run("b$", RegexOptions::MULTILINE, b"ab\ncd", 0), Some((1, 2)));
        assert_eq!(find("\\bcat\\b", "concat cat"), Some((7, 10)));
        assert_eq!(find("\\Bcat", "concat cat"), Some((3, 6)));
        assert_eq!(find("\\Aab", "abab"), Some((0, 2)));
        assert_eq!(run("\\Aab", RegexOptions::NONE, b"abab", 1), None);
        assert_eq!(find("b\\z", "ab\n"), None);
        assert_eq!(find("b\\Z", "ab\n"), Some((1, 2)));
    }

    #[test]
    fn test_any_and_newline() {
        assert_eq!(find("a.c", "a\nc"), None);
        assert_eq!(run("a.c", RegexOptions::SINGLELINE, b"a\nc", 0), Some((0, 3)));
    }

    #[test]
    fn test_classes() {
        assert_eq!(find("[0-9]+", "ab123c"), Some((2, 5)));
        assert_eq!(find("[^a-c]", "abcd"), Some((3, 4)));
        assert_eq!(find("[a-z-[aeiou]]+", "aexyz"), Some((2, 5)));
        assert_eq!(find("\\d\\s\\w", "x1 _"), Some((1, 4)));
    }

    #[test]
    fn test_ignore_case() {
        let ci = RegexOptions::IGNORE_CASE;
        assert_eq!(run("abc", ci, b"xABC", 0), Some((1, 4)));
        assert_eq!(run("[A-C]+", ci, b"abcd", 0), Some((0, 3)));
        assert_eq!(run("[^A]", ci, b"ab", 0), Some((1, 2)));
    }

    #[test]
    fn test_start_offset_and_end() {
        assert_eq!(run("a", RegexOptions::NONE, b"aaa", 2), Some((2, 3)));
        assert_eq!(run("a", RegexOptions::NONE, b"aaa", 3), None);
        assert_eq!(run("", RegexOptions::NONE, b"", 0), None);
        assert_eq!(run("", RegexOptions::NONE, b"ab", 1), Some((1, 1)));
    }

    #[test]
    fn test_step_limit() {
        let regexp = Comp::regcomp(b"(a|aa)*b", RegexOptions::NONE, &UnsupportedProperties).unwrap();
        let input = vec![b'a'; 40];
        let haystack = Haystack::Bytes(&input);
        let limits = ScanLimits {
            max_steps: 10_000,
            ..ScanLimits::default()
        };
        let result = Exec::new(&regexp, &haystack, RegexOptions::NONE, limits).regexec(0);
        assert_eq!(result, Err(Error::BacktrackLimit(10_000)));
    }

    #[test]
    fn test_long_repetitions_of_wide_atoms() {
        let input = "ab".repeat(20_000);
        assert_eq!(find("(ab)+", &input), Some((0, 40_000)));
        assert_eq!(find("(a|b)*c", &(input.clone() + "c")), Some((0, 40_001)));
        assert_eq!(find("(ab)*?c", &(input.clone() + "c")), Some((0, 40_001)));
        assert_eq!(find("(ab){2,}?$", &input), Some((0, 40_000)));
    }

    #[test]
    fn test_backtracking_order() {
        // the newest open choice is resumed first
        assert_eq!(find("(a|ab)(c|bcd)(d*)", "abcd"), Some((0, 4)));
        assert_eq!(find("(ab|a)*b", "abab"), Some((0, 4)));
        assert_eq!(find("a*ab", "aaab"), Some((0, 4)));
        assert_eq!(find("a*?ab", "aaab"), Some((0, 4)));
        assert_eq!(find("(ab)+?b", "ababb"), Some((0, 5)));
    }

    #[test]
    fn test_depth_limit() {
        let regexp = Comp::regcomp(b"(ab)*c", RegexOptions::NONE, &UnsupportedProperties).unwrap();
        let input = b"ab".repeat(100);
        let haystack = Haystack::Bytes(&input);
        let limits = ScanLimits {
            max_depth: 20,
            ..ScanLimits::default()
        };
        let result = Exec::new(&regexp, &haystack, RegexOptions::NONE, limits).regexec(0);
        assert_eq!(result, Err(Error::RecursionLimit(20)));
    }
}
