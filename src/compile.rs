use std::{collections::HashMap, vec::IntoIter};

use bitflags::bitflags;
use itertools::{peek_nth, PeekNth};

use crate::{
    program::{Opcode, Program, ProgramCounter, INFINITE, MAX_PROGRAM_SIZE, PC},
    syntax::{
        casefold::to_lower,
        charclass::{
            DIGIT_CLASS, ECMA_DIGIT_CLASS, ECMA_SPACE_CLASS, ECMA_WORD_CLASS, NOT_DIGIT_CLASS,
            NOT_ECMA_DIGIT_CLASS, NOT_ECMA_SPACE_CLASS, NOT_ECMA_WORD_CLASS, NOT_SPACE_CLASS,
            NOT_WORD_CLASS, SPACE_CLASS, WORD_CLASS,
        },
        pattern_symbols, CharSet, PropertyResolver, RegexOptions, MAX_RUNE,
    },
    Error,
};

const META_CHAR: &str = "^$.[()|?+*\\";

// longest run of literal symbols packed into one EXACTLY node
const MAX_LITERAL: usize = 0x400;

fn is_repn(ch: char) -> bool {
    ch == '?' || ch == '*' || ch == '+'
}

fn is_meta(ch: char) -> bool {
    META_CHAR.contains(ch)
}

bitflags! {
    pub(crate) struct CompStatus: u8 {
        const WORST        = 0;
        const HASWIDTH     = 1;          // does sub match have length
        const SIMPLE       = 2;          // one symbol wide, so STAR/PLUS/CURLY can loop over it
        const SPSTART      = 4;          // does sub match starts with * or +
    }
}

/// A parsed quantifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Repeat {
    min: u16,
    max: u16,
    lazy: bool,
}

// what wraps an extra copy of a counted atom
#[derive(Debug, Clone, Copy)]
enum CopyKind {
    Mandatory,
    Optional,
    Star,
}

type ParseState = (PeekNth<IntoIter<char>>, usize);

/// A compiled pattern plus the facts the scanner uses to skip start positions.
#[derive(Debug, Clone)]
pub(crate) struct Regexp {
    // every match starts with this symbol (already lowercased under IGNORE_CASE)
    pub regstart: Option<u32>,
    // a match can only start at offset 0
    pub reganch: bool,
    pub program: Program,
}

impl Regexp {
    fn new(program: Program, options: RegexOptions) -> Regexp {
        let mut regexp = Regexp {
            regstart: None,
            reganch: false,
            program,
        };
        let scan = ProgramCounter(1); /* First BRANCH. */
        let sole_branch = regexp
            .program
            .next_at(scan)
            .is_some_and(|next| regexp.program.opcode_at(next) == Ok(Opcode::END));
        if !sole_branch {
            return regexp;
        }
        if let Some(first) = regexp.program.operand_at(scan) {
            match regexp.program.opcode_at(first) {
                Ok(Opcode::EXACTLY) => {
                    regexp.regstart = regexp.program.literal_at(first).ok().and_then(|mut l| l.next());
                }
                Ok(Opcode::BOL) if !options.contains(RegexOptions::MULTILINE) => {
                    regexp.reganch = true;
                }
                Ok(Opcode::BOT) => regexp.reganch = true,
                _ => {}
            }
        }
        regexp
    }
}

// Work-variable struct for regex compile
pub(crate) struct Comp<'a> {
    regparse: PeekNth<IntoIter<char>>, // pattern symbols not yet consumed
    regposi: usize,                    // symbols consumed so far
    program: Program,                  // compile result. byte code represent of nfa.
    emit_code: bool,                   // if false, don't emit code.
    code_size: usize,
    options: RegexOptions,
    resolver: &'a dyn PropertyResolver,
    set_index: HashMap<CharSet, u16>, // identical classes share one slot
}

impl<'a> Comp<'a> {
    /*
    -   regcomp  compile a regular expression into internal code
    *
    *   compile regex will be two phase process. first for verify the validity of the regex, don't emit code.
    *
    */
    pub fn regcomp(
        pattern: &[u8],
        options: RegexOptions,
        resolver: &'a dyn PropertyResolver,
    ) -> Result<Regexp, Error> {
        let symbols = pattern_symbols(pattern, options);
        let mut comp = Comp {
            regparse: peek_nth(symbols.clone().into_iter()),
            regposi: 0,
            program: Program::new(),
            emit_code: false,
            code_size: 0,
            options,
            resolver,
            set_index: HashMap::new(),
        };
        comp.regc(Opcode::BEGIN.into());
        comp.reg(false).map_err(|err| {
            if let Error::InvalidRegex(posi, msg) = &err {
                log::debug!(
                    "{}\n{}^   {}",
                    symbols.iter().collect::<String>(),
                    " ".repeat(posi.saturating_sub(1)),
                    msg
                );
            }
            err
        })?;

        if comp.code_size >= MAX_PROGRAM_SIZE {
            return Err(Error::InvalidRegex(comp.regposi, "regex too big"));
        }
        comp.program.reserve(comp.code_size);

        comp.regparse = peek_nth(symbols.into_iter());
        comp.regposi = 0;
        comp.emit_code = true;
        comp.regc(Opcode::BEGIN.into());
        let (_, _) = comp.reg(false)?;
        Ok(Regexp::new(comp.program, options))
    }

    /*
     *  reg - regular expression, i.e. main body or parenthesized thing
     *  Caller must absorb opening parenthesis.
     */
    fn reg(&mut self, paren: bool) -> Result<(PC, CompStatus), Error> {
        let mut flags = CompStatus::HASWIDTH;
        let (ret, branch_flags) = self.regbranch()?;
        flags &= !(!branch_flags & CompStatus::HASWIDTH); /* if branch is not report has width, clear it */
        flags |= branch_flags & CompStatus::SPSTART;
        while self.exp_peak() == Some('|') {
            self.exp_advance();
            let (br, branch_flags) = self.regbranch()?;
            self.regtail(ret, br)?; /* BRANCH -> BRANCH. */
            flags &= !(!branch_flags & CompStatus::HASWIDTH);
            flags |= branch_flags & CompStatus::SPSTART;
        }
        // groups close on a NOTHING so a quantifier can hook onto one tail
        let end = self.regnode(if paren { Opcode::NOTHING } else { Opcode::END });
        self.regtail(ret, end)?;

        /* Hook the tails of the branches to the closing node. */
        let mut branch = ret;
        self.regoptail(branch, end)?;
        while let Some(next_branch) = self.regnext(branch) {
            self.regoptail(next_branch, end)?;
            branch = next_branch;
        }

        /* Check for proper termination. */
        if paren && self.exp_next() != Some(')') {
            return Err(Error::InvalidRegex(self.regposi, "unterminated ()"));
        } else if !paren && self.exp_peak().is_some() {
            if self.exp_peak() == Some(')') {
                return Err(Error::InvalidRegex(self.regposi, "unmatched ()"));
            } else {
                return Err(Error::InvalidRegex(self.regposi, "internal error: junk on end"));
            }
        }
        Ok((ret, flags))
    }

    /*
    - regbranch - one alternative of an | operator
    *
    * Implements the concatenation operator.
    */
    fn regbranch(&mut self) -> Result<(PC, CompStatus), Error> {
        let mut flags = CompStatus::WORST;
        let ret = self.regnode(Opcode::BRANCH);
        let mut chain: Option<PC> = None;
        while let Some(ch) = self.exp_peak() {
            if ch == '|' || ch == ')' {
                break;
            }
            let (latest, piece_flags) = self.regpiece()?;
            flags |= piece_flags & CompStatus::HASWIDTH;
            match chain {
                /* First piece. */
                None => flags |= piece_flags & CompStatus::SPSTART,
                Some(chain) => self.regtail(chain, latest)?,
            }
            chain = Some(latest);
        }
        if chain.is_none() {
            /* Loop ran zero times. */
            self.regnode(Opcode::NOTHING);
        }

        Ok((ret, flags))
    }

    /*
    - regpiece - something followed by a possible quantifier
    *
    * One-symbol atoms loop through STAR, PLUS, CURLY or MINCURLY. Anything
    * wider is built from BRANCH and BACK nodes, and a counted repeat of it is
    * compiled as that many copies of the atom.
    */
    fn regpiece(&mut self) -> Result<(PC, CompStatus), Error> {
        let atom_start: ParseState = (self.regparse.clone(), self.regposi);
        let (ret, atom_flags) = self.regatom()?;

        let repeat = match self.parse_repeat()? {
            Some(repeat) => repeat,
            None => return Ok((ret, atom_flags)),
        };
        if !atom_flags.contains(CompStatus::HASWIDTH) && repeat.max == INFINITE {
            return Err(Error::InvalidRegex(self.regposi, "*+ operand could be empty"));
        }
        let mut flags = CompStatus::WORST;
        if repeat.max == INFINITE {
            flags |= CompStatus::SPSTART;
        }
        if repeat.min > 0 {
            flags |= atom_flags & CompStatus::HASWIDTH;
        }

        if repeat.max == 0 {
            // x{0} matches the empty string only
            self.regtruncate(ret);
            let nothing = self.regnode(Opcode::NOTHING);
            self.check_nested()?;
            return Ok((nothing, CompStatus::WORST));
        }

        if atom_flags.contains(CompStatus::SIMPLE) {
            match (repeat.min, repeat.max, repeat.lazy) {
                (0, INFINITE, false) => self.reginsert(Opcode::STAR, ret, &[])?,
                (1, INFINITE, false) => self.reginsert(Opcode::PLUS, ret, &[])?,
                (0, 1, false) => self.optional(ret, false)?,
                (min, max, lazy) => {
                    let op = if lazy { Opcode::MINCURLY } else { Opcode::CURLY };
                    let [min_hi, min_lo] = min.to_be_bytes();
                    let [max_hi, max_lo] = max.to_be_bytes();
                    self.reginsert(op, ret, &[min_hi, min_lo, max_hi, max_lo])?;
                }
            }
        } else {
            match (repeat.min, repeat.max) {
                (0, INFINITE) => self.star(ret, repeat.lazy)?,
                (1, INFINITE) => self.plus(ret, repeat.lazy)?,
                (0, 1) => self.optional(ret, repeat.lazy)?,
                _ => self.expand(ret, repeat, atom_start)?,
            }
        }
        self.check_nested()?;
        Ok((ret, flags))
    }

    fn check_nested(&mut self) -> Result<(), Error> {
        if self.is_quantifier_at(0) {
            return Err(Error::InvalidRegex(self.regposi, "nested *?+"));
        }
        Ok(())
    }

    // x? : BRANCH(x) BRANCH(NOTHING) NOTHING
    fn optional(&mut self, ret: PC, lazy: bool) -> Result<(), Error> {
        if lazy {
            return self.lazy_optional(ret);
        }
        self.reginsert(Opcode::BRANCH, ret, &[])?;
        let branch = self.regnode(Opcode::BRANCH);
        self.regtail(ret, branch)?;
        let nothing = self.regnode(Opcode::NOTHING);
        self.regtail(ret, nothing)?;
        self.regoptail(ret, nothing)
    }

    // x?? : BRANCH(NOTHING) BRANCH(x) NOTHING
    fn lazy_optional(&mut self, ret: PC) -> Result<(), Error> {
        self.reginsert(Opcode::BRANCH, ret, &[])?;
        self.reginsert(Opcode::NOTHING, ret, &[])?;
        self.reginsert(Opcode::BRANCH, ret, &[])?;
        let second = ret + 6;
        self.regtail(ret, second)?;
        let nothing = self.regnode(Opcode::NOTHING);
        self.regtail(ret, nothing)?;
        self.regoptail(ret, nothing)?;
        self.regoptail(second, nothing)
    }

    // x* : BRANCH(x BACK) BRANCH(NOTHING) NOTHING
    fn star(&mut self, ret: PC, lazy: bool) -> Result<(), Error> {
        if lazy {
            return self.lazy_star(ret);
        }
        self.reginsert(Opcode::BRANCH, ret, &[])?;
        let back = self.regnode(Opcode::BACK);
        self.regoptail(ret, back)?;
        self.regoptail(ret, ret)?;
        let next_branch = self.regnode(Opcode::BRANCH);
        self.regtail(ret, next_branch)?;
        let nothing = self.regnode(Opcode::NOTHING);
        self.regtail(ret, nothing)
    }

    // x*? : BRANCH(NOTHING) BRANCH(x BACK) NOTHING
    fn lazy_star(&mut self, ret: PC) -> Result<(), Error> {
        self.reginsert(Opcode::BRANCH, ret, &[])?;
        self.reginsert(Opcode::NOTHING, ret, &[])?;
        self.reginsert(Opcode::BRANCH, ret, &[])?;
        let second = ret + 6;
        self.regtail(ret, second)?;
        let back = self.regnode(Opcode::BACK);
        self.regoptail(second, back)?;
        self.regtail(back, ret)?;
        let nothing = self.regnode(Opcode::NOTHING);
        self.regtail(ret, nothing)?;
        self.regoptail(ret, nothing)
    }

    // x+ : x BRANCH(BACK) BRANCH(NOTHING) NOTHING
    fn plus(&mut self, ret: PC, lazy: bool) -> Result<(), Error> {
        if lazy {
            return self.lazy_plus(ret);
        }
        let branch = self.regnode(Opcode::BRANCH);
        self.regtail(ret, branch)?;
        let back = self.regnode(Opcode::BACK);
        self.regtail(back, ret)?;
        let next_branch = self.regnode(Opcode::BRANCH);
        self.regtail(branch, next_branch)?;
        let nothing = self.regnode(Opcode::NOTHING);
        self.regtail(ret, nothing)
    }

    // x+? : x BRANCH(NOTHING) BRANCH(BACK) NOTHING
    fn lazy_plus(&mut self, ret: PC) -> Result<(), Error> {
        let first = self.regnode(Opcode::BRANCH);
        self.regtail(ret, first)?;
        let leave = self.regnode(Opcode::NOTHING);
        let second = self.regnode(Opcode::BRANCH);
        self.regtail(first, second)?;
        let back = self.regnode(Opcode::BACK);
        self.regtail(back, ret)?;
        let nothing = self.regnode(Opcode::NOTHING);
        self.regtail(ret, nothing)?;
        self.regtail(leave, nothing)
    }

    // x{n,m} on a wide atom: the copy at `ret`, then re-parsed copies of the
    // atom chained after it.
    fn expand(&mut self, ret: PC, repeat: Repeat, atom_start: ParseState) -> Result<(), Error> {
        let resume: ParseState = (self.regparse.clone(), self.regposi);
        if repeat.min == 0 {
            self.optional(ret, repeat.lazy)?;
        }
        for _ in 1..repeat.min {
            self.copy_atom(ret, &atom_start, CopyKind::Mandatory, repeat.lazy)?;
        }
        if repeat.max == INFINITE {
            self.copy_atom(ret, &atom_start, CopyKind::Star, repeat.lazy)?;
        } else {
            for _ in 0..repeat.max - repeat.min.max(1) {
                self.copy_atom(ret, &atom_start, CopyKind::Optional, repeat.lazy)?;
            }
        }
        self.regparse = resume.0;
        self.regposi = resume.1;
        Ok(())
    }

    fn copy_atom(
        &mut self,
        ret: PC,
        atom_start: &ParseState,
        kind: CopyKind,
        lazy: bool,
    ) -> Result<(), Error> {
        self.regparse = atom_start.0.clone();
        self.regposi = atom_start.1;
        let (copy, _) = self.regatom()?;
        match kind {
            CopyKind::Mandatory => {}
            CopyKind::Optional => self.optional(copy, lazy)?,
            CopyKind::Star => self.star(copy, lazy)?,
        }
        self.regtail(ret, copy)?;
        if self.size() >= MAX_PROGRAM_SIZE {
            return Err(Error::InvalidRegex(self.regposi, "regex too big"));
        }
        Ok(())
    }

    // consume a quantifier if one follows
    fn parse_repeat(&mut self) -> Result<Option<Repeat>, Error> {
        if !self.is_quantifier_at(0) {
            return Ok(None);
        }
        let (min, max) = match self.exp_next() {
            Some('*') => (0, INFINITE),
            Some('+') => (1, INFINITE),
            Some('?') => (0, 1),
            Some('{') => {
                let min = self.scan_count()?;
                let max = if self.exp_peak() == Some(',') {
                    self.exp_advance();
                    if self.exp_peak() == Some('}') {
                        INFINITE
                    } else {
                        self.scan_count()?
                    }
                } else {
                    min
                };
                self.exp_advance(); /* '}' */
                if min > max {
                    return Err(Error::InvalidRegex(self.regposi, "illegal {x,y} with x > y"));
                }
                (min, max)
            }
            _ => return Err(Error::InvalidRegex(self.regposi, "internal error: quantifier expected")),
        };
        let lazy = self.exp_peak() == Some('?');
        if lazy {
            self.exp_advance();
        }
        Ok(Some(Repeat { min, max, lazy }))
    }

    fn scan_count(&mut self) -> Result<u16, Error> {
        let mut value: u32 = 0;
        while let Some(digit) = self.exp_peak().and_then(|ch| ch.to_digit(10)) {
            self.exp_advance();
            value = value * 10 + digit;
            if value >= INFINITE as u32 {
                return Err(Error::InvalidRegex(self.regposi, "repetition count too large"));
            }
        }
        Ok(value as u16)
    }

    // does a quantifier start `n` symbols ahead? `{` only counts when it
    // opens `{n}`, `{n,}` or `{n,m}`.
    fn is_quantifier_at(&mut self, n: usize) -> bool {
        match self.exp_peak_nth(n) {
            Some(ch) if is_repn(ch) => true,
            Some('{') => self.is_count_at(n + 1),
            _ => false,
        }
    }

    // `n}`, `n,}` or `n,m}` starting `n` symbols ahead
    fn is_count_at(&mut self, mut i: usize) -> bool {
        let is_digit = |ch: Option<char>| ch.is_some_and(|ch| ch.is_ascii_digit());
        if !is_digit(self.exp_peak_nth(i)) {
            return false;
        }
        while is_digit(self.exp_peak_nth(i)) {
            i += 1;
        }
        if self.exp_peak_nth(i) == Some(',') {
            i += 1;
            while is_digit(self.exp_peak_nth(i)) {
                i += 1;
            }
        }
        self.exp_peak_nth(i) == Some('}')
    }

    /*
    - regatom - the lowest level
    *
    * Optimization:  gobbles an entire sequence of ordinary characters so that
    * it can turn them into a single node, which is smaller to store and
    * faster to run.  Backslashed characters are exceptions, each becoming a
    * separate node; the code is simpler that way and it's not worth fixing.
    */
    fn regatom(&mut self) -> Result<(PC, CompStatus), Error> {
        let mut flags = CompStatus::WORST;
        let ch = self.exp_next();
        let ret;
        match ch {
            Some('^') => {
                ret = self.regnode(Opcode::BOL);
            }
            Some('$') => {
                ret = self.regnode(Opcode::EOL);
            }
            Some('.') => {
                ret = self.regnode(Opcode::ANY);
                flags |= CompStatus::HASWIDTH | CompStatus::SIMPLE;
            }
            Some('[') => {
                let set = self.scan_char_class()?;
                ret = self.regclass(set);
                flags |= CompStatus::HASWIDTH | CompStatus::SIMPLE;
            }
            Some('(') => {
                self.group_construct()?;
                let (sub_ret, sub_reg_flags) = self.reg(true)?;
                ret = sub_ret;
                flags |= sub_reg_flags & (CompStatus::HASWIDTH | CompStatus::SPSTART);
            }
            Some('|') | Some(')') | None => {
                return Err(Error::InvalidRegex(self.regposi, "internal error: \\0|) unexpected"))
            }
            Some('?') | Some('+') | Some('*') => {
                return Err(Error::InvalidRegex(self.regposi, "?+* follows nothing"));
            }
            Some('{') if self.is_count_at(0) => {
                return Err(Error::InvalidRegex(self.regposi, "?+* follows nothing"));
            }
            Some('\\') => return self.regescape(),

            // nomal case, single character or a string of characters handle here.
            Some(ch) => {
                if is_meta(ch) {
                    return Err(Error::InvalidRegex(self.regposi, "internal error: meta char unexpected"));
                }
                let mut len = 0;
                // absorb as many as simple char
                while len < MAX_LITERAL - 1 {
                    match self.exp_peak_nth(len) {
                        Some(next) if !is_meta(next) && !(next == '{' && self.is_quantifier_at(len)) => {
                            len += 1
                        }
                        _ => break,
                    }
                }
                // consider "abcd*", we must back one character, since '*' is left combination
                if len > 0 && self.is_quantifier_at(len) {
                    len -= 1; /* Back off clear of ?+* operand. */
                }
                flags |= CompStatus::HASWIDTH;
                if len == 0 {
                    flags |= CompStatus::SIMPLE;
                }

                let mut symbols = Vec::with_capacity(len + 1);
                symbols.push(self.fold(ch as u32));
                for _ in 0..len {
                    let ch = self
                        .exp_next()
                        .ok_or(Error::InvalidRegex(self.regposi, "internal error: literal ran short"))?;
                    symbols.push(self.fold(ch as u32));
                }
                ret = self.regliteral(&symbols);
            }
        };
        Ok((ret, flags))
    }

    // the part of `(` that follows it: `(?:` is the only construct besides
    // a plain group.
    fn group_construct(&mut self) -> Result<(), Error> {
        if self.exp_peak() != Some('?') {
            return Ok(());
        }
        if self.exp_peak_nth(1) == Some(':') {
            self.exp_advance();
            self.exp_advance();
            return Ok(());
        }
        let construct: String = self.exp_peak_nth(1).map(String::from).unwrap_or_default();
        Err(Error::UnsupportedFeature(format!("group construct (?{}", construct)))
    }

    // an escape outside a character class; the backslash is consumed.
    fn regescape(&mut self) -> Result<(PC, CompStatus), Error> {
        let simple = CompStatus::HASWIDTH | CompStatus::SIMPLE;
        let ecma = self.options.contains(RegexOptions::ECMASCRIPT);
        let ch = self
            .exp_next()
            .ok_or(Error::InvalidRegex(self.regposi, "trailing \\"))?;
        let builtin = match (ch, ecma) {
            ('d', false) => Some(&DIGIT_CLASS),
            ('d', true) => Some(&ECMA_DIGIT_CLASS),
            ('D', false) => Some(&NOT_DIGIT_CLASS),
            ('D', true) => Some(&NOT_ECMA_DIGIT_CLASS),
            ('w', false) => Some(&WORD_CLASS),
            ('w', true) => Some(&ECMA_WORD_CLASS),
            ('W', false) => Some(&NOT_WORD_CLASS),
            ('W', true) => Some(&NOT_ECMA_WORD_CLASS),
            ('s', false) => Some(&SPACE_CLASS),
            ('s', true) => Some(&ECMA_SPACE_CLASS),
            ('S', false) => Some(&NOT_SPACE_CLASS),
            ('S', true) => Some(&NOT_ECMA_SPACE_CLASS),
            _ => None,
        };
        if let Some(builtin) = builtin {
            let mut set = CharSet::clone(builtin);
            if self.ignore_case() {
                set.add_lowercase();
            }
            return Ok((self.regclass(set), simple));
        }

        let ret = match ch {
            'p' | 'P' => {
                let name = self.scan_property_name()?;
                let mut set = CharSet::new();
                set.add_category_with(&name, ch == 'P', self.ignore_case(), self.resolver)?;
                if self.ignore_case() {
                    set.add_lowercase();
                }
                return Ok((self.regclass(set), simple));
            }
            'b' => self.regnode(Opcode::BOUND),
            'B' => self.regnode(Opcode::NOTBOUND),
            'A' => self.regnode(Opcode::BOT),
            'z' => self.regnode(Opcode::EOT),
            'Z' => self.regnode(Opcode::EOTZ),
            '1'..='9' => {
                return Err(Error::UnsupportedFeature(format!("backreference \\{}", ch)));
            }
            _ => {
                let symbol = self.scan_escape(ch)?;
                let symbol = self.fold(symbol);
                return Ok((self.regliteral(&[symbol]), simple));
            }
        };
        Ok((ret, CompStatus::WORST))
    }

    // value of a single-symbol escape; `ch` is the symbol after the backslash.
    fn scan_escape(&mut self, ch: char) -> Result<u32, Error> {
        let symbol = match ch {
            'x' if self.exp_peak() == Some('{') => {
                self.exp_advance();
                let mut value: u32 = 0;
                let mut digits = 0;
                while let Some(digit) = self.exp_peak().and_then(|ch| ch.to_digit(16)) {
                    self.exp_advance();
                    value = value.saturating_mul(16).saturating_add(digit);
                    digits += 1;
                }
                if digits == 0 || self.exp_next() != Some('}') {
                    return Err(Error::InvalidRegex(self.regposi, "malformed \\x{X} escape"));
                }
                value
            }
            'x' => self.scan_hex(2)?,
            'u' => self.scan_hex(4)?,
            '0' => {
                let mut value = 0;
                for _ in 0..2 {
                    match self.exp_peak().and_then(|ch| ch.to_digit(8)) {
                        Some(digit) => {
                            self.exp_advance();
                            value = value * 8 + digit;
                        }
                        None => break,
                    }
                }
                value
            }
            'c' => match self.exp_next() {
                Some(letter) if letter.is_ascii_alphabetic() => (letter as u32) % 32,
                _ => return Err(Error::InvalidRegex(self.regposi, "missing control character")),
            },
            'n' => 0x0A,
            't' => 0x09,
            'r' => 0x0D,
            'f' => 0x0C,
            'v' => 0x0B,
            'e' => 0x1B,
            'a' => 0x07,
            ch if ch.is_ascii_alphanumeric() => {
                return Err(Error::InvalidRegex(self.regposi, "unrecognized escape"));
            }
            ch => ch as u32,
        };
        if symbol > MAX_RUNE {
            return Err(Error::InvalidRegex(self.regposi, "code point out of range"));
        }
        Ok(symbol)
    }

    fn scan_hex(&mut self, digits: usize) -> Result<u32, Error> {
        let mut value = 0;
        for _ in 0..digits {
            match self.exp_next().and_then(|ch| ch.to_digit(16)) {
                Some(digit) => value = value * 16 + digit,
                None => return Err(Error::InvalidRegex(self.regposi, "insufficient hex digits")),
            }
        }
        Ok(value)
    }

    // `{Name}` after \p or \P
    fn scan_property_name(&mut self) -> Result<String, Error> {
        if self.exp_next() != Some('{') {
            return Err(Error::InvalidRegex(self.regposi, "incomplete \\p{X} character escape"));
        }
        let mut name = String::new();
        loop {
            match self.exp_next() {
                Some('}') if !name.is_empty() => return Ok(name),
                Some(ch) if ch.is_alphanumeric() || ch == '_' || ch == '-' => name.push(ch),
                _ => {
                    return Err(Error::InvalidRegex(self.regposi, "malformed \\p{X} character escape"))
                }
            }
        }
    }

    /*
    - scan_char_class - the body of a [...] class, opening bracket consumed
    *
    * A `-[...]` at the end of a class subtracts the nested class from it.
    */
    fn scan_char_class(&mut self) -> Result<CharSet, Error> {
        let ecma = self.options.contains(RegexOptions::ECMASCRIPT);
        let mut set = CharSet::new();
        if self.exp_peak() == Some('^') {
            self.exp_advance();
            set.set_negate(true);
        }
        let mut first = true;
        loop {
            let ch = self
                .exp_next()
                .ok_or(Error::InvalidRegex(self.regposi, "unterminated [] set"))?;
            match ch {
                ']' if !first => break,
                '-' if !first && self.exp_peak() == Some('[') => {
                    self.exp_advance();
                    let sub = self.scan_char_class()?;
                    if self.exp_next() != Some(']') {
                        return Err(Error::InvalidRegex(
                            self.regposi,
                            "a subtraction must be the last element in a character class",
                        ));
                    }
                    set.add_subtraction(sub);
                    break;
                }
                '\\' => {
                    let esc = self
                        .exp_next()
                        .ok_or(Error::InvalidRegex(self.regposi, "unterminated [] set"))?;
                    match esc {
                        'd' | 'D' => set.add_digit(ecma, esc == 'D'),
                        'w' | 'W' => set.add_word(ecma, esc == 'W'),
                        's' | 'S' => set.add_space(ecma, esc == 'S'),
                        'p' | 'P' => {
                            let name = self.scan_property_name()?;
                            set.add_category_with(&name, esc == 'P', self.ignore_case(), self.resolver)?;
                        }
                        // \b is backspace inside a class
                        'b' => self.class_range_from(&mut set, 0x08)?,
                        _ => {
                            let lo = self.scan_escape(esc)?;
                            self.class_range_from(&mut set, lo)?;
                        }
                    }
                }
                _ => self.class_range_from(&mut set, ch as u32)?,
            }
            first = false;
        }
        if self.ignore_case() {
            set.add_lowercase();
        }
        Ok(set)
    }

    // add `lo`, or the range `lo-hi` if a range follows
    fn class_range_from(&mut self, set: &mut CharSet, lo: u32) -> Result<(), Error> {
        let is_range = self.exp_peak() == Some('-')
            && !matches!(self.exp_peak_nth(1), Some(']') | Some('[') | None);
        if !is_range {
            set.add_char(lo);
            return Ok(());
        }
        self.exp_advance(); /* '-' */
        let hi = match self.exp_next() {
            Some('\\') => {
                let esc = self
                    .exp_next()
                    .ok_or(Error::InvalidRegex(self.regposi, "unterminated [] set"))?;
                match esc {
                    'd' | 'D' | 'w' | 'W' | 's' | 'S' | 'p' | 'P' => {
                        return Err(Error::InvalidRegex(
                            self.regposi,
                            "cannot include class in character range",
                        ));
                    }
                    'b' => 0x08,
                    _ => self.scan_escape(esc)?,
                }
            }
            Some(ch) => ch as u32,
            None => return Err(Error::InvalidRegex(self.regposi, "unterminated [] set")),
        };
        if lo > hi {
            return Err(Error::InvalidRegex(self.regposi, "[x-y] range in reverse order"));
        }
        set.add_range(lo, hi);
        Ok(())
    }

    // emit the cheapest node that matches one symbol of `set`
    fn regclass(&mut self, set: CharSet) -> PC {
        if set.is_singleton() {
            return self.regliteral(&[set.singleton_char()]);
        }
        if set.is_singleton_inverse() {
            let ret = self.regnode(Opcode::ANYBUT);
            self.regchar(set.singleton_char());
            return ret;
        }
        let ret = self.regnode(Opcode::ANYOF);
        let index = self.regset(set);
        self.regu16(index);
        ret
    }

    fn regset(&mut self, set: CharSet) -> u16 {
        if !self.emit_code {
            return 0;
        }
        if let Some(&index) = self.set_index.get(&set) {
            return index;
        }
        let index = self.program.add_set(set.clone());
        self.set_index.insert(set, index);
        index
    }

    fn regliteral(&mut self, symbols: &[u32]) -> PC {
        let ret = self.regnode(Opcode::EXACTLY);
        self.regu16(symbols.len() as u16);
        for &symbol in symbols {
            self.regchar(symbol);
        }
        ret
    }

    fn ignore_case(&self) -> bool {
        self.options.contains(RegexOptions::IGNORE_CASE)
    }

    fn fold(&self, symbol: u32) -> u32 {
        if self.ignore_case() {
            to_lower(symbol)
        } else {
            symbol
        }
    }

    fn size(&self) -> usize {
        if self.emit_code {
            self.program.pc.0
        } else {
            self.code_size
        }
    }

    // emit a node at tail of program, this shouldn't fail
    fn regnode(&mut self, op: Opcode) -> PC {
        if self.emit_code {
            self.program.emit_node(op)
        } else {
            self.code_size += 3;
            ProgramCounter(0)
        }
    }
    //  emit (if appropriate) a byte of code at tail of program. shouldn't fail
    fn regc(&mut self, byte: u8) {
        if self.emit_code {
            self.program.emit_byte(byte);
        } else {
            self.code_size += 1;
        }
    }
    fn regu16(&mut self, value: u16) {
        if self.emit_code {
            self.program.emit_u16(value);
        } else {
            self.code_size += 2;
        }
    }
    // emit one symbol at tail of program
    fn regchar(&mut self, symbol: u32) {
        if self.emit_code {
            self.program.emit_symbol(symbol);
        } else {
            self.code_size += 4;
        }
    }

    // insert an operator in front of already-emitted operand
    fn reginsert(&mut self, op: Opcode, opnd: PC, operand: &[u8]) -> Result<(), Error> {
        if self.emit_code {
            self.program.insert_node(op, opnd, operand)
        } else {
            self.code_size += 3 + operand.len();
            Ok(())
        }
    }

    // forget the atom emitted at `ret`
    fn regtruncate(&mut self, ret: PC) {
        if self.emit_code {
            self.program.truncate(ret);
        }
    }

    fn regnext(&self, pc: PC) -> Option<PC> {
        self.program.next_at(pc)
    }

    fn regtail(&mut self, chain: PC, new_tail: PC) -> Result<(), Error> {
        if self.emit_code {
            self.program.update_tail(chain, new_tail)
        } else {
            Ok(())
        }
    }
    fn regoptail(&mut self, branch: PC, new_tail: PC) -> Result<(), Error> {
        if self.emit_code {
            self.program.update_oprand_tail(branch, new_tail)
        } else {
            Ok(())
        }
    }
    fn exp_peak(&mut self) -> Option<char> {
        self.regparse.peek().copied()
    }
    fn exp_peak_nth(&mut self, n: usize) -> Option<char> {
        self.regparse.peek_nth(n).copied()
    }
    fn exp_advance(&mut self) {
        self.regposi += 1;
        self.regparse.next();
    }
    fn exp_next(&mut self) -> Option<char> {
        self.regposi += 1;
        self.regparse.next()
    }
}
