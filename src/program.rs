#![allow(clippy::upper_case_acronyms)]

use num_enum::{IntoPrimitive, TryFromPrimitive};

use std::{
    fmt::Display,
    ops::{Add, AddAssign, Sub},
};

use crate::{syntax::CharSet, Error};

/// Largest program the 15-bit node offsets can address.
pub(crate) const MAX_PROGRAM_SIZE: usize = 0x7fff;

/// Repeat count meaning "no upper bound".
pub(crate) const INFINITE: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, IntoPrimitive, TryFromPrimitive, PartialEq, Eq, Display)]
#[repr(u8)]
pub(crate) enum Opcode {
    /* definition	number	opnd?	meaning */
    END = 255,     /* no	End of program. */
    BOL = 1,       /* no	Match beginning of line. */
    EOL = 2,       /* no	Match end of line. */
    ANY = 3,       /* no	Match any symbol but newline. */
    ANYOF = 4,     /* set	Match any symbol of this set. */
    ANYBUT = 5,    /* sym	Match any symbol but this one. */
    BRANCH = 6,    /* node	Match this, or the next..\&. */
    BACK = 7,      /* no	"next" ptr points backward. */
    EXACTLY = 8,   /* str	Match this string. */
    NOTHING = 9,   /* no	Match empty string. */
    STAR = 10,     /* node	Match this 0 or more times. */
    PLUS = 11,     /* node	Match this 1 or more times. */
    CURLY = 12,    /* min max node	Match this min..=max times, greedy. */
    MINCURLY = 13, /* min max node	Match this min..=max times, lazy. */
    BOUND = 14,    /* no	Match a word boundary. */
    NOTBOUND = 15, /* no	Match anywhere but a word boundary. */
    BOT = 16,      /* no	Match beginning of input. */
    EOT = 17,      /* no	Match end of input. */
    EOTZ = 18,     /* no	Match end of input or before a final newline. */
    BEGIN = 100,   /* no	Program begin. */
}

impl Opcode {
    /// Operand bytes that sit between the node header and whatever follows.
    pub fn operand_len(self) -> usize {
        match self {
            Opcode::ANYOF => 2,
            Opcode::ANYBUT => 4,
            Opcode::CURLY | Opcode::MINCURLY => 4,
            _ => 0,
        }
    }
}

// use pc(index in to bincode vec) to simulate pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ProgramCounter(pub usize);
impl Display for ProgramCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl Add<usize> for ProgramCounter {
    type Output = ProgramCounter;

    fn add(self, rhs: usize) -> Self::Output {
        ProgramCounter(self.0 + rhs)
    }
}
impl AddAssign<usize> for ProgramCounter {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}
impl Sub<usize> for ProgramCounter {
    type Output = ProgramCounter;

    fn sub(self, rhs: usize) -> Self::Output {
        ProgramCounter(self.0 - rhs)
    }
}
pub(crate) type PC = ProgramCounter;

/// Compiled pattern: a chain of 3-byte node headers (opcode, 15-bit next
/// offset) with operands inline, plus the character classes `ANYOF` refers to.
#[derive(Debug, Clone)]
pub(crate) struct Program {
    pub pc: PC,
    bincode: Vec<u8>,
    sets: Vec<CharSet>,
}
impl Program {
    pub fn new() -> Program {
        Program {
            pc: ProgramCounter(0),
            bincode: vec![],
            sets: vec![],
        }
    }
    pub fn reserve(&mut self, additional: usize) {
        self.bincode.reserve(additional);
    }
    fn is_node_out_of_bound(&self, pc: PC) -> Result<(), Error> {
        if pc + 2 >= self.pc {
            Err(Error::OutOfBound)
        } else {
            Ok(())
        }
    }
    // return the opcode at the position pc in bincode.
    pub fn opcode_at(&self, pc: PC) -> Result<Opcode, Error> {
        self.is_node_out_of_bound(pc)?;
        Opcode::try_from(self.bincode[pc.0]).map_err(|_| Error::InvalidOpcode)
    }
    // return the next pc at the position pc in bincode.
    pub fn next_at(&self, pc: PC) -> Option<PC> {
        self.is_node_out_of_bound(pc).ok()?;
        let high_byte = self.bincode[(pc + 1).0] as usize;
        let low_byte = self.bincode[(pc + 2).0] as usize;
        let offset = ((high_byte & 0o177) << 8) + low_byte;

        if offset == 0 {
            return None;
        }
        if self.opcode_at(pc).ok()? == Opcode::BACK {
            Some(pc - offset)
        } else {
            Some(pc + offset)
        }
    }

    // first node owned by `pc`: a branch body or the node a loop repeats.
    pub fn operand_at(&self, pc: PC) -> Option<PC> {
        let opcode = self.opcode_at(pc).ok()?;
        let operand = pc + 3 + opcode.operand_len();
        self.is_node_out_of_bound(operand).ok()?;
        Some(operand)
    }

    fn operand_bytes(&self, pc: PC, len: usize) -> Result<&[u8], Error> {
        self.bincode
            .get(pc.0 + 3..pc.0 + 3 + len)
            .ok_or(Error::InvalidOperand)
    }

    fn u16_at(&self, at: usize) -> Result<u16, Error> {
        match self.bincode.get(at..at + 2) {
            Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
            _ => Err(Error::InvalidOperand),
        }
    }

    // symbols of an EXACTLY node: u16 count, then one u32 per symbol.
    pub fn literal_at(&self, pc: PC) -> Result<impl Iterator<Item = u32> + '_, Error> {
        let count = self.u16_at(pc.0 + 3)? as usize;
        let bytes = self
            .bincode
            .get(pc.0 + 5..pc.0 + 5 + count * 4)
            .ok_or(Error::InvalidOperand)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
    }

    pub fn literal_len(&self, pc: PC) -> Result<usize, Error> {
        Ok(self.u16_at(pc.0 + 3)? as usize)
    }

    pub fn symbol_at(&self, pc: PC) -> Result<u32, Error> {
        let b = self.operand_bytes(pc, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn set_at(&self, pc: PC) -> Result<&CharSet, Error> {
        let index = self.u16_at(pc.0 + 3)? as usize;
        self.sets.get(index).ok_or(Error::InvalidOperand)
    }

    // (min, max) of a CURLY or MINCURLY node
    pub fn bounds_at(&self, pc: PC) -> Result<(u16, u16), Error> {
        Ok((self.u16_at(pc.0 + 3)?, self.u16_at(pc.0 + 5)?))
    }

    // push a new node in bincode, return origial pc before emit.
    pub fn emit_node(&mut self, opcode: Opcode) -> PC {
        let old_pc = self.pc;
        self.bincode.push(opcode.into());
        self.bincode.push(0);
        self.bincode.push(0);
        self.pc += 3;
        old_pc
    }
    pub fn emit_byte(&mut self, byte: u8) {
        self.bincode.push(byte);
        self.pc += 1;
    }
    pub fn emit_u16(&mut self, value: u16) {
        for byte in value.to_be_bytes() {
            self.emit_byte(byte);
        }
    }
    pub fn emit_symbol(&mut self, symbol: u32) {
        for byte in symbol.to_be_bytes() {
            self.emit_byte(byte);
        }
    }
    // drop everything from `pc` on; only valid for the most recent atom.
    pub fn truncate(&mut self, pc: PC) {
        self.bincode.truncate(pc.0);
        self.pc = pc;
    }

    /// Stores `set` and returns its slot.
    pub fn add_set(&mut self, set: CharSet) -> u16 {
        self.sets.push(set);
        (self.sets.len() - 1) as u16
    }

    #[cfg(test)]
    pub fn set_count(&self) -> usize {
        self.sets.len()
    }

    // insert an operator in front of already-emitted operand
    // Means relocating the operand.
    pub fn insert_node(&mut self, opcode: Opcode, opnd: PC, operand: &[u8]) -> Result<(), Error> {
        self.is_node_out_of_bound(opnd)?;
        let width = 3 + operand.len();
        let begin = opnd.0;
        let mut node = vec![opcode.into(), 0, 0];
        node.extend_from_slice(operand);
        self.bincode.splice(begin..begin, node);
        self.pc += width;
        Ok(())
    }

    // set the next-pointer at the end of a node chain
    pub fn update_tail(&mut self, mut chain: PC, new_tail: PC) -> Result<(), Error> {
        self.is_node_out_of_bound(chain)?;
        while let Some(next) = self.next_at(chain) {
            chain = next;
        }
        let offset = if self.opcode_at(chain)? == Opcode::BACK {
            chain.0 - new_tail.0
        } else {
            new_tail.0 - chain.0
        };
        self.bincode[chain.0 + 1] = ((offset >> 8) & 0o177) as u8;
        self.bincode[chain.0 + 2] = (offset & 0o377) as u8;
        Ok(())
    }

    // regtail on operand of first argument; nop if operandless
    pub fn update_oprand_tail(&mut self, branch: PC, new_tail: PC) -> Result<(), Error> {
        if self.opcode_at(branch)? != Opcode::BRANCH {
            Ok(())
        } else {
            self.update_tail(
                self.operand_at(branch).ok_or(Error::InvalidOperand)?,
                new_tail,
            )
        }
    }

    // bytes a node occupies, operands included
    fn node_len(&self, pc: PC) -> Result<usize, Error> {
        let opcode = self.opcode_at(pc)?;
        Ok(match opcode {
            Opcode::EXACTLY => 3 + 2 + 4 * self.literal_len(pc)?,
            _ => 3 + opcode.operand_len(),
        })
    }
}
impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", Opcode::BEGIN)?;
        let mut pc = ProgramCounter(1);
        while let Ok(opcode) = self.opcode_at(pc) {
            write!(f, "{:>3}:{}", pc.0, opcode)?;
            match self.next_at(pc) {
                Some(next) => write!(f, "({})", next)?,
                None => write!(f, "(0)")?,
            }
            match opcode {
                Opcode::EXACTLY => {
                    if let Ok(literal) = self.literal_at(pc) {
                        for symbol in literal {
                            match char::from_u32(symbol) {
                                Some(ch) if !ch.is_control() => write!(f, "{}", ch)?,
                                _ => write!(f, "\\x{{{:X}}}", symbol)?,
                            }
                        }
                    }
                }
                Opcode::ANYOF => {
                    if let Ok(set) = self.set_at(pc) {
                        write!(f, "{}", set)?;
                    }
                }
                Opcode::ANYBUT => {
                    if let Ok(symbol) = self.symbol_at(pc) {
                        write!(f, "\\x{{{:X}}}", symbol)?;
                    }
                }
                Opcode::CURLY | Opcode::MINCURLY => {
                    if let Ok((min, max)) = self.bounds_at(pc) {
                        if max == INFINITE {
                            write!(f, "{{{},}}", min)?;
                        } else {
                            write!(f, "{{{},{}}}", min, max)?;
                        }
                    }
                }
                _ => {}
            }
            writeln!(f)?;
            match self.node_len(pc) {
                Ok(len) => pc += len,
                Err(_) => break,
            }
        }
        Ok(())
    }
}
