use std::fmt;

/// Everything that can go wrong while compiling a pattern or scanning an input.
///
/// Not finding a match is not an error: scans return `Ok(None)` for that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The pattern text is malformed. Carries the symbol position the parser
    /// stopped at and a short description.
    InvalidRegex(usize, &'static str),
    /// The pattern asks for something this engine cannot do, such as an
    /// unknown `\p{..}` property with no resolver installed.
    UnsupportedFeature(String),
    /// A scan was started past the end of the input.
    InvalidOffset { offset: usize, len: usize },
    /// The scan visited more program nodes than its step budget allows.
    BacktrackLimit(usize),
    /// The scan needed more open backtracking points than its budget allows.
    RecursionLimit(usize),

    // Program corruption. These never escape a program built by `compile`.
    OutOfBound,
    InvalidOpcode,
    InvalidOperand,
    ExecuteFailed(usize, &'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRegex(pos, msg) => {
                write!(f, "invalid pattern at position {}: {}", pos, msg)
            }
            Error::UnsupportedFeature(what) => write!(f, "unsupported feature: {}", what),
            Error::InvalidOffset { offset, len } => {
                write!(f, "start offset {} is out of bounds for input of length {}", offset, len)
            }
            Error::BacktrackLimit(steps) => write!(f, "scan exceeded the limit of {} steps", steps),
            Error::RecursionLimit(depth) => {
                write!(f, "scan needed more than {} open backtracking points", depth)
            }
            Error::OutOfBound => write!(f, "program counter out of bound"),
            Error::InvalidOpcode => write!(f, "invalid opcode"),
            Error::InvalidOperand => write!(f, "invalid operand"),
            Error::ExecuteFailed(pc, msg) => write!(f, "execute failed at {}: {}", pc, msg),
        }
    }
}

impl std::error::Error for Error {}
