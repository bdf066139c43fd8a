//! Error taxonomy shared by the assembler, disassembler and emulator.

use std::fmt;

use crate::core::types::C8Addr;

/// Common result alias, specialized to [`Error`] rather than a boxed trait
/// object so callers can match on `kind` directly.
pub type CResult<T = ()> = Result<T, Error>;

/// Sub-kind of a [`Error::Parse`] failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No opcode-table entry has this mnemonic at all.
    UnknownMnemonic,
    /// The mnemonic exists, but not with this many arguments.
    ArgCountMismatch,
    /// A literal token looked like a hex escape but didn't parse.
    BadHexLiteral,
    /// The same label was defined twice.
    DuplicateLabel,
    /// A data declaration value doesn't fit in its declared width.
    DataDeclarationOverflow,
    /// A data declaration value could not be parsed at all.
    BadDataLiteral,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParseErrorKind::UnknownMnemonic => "unknown mnemonic",
            ParseErrorKind::ArgCountMismatch => "argument count mismatch",
            ParseErrorKind::BadHexLiteral => "malformed hex literal",
            ParseErrorKind::DuplicateLabel => "duplicate label",
            ParseErrorKind::DataDeclarationOverflow => "data declaration overflow",
            ParseErrorKind::BadDataLiteral => "malformed data literal",
        };
        f.write_str(s)
    }
}

/// Every way assembly, disassembly, or emulation can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// ROM file is missing or exceeds [`crate::core::types::MAX_ROM_SIZE`].
    RomLoad(String),
    /// Pass 1/2 assembler failure tied to a source line.
    Parse {
        /// 1-indexed source line.
        line: usize,
        /// What went wrong.
        kind: ParseErrorKind,
    },
    /// No opcode-table variant matched the mnemonic with these arguments.
    UnknownMnemonicArgs {
        /// 1-indexed source line.
        line: usize,
    },
    /// `call` pushed past the 12-entry call stack.
    StackOverflow,
    /// `ret` popped an empty call stack.
    StackUnderflow,
    /// The fetched bytes did not decode to a valid, executable instruction.
    InvalidInstruction {
        /// Program counter at fetch time.
        pc: C8Addr,
        /// The two raw bytes that failed to decode.
        bytes: [u8; 2],
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::RomLoad(msg) => write!(f, "ROM load error: {}", msg),
            Error::Parse { line, kind } => write!(f, "line {}: {}", line, kind),
            Error::UnknownMnemonicArgs { line } => {
                write!(f, "line {}: no opcode variant matches these arguments", line)
            }
            Error::StackOverflow => write!(f, "call stack overflow"),
            Error::StackUnderflow => write!(f, "call stack underflow"),
            Error::InvalidInstruction { pc, bytes } => write!(
                f,
                "invalid instruction {:02x}{:02x} at {:#06x}",
                bytes[0], bytes[1], pc
            ),
        }
    }
}

impl std::error::Error for Error {}
