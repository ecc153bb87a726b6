use core::fmt;
use primitives::error::{ScriptError, ScriptErrorKind};

/// Errors local to reading and disassembling a bytecode stream. Narrower
/// than [`ScriptError`] so [`crate::reader::BytecodeReader`] and
/// [`crate::disassembler::Disassembler`] stay decoupled from the unified
/// error enum; a `From` impl folds them in at the call site, mirroring
/// `revm-bytecode::BytecodeDecodeError`'s relationship to its callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BytecodeError {
    TruncatedInstruction,
    InvalidOpcodeType { opcode: u8, type_suffix: u8 },
    UnknownOpcode { opcode: u8 },
}

impl fmt::Display for BytecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TruncatedInstruction => f.write_str("reader ran past end of bytecode"),
            Self::InvalidOpcodeType {
                opcode,
                type_suffix,
            } => write!(
                f,
                "opcode 0x{opcode:02X} does not accept type suffix 0x{type_suffix:02X}"
            ),
            Self::UnknownOpcode { opcode } => write!(f, "unknown opcode 0x{opcode:02X}"),
        }
    }
}

impl std::error::Error for BytecodeError {}

impl From<BytecodeError> for ScriptError {
    fn from(e: BytecodeError) -> Self {
        let kind = match e {
            BytecodeError::TruncatedInstruction => ScriptErrorKind::TruncatedInstruction,
            BytecodeError::InvalidOpcodeType {
                opcode,
                type_suffix,
            } => ScriptErrorKind::InvalidOpcodeType {
                opcode,
                type_suffix,
            },
            BytecodeError::UnknownOpcode { opcode } => ScriptErrorKind::UnknownOpcode { opcode },
        };
        ScriptError::new(kind)
    }
}
