use core::fmt;
use primitives::error::{ScriptError, ScriptErrorKind};

/// Errors raised by the three analyzer passes. Narrower than
/// [`ScriptError`], mirroring [`bytecode::BytecodeError`]'s relationship
/// to the unified enum.
#[derive(Clone, Debug, PartialEq)]
pub enum AnalyzerError {
    /// Bytecode decoding failed mid-scan (pass 1 or pass 2).
    Bytecode(bytecode::BytecodeError),
    /// Two edges into the same flow disagree on SP (spec §4.7).
    FlowSpMismatch { expected: i32, found: i32 },
    /// The work-list could not make progress: every remaining item is
    /// blocked on a callee that is itself blocked, transitively, on the
    /// caller (spec §4.7, "Termination").
    UnboundedRecursion,
    /// A stack-relative IR access fell outside the flow's known SP range.
    StackOutOfRange { offset: i32 },
    /// A global-relative IR access fell outside the known global frame.
    GlobalOutOfRange { offset: i32 },
    /// The process-wide scanned-instruction bound was exceeded.
    InstructionLimitExceeded,
}

impl fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytecode(e) => write!(f, "{e}"),
            Self::FlowSpMismatch { expected, found } => {
                write!(f, "flow join disagrees on SP: expected {expected}, found {found}")
            }
            Self::UnboundedRecursion => {
                f.write_str("structural analysis cannot progress: unbounded recursion")
            }
            Self::StackOutOfRange { offset } => {
                write!(f, "stack-relative access out of range at offset {offset}")
            }
            Self::GlobalOutOfRange { offset } => {
                write!(f, "global-relative access out of range at offset {offset}")
            }
            Self::InstructionLimitExceeded => {
                f.write_str("analysis exceeded the scanned-instruction bound")
            }
        }
    }
}

impl std::error::Error for AnalyzerError {}

impl From<bytecode::BytecodeError> for AnalyzerError {
    fn from(e: bytecode::BytecodeError) -> Self {
        Self::Bytecode(e)
    }
}

impl From<AnalyzerError> for ScriptError {
    fn from(e: AnalyzerError) -> Self {
        let kind = match e {
            AnalyzerError::Bytecode(inner) => return inner.into(),
            AnalyzerError::FlowSpMismatch { expected, found } => {
                ScriptErrorKind::FlowSpMismatch { expected, found }
            }
            AnalyzerError::UnboundedRecursion => ScriptErrorKind::UnboundedRecursion,
            AnalyzerError::StackOutOfRange { offset } => ScriptErrorKind::StackOutOfRange { offset },
            AnalyzerError::GlobalOutOfRange { offset } => {
                ScriptErrorKind::GlobalOutOfRange { offset }
            }
            AnalyzerError::InstructionLimitExceeded => ScriptErrorKind::InstructionBudgetExceeded,
        };
        ScriptError::new(kind)
    }
}
