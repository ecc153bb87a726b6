use core::fmt;
use primitives::error::{ScriptError, ScriptErrorKind};

/// Errors raised while a [`crate::vm::Vm`] or [`crate::stack::StackMachine`]
/// executes. Narrow and local, the same way `revm-interpreter`'s
/// `InstructionResult` stays local to the interpreter crate before its
/// handler folds it into the engine's own error type; here a `From` impl
/// folds straight into the shared [`ScriptError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpreterError {
    StackUnderflow,
    StackOverflow,
    TypeMismatch { expected: primitives::Tag, found: primitives::Tag },
    DivideByZero,
    ActionArity { ordinal: u16, got: u8 },
    ActionFailed { ordinal: u16 },
    RecursionTooDeep,
    CallDepthExceeded,
    InstructionBudgetExceeded,
    Aborted,
    SituationSignatureMismatch,
    FrameUnderflow,
}

impl fmt::Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StackUnderflow => f.write_str("stack underflow"),
            Self::StackOverflow => f.write_str("stack overflow or overlapping copy"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected stack cell of type {expected}, found {found}")
            }
            Self::DivideByZero => f.write_str("division or modulo by zero"),
            Self::ActionArity { ordinal, got } => {
                write!(f, "action {ordinal} called with {got} arguments outside its declared arity")
            }
            Self::ActionFailed { ordinal } => write!(f, "host action {ordinal} failed"),
            Self::RecursionTooDeep => f.write_str("VM re-entrancy depth exceeded"),
            Self::CallDepthExceeded => f.write_str("call-depth guard exceeded"),
            Self::InstructionBudgetExceeded => f.write_str("instruction-count guard exceeded"),
            Self::Aborted => f.write_str("host requested abort"),
            Self::SituationSignatureMismatch => {
                f.write_str("saved situation magic, name or code size did not match")
            }
            Self::FrameUnderflow => f.write_str("RETN with no matching call frame"),
        }
    }
}

impl std::error::Error for InterpreterError {}

impl From<InterpreterError> for ScriptError {
    fn from(e: InterpreterError) -> Self {
        let kind = match e {
            InterpreterError::StackUnderflow => ScriptErrorKind::StackUnderflow,
            InterpreterError::StackOverflow => ScriptErrorKind::StackOverflow,
            InterpreterError::TypeMismatch { expected, found } => {
                ScriptErrorKind::TypeMismatch { expected, found }
            }
            InterpreterError::DivideByZero => ScriptErrorKind::DivideByZero,
            InterpreterError::ActionArity { ordinal, got } => {
                ScriptErrorKind::ActionArity { ordinal, got }
            }
            InterpreterError::ActionFailed { ordinal } => {
                ScriptErrorKind::ActionFailed { ordinal }
            }
            InterpreterError::RecursionTooDeep => ScriptErrorKind::RecursionTooDeep,
            InterpreterError::CallDepthExceeded => ScriptErrorKind::CallDepthExceeded,
            InterpreterError::InstructionBudgetExceeded => {
                ScriptErrorKind::InstructionBudgetExceeded
            }
            InterpreterError::Aborted => ScriptErrorKind::Aborted,
            InterpreterError::SituationSignatureMismatch => {
                ScriptErrorKind::SituationSignatureMismatch
            }
            // NWScript's own error vocabulary has no separate "frame
            // underflow" kind; an unbalanced RETN is a stack discipline
            // violation from the host's point of view.
            InterpreterError::FrameUnderflow => ScriptErrorKind::StackUnderflow,
        };
        ScriptError::new(kind)
    }
}
