use crate::engine_type::EngineTypeId;
use std::string::String;
use std::vec::Vec;

/// Declared type of one action parameter or return value (spec §6.2).
///
/// `Action` parameters consume zero stack cells (they name a subroutine, not
/// a value); `Vector` consumes three; every other variant consumes one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionType {
    Void,
    Int,
    Float,
    String,
    Object,
    Vector,
    Engine(EngineTypeId),
    Action,
}

impl ActionType {
    /// Number of stack cells one value of this type occupies.
    pub fn cell_count(self) -> u32 {
        match self {
            ActionType::Void | ActionType::Action => 0,
            ActionType::Vector => 3,
            _ => 1,
        }
    }
}

/// One entry of the host's action table (spec §6.2), registered before any
/// `Execute` call.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionSignature {
    pub ordinal: u16,
    pub name: String,
    pub min_params: u8,
    pub num_params: u8,
    pub parameter_types: Vec<ActionType>,
    pub return_type: ActionType,
}

impl ActionSignature {
    /// Checks the runtime argument count against `minParams ..= numParams`
    /// (spec §4.5, "Argument-count policing").
    pub fn accepts_arg_count(&self, n: u8) -> bool {
        n >= self.min_params && n <= self.num_params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_counts() {
        assert_eq!(ActionType::Vector.cell_count(), 3);
        assert_eq!(ActionType::Action.cell_count(), 0);
        assert_eq!(ActionType::Int.cell_count(), 1);
    }

    #[test]
    fn arity_policing() {
        let sig = ActionSignature {
            ordinal: 17,
            name: "TestAction".into(),
            min_params: 1,
            num_params: 3,
            parameter_types: vec![ActionType::Int, ActionType::Int, ActionType::Int],
            return_type: ActionType::Void,
        };
        assert!(!sig.accepts_arg_count(0));
        assert!(sig.accepts_arg_count(1));
        assert!(sig.accepts_arg_count(3));
        assert!(!sig.accepts_arg_count(4));
    }
}
