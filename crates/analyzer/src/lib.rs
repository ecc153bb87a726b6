//! Three-pass static analyzer: structure, code, optimizer (spec §3-4).
//!
//! Mirrors `revm-bytecode`'s split between raw decoding (`script-bytecode`)
//! and the higher-level analysis this crate builds on top of it, the way
//! `revm-bytecode::analysis` builds its jump table on top of the raw opcode
//! stream without touching execution.

pub mod code;
pub mod error;
pub mod ir;
pub mod optimizer;
pub mod structure;

pub use error::AnalyzerError;
pub use ir::{
    ConstLiteral, ControlFlow, FlowId, Instruction, IrOp, IrType, Subroutine, SubroutineFlags,
    Termination, VarClass, VarFlags, VarId, Variable,
};
pub use structure::{ActionTable, EntryShape, StructureAnalysis};

use std::sync::Arc;

/// Fully analyzed program: every subroutine, lifted to IR and optionally
/// optimized (spec §3, "Program" is implicit as the top-level analyzer
/// output — the set of Subroutines reachable from the entry bootstrap).
#[derive(Debug)]
pub struct Program {
    pub subroutines: Vec<Subroutine>,
    pub index_by_entry: std::collections::HashMap<u32, usize>,
    pub entry: EntryShape,
    pub global_count: u32,
}

impl Program {
    pub fn subroutine_at(&self, entry_pc: u32) -> Option<&Subroutine> {
        self.index_by_entry.get(&entry_pc).map(|&i| &self.subroutines[i])
    }
}

/// Runs all three passes over `code` and returns the finished [`Program`].
/// `optimize` gates pass 3, mirroring the `EnableIROptimizations` control
/// (spec §6.6) — the engine crate threads that flag through to here.
pub fn analyze_program(
    code: &Arc<[u8]>,
    actions: &dyn ActionTable,
    optimize: bool,
) -> Result<Program, AnalyzerError> {
    let mut analysis = structure::analyze_structure(code, actions)?;
    code::analyze_code(code, actions, &mut analysis)?;
    if optimize {
        for sub in &mut analysis.subroutines {
            optimizer::optimize_subroutine(sub);
        }
    }
    Ok(Program {
        subroutines: analysis.subroutines,
        index_by_entry: analysis.index_by_entry,
        entry: analysis.entry,
        global_count: analysis.global_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::type_suffix as ty;
    use bytecode::Opcode;
    use primitives::ActionSignature;

    struct NoActions;
    impl ActionTable for NoActions {
        fn signature(&self, _ordinal: u16) -> Option<&ActionSignature> {
            None
        }
    }

    #[test]
    fn analyzes_and_optimizes_a_trivial_program() {
        let mut code = Vec::new();
        code.push(Opcode::Jsr.as_byte());
        code.push(ty::UNARY_NONE);
        code.extend_from_slice(&6i32.to_be_bytes());
        code.push(Opcode::RsAdd.as_byte());
        code.push(ty::UNARY_INT);
        code.push(Opcode::Retn.as_byte());
        code.push(ty::UNARY_NONE);
        let code: Arc<[u8]> = Arc::from(code);
        let actions = NoActions;
        let program = analyze_program(&code, &actions, true).unwrap();
        let sub = program.subroutine_at(6).unwrap();
        assert!(sub.flags.contains(SubroutineFlags::IS_ANALYZED));
        assert!(sub.flags.contains(SubroutineFlags::IS_TYPE_ANALYZED));
    }
}
