use std::sync::Arc;

use primitives::{ObjectId, StackValue};

use crate::error::InterpreterError;
use crate::stack::StackMachine;

/// `'NSSJ'` as a big-endian 4-byte signature, per the original runtime's
/// `SAVED_STATE_ID` (`AuroraServerNWScript/NWScriptRuntime.h`). Treated as an
/// opaque 4-byte value, not as a meaningful integer.
pub const SITUATION_MAGIC: u32 = 0x4E53534A;

/// A captured continuation: the saved program counter, the globals/locals
/// snapshot, and enough identity information about the originating program
/// to refuse a decode against the wrong script (spec §4.6).
#[derive(Clone, Debug, PartialEq)]
pub struct Situation {
    pub globals: Vec<StackValue>,
    pub locals: Vec<StackValue>,
    pub resume_method_id: i32,
    pub resume_pc: u32,
    pub object_self: ObjectId,
    pub origin_code_size: u32,
    pub origin_script_name: Arc<[u8]>,
}

impl Situation {
    /// Pushes the cell layout of spec §4.6 onto `sink`, bottom to top.
    /// Returns the number of cells pushed.
    pub fn encode(&self, sink: &mut StackMachine) -> u32 {
        let start = sink.len();
        for cell in &self.globals {
            sink.push_cell(cell.clone());
        }
        for cell in &self.locals {
            sink.push_cell(cell.clone());
        }
        sink.push_int(self.resume_method_id);
        sink.push_int(self.resume_pc as i32);
        sink.push_int(self.globals.len() as i32);
        sink.push_int(self.locals.len() as i32);
        sink.push_object(self.object_self);
        sink.push_int(self.origin_code_size as i32);
        sink.push_string(self.origin_script_name.clone());
        sink.push_int(SITUATION_MAGIC as i32);
        sink.len() - start
    }

    /// Pops the cell layout of spec §4.6 from `src`, verifying the magic tag
    /// and the originating script's name and code size against
    /// `(current_script_name, current_code_size)`.
    pub fn decode(
        src: &mut StackMachine,
        current_script_name: &[u8],
        current_code_size: u32,
    ) -> Result<Self, InterpreterError> {
        let magic = src.pop_int()? as u32;
        if magic != SITUATION_MAGIC {
            return Err(InterpreterError::SituationSignatureMismatch);
        }
        let origin_script_name = src.pop_string()?;
        if &*origin_script_name != current_script_name {
            return Err(InterpreterError::SituationSignatureMismatch);
        }
        let origin_code_size = src.pop_int()? as u32;
        if origin_code_size != 0 && origin_code_size != current_code_size {
            return Err(InterpreterError::SituationSignatureMismatch);
        }
        let object_self = src.pop_object()?;
        let save_local_count = src.pop_int()?;
        let save_global_count = src.pop_int()?;
        if save_local_count < 0 || save_global_count < 0 {
            return Err(InterpreterError::SituationSignatureMismatch);
        }
        let resume_pc = src.pop_int()? as u32;
        let resume_method_id = src.pop_int()?;

        let mut locals = Vec::with_capacity(save_local_count as usize);
        for _ in 0..save_local_count {
            locals.push(src.pop_cell()?);
        }
        locals.reverse();

        let mut globals = Vec::with_capacity(save_global_count as usize);
        for _ in 0..save_global_count {
            globals.push(src.pop_cell()?);
        }
        globals.reverse();

        Ok(Situation {
            globals,
            locals,
            resume_method_id,
            resume_pc,
            object_self,
            origin_code_size,
            origin_script_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_host_stack() {
        let situation = Situation {
            globals: vec![StackValue::Int(1), StackValue::Int(2)],
            locals: vec![StackValue::Float(3.5)],
            resume_method_id: 0,
            resume_pc: 128,
            object_self: ObjectId(7),
            origin_code_size: 4096,
            origin_script_name: Arc::from(&b"nw_o0_conversation"[..]),
        };
        let mut host_stack = StackMachine::new();
        let pushed = situation.encode(&mut host_stack);
        assert_eq!(pushed, 10);

        let decoded =
            Situation::decode(&mut host_stack, b"nw_o0_conversation", 4096).unwrap();
        assert_eq!(decoded, situation);
        assert_eq!(host_stack.len(), 0);
    }

    #[test]
    fn rejects_wrong_script_name() {
        let situation = Situation {
            globals: vec![],
            locals: vec![],
            resume_method_id: 0,
            resume_pc: 0,
            object_self: ObjectId::SELF,
            origin_code_size: 10,
            origin_script_name: Arc::from(&b"a"[..]),
        };
        let mut host_stack = StackMachine::new();
        situation.encode(&mut host_stack);
        assert_eq!(
            Situation::decode(&mut host_stack, b"b", 10),
            Err(InterpreterError::SituationSignatureMismatch)
        );
    }

    #[test]
    fn zero_code_size_is_accepted_unconditionally() {
        let situation = Situation {
            globals: vec![],
            locals: vec![],
            resume_method_id: 0,
            resume_pc: 0,
            object_self: ObjectId::SELF,
            origin_code_size: 0,
            origin_script_name: Arc::from(&b"a"[..]),
        };
        let mut host_stack = StackMachine::new();
        situation.encode(&mut host_stack);
        assert!(Situation::decode(&mut host_stack, b"a", 999).is_ok());
    }
}
