use std::sync::Arc;

use bytecode::{type_suffix as ty, BytecodeError, BytecodeReader, Disassembler, Opcode};
use primitives::{ObjectId, ScriptError, StackValue};

use crate::action_dispatcher;
use crate::error::InterpreterError;
use crate::function_stack::FunctionStack;
use crate::host::Host;
use crate::situation::Situation;
use crate::stack::StackMachine;

/// Per-invocation resource guards (spec §4.4, configurable via §6.6).
/// `0` means unlimited for every counter here.
#[derive(Clone, Copy, Debug)]
pub struct VmLimits {
    pub max_instructions: u64,
    pub max_call_depth: u32,
    pub max_loop_iterations: u64,
    pub max_recursion_depth: u32,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self {
            max_instructions: 0,
            max_call_depth: 0,
            max_loop_iterations: 0,
            max_recursion_depth: 8,
        }
    }
}

/// The return address pushed for the top-level entry point itself, so that
/// its `RETN` has a frame to pop instead of underflowing. Popping this
/// sentinel ends execution rather than resuming anywhere.
const ENTRY_SENTINEL: u32 = u32::MAX;

/// Executes one subroutine invocation of a program image on behalf of the
/// host (spec §4.4). A `Vm` owns the per-invocation stack, call frames and
/// PC; the program image (`code`) is shared and read-only.
#[derive(Debug)]
pub struct Vm {
    code: Arc<[u8]>,
    script_name: Arc<[u8]>,
    global_count: u32,
    object_self: ObjectId,
    stack: StackMachine,
    calls: FunctionStack,
    reader: BytecodeReader,
    limits: VmLimits,
    recursion_depth: u32,
    instruction_count: u64,
    loop_iterations: u64,
    abort_requested: bool,
}

impl Vm {
    /// `script_name` and `global_count` identify this program image for the
    /// situation codec (spec §4.6): `script_name` must match what a
    /// captured `Situation` records, and `global_count` is how many cells at
    /// the bottom of the stack `STORE_STATEALL` treats as "currently visible
    /// globals". `recursion_depth` is the re-entrancy level of this
    /// invocation, set by the caller when an action handler invokes the VM
    /// recursively (spec §4.4, "Re-entrancy"); top-level calls pass `0`.
    pub fn new(
        code: Arc<[u8]>,
        script_name: Arc<[u8]>,
        global_count: u32,
        limits: VmLimits,
        recursion_depth: u32,
    ) -> Result<Self, ScriptError> {
        if limits.max_recursion_depth != 0 && recursion_depth >= limits.max_recursion_depth {
            return Err(InterpreterError::RecursionTooDeep.into());
        }
        Ok(Self {
            reader: BytecodeReader::new(code.clone()),
            code,
            script_name,
            global_count,
            object_self: ObjectId::SELF,
            stack: StackMachine::new(),
            calls: FunctionStack::new(limits.max_call_depth),
            limits,
            recursion_depth,
            instruction_count: 0,
            loop_iterations: 0,
            abort_requested: false,
        })
    }

    /// Requests that execution stop with `Aborted` at the next instruction
    /// boundary (spec §4.4: `AbortScript`).
    pub fn abort_script(&mut self) {
        self.abort_requested = true;
    }

    /// This invocation's own re-entrancy level, as passed to [`Vm::new`].
    /// A `Host::execute_action` implementation that re-enters the VM (spec
    /// §4.4, "Re-entrancy") must construct the nested `Vm` with
    /// `depth + 1`, not `0`, or the recursion ceiling never triggers across
    /// action boundaries.
    pub fn recursion_depth(&self) -> u32 {
        self.recursion_depth
    }

    /// Runs the subroutine at `entry_pc`. The host must have already pushed
    /// return-value placeholders and arguments onto `param_stack` in
    /// declaration order (outermost return first, then parameters
    /// left-to-right). Returns the stack as left after the final `RETN`,
    /// from which the host reads the return value.
    pub fn execute(
        &mut self,
        entry_pc: u32,
        object_self: ObjectId,
        param_stack: StackMachine,
        host: &mut dyn Host,
    ) -> Result<StackMachine, ScriptError> {
        self.object_self = object_self;
        self.stack = param_stack;
        self.calls = FunctionStack::new(self.limits.max_call_depth);
        self.calls.push(ENTRY_SENTINEL).map_err(InterpreterError::into)?;
        self.reader.seek(entry_pc);
        self.run(host)?;
        Ok(std::mem::replace(&mut self.stack, StackMachine::new()))
    }

    /// Resumes a previously captured [`Situation`]: restores globals/locals
    /// and BP onto the stack and continues at the saved PC
    /// (spec §4.4: `ExecuteSituation`).
    pub fn execute_situation(
        &mut self,
        host_stack: &mut StackMachine,
        host: &mut dyn Host,
    ) -> Result<StackMachine, ScriptError> {
        let situation = Situation::decode(host_stack, &self.script_name, self.code.len() as u32)
            .map_err(InterpreterError::into)?;

        self.object_self = situation.object_self;
        self.stack = StackMachine::new();
        for cell in situation.globals {
            self.stack.push_cell(cell);
        }
        self.stack.save_bp();
        for cell in situation.locals {
            self.stack.push_cell(cell);
        }
        self.calls = FunctionStack::new(self.limits.max_call_depth);
        self.calls.push(ENTRY_SENTINEL).map_err(InterpreterError::into)?;
        self.reader.seek(situation.resume_pc);
        self.run(host)?;
        Ok(std::mem::replace(&mut self.stack, StackMachine::new()))
    }

    fn run(&mut self, host: &mut dyn Host) -> Result<(), ScriptError> {
        loop {
            if self.limits.max_instructions != 0 && self.instruction_count >= self.limits.max_instructions
            {
                return Err(InterpreterError::InstructionBudgetExceeded.into());
            }
            if self.abort_requested || host.should_abort() {
                return Err(InterpreterError::Aborted.into());
            }
            self.instruction_count += 1;

            let instr_start = self.reader.tell();
            let decoded = Disassembler::decode(&mut self.reader)
                .map_err(|e: BytecodeError| ScriptError::from(e).with_pc(instr_start))?;

            if self.step(decoded.opcode, decoded.type_suffix, instr_start, host)? {
                return Ok(());
            }
        }
    }

    /// Executes one decoded instruction. Returns `Ok(true)` when the
    /// top-level entry's `RETN` has unwound the sentinel frame and execution
    /// is complete.
    fn step(
        &mut self,
        opcode: Opcode,
        suffix: u8,
        pc: u32,
        host: &mut dyn Host,
    ) -> Result<bool, ScriptError> {
        macro_rules! ierr {
            ($e:expr) => {
                $e.map_err(|e: InterpreterError| ScriptError::from(e).with_pc(pc))?
            };
        }
        macro_rules! bcerr {
            ($e:expr) => {
                $e.map_err(|e: BytecodeError| ScriptError::from(e).with_pc(pc))?
            };
        }

        match opcode {
            Opcode::CpDownSp => {
                let (offset_bytes, size_bytes) = bcerr!(read_stackop_operand(&mut self.reader));
                ierr!(self.stack.cp_down_sp(to_cells(offset_bytes), to_cells_u(size_bytes)));
            }
            Opcode::CpTopSp => {
                let (offset_bytes, size_bytes) = bcerr!(read_stackop_operand(&mut self.reader));
                ierr!(self.stack.cp_top_sp(to_cells(offset_bytes), to_cells_u(size_bytes)));
            }
            Opcode::CpDownBp => {
                let (offset_bytes, size_bytes) = bcerr!(read_stackop_operand(&mut self.reader));
                let sp_rel = self.bp_to_sp_relative(to_cells(offset_bytes));
                ierr!(self.stack.cp_down_sp(sp_rel, to_cells_u(size_bytes)));
            }
            Opcode::CpTopBp => {
                let (offset_bytes, size_bytes) = bcerr!(read_stackop_operand(&mut self.reader));
                let sp_rel = self.bp_to_sp_relative(to_cells(offset_bytes));
                ierr!(self.stack.cp_top_sp(sp_rel, to_cells_u(size_bytes)));
            }
            Opcode::RsAdd => self.push_default_for_suffix(suffix, host),
            Opcode::Const => ierr!(self.exec_const(suffix)),
            Opcode::Action => {
                let ordinal = bcerr!(self.reader.read_u16());
                let arg_count = bcerr!(self.reader.read_u8());
                ierr!(action_dispatcher::dispatch(
                    &mut self.stack,
                    host,
                    ordinal,
                    arg_count,
                    self.recursion_depth
                ));
            }
            Opcode::LogAnd | Opcode::LogOr | Opcode::IncOr | Opcode::ExcOr | Opcode::BoolAnd
            | Opcode::ShLeft | Opcode::ShRight | Opcode::UShRight | Opcode::Mod => {
                ierr!(self.exec_int_binary(opcode));
            }
            Opcode::Equal | Opcode::NEqual => {
                let is_equal = opcode == Opcode::Equal;
                if suffix == ty::BINARY_STRUCTSTRUCT {
                    let size = bcerr!(self.reader.read_u16()) as u32;
                    let result = ierr!(self.exec_struct_eq(size));
                    self.stack.push_int((result == is_equal) as i32);
                } else {
                    let result = ierr!(self.exec_scalar_eq(suffix));
                    self.stack.push_int((result == is_equal) as i32);
                }
            }
            Opcode::Geq | Opcode::Gt | Opcode::Lt | Opcode::Leq => {
                ierr!(self.exec_comparison(opcode, suffix));
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                ierr!(self.exec_numeric_binary(opcode, suffix));
            }
            Opcode::Neg => ierr!(self.exec_neg(suffix)),
            Opcode::Comp => {
                let v = ierr!(self.stack.pop_int());
                self.stack.push_int(!v);
            }
            Opcode::Not => {
                let v = ierr!(self.stack.pop_int());
                self.stack.push_int((v == 0) as i32);
            }
            Opcode::MovSp => {
                let delta = bcerr!(self.reader.read_i32());
                ierr!(self.stack.move_sp(to_cells(delta)));
            }
            Opcode::StoreStateAll => {
                let displacement = bcerr!(self.reader.read_i32());
                let global_count = self.global_count;
                let local_count = self.stack.len().saturating_sub(global_count);
                self.capture_situation(pc, displacement, 1, global_count, local_count, host);
            }
            Opcode::StoreState => {
                let displacement = bcerr!(self.reader.read_i32());
                let global_count = bcerr!(self.reader.read_u32());
                let local_count = bcerr!(self.reader.read_u32());
                self.capture_situation(pc, displacement, 0, global_count, local_count, host);
            }
            Opcode::Jmp => {
                let displacement = bcerr!(self.reader.read_i32());
                self.reader.jump_relative(pc, displacement);
                self.note_backward_branch(pc)?;
            }
            Opcode::Jsr => {
                let displacement = bcerr!(self.reader.read_i32());
                let fallthrough = self.reader.tell();
                ierr!(self.calls.push(fallthrough));
                self.reader.jump_relative(pc, displacement);
                self.note_backward_branch(pc)?;
            }
            Opcode::Jz => {
                let displacement = bcerr!(self.reader.read_i32());
                let v = ierr!(self.stack.pop_int());
                if v == 0 {
                    self.reader.jump_relative(pc, displacement);
                    self.note_backward_branch(pc)?;
                }
            }
            Opcode::Jnz => {
                let displacement = bcerr!(self.reader.read_i32());
                let v = ierr!(self.stack.pop_int());
                if v != 0 {
                    self.reader.jump_relative(pc, displacement);
                    self.note_backward_branch(pc)?;
                }
            }
            Opcode::Retn => {
                let frame = ierr!(self.calls.pop());
                if frame.return_pc == ENTRY_SENTINEL {
                    return Ok(true);
                }
                self.reader.seek(frame.return_pc);
            }
            Opcode::Destruct => {
                let size = bcerr!(self.reader.read_u16()) as u32;
                let ex_offset = bcerr!(self.reader.read_i16()) as i32;
                let ex_size = bcerr!(self.reader.read_u16()) as u32;
                ierr!(self.stack.destruct(size, ex_offset, ex_size));
            }
            Opcode::DecISp | Opcode::IncISp => {
                let offset = to_cells(bcerr!(self.reader.read_i32()));
                self.exec_incdec_sp(opcode, offset)?;
            }
            Opcode::DecIBp | Opcode::IncIBp => {
                let offset_bp = to_cells(bcerr!(self.reader.read_i32()));
                let sp_rel = self.bp_to_sp_relative(offset_bp);
                self.exec_incdec_sp(if opcode == Opcode::DecIBp { Opcode::DecISp } else { Opcode::IncISp }, sp_rel)?;
            }
            Opcode::SaveBp => self.stack.save_bp(),
            Opcode::RestoreBp => ierr!(self.stack.restore_bp()),
            Opcode::Nop => {}
        }
        Ok(false)
    }

    fn exec_incdec_sp(&mut self, opcode: Opcode, offset_cells: i32) -> Result<(), ScriptError> {
        let v = self
            .stack
            .read_int_at(offset_cells)
            .map_err(InterpreterError::into)?;
        let updated = if opcode == Opcode::DecISp { v - 1 } else { v + 1 };
        self.stack
            .write_int_at(offset_cells, updated)
            .map_err(InterpreterError::into)
    }

    /// Builds a [`Situation`] out of the current stack and hands it to the
    /// host (spec §4.4 "Save state", §4.6). `resume_method_id` distinguishes
    /// `STORE_STATE` (`0`) from `STORE_STATEALL` (`1`) for the host's own
    /// bookkeeping; the codec itself treats it as an opaque value.
    fn capture_situation(
        &mut self,
        instr_start: u32,
        displacement: i32,
        resume_method_id: i32,
        global_count: u32,
        local_count: u32,
        host: &mut dyn Host,
    ) {
        let slice = self.stack.as_slice();
        let globals = slice[..(global_count as usize).min(slice.len())].to_vec();
        let locals_start = slice.len().saturating_sub(local_count as usize);
        let locals = slice[locals_start..].to_vec();
        let resume_pc = (instr_start as i64 + displacement as i64) as u32;

        host.capture_situation(Situation {
            globals,
            locals,
            resume_method_id,
            resume_pc,
            object_self: self.object_self,
            origin_code_size: self.code.len() as u32,
            origin_script_name: self.script_name.clone(),
        });
    }

    fn bp_to_sp_relative(&self, offset_from_bp_cells: i32) -> i32 {
        self.stack.bp() as i64 as i32 + offset_from_bp_cells - self.stack.len() as i32
    }

    fn note_backward_branch(&mut self, from_pc: u32) -> Result<(), ScriptError> {
        if self.reader.tell() <= from_pc {
            self.loop_iterations += 1;
            if self.limits.max_loop_iterations != 0
                && self.loop_iterations > self.limits.max_loop_iterations
            {
                return Err(InterpreterError::InstructionBudgetExceeded.into());
            }
        }
        Ok(())
    }

    fn push_default_for_suffix(&mut self, suffix: u8, host: &mut dyn Host) {
        match suffix {
            ty::UNARY_INT => self.stack.push_int(0),
            ty::UNARY_FLOAT => self.stack.push_float(0.0),
            ty::UNARY_STRING => self.stack.push_string(Arc::from(&b""[..])),
            ty::UNARY_OBJECTID => self.stack.push_object(ObjectId::INVALID),
            s if ty::is_unary_engine(s) => {
                let k = ty::engine_type_id(s).unwrap();
                self.stack.push_engine(host.create_engine_structure(k));
            }
            _ => unreachable!("illegal RSADD suffix already rejected by the disassembler"),
        }
    }

    fn exec_const(&mut self, suffix: u8) -> Result<(), InterpreterError> {
        match suffix {
            ty::UNARY_INT => {
                let v = self.reader.read_i32().map_err(|_| InterpreterError::StackUnderflow)?;
                self.stack.push_int(v);
            }
            ty::UNARY_FLOAT => {
                let v = self.reader.read_f32().map_err(|_| InterpreterError::StackUnderflow)?;
                self.stack.push_float(v);
            }
            ty::UNARY_OBJECTID => {
                let v = self.reader.read_i32().map_err(|_| InterpreterError::StackUnderflow)?;
                self.stack.push_object(ObjectId(v as u32));
            }
            ty::UNARY_STRING => {
                let len = self.reader.read_u16().map_err(|_| InterpreterError::StackUnderflow)? as u32;
                let s = self.reader.read_string(len).map_err(|_| InterpreterError::StackUnderflow)?;
                self.stack.push_string(s);
            }
            _ => unreachable!("illegal CONST suffix already rejected by the disassembler"),
        }
        Ok(())
    }

    fn exec_int_binary(&mut self, opcode: Opcode) -> Result<(), InterpreterError> {
        let b = self.stack.pop_int()?;
        let a = self.stack.pop_int()?;
        let r = match opcode {
            Opcode::LogAnd => ((a != 0) && (b != 0)) as i32,
            Opcode::LogOr => ((a != 0) || (b != 0)) as i32,
            Opcode::IncOr => a | b,
            Opcode::ExcOr => a ^ b,
            Opcode::BoolAnd => a & b,
            Opcode::ShLeft => a.wrapping_shl(b as u32),
            Opcode::ShRight => a.wrapping_shr(b as u32),
            Opcode::UShRight => ((a as u32).wrapping_shr(b as u32)) as i32,
            Opcode::Mod => {
                if b == 0 {
                    return Err(InterpreterError::DivideByZero);
                }
                a.wrapping_rem(b)
            }
            _ => unreachable!(),
        };
        self.stack.push_int(r);
        Ok(())
    }

    fn exec_scalar_eq(&mut self, suffix: u8) -> Result<bool, InterpreterError> {
        Ok(match suffix {
            ty::BINARY_INTINT => {
                let b = self.stack.pop_int()?;
                let a = self.stack.pop_int()?;
                a == b
            }
            ty::BINARY_FLOATFLOAT => {
                let b = self.stack.pop_float()?;
                let a = self.stack.pop_float()?;
                a == b
            }
            ty::BINARY_OBJECTIDOBJECTID => {
                let b = self.stack.pop_object()?;
                let a = self.stack.pop_object()?;
                a == b
            }
            ty::BINARY_STRINGSTRING => {
                let b = self.stack.pop_string()?;
                let a = self.stack.pop_string()?;
                a == b
            }
            s if ty::is_binary_engine(s) => {
                let k = ty::engine_type_id(s).unwrap();
                let b = self.stack.pop_engine(k)?;
                let a = self.stack.pop_engine(k)?;
                a == b
            }
            _ => unreachable!("illegal EQUAL/NEQUAL suffix already rejected by the disassembler"),
        })
    }

    fn exec_struct_eq(&mut self, size_cells: u32) -> Result<bool, InterpreterError> {
        let n = size_cells as usize;
        let mut rhs = Vec::with_capacity(n);
        for _ in 0..n {
            rhs.push(self.stack.pop_cell()?);
        }
        let mut lhs = Vec::with_capacity(n);
        for _ in 0..n {
            lhs.push(self.stack.pop_cell()?);
        }
        rhs.reverse();
        lhs.reverse();
        Ok(lhs == rhs)
    }

    fn exec_comparison(&mut self, opcode: Opcode, suffix: u8) -> Result<(), InterpreterError> {
        let result = match suffix {
            ty::BINARY_INTINT => {
                let b = self.stack.pop_int()?;
                let a = self.stack.pop_int()?;
                match opcode {
                    Opcode::Geq => a >= b,
                    Opcode::Gt => a > b,
                    Opcode::Lt => a < b,
                    Opcode::Leq => a <= b,
                    _ => unreachable!(),
                }
            }
            ty::BINARY_FLOATFLOAT => {
                let b = self.stack.pop_float()?;
                let a = self.stack.pop_float()?;
                match opcode {
                    Opcode::Geq => a >= b,
                    Opcode::Gt => a > b,
                    Opcode::Lt => a < b,
                    Opcode::Leq => a <= b,
                    _ => unreachable!(),
                }
            }
            _ => unreachable!("illegal comparison suffix already rejected by the disassembler"),
        };
        self.stack.push_int(result as i32);
        Ok(())
    }

    fn exec_numeric_binary(&mut self, opcode: Opcode, suffix: u8) -> Result<(), InterpreterError> {
        match suffix {
            ty::BINARY_INTINT => {
                let b = self.stack.pop_int()?;
                let a = self.stack.pop_int()?;
                let r = match opcode {
                    Opcode::Add => a.wrapping_add(b),
                    Opcode::Sub => a.wrapping_sub(b),
                    Opcode::Mul => a.wrapping_mul(b),
                    Opcode::Div => {
                        if b == 0 {
                            return Err(InterpreterError::DivideByZero);
                        }
                        a.wrapping_div(b)
                    }
                    _ => unreachable!(),
                };
                self.stack.push_int(r);
            }
            ty::BINARY_FLOATFLOAT => {
                let b = self.stack.pop_float()?;
                let a = self.stack.pop_float()?;
                let r = match opcode {
                    Opcode::Add => a + b,
                    Opcode::Sub => a - b,
                    Opcode::Mul => a * b,
                    Opcode::Div => a / b,
                    _ => unreachable!(),
                };
                self.stack.push_float(r);
            }
            ty::BINARY_INTFLOAT => {
                let b = self.stack.pop_float()?;
                let a = self.stack.pop_int()? as f32;
                self.stack.push_float(apply_numeric(opcode, a, b));
            }
            ty::BINARY_FLOATINT => {
                let b = self.stack.pop_int()? as f32;
                let a = self.stack.pop_float()?;
                self.stack.push_float(apply_numeric(opcode, a, b));
            }
            ty::BINARY_STRINGSTRING if opcode == Opcode::Add => {
                let b = self.stack.pop_string()?;
                let a = self.stack.pop_string()?;
                let mut s = Vec::with_capacity(a.len() + b.len());
                s.extend_from_slice(&a);
                s.extend_from_slice(&b);
                self.stack.push_string(Arc::from(s));
            }
            ty::BINARY_VECTORVECTOR => {
                let (bx, by, bz) = self.stack.pop_vector()?;
                let (ax, ay, az) = self.stack.pop_vector()?;
                self.stack.push_vector(
                    apply_numeric(opcode, ax, bx),
                    apply_numeric(opcode, ay, by),
                    apply_numeric(opcode, az, bz),
                );
            }
            ty::BINARY_VECTORFLOAT => {
                let b = self.stack.pop_float()?;
                let (ax, ay, az) = self.stack.pop_vector()?;
                self.stack.push_vector(
                    apply_numeric(opcode, ax, b),
                    apply_numeric(opcode, ay, b),
                    apply_numeric(opcode, az, b),
                );
            }
            ty::BINARY_FLOATVECTOR => {
                let (bx, by, bz) = self.stack.pop_vector()?;
                let a = self.stack.pop_float()?;
                self.stack.push_vector(
                    apply_numeric(opcode, a, bx),
                    apply_numeric(opcode, a, by),
                    apply_numeric(opcode, a, bz),
                );
            }
            _ => unreachable!("illegal arithmetic suffix already rejected by the disassembler"),
        }
        Ok(())
    }

    fn exec_neg(&mut self, suffix: u8) -> Result<(), InterpreterError> {
        match suffix {
            ty::UNARY_INT => {
                let v = self.stack.pop_int()?;
                self.stack.push_int(v.wrapping_neg());
            }
            ty::UNARY_FLOAT => {
                let v = self.stack.pop_float()?;
                self.stack.push_float(-v);
            }
            _ => unreachable!("illegal NEG suffix already rejected by the disassembler"),
        }
        Ok(())
    }
}

fn apply_numeric(opcode: Opcode, a: f32, b: f32) -> f32 {
    match opcode {
        Opcode::Add => a + b,
        Opcode::Sub => a - b,
        Opcode::Mul => a * b,
        Opcode::Div => a / b,
        _ => unreachable!(),
    }
}

fn to_cells(offset_bytes: i32) -> i32 {
    offset_bytes / primitives::CELL_SIZE as i32
}

fn to_cells_u(size_bytes: u16) -> u32 {
    size_bytes as u32 / primitives::CELL_SIZE
}

/// Reads the `(offset: i32, size: u16)` operand shared by
/// `CPDOWNSP`/`CPTOPSP`/`CPDOWNBP`/`CPTOPBP`, both in bytes.
fn read_stackop_operand(reader: &mut BytecodeReader) -> Result<(i32, u16), BytecodeError> {
    let offset = reader.read_i32()?;
    let size = reader.read_u16()?;
    Ok((offset, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DummyHost;
    use bytecode::{type_suffix as ty, Opcode};
    use primitives::ObjectId;

    fn program(bytes: Vec<u8>) -> Arc<[u8]> {
        Arc::from(bytes)
    }

    fn push_retn(buf: &mut Vec<u8>) {
        buf.push(Opcode::Retn.as_byte());
        buf.push(ty::UNARY_NONE);
    }

    #[test]
    fn adds_two_consts_and_returns() {
        let mut code = Vec::new();
        code.push(Opcode::Const.as_byte());
        code.push(ty::UNARY_INT);
        code.extend_from_slice(&20i32.to_be_bytes());
        code.push(Opcode::Const.as_byte());
        code.push(ty::UNARY_INT);
        code.extend_from_slice(&22i32.to_be_bytes());
        code.push(Opcode::Add.as_byte());
        code.push(ty::BINARY_INTINT);
        push_retn(&mut code);
        let code = program(code);

        let mut vm = Vm::new(code, Arc::from(&b"test"[..]), 0, VmLimits::default(), 0).unwrap();
        let mut host = DummyHost::default();
        let result = vm.execute(0, ObjectId::SELF, StackMachine::new(), &mut host).unwrap();
        assert_eq!(result.as_slice(), &[StackValue::Int(42)]);
    }

    #[test]
    fn divide_by_zero_fails() {
        let mut code = Vec::new();
        code.push(Opcode::Const.as_byte());
        code.push(ty::UNARY_INT);
        code.extend_from_slice(&1i32.to_be_bytes());
        code.push(Opcode::Const.as_byte());
        code.push(ty::UNARY_INT);
        code.extend_from_slice(&0i32.to_be_bytes());
        code.push(Opcode::Div.as_byte());
        code.push(ty::BINARY_INTINT);
        push_retn(&mut code);
        let code = program(code);

        let mut vm = Vm::new(code, Arc::from(&b"test"[..]), 0, VmLimits::default(), 0).unwrap();
        let mut host = DummyHost::default();
        let err = vm.execute(0, ObjectId::SELF, StackMachine::new(), &mut host).unwrap_err();
        assert_eq!(err.kind, primitives::ScriptErrorKind::DivideByZero);
    }

    #[test]
    fn comp_is_bitwise_not_logical() {
        let mut code = Vec::new();
        code.push(Opcode::Const.as_byte());
        code.push(ty::UNARY_INT);
        code.extend_from_slice(&0i32.to_be_bytes());
        code.push(Opcode::Comp.as_byte());
        code.push(ty::UNARY_NONE);
        push_retn(&mut code);
        let code = program(code);

        let mut vm = Vm::new(code, Arc::from(&b"test"[..]), 0, VmLimits::default(), 0).unwrap();
        let mut host = DummyHost::default();
        let result = vm.execute(0, ObjectId::SELF, StackMachine::new(), &mut host).unwrap();
        assert_eq!(result.as_slice(), &[StackValue::Int(-1)]);
    }

    #[test]
    fn jsr_and_retn_round_trip() {
        // layout: [0] JSR +6 -> target at pc(0)+6 ; [6] fallthrough: RETN
        // target: CONST INT 7 ; RETN
        let mut code = Vec::new();
        code.push(Opcode::Jsr.as_byte());
        code.push(ty::UNARY_NONE);
        code.extend_from_slice(&6i32.to_be_bytes()); // instruction is 6 bytes, target right after it
        push_retn(&mut code); // fallthrough address (pc=6)
        code.push(Opcode::Const.as_byte());
        code.push(ty::UNARY_INT);
        code.extend_from_slice(&7i32.to_be_bytes());
        push_retn(&mut code);
        let code = program(code);

        let mut vm = Vm::new(code, Arc::from(&b"test"[..]), 0, VmLimits::default(), 0).unwrap();
        let mut host = DummyHost::default();
        let result = vm.execute(0, ObjectId::SELF, StackMachine::new(), &mut host).unwrap();
        assert_eq!(result.as_slice(), &[StackValue::Int(7)]);
    }

    #[test]
    fn instruction_budget_is_enforced() {
        let mut code = Vec::new();
        // an infinite loop: JMP -2 (jumps to itself)
        code.push(Opcode::Jmp.as_byte());
        code.push(ty::UNARY_NONE);
        code.extend_from_slice(&0i32.to_be_bytes());
        let code = program(code);

        let limits = VmLimits {
            max_instructions: 5,
            ..VmLimits::default()
        };
        let mut vm = Vm::new(code, Arc::from(&b"test"[..]), 0, limits, 0).unwrap();
        let mut host = DummyHost::default();
        let err = vm.execute(0, ObjectId::SELF, StackMachine::new(), &mut host).unwrap_err();
        assert_eq!(
            err.kind,
            primitives::ScriptErrorKind::InstructionBudgetExceeded
        );
    }

    #[test]
    fn recursion_too_deep_at_construction() {
        let code = program(vec![]);
        let limits = VmLimits {
            max_recursion_depth: 2,
            ..VmLimits::default()
        };
        assert_eq!(
            Vm::new(code, Arc::from(&b"test"[..]), 0, limits, 2).unwrap_err().kind,
            primitives::ScriptErrorKind::RecursionTooDeep
        );
    }

    #[derive(Default)]
    struct CapturingHost {
        captured: Option<Situation>,
    }

    impl Host for CapturingHost {
        fn action_signature(&self, _ordinal: u16) -> Option<&primitives::ActionSignature> {
            None
        }
        fn execute_action(
            &mut self,
            ordinal: u16,
            _args: &[crate::host::HostValue],
            _depth: u32,
        ) -> Result<Option<crate::host::HostValue>, InterpreterError> {
            Err(InterpreterError::ActionFailed { ordinal })
        }
        fn create_engine_structure(&mut self, _type_id: primitives::EngineTypeId) -> primitives::EngineHandle {
            unimplemented!()
        }
        fn capture_situation(&mut self, situation: Situation) {
            self.captured = Some(situation);
        }
    }

    #[test]
    fn store_state_hands_a_situation_to_the_host() {
        let mut code = Vec::new();
        code.push(Opcode::StoreState.as_byte());
        code.push(ty::UNARY_NONE);
        code.extend_from_slice(&100i32.to_be_bytes()); // resume PC displacement
        code.extend_from_slice(&0u32.to_be_bytes()); // global count
        code.extend_from_slice(&1u32.to_be_bytes()); // local count
        push_retn(&mut code);
        let code = program(code);

        let mut vm = Vm::new(code, Arc::from(&b"conv"[..]), 0, VmLimits::default(), 0).unwrap();
        let mut host = CapturingHost::default();
        let mut params = StackMachine::new();
        params.push_int(55);
        vm.execute(0, ObjectId::SELF, params, &mut host).unwrap();

        let situation = host.captured.expect("situation was captured");
        assert_eq!(situation.locals, vec![StackValue::Int(55)]);
        assert_eq!(situation.resume_method_id, 0);
        assert_eq!(&*situation.origin_script_name, b"conv");
    }
}
