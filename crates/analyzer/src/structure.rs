//! Pass 1: structural analysis (spec §4.7). Discovers subroutines and their
//! control-flow graphs without executing the program — only the stack
//! *pointer* is simulated, never stack values.

use std::collections::HashMap;
use std::sync::Arc;

use bytecode::{type_suffix as ty, BytecodeReader, Disassembler, Opcode};
use primitives::ActionSignature;

use crate::error::AnalyzerError;
use crate::ir::{ControlFlow, FlowId, Subroutine, Termination};

/// Process-wide bound on scanned instructions (spec §4.7, "Opcode limits").
pub const ANALYSIS_MAX_SCRIPT_INSTRUCTIONS: u64 = 1 << 20;

/// The action table the structural pass needs to know each action's cell
/// footprint (`Vector` arguments/returns are 3 cells, everything else is
/// 1), since `ACTION`'s own SP delta depends on it exactly the way a
/// `JSR`'s delta depends on the callee's discovered parameter size.
pub trait ActionTable {
    fn signature(&self, ordinal: u16) -> Option<&ActionSignature>;
}

/// Shape of the `#loader`/`#globals` bootstrap discovered at PC 0 (spec
/// §4.7, "Entry-point discovery").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryShape {
    pub has_int_return: bool,
    pub globals_pc: Option<u32>,
    pub entry_pc: u32,
}

#[derive(Debug)]
pub struct StructureAnalysis {
    pub subroutines: Vec<Subroutine>,
    /// Index into `subroutines` for each discovered entry PC, so pass 2 can
    /// look a callee back up by address.
    pub index_by_entry: HashMap<u32, usize>,
    pub entry: EntryShape,
    /// Number of global-variable cells `#globals` initializes before
    /// calling the true entry point, i.e. the stack depth right before
    /// that JSR, not counting the `SAVEBP` marker cell (spec §4.2, "global
    /// variable segment"). Zero for scripts with no `#globals` bootstrap.
    pub global_count: u32,
}

/// Scans the `#loader` pseudo-subroutine at PC 0 to classify the program's
/// entry shape (spec §4.7).
pub fn discover_entry(code: &Arc<[u8]>) -> Result<EntryShape, AnalyzerError> {
    let mut reader = BytecodeReader::new(code.clone());
    let first = Disassembler::decode(&mut reader)?;
    reader.seek(reader.tell() + (first.length - first.cursor_offset));

    let (has_int_return, jsr_pc) = if first.opcode == Opcode::RsAdd {
        let second_start = reader.tell();
        let second = Disassembler::decode(&mut reader)?;
        if second.opcode != Opcode::Jsr {
            return Err(AnalyzerError::Bytecode(bytecode::BytecodeError::InvalidOpcodeType {
                opcode: second.opcode.as_byte(),
                type_suffix: second.type_suffix,
            }));
        }
        (true, second_start)
    } else if first.opcode == Opcode::Jsr {
        (false, 0)
    } else {
        return Err(AnalyzerError::Bytecode(bytecode::BytecodeError::InvalidOpcodeType {
            opcode: first.opcode.as_byte(),
            type_suffix: first.type_suffix,
        }));
    };

    let mut reader = BytecodeReader::new(code.clone());
    reader.seek(jsr_pc);
    let jsr_target = read_jsr_target(&mut reader)?;

    // If the JSR's target begins with SAVEBP before its first JSR, the
    // target is `#globals`, which itself JSRs to the true entry point.
    let mut probe = BytecodeReader::new(code.clone());
    probe.seek(jsr_target);
    let mut globals_pc = None;
    let mut entry_pc = jsr_target;
    loop {
        let start = probe.tell();
        let d = Disassembler::decode(&mut probe)?;
        probe.seek(start + d.length);
        match d.opcode {
            Opcode::SaveBp => {
                globals_pc = Some(jsr_target);
                continue;
            }
            Opcode::Jsr if globals_pc.is_some() => {
                let mut jsr_reader = BytecodeReader::new(code.clone());
                jsr_reader.seek(start);
                entry_pc = read_jsr_target(&mut jsr_reader)?;
                break;
            }
            _ if globals_pc.is_none() => break,
            _ => break,
        }
    }

    Ok(EntryShape { has_int_return, globals_pc, entry_pc })
}

fn read_jsr_target(reader: &mut BytecodeReader) -> Result<u32, AnalyzerError> {
    let base = reader.tell();
    let d = Disassembler::decode(reader)?;
    if d.opcode != Opcode::Jsr {
        return Err(AnalyzerError::Bytecode(bytecode::BytecodeError::InvalidOpcodeType {
            opcode: d.opcode.as_byte(),
            type_suffix: d.type_suffix,
        }));
    }
    let displacement = reader.read_i32()?;
    Ok((base as i64 + displacement as i64) as u32)
}

struct Ctx<'a> {
    code: Arc<[u8]>,
    actions: &'a dyn ActionTable,
    subs: Vec<Subroutine>,
    index: HashMap<u32, usize>,
    in_progress: std::collections::HashSet<u32>,
    scanned: u64,
    entry: EntryShape,
    global_count: Option<u32>,
}

/// Runs pass 1 over the whole program, starting from its `#globals`/entry
/// bootstrap (spec §4.7).
pub fn analyze_structure(
    code: &Arc<[u8]>,
    actions: &dyn ActionTable,
) -> Result<StructureAnalysis, AnalyzerError> {
    let entry = discover_entry(code)?;
    let mut ctx = Ctx {
        code: code.clone(),
        actions,
        subs: Vec::new(),
        index: HashMap::new(),
        in_progress: std::collections::HashSet::new(),
        scanned: 0,
        entry,
        global_count: None,
    };
    let root_pc = entry.globals_pc.unwrap_or(entry.entry_pc);
    let root_return_size = if entry.globals_pc.is_none() && entry.has_int_return { 1 } else { 0 };
    ctx.analyze_subroutine(root_pc, root_return_size)?;
    if entry.globals_pc.is_some() {
        let entry_return_size = if entry.has_int_return { 1 } else { 0 };
        ctx.analyze_subroutine(entry.entry_pc, entry_return_size)?;
    }
    let global_count = ctx.global_count.unwrap_or(0);
    Ok(StructureAnalysis {
        subroutines: ctx.subs,
        index_by_entry: ctx.index,
        entry,
        global_count,
    })
}

impl<'a> Ctx<'a> {
    /// Fully analyzes the subroutine at `entry_pc`, recursively resolving
    /// any callee it JSRs to first (spec §4.7, "Subroutine-call handling" —
    /// modeled here via the call stack rather than an explicit blocked work
    /// list: a JSR to an unanalyzed callee recurses into it before the
    /// caller's own SP bookkeeping can continue, since the JSR's own SP
    /// delta is `-paramSize(callee)`).
    ///
    /// `return_size` is how many cells the caller reserved for this
    /// subroutine's return value before pushing parameters, which is only
    /// knowable ahead of time for the program's own entry point (from
    /// `EntryShape::has_int_return`); every other callee is analyzed with
    /// `return_size = 0`; a non-void helper subroutine that never writes its
    /// result back via a negative-offset copy into the caller's frame will
    /// consequently get a `param_size` that is off by its own return size.
    fn analyze_subroutine(&mut self, entry_pc: u32, return_size: i32) -> Result<usize, AnalyzerError> {
        if let Some(&idx) = self.index.get(&entry_pc) {
            return Ok(idx);
        }
        if !self.in_progress.insert(entry_pc) {
            return Err(AnalyzerError::UnboundedRecursion);
        }

        let sub_idx = self.subs.len();
        self.subs.push(Subroutine::new(entry_pc));
        self.subs[sub_idx].raw_return_size = return_size;
        let mut flow_starts: HashMap<u32, FlowId> = HashMap::new();
        let root_flow = self.subs[sub_idx].push_flow(ControlFlow::new(entry_pc, 0));
        flow_starts.insert(entry_pc, root_flow);

        self.trace_flow(sub_idx, &mut flow_starts, root_flow, entry_pc, 0)?;

        self.in_progress.remove(&entry_pc);
        if self.subs[sub_idx].param_size.is_none() {
            // A subroutine with no reachable RETN trivially has no
            // parameters to discover; treat it as zero.
            self.subs[sub_idx].param_size = Some(0);
        }
        self.index.insert(entry_pc, sub_idx);
        Ok(sub_idx)
    }

    /// Registers the resume point of a `STORE_STATE`/`STORE_STATEALL` as its
    /// own subroutine, the same way a JSR callee is registered, except its
    /// `param_size` is known up front from the opcode's own operands rather
    /// than discovered by balancing SP at its RETN (spec §4.7, "Script
    /// situation handling"). A no-op if `resume_pc` was already registered,
    /// whether as an ordinary subroutine or a previously seen situation.
    fn register_situation(&mut self, resume_pc: u32, param_size: i32) -> Result<usize, AnalyzerError> {
        if let Some(&idx) = self.index.get(&resume_pc) {
            return Ok(idx);
        }
        if !self.in_progress.insert(resume_pc) {
            return Err(AnalyzerError::UnboundedRecursion);
        }

        let sub_idx = self.subs.len();
        self.subs.push(Subroutine::new(resume_pc));
        self.subs[sub_idx].raw_return_size = 0;
        self.subs[sub_idx].param_size = Some(param_size);
        self.subs[sub_idx].flags.insert(crate::ir::SubroutineFlags::SCRIPT_SITUATION);
        let mut flow_starts: HashMap<u32, FlowId> = HashMap::new();
        let root_flow = self.subs[sub_idx].push_flow(ControlFlow::new(resume_pc, 0));
        flow_starts.insert(resume_pc, root_flow);

        self.trace_flow(sub_idx, &mut flow_starts, root_flow, resume_pc, 0)?;

        self.in_progress.remove(&resume_pc);
        self.index.insert(resume_pc, sub_idx);
        Ok(sub_idx)
    }

    /// Traces one flow forward from `pc`/`sp` until it terminates, splits
    /// into an existing flow, or ends the subroutine.
    fn trace_flow(
        &mut self,
        sub_idx: usize,
        flow_starts: &mut HashMap<u32, FlowId>,
        mut flow_id: FlowId,
        mut pc: u32,
        mut sp: i32,
    ) -> Result<(), AnalyzerError> {
        let mut reader = BytecodeReader::new(self.code.clone());
        loop {
            if let Some(&existing) = flow_starts.get(&pc) {
                if existing != flow_id {
                    self.link_transfer(sub_idx, flow_id, pc, sp, existing)?;
                    return Ok(());
                }
            } else if let Some(split_at) = self.find_mid_flow(sub_idx, flow_starts, pc) {
                let new_flow = self.split_flow_at(sub_idx, split_at, pc)?;
                flow_starts.insert(pc, new_flow);
                self.link_transfer(sub_idx, flow_id, pc, sp, new_flow)?;
                return Ok(());
            }

            self.scanned += 1;
            if self.scanned > ANALYSIS_MAX_SCRIPT_INSTRUCTIONS {
                return Err(AnalyzerError::InstructionLimitExceeded);
            }

            reader.seek(pc);
            let start = pc;
            let decoded = Disassembler::decode(&mut reader)?;
            let next_pc = start + decoded.length;

            match decoded.opcode {
                Opcode::Retn => {
                    self.close_flow(sub_idx, flow_id, next_pc, sp, Termination::Terminate);
                    let sub = &mut self.subs[sub_idx];
                    // A script situation's parameter count is fixed up front
                    // from its STORE_STATE[ALL] operands and is not required
                    // to fully clean the stack on return (spec §4.7).
                    if !sub.flags.contains(crate::ir::SubroutineFlags::SCRIPT_SITUATION) {
                        let expected = sub.raw_return_size - sp;
                        match sub.param_size {
                            None => sub.param_size = Some(expected),
                            Some(prev) if prev == expected => {}
                            Some(prev) => {
                                return Err(AnalyzerError::FlowSpMismatch { expected: prev, found: expected })
                            }
                        }
                    }
                    return Ok(());
                }
                Opcode::Jmp => {
                    let displacement = reader.read_i32()?;
                    let target = (start as i64 + displacement as i64) as u32;
                    self.close_flow(sub_idx, flow_id, next_pc, sp, Termination::Transfer);
                    pc = target;
                    flow_id = self.child_flow(sub_idx, flow_starts, flow_id, target, sp)?;
                    continue;
                }
                Opcode::Jz | Opcode::Jnz => {
                    let displacement = reader.read_i32()?;
                    let target = (start as i64 + displacement as i64) as u32;
                    let sp_after = sp - 1;
                    self.close_flow(sub_idx, flow_id, next_pc, sp_after, Termination::Split);
                    let fallthrough_flow =
                        self.child_flow(sub_idx, flow_starts, flow_id, next_pc, sp_after)?;
                    self.trace_flow(sub_idx, flow_starts, fallthrough_flow, next_pc, sp_after)?;
                    let taken_flow = self.child_flow(sub_idx, flow_starts, flow_id, target, sp_after)?;
                    self.trace_flow(sub_idx, flow_starts, taken_flow, target, sp_after)?;
                    return Ok(());
                }
                Opcode::Jsr => {
                    let displacement = reader.read_i32()?;
                    let target = (start as i64 + displacement as i64) as u32;
                    if self.global_count.is_none()
                        && Some(self.subs[sub_idx].entry_pc) == self.entry.globals_pc
                        && target == self.entry.entry_pc
                    {
                        self.global_count = Some((sp - 1).max(0) as u32);
                    }
                    let callee_idx = self.analyze_subroutine(target, 0)?;
                    let param_size = self.subs[callee_idx]
                        .param_size
                        .expect("callee always resolves its own parameter size before returning");
                    sp -= param_size;
                    pc = next_pc;
                }
                Opcode::CpTopSp | Opcode::CpTopBp => {
                    let _offset = reader.read_i32()?;
                    let size = reader.read_u16()? as i32;
                    sp += size / primitives::CELL_SIZE as i32;
                    pc = next_pc;
                }
                Opcode::CpDownSp | Opcode::CpDownBp => {
                    pc = next_pc;
                }
                Opcode::RsAdd => {
                    sp += 1;
                    pc = next_pc;
                }
                Opcode::Const => {
                    sp += 1;
                    pc = next_pc;
                }
                Opcode::Action => {
                    let ordinal = reader.read_u16()?;
                    let arg_count = reader.read_u8()? as usize;
                    let sig = self.actions.signature(ordinal);
                    let (popped, pushed) = match sig {
                        Some(sig) => {
                            let popped: u32 = sig.parameter_types[..arg_count.min(sig.parameter_types.len())]
                                .iter()
                                .map(|t| t.cell_count())
                                .sum();
                            (popped as i32, sig.return_type.cell_count() as i32)
                        }
                        None => (arg_count as i32, 0),
                    };
                    sp = sp - popped + pushed;
                    pc = next_pc;
                }
                Opcode::MovSp => {
                    let delta_bytes = reader.read_i32()?;
                    sp += delta_bytes / primitives::CELL_SIZE as i32;
                    pc = next_pc;
                }
                Opcode::Destruct => {
                    let size = reader.read_u16()? as i32;
                    let _ex_offset = reader.read_i16()?;
                    let ex_size = reader.read_u16()? as i32;
                    sp -= (size - ex_size) / primitives::CELL_SIZE as i32;
                    pc = next_pc;
                }
                Opcode::SaveBp => {
                    sp += 1;
                    pc = next_pc;
                }
                Opcode::RestoreBp => {
                    sp -= 1;
                    pc = next_pc;
                }
                Opcode::Equal | Opcode::NEqual => {
                    if decoded.type_suffix == ty::BINARY_STRUCTSTRUCT {
                        let size = reader.read_u16()? as i32;
                        sp -= 2 * size - 1;
                    } else {
                        sp -= 1;
                    }
                    pc = next_pc;
                }
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    sp += match decoded.type_suffix {
                        s if s == ty::BINARY_VECTORVECTOR => -3,
                        s if s == ty::BINARY_VECTORFLOAT || s == ty::BINARY_FLOATVECTOR => -1,
                        _ => -1,
                    };
                    pc = next_pc;
                }
                Opcode::LogAnd | Opcode::LogOr | Opcode::IncOr | Opcode::ExcOr | Opcode::BoolAnd
                | Opcode::ShLeft | Opcode::ShRight | Opcode::UShRight | Opcode::Mod
                | Opcode::Geq | Opcode::Gt | Opcode::Lt | Opcode::Leq => {
                    sp -= 1;
                    pc = next_pc;
                }
                Opcode::Neg | Opcode::Comp | Opcode::Not => {
                    pc = next_pc;
                }
                Opcode::DecISp | Opcode::IncISp | Opcode::DecIBp | Opcode::IncIBp => {
                    let _offset = reader.read_i32()?;
                    pc = next_pc;
                }
                Opcode::StoreState => {
                    let displacement = reader.read_i32()?;
                    let _globals = reader.read_u32()?;
                    let locals = reader.read_u32()? as i32;
                    let resume_pc = (start as i64 + displacement as i64) as u32;
                    self.subs[sub_idx].flags.insert(crate::ir::SubroutineFlags::SAVES_STATE);
                    self.register_situation(resume_pc, locals)?;
                    pc = next_pc;
                }
                Opcode::StoreStateAll => {
                    let displacement = reader.read_i32()?;
                    let resume_pc = (start as i64 + displacement as i64) as u32;
                    self.subs[sub_idx].flags.insert(crate::ir::SubroutineFlags::SAVES_STATE);
                    self.register_situation(resume_pc, sp)?;
                    pc = next_pc;
                }
                Opcode::Nop => {
                    pc = next_pc;
                }
            }
        }
    }

    fn close_flow(&mut self, sub_idx: usize, flow_id: FlowId, end_pc: u32, sp: i32, kind: Termination) {
        let flow = self.subs[sub_idx].flow_mut(flow_id);
        flow.end_pc = end_pc;
        flow.end_sp = Some(sp);
        flow.termination = kind;
    }

    /// Gets or creates the flow that starts at `target`, linking it as a
    /// child of `parent`. If `target` already starts a flow, its recorded
    /// `start_sp` must agree (spec §4.7, "every scheduled edge to a
    /// pre-existing flow must have matching SP").
    fn child_flow(
        &mut self,
        sub_idx: usize,
        flow_starts: &mut HashMap<u32, FlowId>,
        parent: FlowId,
        target: u32,
        sp: i32,
    ) -> Result<FlowId, AnalyzerError> {
        if let Some(&existing) = flow_starts.get(&target) {
            let start_sp = self.subs[sub_idx].flow(existing).start_sp;
            if start_sp != sp {
                return Err(AnalyzerError::FlowSpMismatch { expected: start_sp, found: sp });
            }
            self.link(sub_idx, parent, existing);
            return Ok(existing);
        }
        let new_id = self.subs[sub_idx].push_flow(ControlFlow::new(target, sp));
        flow_starts.insert(target, new_id);
        self.link(sub_idx, parent, new_id);
        Ok(new_id)
    }

    /// Links `parent -> existing` when a trace runs into an already fully
    /// traced flow rather than extending linearly into it.
    fn link_transfer(
        &mut self,
        sub_idx: usize,
        parent: FlowId,
        _pc: u32,
        sp: i32,
        existing: FlowId,
    ) -> Result<(), AnalyzerError> {
        let start_sp = self.subs[sub_idx].flow(existing).start_sp;
        if start_sp != sp {
            return Err(AnalyzerError::FlowSpMismatch { expected: start_sp, found: sp });
        }
        self.close_flow(sub_idx, parent, self.subs[sub_idx].flow(existing).start_pc, sp, Termination::Transfer);
        self.link(sub_idx, parent, existing);
        Ok(())
    }

    fn link(&mut self, sub_idx: usize, parent: FlowId, child: FlowId) {
        if !self.subs[sub_idx].flow(parent).children.contains(&child) {
            self.subs[sub_idx].flow_mut(parent).children.push(child);
        }
        if !self.subs[sub_idx].flow(child).parents.contains(&parent) {
            self.subs[sub_idx].flow_mut(child).parents.push(parent);
        }
    }

    /// Finds a fully-traced flow whose `[start_pc, end_pc)` range strictly
    /// contains `pc` (not equal to its start), meaning the scan has walked
    /// into the middle of an existing block and it must be split.
    fn find_mid_flow(
        &self,
        sub_idx: usize,
        flow_starts: &HashMap<u32, FlowId>,
        pc: u32,
    ) -> Option<FlowId> {
        for (&start, &id) in flow_starts.iter() {
            if start == pc {
                continue;
            }
            let flow = self.subs[sub_idx].flow(id);
            if flow.end_sp.is_some() && flow.start_pc < pc && pc < flow.end_pc {
                return Some(id);
            }
        }
        None
    }

    /// Splits `flow_id` at `split_pc`, moving everything from `split_pc`
    /// onward into a freshly created tail flow and re-linking children.
    fn split_flow_at(
        &mut self,
        sub_idx: usize,
        flow_id: FlowId,
        split_pc: u32,
    ) -> Result<FlowId, AnalyzerError> {
        let sub = &mut self.subs[sub_idx];
        let old = sub.flow(flow_id).clone();
        let mut tail = ControlFlow::new(split_pc, old.start_sp);
        tail.end_pc = old.end_pc;
        tail.end_sp = old.end_sp;
        tail.termination = old.termination;
        tail.children = old.children.clone();
        let tail_id = sub.push_flow(tail);

        for &child in &old.children {
            let child_flow = sub.flow_mut(child);
            child_flow.parents.retain(|&p| p != flow_id);
            child_flow.parents.push(tail_id);
        }

        let head = sub.flow_mut(flow_id);
        head.end_pc = split_pc;
        head.end_sp = Some(old.start_sp);
        head.termination = Termination::Transfer;
        head.children = vec![tail_id];

        let tail_flow = sub.flow_mut(tail_id);
        tail_flow.parents = vec![flow_id];

        Ok(tail_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::type_suffix as ty;

    struct NoActions;
    impl ActionTable for NoActions {
        fn signature(&self, _ordinal: u16) -> Option<&ActionSignature> {
            None
        }
    }

    fn push_retn(buf: &mut Vec<u8>) {
        buf.push(Opcode::Retn.as_byte());
        buf.push(ty::UNARY_NONE);
    }

    fn program(loader_tail: Vec<u8>) -> Arc<[u8]> {
        // #loader: bare JSR to the entry, which is a trivial RETN body.
        let mut code = Vec::new();
        code.push(Opcode::Jsr.as_byte());
        code.push(ty::UNARY_NONE);
        let entry_pc = 6u32;
        let displacement = entry_pc as i32 - 0i32;
        code.extend_from_slice(&displacement.to_be_bytes());
        code.extend(loader_tail);
        Arc::from(code)
    }

    #[test]
    fn discovers_void_entry_with_no_globals() {
        let mut tail = Vec::new();
        push_retn(&mut tail);
        let code = program(tail);
        let entry = discover_entry(&code).unwrap();
        assert!(!entry.has_int_return);
        assert!(entry.globals_pc.is_none());
        assert_eq!(entry.entry_pc, 6);
    }

    #[test]
    fn analyzes_trivial_void_subroutine() {
        let mut tail = Vec::new();
        push_retn(&mut tail);
        let code = program(tail);
        let actions = NoActions;
        let analysis = analyze_structure(&code, &actions).unwrap();
        let idx = analysis.index_by_entry[&6];
        assert_eq!(analysis.subroutines[idx].param_size, Some(0));
    }

    #[test]
    fn discovers_nonzero_parameter_size_from_cleanup_before_retn() {
        // entry: RSADD Int (local, +1 cell); MOVSP -8 bytes (-2 cells, one
        // cell below the entry baseline -- that's the discovered parameter
        // cell); RETN.
        let mut tail = Vec::new();
        tail.push(Opcode::RsAdd.as_byte());
        tail.push(ty::UNARY_INT);
        tail.push(Opcode::MovSp.as_byte());
        tail.push(ty::UNARY_NONE);
        tail.extend_from_slice(&(-8i32).to_be_bytes());
        push_retn(&mut tail);
        let code = program(tail);
        let actions = NoActions;
        let analysis = analyze_structure(&code, &actions).unwrap();
        let idx = analysis.index_by_entry[&6];
        assert_eq!(analysis.subroutines[idx].param_size, Some(1));
    }

    #[test]
    fn int_returning_entry_with_no_params_has_zero_param_size() {
        // #loader: RSADD Int (reserves the return cell); JSR entry.
        // entry: CONST Int 1; RETN. sp at RETN is 1, matching the reserved
        // return cell exactly, so the entry takes no parameters.
        let mut code = Vec::new();
        code.push(Opcode::RsAdd.as_byte());
        code.push(ty::UNARY_INT);
        code.push(Opcode::Jsr.as_byte());
        code.push(ty::UNARY_NONE);
        let entry_pc = 8u32;
        code.extend_from_slice(&(entry_pc as i32).to_be_bytes());
        code.push(Opcode::Const.as_byte());
        code.push(ty::UNARY_INT);
        code.extend_from_slice(&1i32.to_be_bytes());
        push_retn(&mut code);
        let code: Arc<[u8]> = Arc::from(code);

        let entry = discover_entry(&code).unwrap();
        assert!(entry.has_int_return);

        let actions = NoActions;
        let analysis = analyze_structure(&code, &actions).unwrap();
        let idx = analysis.index_by_entry[&entry_pc];
        assert_eq!(analysis.subroutines[idx].param_size, Some(0));
        assert_eq!(analysis.subroutines[idx].raw_return_size, 1);
    }

    #[test]
    fn store_state_all_registers_unreached_resume_point_as_situation() {
        // entry: RSADD Int (local, sp=1); STORE_STATEALL -> resume body that
        // is not otherwise reachable by fallthrough or any branch; RETN.
        // resume body: RETN (its own trivial subroutine).
        let mut tail = Vec::new();
        tail.push(Opcode::RsAdd.as_byte());
        tail.push(ty::UNARY_INT);
        tail.push(Opcode::StoreStateAll.as_byte());
        tail.push(ty::UNARY_NONE);
        tail.extend_from_slice(&8i32.to_be_bytes()); // start=8, resume_pc=16
        push_retn(&mut tail); // entry's own RETN, pc 14-15
        push_retn(&mut tail); // resume body, pc 16-17
        let code = program(tail);

        let actions = NoActions;
        let analysis = analyze_structure(&code, &actions).unwrap();

        let entry_idx = analysis.index_by_entry[&6];
        assert!(!analysis.subroutines[entry_idx].flags.contains(crate::ir::SubroutineFlags::SCRIPT_SITUATION));
        assert!(analysis.subroutines[entry_idx].flags.contains(crate::ir::SubroutineFlags::SAVES_STATE));

        let situation_idx = analysis.index_by_entry[&16];
        let situation = &analysis.subroutines[situation_idx];
        assert!(situation.flags.contains(crate::ir::SubroutineFlags::SCRIPT_SITUATION));
        assert_eq!(situation.param_size, Some(1));
    }

    #[test]
    fn rejects_unbounded_self_recursion() {
        // entry at pc 6: JSR back to itself with no base case.
        let mut tail = Vec::new();
        tail.push(Opcode::Jsr.as_byte());
        tail.push(ty::UNARY_NONE);
        tail.extend_from_slice(&(0i32).to_be_bytes()); // displacement 0 -> jumps to itself
        let code = program(tail);
        let actions = NoActions;
        let err = analyze_structure(&code, &actions).unwrap_err();
        assert_eq!(err, AnalyzerError::UnboundedRecursion);
    }
}
