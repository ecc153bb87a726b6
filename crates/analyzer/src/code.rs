//! Pass 2: lifts each subroutine's bytecode to typed IR (spec §4.8), given
//! the CFG skeleton pass 1 already built.

use std::collections::HashMap;
use std::sync::Arc;

use bytecode::{type_suffix as ty, BytecodeReader, Disassembler, Opcode};
use primitives::value::{ObjectId, Tag};

use crate::error::AnalyzerError;
use crate::ir::{
    ConstLiteral, FlowId, Instruction, IrOp, IrType, Subroutine, SubroutineFlags, VarClass, VarFlags,
    Variable,
};
use crate::structure::{ActionTable, StructureAnalysis};

/// Runs pass 2 over every subroutine discovered by pass 1, mutating each
/// [`Subroutine`] in place with its lifted IR.
pub fn analyze_code(
    code: &Arc<[u8]>,
    actions: &dyn ActionTable,
    analysis: &mut StructureAnalysis,
) -> Result<(), AnalyzerError> {
    let entry_pcs: Vec<u32> = analysis.subroutines.iter().map(|s| s.entry_pc).collect();
    for (idx, entry_pc) in entry_pcs.into_iter().enumerate() {
        lift_subroutine(code, actions, analysis, idx, entry_pc)?;
    }
    Ok(())
}

fn lift_subroutine(
    code: &Arc<[u8]>,
    actions: &dyn ActionTable,
    analysis: &mut StructureAnalysis,
    sub_idx: usize,
    _entry_pc: u32,
) -> Result<(), AnalyzerError> {
    let flow_count = analysis.subroutines[sub_idx].flows.len();
    let param_size = analysis.subroutines[sub_idx].param_size.unwrap_or(0);

    // Synthesize parameter Variables (they live below the entry baseline,
    // at negative offsets, in calling-convention order).
    let mut entry_var_stack: Vec<crate::ir::VarId> = Vec::new();
    {
        let sub = &mut analysis.subroutines[sub_idx];
        for _ in 0..param_size {
            let v = sub.push_variable(Variable::new(VarClass::Parameter));
            entry_var_stack.push(v);
        }
    }

    let mut var_stacks: HashMap<FlowId, Vec<crate::ir::VarId>> = HashMap::new();
    var_stacks.insert(FlowId(0), entry_var_stack);

    // Flows are discovered in trace order, not topological order: at a
    // two-parent join, the first arm's own forward jump usually creates the
    // join flow before the second arm that also feeds it has been traced at
    // all, so the join's index can land before one of its own parents. A
    // single ascending pass would then see that parent's stack missing and
    // merge only the arm it already had. Sweep to a fixed point instead,
    // deferring any flow whose parents aren't all lifted yet; a loop
    // back-edge (header and body waiting on each other) can't reach a fixed
    // point this way, so once a sweep makes no progress the remainder is
    // lifted anyway with whatever parent stacks are available, same as
    // `merge_parent_stacks` already tolerates for back-edges.
    let mut remaining: Vec<usize> = (0..flow_count).collect();
    while !remaining.is_empty() {
        let mut still_pending = Vec::new();
        let mut made_progress = false;
        for i in remaining {
            let flow_id = FlowId(i as u32);
            let parents = analysis.subroutines[sub_idx].flow(flow_id).parents.clone();
            if !parents.iter().all(|p| var_stacks.contains_key(p)) {
                still_pending.push(i);
                continue;
            }
            let incoming = merge_parent_stacks(analysis, sub_idx, flow_id, &var_stacks);
            let var_stack = incoming.unwrap_or_default();
            let resulting = lift_flow(code, actions, analysis, sub_idx, flow_id, var_stack)?;
            var_stacks.insert(flow_id, resulting);
            made_progress = true;
        }
        if !made_progress {
            for i in &still_pending {
                let flow_id = FlowId(*i as u32);
                let incoming = merge_parent_stacks(analysis, sub_idx, flow_id, &var_stacks);
                let var_stack = incoming.unwrap_or_default();
                let resulting = lift_flow(code, actions, analysis, sub_idx, flow_id, var_stack)?;
                var_stacks.insert(flow_id, resulting);
            }
            still_pending.clear();
        }
        remaining = still_pending;
    }

    analysis.subroutines[sub_idx].flags.insert(SubroutineFlags::IS_ANALYZED);
    Ok(())
}

/// At a flow with ≥2 parents, unifies divergent Variables position-wise via
/// `MergedWith` and flags them `MultiplyCreated` (spec §4.8, "Variable
/// merging at flow joins").
fn merge_parent_stacks(
    analysis: &mut StructureAnalysis,
    sub_idx: usize,
    flow_id: FlowId,
    var_stacks: &HashMap<FlowId, Vec<crate::ir::VarId>>,
) -> Option<Vec<crate::ir::VarId>> {
    let parents = analysis.subroutines[sub_idx].flow(flow_id).parents.clone();
    if parents.is_empty() {
        return var_stacks.get(&flow_id).cloned();
    }
    let mut stacks: Vec<Vec<crate::ir::VarId>> =
        parents.iter().filter_map(|p| var_stacks.get(p).cloned()).collect();
    let base = stacks.pop()?;
    let mut merged = base.clone();
    for other in stacks {
        if other.len() != merged.len() {
            continue; // pass 1 already enforces SP agreement; length mismatch here is unreachable for a valid program
        }
        for (slot, &other_var) in merged.iter_mut().zip(other.iter()) {
            if *slot != other_var {
                analysis.subroutines[sub_idx].merge_variables(other_var, *slot);
                let root = *slot;
                let v = analysis.subroutines[sub_idx].variable_mut(root);
                v.flags.insert(VarFlags::MULTIPLY_CREATED);
            }
        }
    }
    Some(merged)
}

fn lift_flow(
    code: &Arc<[u8]>,
    actions: &dyn ActionTable,
    analysis: &mut StructureAnalysis,
    sub_idx: usize,
    flow_id: FlowId,
    mut stack: Vec<crate::ir::VarId>,
) -> Result<Vec<crate::ir::VarId>, AnalyzerError> {
    let (start_pc, end_pc) = {
        let flow = analysis.subroutines[sub_idx].flow(flow_id);
        (flow.start_pc, flow.end_pc)
    };
    let mut reader = BytecodeReader::new(code.clone());
    reader.seek(start_pc);
    let mut instructions: Vec<Instruction> = Vec::new();

    while reader.tell() < end_pc {
        let pc = reader.tell();
        let decoded = Disassembler::decode(&mut reader)?;
        let suffix = decoded.type_suffix;

        match decoded.opcode {
            Opcode::RsAdd => {
                let tag = suffix_to_tag(suffix);
                let v = push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                set_type(analysis, sub_idx, v, tag);
                instructions.push(tagged(IrOp::Create, pc, None, None, Some(v)));
                instructions.push(tagged(IrOp::Initialize, pc, None, None, Some(v)));
                stack.push(v);
            }
            Opcode::Const => {
                let (literal, tag) = read_const(&mut reader, suffix)?;
                let v = push_var(
                    analysis,
                    sub_idx,
                    Variable::constant_of(VarClass::Constant, tag, literal),
                );
                stack.push(v);
                instructions.push(tagged(IrOp::Assign, pc, None, None, Some(v)));
            }
            Opcode::CpDownSp | Opcode::CpDownBp => {
                let offset = reader.read_i32()? / primitives::CELL_SIZE as i32;
                let size = reader.read_u16()? as i32 / primitives::CELL_SIZE as i32;
                let top = stack.len() as i32;
                let dst_start = (top + offset) as usize;
                // copy the top `size` Variables down to `dst_start..`
                let src_slice: Vec<_> = stack[(stack.len() - size as usize)..].to_vec();
                for (k, src) in src_slice.into_iter().enumerate() {
                    let dst = stack[dst_start + k];
                    link_types(analysis, sub_idx, dst, src);
                    instructions.push(tagged(IrOp::Assign, pc, Some(src), None, Some(dst)));
                }
            }
            Opcode::CpTopSp | Opcode::CpTopBp => {
                let offset = reader.read_i32()? / primitives::CELL_SIZE as i32;
                let size = reader.read_u16()? as i32 / primitives::CELL_SIZE as i32;
                let top = stack.len() as i32;
                let src_start = (top + offset) as usize;
                let src_slice: Vec<_> = stack[src_start..src_start + size as usize].to_vec();
                for src in src_slice {
                    let v = push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                    link_types(analysis, sub_idx, v, src);
                    instructions.push(tagged(IrOp::Create, pc, None, None, Some(v)));
                    instructions.push(tagged(IrOp::Assign, pc, Some(src), None, Some(v)));
                    stack.push(v);
                }
            }
            Opcode::MovSp => {
                let delta = reader.read_i32()? / primitives::CELL_SIZE as i32;
                for _ in 0..(-delta) {
                    if let Some(v) = stack.pop() {
                        instructions.push(tagged(IrOp::Delete, pc, None, None, Some(v)));
                    }
                }
            }
            Opcode::Destruct => {
                let size = reader.read_u16()? as i32 / primitives::CELL_SIZE as i32;
                let ex_offset = reader.read_i16()? as i32 / primitives::CELL_SIZE as i32;
                let ex_size = reader.read_u16()? as i32 / primitives::CELL_SIZE as i32;
                let region: Vec<_> = stack.split_off(stack.len() - size as usize);
                let hole_start = (region.len() as i32 + ex_offset) as usize;
                let hole: Vec<_> = region[hole_start..hole_start + ex_size as usize].to_vec();
                for (i, v) in region.iter().enumerate() {
                    if i < hole_start || i >= hole_start + ex_size as usize {
                        instructions.push(tagged(IrOp::Delete, pc, None, None, Some(*v)));
                    }
                }
                stack.extend(hole);
            }
            Opcode::Equal | Opcode::NEqual => {
                let is_equal = decoded.opcode == Opcode::Equal;
                if suffix == ty::BINARY_STRUCTSTRUCT {
                    let size = reader.read_u16()? as usize;
                    let rhs: Vec<_> = stack.split_off(stack.len() - size);
                    let lhs: Vec<_> = stack.split_off(stack.len() - size);
                    let mut fold: Option<crate::ir::VarId> = None;
                    for (l, r) in lhs.into_iter().zip(rhs.into_iter()) {
                        let cell_result =
                            push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                        set_type(analysis, sub_idx, cell_result, Tag::Int);
                        instructions.push(tagged(
                            IrOp::Equal,
                            pc,
                            Some(l),
                            Some(r),
                            Some(cell_result),
                        ));
                        fold = Some(match fold {
                            None => cell_result,
                            Some(prev) => {
                                let folded =
                                    push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                                set_type(analysis, sub_idx, folded, Tag::Int);
                                let op = if is_equal { IrOp::LogAnd } else { IrOp::IncOr };
                                instructions.push(tagged(op, pc, Some(prev), Some(cell_result), Some(folded)));
                                folded
                            }
                        });
                    }
                    let result = fold.unwrap_or_else(|| {
                        let v = push_var(analysis, sub_idx, Variable::new(VarClass::Constant));
                        set_type(analysis, sub_idx, v, Tag::Int);
                        v
                    });
                    stack.push(result);
                } else {
                    let rhs = stack.pop().unwrap_or_else(|| entry_placeholder(analysis, sub_idx));
                    let lhs = stack.pop().unwrap_or_else(|| entry_placeholder(analysis, sub_idx));
                    let result = push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                    set_type(analysis, sub_idx, result, Tag::Int);
                    let op = if is_equal { IrOp::Equal } else { IrOp::NEqual };
                    instructions.push(tagged(op, pc, Some(lhs), Some(rhs), Some(result)));
                    stack.push(result);
                }
            }
            Opcode::Geq | Opcode::Gt | Opcode::Lt | Opcode::Leq
            | Opcode::LogAnd | Opcode::LogOr | Opcode::IncOr | Opcode::ExcOr | Opcode::BoolAnd
            | Opcode::ShLeft | Opcode::ShRight | Opcode::UShRight | Opcode::Mod
            | Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                let is_vector_op = matches!(
                    suffix,
                    s if s == ty::BINARY_VECTORVECTOR
                        || s == ty::BINARY_VECTORFLOAT
                        || s == ty::BINARY_FLOATVECTOR
                );
                let component_count = if is_vector_op { 3 } else { 1 };
                // BINARY_VECTORFLOAT/BINARY_FLOATVECTOR name the lhs/rhs
                // order directly: the Float side contributes a single
                // broadcast cell, the Vector side contributes all three.
                let lhs_width = if suffix == ty::BINARY_FLOATVECTOR { 1 } else { component_count };
                let rhs_width = if suffix == ty::BINARY_VECTORFLOAT { 1 } else { component_count };
                let rhs_vars: Vec<_> = stack.split_off(stack.len() - rhs_width);
                let lhs_vars: Vec<_> = stack.split_off(stack.len() - lhs_width);
                let out_width = component_count;
                for k in 0..out_width {
                    let l = lhs_vars[k.min(lhs_vars.len() - 1)];
                    let r = rhs_vars[k.min(rhs_vars.len() - 1)];
                    let result = push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                    let op = ir_op_for(decoded.opcode);
                    instructions.push(tagged(op, pc, Some(l), Some(r), Some(result)));
                    stack.push(result);
                }
            }
            Opcode::Neg | Opcode::Comp | Opcode::Not => {
                let v = stack.pop().unwrap_or_else(|| entry_placeholder(analysis, sub_idx));
                let result = push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                let op = ir_op_for(decoded.opcode);
                instructions.push(tagged(op, pc, Some(v), None, Some(result)));
                stack.push(result);
            }
            Opcode::DecISp | Opcode::IncISp | Opcode::DecIBp | Opcode::IncIBp => {
                let offset = reader.read_i32()? / primitives::CELL_SIZE as i32;
                let top = stack.len() as i32;
                let idx = (top + offset) as usize;
                if idx < stack.len() {
                    let v = stack[idx];
                    set_type(analysis, sub_idx, v, Tag::Int);
                    let op = if matches!(decoded.opcode, Opcode::DecISp | Opcode::DecIBp) {
                        IrOp::Dec
                    } else {
                        IrOp::Inc
                    };
                    instructions.push(tagged(op, pc, Some(v), None, Some(v)));
                }
            }
            Opcode::Action => {
                let ordinal = reader.read_u16()?;
                let arg_count = reader.read_u8()? as usize;
                let sig = actions.signature(ordinal).cloned();
                let param_types: Vec<_> = sig
                    .as_ref()
                    .map(|s| s.parameter_types[..arg_count.min(s.parameter_types.len())].to_vec())
                    .unwrap_or_default();
                // Walk parameters back-to-front (the last declared parameter
                // sits on top of the stack), popping each parameter's whole
                // cell run in its original left-to-right order, then
                // restore front-to-back parameter order at the end.
                let mut per_param: Vec<Vec<crate::ir::VarId>> = Vec::new();
                for t in param_types.iter().rev() {
                    let cells = t.cell_count() as usize;
                    if cells == 0 {
                        continue;
                    }
                    per_param.push(stack.split_off(stack.len() - cells));
                }
                per_param.reverse();
                let args: Vec<_> = per_param.into_iter().flatten().collect();
                let mut returns = Vec::new();
                if let Some(sig) = &sig {
                    let cells = sig.return_type.cell_count();
                    for _ in 0..cells {
                        let v = push_var(analysis, sub_idx, Variable::new(VarClass::CallReturnValue));
                        returns.push(v);
                        stack.push(v);
                    }
                }
                instructions.push(tagged(
                    IrOp::Action { ordinal, args, returns },
                    pc,
                    None,
                    None,
                    None,
                ));
            }
            Opcode::Jsr => {
                let displacement = reader.read_i32()?;
                let target = (pc as i64 + displacement as i64) as u32;
                let callee_idx = analysis
                    .index_by_entry
                    .get(&target)
                    .copied()
                    .expect("pass 1 analyzed every JSR target");
                let param_size = analysis.subroutines[callee_idx].param_size.unwrap_or(0) as usize;
                let mut args = Vec::new();
                if param_size <= stack.len() {
                    args = stack.split_off(stack.len() - param_size);
                }
                let mut returns = Vec::new();
                let return_size = analysis.subroutines[callee_idx].return_types.len();
                for _ in 0..return_size {
                    let v = push_var(analysis, sub_idx, Variable::new(VarClass::CallReturnValue));
                    returns.push(v);
                    stack.push(v);
                }
                instructions.push(tagged(
                    IrOp::Call { target_pc: target, args, returns },
                    pc,
                    None,
                    None,
                    None,
                ));
            }
            Opcode::StoreState | Opcode::StoreStateAll => {
                let (displacement, global_count, local_count) = match decoded.opcode {
                    Opcode::StoreState => {
                        let d = reader.read_i32()?;
                        let g = reader.read_u32()?;
                        let l = reader.read_u32()?;
                        (d, g as usize, l as usize)
                    }
                    _ => {
                        let d = reader.read_i32()?;
                        (d, 0, stack.len())
                    }
                };
                let resume_pc = (pc as i64 + displacement as i64) as u32;
                let globals = stack[..global_count.min(stack.len())].to_vec();
                let locals = stack[stack.len().saturating_sub(local_count)..].to_vec();
                instructions.push(tagged(
                    IrOp::SaveState { resume_pc, globals, locals },
                    pc,
                    None,
                    None,
                    None,
                ));
            }
            Opcode::SaveBp => {
                // Pushes the saved base pointer (spec §4.7 tracks this as a
                // +1 SP delta); modeled as an opaque Variable so later
                // CPDOWNBP/CPTOPBP offsets computed from `stack.len()` stay
                // aligned with the real VM stack.
                let v = push_var(analysis, sub_idx, Variable::new(VarClass::Local));
                set_type(analysis, sub_idx, v, Tag::BasePointer);
                instructions.push(tagged(IrOp::Create, pc, None, None, Some(v)));
                stack.push(v);
            }
            Opcode::RestoreBp => {
                if let Some(v) = stack.pop() {
                    instructions.push(tagged(IrOp::Delete, pc, None, None, Some(v)));
                }
            }
            Opcode::Jz | Opcode::Jnz | Opcode::Jmp => {
                if decoded.opcode != Opcode::Jmp {
                    let _displacement = reader.read_i32()?;
                    let v = stack.pop().unwrap_or_else(|| entry_placeholder(analysis, sub_idx));
                    instructions.push(tagged(IrOp::Test, pc, Some(v), None, None));
                    instructions.push(tagged(IrOp::Delete, pc, None, None, Some(v)));
                } else {
                    let _displacement = reader.read_i32()?;
                }
            }
            Opcode::Retn => {
                instructions.push(tagged(IrOp::Retn, pc, None, None, None));
            }
            Opcode::Nop => {}
        }
    }

    analysis.subroutines[sub_idx].flow_mut(flow_id).instructions = instructions;
    analysis.subroutines[sub_idx].flow_mut(flow_id).exit_var_stack = stack.clone();
    Ok(stack)
}

fn entry_placeholder(analysis: &mut StructureAnalysis, sub_idx: usize) -> crate::ir::VarId {
    push_var(analysis, sub_idx, Variable::new(VarClass::Local))
}

fn tagged(
    op: IrOp,
    pc: u32,
    lhs: Option<crate::ir::VarId>,
    rhs: Option<crate::ir::VarId>,
    result: Option<crate::ir::VarId>,
) -> Instruction {
    let mut ins = Instruction::new(op, pc);
    ins.lhs = lhs;
    ins.rhs = rhs;
    ins.result = result;
    ins
}

fn push_var(analysis: &mut StructureAnalysis, sub_idx: usize, var: Variable) -> crate::ir::VarId {
    analysis.subroutines[sub_idx].push_variable(var)
}

fn set_type(analysis: &mut StructureAnalysis, sub_idx: usize, var: crate::ir::VarId, tag: Tag) {
    let root = analysis.subroutines[sub_idx].head_variable(var);
    analysis.subroutines[sub_idx].variable_mut(root).ty = IrType::Concrete(tag);
}

/// Unifies two Variables' types via `LinkTypes` (spec §4.8, "Type
/// propagation"): if either side already has a concrete type, the other is
/// resolved to match.
fn link_types(analysis: &mut StructureAnalysis, sub_idx: usize, a: crate::ir::VarId, b: crate::ir::VarId) {
    let a_ty = analysis.subroutines[sub_idx].variable(analysis.subroutines[sub_idx].head_variable(a)).ty;
    let b_ty = analysis.subroutines[sub_idx].variable(analysis.subroutines[sub_idx].head_variable(b)).ty;
    match (a_ty, b_ty) {
        (IrType::Concrete(t), IrType::Void) => set_type(analysis, sub_idx, b, t),
        (IrType::Void, IrType::Concrete(t)) => set_type(analysis, sub_idx, a, t),
        _ => {}
    }
}

fn suffix_to_tag(suffix: u8) -> Tag {
    match suffix {
        ty::UNARY_INT => Tag::Int,
        ty::UNARY_FLOAT => Tag::Float,
        ty::UNARY_STRING => Tag::String,
        ty::UNARY_OBJECTID => Tag::Object,
        s if ty::is_unary_engine(s) => Tag::Engine(ty::engine_type_id(s).unwrap()),
        _ => Tag::Int,
    }
}

fn read_const(reader: &mut BytecodeReader, suffix: u8) -> Result<(ConstLiteral, Tag), AnalyzerError> {
    Ok(match suffix {
        ty::UNARY_INT => (ConstLiteral::Int(reader.read_i32()?), Tag::Int),
        ty::UNARY_FLOAT => (ConstLiteral::Float(reader.read_f32()?), Tag::Float),
        ty::UNARY_OBJECTID => (ConstLiteral::Object(ObjectId(reader.read_u32()?)), Tag::Object),
        ty::UNARY_STRING => {
            let len = reader.read_u16()? as u32;
            (ConstLiteral::String(reader.read_string(len)?), Tag::String)
        }
        _ => {
            return Err(AnalyzerError::Bytecode(bytecode::BytecodeError::InvalidOpcodeType {
                opcode: Opcode::Const.as_byte(),
                type_suffix: suffix,
            }))
        }
    })
}

fn ir_op_for(opcode: Opcode) -> IrOp {
    match opcode {
        Opcode::LogAnd => IrOp::LogAnd,
        Opcode::LogOr => IrOp::LogOr,
        Opcode::IncOr => IrOp::IncOr,
        Opcode::ExcOr => IrOp::ExcOr,
        Opcode::BoolAnd => IrOp::BoolAnd,
        Opcode::Geq => IrOp::Geq,
        Opcode::Gt => IrOp::Gt,
        Opcode::Lt => IrOp::Lt,
        Opcode::Leq => IrOp::Leq,
        Opcode::ShLeft => IrOp::ShLeft,
        Opcode::ShRight => IrOp::ShRight,
        Opcode::UShRight => IrOp::UShRight,
        Opcode::Mod => IrOp::Mod,
        Opcode::Add => IrOp::Add,
        Opcode::Sub => IrOp::Sub,
        Opcode::Mul => IrOp::Mul,
        Opcode::Div => IrOp::Div,
        Opcode::Neg => IrOp::Neg,
        Opcode::Comp => IrOp::Comp,
        Opcode::Not => IrOp::Not,
        _ => unreachable!("ir_op_for called with a non-arithmetic opcode"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::analyze_structure;
    use bytecode::type_suffix as ty;
    use std::sync::Arc;

    struct NoActions;
    impl ActionTable for NoActions {
        fn signature(&self, _ordinal: u16) -> Option<&primitives::ActionSignature> {
            None
        }
    }

    fn program_with_entry_body(body: Vec<u8>) -> Arc<[u8]> {
        let mut code = Vec::new();
        code.push(Opcode::Jsr.as_byte());
        code.push(ty::UNARY_NONE);
        let entry_pc = 6u32;
        code.extend_from_slice(&(entry_pc as i32).to_be_bytes());
        code.extend(body);
        Arc::from(code)
    }

    #[test]
    fn lifts_two_const_add_retn() {
        let mut body = Vec::new();
        body.push(Opcode::Const.as_byte());
        body.push(ty::UNARY_INT);
        body.extend_from_slice(&3i32.to_be_bytes());
        body.push(Opcode::Const.as_byte());
        body.push(ty::UNARY_INT);
        body.extend_from_slice(&4i32.to_be_bytes());
        body.push(Opcode::Add.as_byte());
        body.push(ty::BINARY_INTINT);
        body.push(Opcode::Retn.as_byte());
        body.push(ty::UNARY_NONE);
        let code = program_with_entry_body(body);
        let actions = NoActions;
        let mut analysis = analyze_structure(&code, &actions).unwrap();
        analyze_code(&code, &actions, &mut analysis).unwrap();
        let idx = analysis.index_by_entry[&6];
        let sub = &analysis.subroutines[idx];
        assert!(sub.flags.contains(SubroutineFlags::IS_ANALYZED));
        let add_instr = sub
            .flows
            .iter()
            .flat_map(|f| f.instructions.iter())
            .find(|i| matches!(i.op, IrOp::Add));
        assert!(add_instr.is_some());
    }
}
