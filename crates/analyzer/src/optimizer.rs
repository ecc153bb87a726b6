//! Pass 3: peephole IR optimizations that must never change the program's
//! externally observable behavior — what it calls, what it stores, what it
//! returns (spec §4.9).

use std::collections::HashSet;

use crate::ir::{IrOp, Subroutine, SubroutineFlags, VarFlags};

/// Runs every optimization this pass defines over an already-lifted
/// subroutine, in the order spec §4.9 lists them. Safe to skip entirely —
/// callers gate this behind `EnableIROptimizations` (spec §6.6).
pub fn optimize_subroutine(sub: &mut Subroutine) {
    classify_variables(sub);
    eliminate_double_creates(sub);
    eliminate_dead_stores(sub);
    eliminate_redundant_copies(sub);
    sub.flags.insert(SubroutineFlags::IS_TYPE_ANALYZED);
}

/// Flags each Variable `LOCAL_TO_FLOW`/`SINGLE_ASSIGNMENT`/`WRITE_ONLY`
/// (spec §4.9, "Variable classification") by scanning every flow's
/// instruction list once.
fn classify_variables(sub: &mut Subroutine) {
    let var_count = sub.variables.len();
    let mut write_count = vec![0u32; var_count];
    let mut read_count = vec![0u32; var_count];
    let mut owning_flow: Vec<Option<usize>> = vec![None; var_count];
    let mut cross_flow: Vec<bool> = vec![false; var_count];

    for (flow_idx, flow) in sub.flows.iter().enumerate() {
        for ins in &flow.instructions {
            if let Some(r) = ins.result {
                let root = sub.head_variable(r).0 as usize;
                write_count[root] += 1;
                match owning_flow[root] {
                    None => owning_flow[root] = Some(flow_idx),
                    Some(f) if f != flow_idx => cross_flow[root] = true,
                    _ => {}
                }
            }
            for operand in [ins.lhs, ins.rhs] {
                if let Some(v) = operand {
                    let root = sub.head_variable(v).0 as usize;
                    read_count[root] += 1;
                    match owning_flow[root] {
                        None => owning_flow[root] = Some(flow_idx),
                        Some(f) if f != flow_idx => cross_flow[root] = true,
                        _ => {}
                    }
                }
            }
        }
    }

    for id in 0..var_count {
        if sub.variable(crate::ir::VarId(id as u32)).merged_with.is_some() {
            continue; // classify representatives only
        }
        let var = sub.variable_mut(crate::ir::VarId(id as u32));
        if !cross_flow[id] {
            var.flags.insert(VarFlags::LOCAL_TO_FLOW);
        }
        if write_count[id] <= 1 {
            var.flags.insert(VarFlags::SINGLE_ASSIGNMENT);
        }
        if read_count[id] == 0 && write_count[id] > 0 {
            var.flags.insert(VarFlags::WRITE_ONLY);
        }
    }
}

/// Removes a `Create`+`Initialize` pair immediately followed by another
/// `Create` on the same Variable at the same origin PC with no intervening
/// read — the "double create" the compiler sometimes emits for a local that
/// is immediately overwritten (spec §4.9, "Double create").
fn eliminate_double_creates(sub: &mut Subroutine) {
    for flow in &mut sub.flows {
        let mut keep = vec![true; flow.instructions.len()];
        let mut i = 0;
        while i + 1 < flow.instructions.len() {
            let same_target = flow.instructions[i].result == flow.instructions[i + 1].result
                && flow.instructions[i].result.is_some();
            if matches!(flow.instructions[i].op, IrOp::Create)
                && matches!(flow.instructions[i + 1].op, IrOp::Create)
                && same_target
            {
                keep[i] = false;
            }
            i += 1;
        }
        let mut idx = 0;
        flow.instructions.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
    }
}

/// Deletes a `Create`/`Assign`/`Initialize` whose result is never read
/// before the next write to the same Variable and is not flagged
/// `MULTIPLY_CREATED` (which would mean some other flow still depends on
/// this value surviving to a join point) — the classic dead-store
/// elimination (spec §4.9, "Dead-store elimination").
fn eliminate_dead_stores(sub: &mut Subroutine) {
    // Precompute everything that needs whole-`sub` access (union-find roots,
    // multiply-created flags) before taking `&mut sub.flows`: a method call
    // like `sub.head_variable(..)` borrows all of `sub`, which cannot
    // overlap with an active `&mut sub.flows` field borrow.
    let var_count = sub.variables.len();
    let root_of: Vec<u32> = (0..var_count)
        .map(|id| sub.head_variable(crate::ir::VarId(id as u32)).0)
        .collect();
    let multiply_created: Vec<bool> = (0..var_count)
        .map(|id| sub.variable(crate::ir::VarId(id as u32)).flags.contains(VarFlags::MULTIPLY_CREATED))
        .collect();

    let mut used: HashSet<u32> = HashSet::new();
    for flow in &sub.flows {
        for ins in &flow.instructions {
            for operand in [ins.lhs, ins.rhs] {
                if let Some(v) = operand {
                    used.insert(root_of[v.0 as usize]);
                }
            }
        }
        for v in &flow.exit_var_stack {
            used.insert(root_of[v.0 as usize]);
        }
    }

    let mut eliminated_roots: HashSet<u32> = HashSet::new();
    for flow in &mut sub.flows {
        flow.instructions.retain(|ins| {
            let writes_dead_var = match (&ins.op, ins.result) {
                (IrOp::Create | IrOp::Initialize | IrOp::Assign, Some(v)) => {
                    let root = root_of[v.0 as usize];
                    !used.contains(&root) && !multiply_created[v.0 as usize]
                }
                _ => false,
            };
            if writes_dead_var {
                if let Some(v) = ins.result {
                    eliminated_roots.insert(root_of[v.0 as usize]);
                }
            }
            !writes_dead_var
        });
    }

    for root in eliminated_roots {
        sub.variable_mut(crate::ir::VarId(root)).flags.insert(VarFlags::OPTIMIZER_ELIMINATED);
    }
}

/// Collapses an `Assign` whose source is itself the untouched result of the
/// immediately preceding `Assign`/`Create` into a single step, for the
/// common `CPTOPSP` immediately followed by a `CPDOWNSP` of the same value
/// pattern the compiler emits around parameter passing (spec §4.9, "Forward
/// and backward copy elimination"). Conservative: only folds adjacent pairs
/// within one flow, never across a branch or a `Call`/`Action`/`SaveState`.
fn eliminate_redundant_copies(sub: &mut Subroutine) {
    for flow in &mut sub.flows {
        let mut i = 0;
        while i + 1 < flow.instructions.len() {
            let can_fold = matches!(flow.instructions[i].op, IrOp::Assign)
                && matches!(flow.instructions[i + 1].op, IrOp::Assign)
                && flow.instructions[i].result == flow.instructions[i + 1].lhs
                && flow.instructions[i].result.is_some();
            if can_fold {
                let source = flow.instructions[i].lhs;
                flow.instructions[i + 1].lhs = source;
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, VarClass, Variable};

    fn sub_with_instructions(instructions: Vec<Instruction>, var_count: usize) -> Subroutine {
        let mut sub = Subroutine::new(0);
        for _ in 0..var_count {
            sub.push_variable(Variable::new(VarClass::Local));
        }
        let mut flow = crate::ir::ControlFlow::new(0, 0);
        flow.end_sp = Some(0);
        flow.instructions = instructions;
        sub.push_flow(flow);
        sub
    }

    #[test]
    fn removes_unused_assign() {
        let v0 = crate::ir::VarId(0);
        let mut ins = Instruction::new(IrOp::Assign, 0);
        ins.result = Some(v0);
        let mut sub = sub_with_instructions(vec![ins], 1);
        eliminate_dead_stores(&mut sub);
        assert!(sub.flows[0].instructions.is_empty());
        assert!(sub.variable(v0).flags.contains(VarFlags::OPTIMIZER_ELIMINATED));
    }

    #[test]
    fn keeps_assign_whose_result_is_read() {
        let v0 = crate::ir::VarId(0);
        let v1 = crate::ir::VarId(1);
        let mut write = Instruction::new(IrOp::Assign, 0);
        write.result = Some(v0);
        let mut read = Instruction::new(IrOp::Assign, 4);
        read.lhs = Some(v0);
        read.result = Some(v1);
        let mut sub = sub_with_instructions(vec![write, read], 2);
        eliminate_dead_stores(&mut sub);
        assert_eq!(sub.flows[0].instructions.len(), 2);
    }

    #[test]
    fn folds_adjacent_copy_chain() {
        let v0 = crate::ir::VarId(0);
        let v1 = crate::ir::VarId(1);
        let v2 = crate::ir::VarId(2);
        let mut first = Instruction::new(IrOp::Assign, 0);
        first.lhs = Some(v0);
        first.result = Some(v1);
        let mut second = Instruction::new(IrOp::Assign, 4);
        second.lhs = Some(v1);
        second.result = Some(v2);
        let mut sub = sub_with_instructions(vec![first, second], 3);
        eliminate_redundant_copies(&mut sub);
        assert_eq!(sub.flows[0].instructions[1].lhs, Some(v0));
    }
}
