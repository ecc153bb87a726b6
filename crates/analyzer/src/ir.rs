//! Typed intermediate representation produced by pass 2 and refined by
//! pass 3 (spec §3 "Subroutine/ControlFlow/Variable/Instruction", §4.8-4.9).

use primitives::value::Tag;
use std::sync::Arc;

/// Tiny bitflags-free flag set macro, matching the small ad-hoc bitmask
/// style the teacher uses for opcode/halt-reason flags rather than pulling
/// in the `bitflags` crate for four-variant sets.
macro_rules! bitflags_like_flags {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
        pub struct $name(u32);

        impl $name {
            $(pub const $variant: Self = Self($value);)*

            pub const fn empty() -> Self {
                Self(0)
            }

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

/// Index of a [`ControlFlow`] node within its owning [`Subroutine`]'s arena.
/// Indices rather than back-references keep the CFG acyclic in ownership
/// even though flows themselves form a general graph (spec §9, "Graph
/// ownership").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(pub u32);

/// Index of a [`Variable`] within its owning [`Subroutine`]'s variable table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// A value a Variable may hold, extended with `Void` for "not yet resolved"
/// (spec §3, Variable).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrType {
    Void,
    Concrete(Tag),
}

/// The role a Variable plays in its subroutine (spec §3, Variable).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarClass {
    Local,
    Global,
    Constant,
    Parameter,
    ReturnValue,
    CallParameter,
    CallReturnValue,
}

bitflags_like_flags! {
    /// Per-Variable flags set by pass 2/3 (spec §3, Variable).
    VarFlags {
        MULTIPLY_CREATED = 1 << 0,
        LOCAL_TO_FLOW = 1 << 1,
        SINGLE_ASSIGNMENT = 1 << 2,
        WRITE_ONLY = 1 << 3,
        OPTIMIZER_ELIMINATED = 1 << 4,
    }
}

/// A constant literal carried by a `Constant`-class Variable.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstLiteral {
    Int(i32),
    Float(f32),
    String(Arc<[u8]>),
    Object(primitives::value::ObjectId),
}

/// One logical SSA-ish value (spec §3, Variable). Variables are unified via
/// [`Variable::merged_with`] (union-find, spec §9 "Union-find Variables");
/// [`Subroutine::head_variable`] follows the chain to the representative.
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub ty: IrType,
    pub class: VarClass,
    pub flags: VarFlags,
    pub constant: Option<ConstLiteral>,
    /// Union-find parent. `None` means this Variable is its own root.
    pub merged_with: Option<VarId>,
}

impl Variable {
    pub fn new(class: VarClass) -> Self {
        Self {
            ty: IrType::Void,
            class,
            flags: VarFlags::empty(),
            constant: None,
            merged_with: None,
        }
    }

    pub fn constant_of(class: VarClass, ty: Tag, literal: ConstLiteral) -> Self {
        Self {
            ty: IrType::Concrete(ty),
            class,
            flags: VarFlags::empty(),
            constant: Some(literal),
            merged_with: None,
        }
    }
}

/// An IR opcode (spec §3, Instruction's opcode set).
#[derive(Clone, Debug, PartialEq)]
pub enum IrOp {
    Create,
    Initialize,
    Assign,
    Delete,
    Test,
    Jz(FlowId),
    Jnz(FlowId),
    Jmp(FlowId),
    Call { target_pc: u32, args: Vec<VarId>, returns: Vec<VarId> },
    Retn,
    Action { ordinal: u16, args: Vec<VarId>, returns: Vec<VarId> },
    SaveState { resume_pc: u32, globals: Vec<VarId>, locals: Vec<VarId> },
    LogAnd,
    LogOr,
    IncOr,
    ExcOr,
    BoolAnd,
    Equal,
    NEqual,
    Geq,
    Gt,
    Lt,
    Leq,
    ShLeft,
    ShRight,
    UShRight,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Comp,
    Not,
    Inc,
    Dec,
}

/// One lifted instruction: an opcode plus up to two operands and a result
/// (spec §3, Instruction).
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub op: IrOp,
    pub lhs: Option<VarId>,
    pub rhs: Option<VarId>,
    pub result: Option<VarId>,
    /// Originating bytecode offset, kept for diagnostics and for the
    /// optimizer's same-position dead-pair checks (spec §4.9, "Double
    /// create").
    pub origin_pc: u32,
}

impl Instruction {
    pub fn new(op: IrOp, origin_pc: u32) -> Self {
        Self { op, lhs: None, rhs: None, result: None, origin_pc }
    }
}

/// How a [`ControlFlow`] node ends (spec §3, ControlFlow).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    Terminate,
    Merge,
    Transfer,
    Split,
}

/// A basic block of the subroutine's CFG (spec §3, ControlFlow).
#[derive(Clone, Debug, PartialEq)]
pub struct ControlFlow {
    pub start_pc: u32,
    pub end_pc: u32,
    pub start_sp: i32,
    /// `None` while blocked on an unanalyzed callee (spec §4.7).
    pub end_sp: Option<i32>,
    pub termination: Termination,
    pub children: Vec<FlowId>,
    pub parents: Vec<FlowId>,
    pub instructions: Vec<Instruction>,
    /// Variable roots live on the stack at flow exit, used to detect and
    /// merge divergent assignments at join points (spec §4.8, "Variable
    /// merging at flow joins").
    pub exit_var_stack: Vec<VarId>,
}

impl ControlFlow {
    pub fn new(start_pc: u32, start_sp: i32) -> Self {
        Self {
            start_pc,
            end_pc: start_pc,
            start_sp,
            end_sp: None,
            termination: Termination::Terminate,
            children: Vec::new(),
            parents: Vec::new(),
            instructions: Vec::new(),
            exit_var_stack: Vec::new(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.end_sp.is_none()
    }
}

/// Flags on a [`Subroutine`] (spec §3, Subroutine).
bitflags_like_flags! {
    SubroutineFlags {
        SCRIPT_SITUATION = 1 << 0,
        SAVES_STATE = 1 << 1,
        IS_ANALYZED = 1 << 2,
        IS_TYPE_ANALYZED = 1 << 3,
    }
}

/// One entry point and its analyzed CFG (spec §3, Subroutine).
#[derive(Clone, Debug, PartialEq)]
pub struct Subroutine {
    pub entry_pc: u32,
    pub param_types: Vec<Tag>,
    pub return_types: Vec<Tag>,
    /// Arena of this subroutine's flows, indexed by [`FlowId`].
    pub flows: Vec<ControlFlow>,
    pub variables: Vec<Variable>,
    pub flags: SubroutineFlags,
    /// `-SP` at the first RETN seen during pass 1 (spec §4.7).
    pub param_size: Option<i32>,
    /// Raw return size computed during pass 1, before subtracting
    /// `param_size` (spec §4.7).
    pub raw_return_size: i32,
}

impl Subroutine {
    pub fn new(entry_pc: u32) -> Self {
        Self {
            entry_pc,
            param_types: Vec::new(),
            return_types: Vec::new(),
            flows: Vec::new(),
            variables: Vec::new(),
            flags: SubroutineFlags::empty(),
            param_size: None,
            raw_return_size: 0,
        }
    }

    pub fn push_flow(&mut self, flow: ControlFlow) -> FlowId {
        let id = FlowId(self.flows.len() as u32);
        self.flows.push(flow);
        id
    }

    pub fn flow(&self, id: FlowId) -> &ControlFlow {
        &self.flows[id.0 as usize]
    }

    pub fn flow_mut(&mut self, id: FlowId) -> &mut ControlFlow {
        &mut self.flows[id.0 as usize]
    }

    pub fn push_variable(&mut self, var: Variable) -> VarId {
        let id = VarId(self.variables.len() as u32);
        self.variables.push(var);
        id
    }

    pub fn variable(&self, id: VarId) -> &Variable {
        &self.variables[id.0 as usize]
    }

    pub fn variable_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.variables[id.0 as usize]
    }

    /// Follows `merged_with` to the representative root (spec §3,
    /// "`GetHeadVariable` follows `MergedWith` to a root").
    pub fn head_variable(&self, mut id: VarId) -> VarId {
        while let Some(parent) = self.variable(id).merged_with {
            if parent == id {
                break;
            }
            id = parent;
        }
        id
    }

    /// Union-find merge: unifies `from` into `to`'s root (spec §9,
    /// "union-by-rank with path compression" — rank is approximated here by
    /// always rooting at the earlier-created, lower-index Variable, which is
    /// stable and sufficient for a bounded per-subroutine variable count).
    pub fn merge_variables(&mut self, from: VarId, to: VarId) {
        let from_root = self.head_variable(from);
        let to_root = self.head_variable(to);
        if from_root == to_root {
            return;
        }
        let (root, child) = if from_root.0 < to_root.0 {
            (from_root, to_root)
        } else {
            (to_root, from_root)
        };
        self.variable_mut(child).merged_with = Some(root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_variable_follows_chain_to_root() {
        let mut sub = Subroutine::new(0);
        let a = sub.push_variable(Variable::new(VarClass::Local));
        let b = sub.push_variable(Variable::new(VarClass::Local));
        let c = sub.push_variable(Variable::new(VarClass::Local));
        sub.merge_variables(b, a);
        sub.merge_variables(c, b);
        assert_eq!(sub.head_variable(c), a);
        assert_eq!(sub.head_variable(b), a);
    }

    #[test]
    fn flags_combine_and_query() {
        let mut flags = SubroutineFlags::empty();
        flags.insert(SubroutineFlags::SAVES_STATE);
        assert!(flags.contains(SubroutineFlags::SAVES_STATE));
        assert!(!flags.contains(SubroutineFlags::IS_ANALYZED));
    }
}
