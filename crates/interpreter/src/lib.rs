//! Stack machine, virtual machine, host trait, action dispatcher and
//! situation codec — the part of the engine that actually runs a program.
//!
//! This crate reads raw bytecode directly (through `script-bytecode`'s
//! reader and disassembler) rather than through the static analyzer's IR:
//! the VM's dispatch loop and the analyzer's passes are independent
//! consumers of the same instruction catalog, the way `revm-interpreter`'s
//! execution loop and `revm-bytecode`'s jump-table analysis both read the
//! same opcode stream without one depending on the other's output.

pub mod action_dispatcher;
pub mod error;
pub mod function_stack;
pub mod host;
pub mod situation;
pub mod stack;
pub mod vm;

pub use error::InterpreterError;
pub use function_stack::{CallFrame, FunctionStack};
pub use host::{DummyHost, Host, HostValue};
pub use situation::{Situation, SITUATION_MAGIC};
pub use stack::StackMachine;
pub use vm::{Vm, VmLimits};
