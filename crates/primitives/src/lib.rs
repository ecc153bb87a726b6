//! Core value and error types shared by every script-engine crate.
//!
//! This crate has no dependency on the bytecode format or the interpreter
//! loop: it only defines what a stack cell *is* (module [`value`]), what an
//! opaque host-owned handle looks like (module [`engine_type`]), the action
//! calling-convention types the host registers (module [`action`]), and the
//! single error enum every later crate funnels into (module [`error`]).
pub mod action;
pub mod engine_type;
pub mod error;
pub mod value;

pub use action::{ActionSignature, ActionType};
pub use engine_type::{EngineHandle, EngineStructure, EngineTypeId, LAST_ENGINE_STRUCTURE};
pub use error::{ScriptError, ScriptErrorKind};
pub use value::{Cell, ObjectId, StackValue, Tag};

/// Size in bytes of one stack cell. Every [`StackValue`] occupies exactly one
/// cell; a `Vector` is a convention of three consecutive `Float` cells, never
/// a fourth fundamental tag.
pub const CELL_SIZE: u32 = 4;
