//! Bytecode reader, instruction disassembler, opcode catalog and
//! platform-native envelope detection.
//!
//! This crate knows the wire format but nothing about execution semantics:
//! it turns a byte stream into `(opcode, type_suffix, length)` triples and
//! leaves interpreting them to `script-analyzer` and `script-interpreter`.

pub mod disassembler;
pub mod error;
pub mod native;
pub mod opcode;
pub mod reader;

pub use disassembler::{DecodedInstruction, Disassembler};
pub use error::BytecodeError;
pub use native::{detect_platform_native, PlatformNativeImage};
pub use opcode::{type_suffix, Opcode};
pub use reader::BytecodeReader;
