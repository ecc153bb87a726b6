//! Program cache, host-action adapter and the top-level [`Engine`] facade
//! (spec §6). This is the crate an embedding host actually links against;
//! `script-analyzer` and `script-interpreter` are implementation details it
//! wires together, the same way `revm`'s top-level crate re-exports
//! `revm-interpreter`/`revm-bytecode` behind one `Evm` entry point.

pub mod action_table;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;

pub use action_table::HostActionTable;
pub use cache::{canonicalize_resource_name, ProgramCache, ProgramImage, MAX_RESOURCE_NAME_LEN};
pub use config::{EngineConfig, EngineSelect};
pub use engine::Engine;
pub use error::EngineError;
