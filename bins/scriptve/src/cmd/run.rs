use std::path::PathBuf;

use clap::Parser;
use engine::{Engine, EngineConfig, EngineError};
use interpreter::{DummyHost, HostValue};
use primitives::ObjectId;

use crate::cmd::input::{load_bytes, InputError};

/// `run` subcommand: load and execute a compiled script's entry point
/// against a no-op host, the way `revme evm` runs arbitrary EVM bytecode.
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Hex-encoded compiled script.
    #[arg(required_unless_present = "path")]
    bytes: Option<String>,
    /// Path to a file containing the hex-encoded compiled script.
    #[arg(long)]
    path: Option<PathBuf>,
    /// Int parameters to push, in declaration order.
    #[arg(long, value_delimiter = ',')]
    int_params: Vec<i32>,
    /// Object ID substituted for `OBJECT_SELF`.
    #[arg(long, default_value_t = 0)]
    object_self: u32,
    /// Disable every resource guard (loop/instruction/call-depth limits).
    #[arg(long)]
    unbounded: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl Cmd {
    pub fn run(&self) -> Result<(), Error> {
        let code = load_bytes(&self.bytes, &self.path)?;
        let config = EngineConfig {
            disable_execution_guards: self.unbounded,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config);
        let mut host = DummyHost::default();

        let params: Vec<HostValue> = self.int_params.iter().map(|v| HostValue::Int(*v)).collect();
        let result = engine.execute_script(
            "scriptve_run",
            code,
            ObjectId(self.object_self),
            &params,
            &mut host,
        )?;

        match result {
            Some(HostValue::Int(v)) => println!("returned: {v}"),
            Some(other) => println!("returned: {other:?}"),
            None => println!("returned: (void)"),
        }
        Ok(())
    }
}
