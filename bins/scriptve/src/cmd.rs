pub mod bytecode;
pub mod input;
pub mod run;
pub mod situation;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(infer_subcommands = true)]
pub enum MainCmd {
    /// Disassemble and print the structure of a compiled script.
    Bytecode(bytecode::Cmd),
    /// Run a compiled script's entry point against the no-op host.
    Run(run::Cmd),
    /// Capture a script situation from a `STORE_STATE[ALL]` and resume it.
    Situation(situation::Cmd),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Bytecode(#[from] bytecode::Error),
    #[error(transparent)]
    Run(#[from] run::Error),
    #[error(transparent)]
    Situation(#[from] situation::Error),
}

impl MainCmd {
    pub fn run(&self) -> Result<(), Error> {
        match self {
            Self::Bytecode(cmd) => cmd.run()?,
            Self::Run(cmd) => cmd.run()?,
            Self::Situation(cmd) => cmd.run()?,
        }
        Ok(())
    }
}
