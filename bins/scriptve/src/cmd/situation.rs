use std::path::PathBuf;

use clap::Parser;
use engine::{Engine, EngineConfig, EngineError};
use interpreter::{Host, HostValue, InterpreterError, Situation};
use primitives::{ActionSignature, EngineHandle, EngineTypeId, ObjectId};

use crate::cmd::input::{load_bytes, InputError};

/// `situation` subcommand: runs a script to its first `STORE_STATE[ALL]`,
/// captures the resulting script situation, then immediately resumes it
/// through [`Engine::resume_situation`] — a round trip through the same
/// codec a host would use to park a delayed action and hand it back later.
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Hex-encoded compiled script.
    #[arg(required_unless_present = "path")]
    bytes: Option<String>,
    /// Path to a file containing the hex-encoded compiled script.
    #[arg(long)]
    path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("script ran to completion without a STORE_STATE or STORE_STATEALL")]
    NoSituationCaptured,
}

#[derive(Default)]
struct CapturingHost {
    captured: Option<Situation>,
}

impl Host for CapturingHost {
    fn action_signature(&self, _ordinal: u16) -> Option<&ActionSignature> {
        None
    }

    fn execute_action(
        &mut self,
        ordinal: u16,
        _args: &[HostValue],
        _depth: u32,
    ) -> Result<Option<HostValue>, InterpreterError> {
        Err(InterpreterError::ActionFailed { ordinal })
    }

    fn create_engine_structure(&mut self, type_id: EngineTypeId) -> EngineHandle {
        interpreter::DummyHost::default().create_engine_structure(type_id)
    }

    fn capture_situation(&mut self, situation: Situation) {
        self.captured = Some(situation);
    }
}

impl Cmd {
    pub fn run(&self) -> Result<(), Error> {
        let code = load_bytes(&self.bytes, &self.path)?;
        let mut engine = Engine::new(EngineConfig::default());
        let mut host = CapturingHost::default();

        engine.execute_script("scriptve_situation", code, ObjectId::SELF, &[], &mut host)?;
        let situation = host.captured.take().ok_or(Error::NoSituationCaptured)?;

        println!("captured situation: resume_pc={}", situation.resume_pc);

        let mut host_stack = interpreter::StackMachine::new();
        situation.encode(&mut host_stack);
        println!("encoded onto {} host-stack cells", host_stack.len());

        let result = engine.resume_situation("scriptve_situation", &mut host_stack, &mut host)?;
        println!(
            "resume finished: host_stack empty={} result_stack empty={}",
            host_stack.is_empty(),
            result.is_empty()
        );
        Ok(())
    }
}
