use primitives::{ActionSignature, EngineHandle, EngineTypeId, ObjectId};

use crate::error::InterpreterError;
use crate::situation::Situation;

/// One marshalled action argument or return value, in the host-neutral form
/// described in spec §6.3. A `Vector` is carried whole here even though it
/// occupies three stack cells — the VM assembles/disassembles it at the
/// stack boundary so the host never sees raw cells.
#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    Int(i32),
    Float(f32),
    String(std::sync::Arc<[u8]>),
    Object(ObjectId),
    Vector(f32, f32, f32),
    Engine(EngineHandle),
    /// An `Action`-typed parameter. Occupies zero stack cells (spec §6.2);
    /// the saved script-situation payload it refers to, if any, travels
    /// out-of-band via `StoreState`/`StoreStateAll`, not through this value.
    Action,
}

/// The embedder's side of the VM, invoked for every `ACTION` instruction and
/// for opaque engine-structure lifecycle operations. Object-safe and
/// dyn-dispatched, the same shape as `revm-interpreter::Host`: one method
/// per host capability rather than a generic callback closure, so a single
/// `&mut dyn Host` can be threaded through the whole call tree including
/// action re-entrancy into the VM.
pub trait Host {
    /// Looks up the declared signature for an action ordinal, used by the
    /// dispatcher to police argument counts and convert stack cells.
    fn action_signature(&self, ordinal: u16) -> Option<&ActionSignature>;

    /// Executes a host-side action with its already-marshalled arguments
    /// (declaration order) and returns its result, or an opaque failure.
    /// `depth` is the calling VM's own re-entrancy level (spec §4.4,
    /// "Re-entrancy"); an action that itself invokes the VM again — e.g. one
    /// script executing another — must pass `depth + 1` to that invocation
    /// so the recursion ceiling is enforced across the whole call chain, not
    /// just within a single script's own subroutine calls.
    fn execute_action(
        &mut self,
        ordinal: u16,
        args: &[HostValue],
        depth: u32,
    ) -> Result<Option<HostValue>, InterpreterError>;

    fn create_engine_structure(&mut self, type_id: EngineTypeId) -> EngineHandle;
    fn copy_engine_structure(&mut self, handle: &EngineHandle) -> EngineHandle {
        handle.clone()
    }
    fn destroy_engine_structure(&mut self, _handle: EngineHandle) {}
    fn equal_engine_structure(&self, a: &EngineHandle, b: &EngineHandle) -> bool {
        a == b
    }

    /// Polled at instruction boundaries; `true` tears the script down with
    /// `Aborted` at the next check (spec §4.4: `AbortScript`).
    fn should_abort(&self) -> bool {
        false
    }

    /// Receives a continuation captured by `STORE_STATE`/`STORE_STATEALL`
    /// (spec §4.4, §6.5: `CaptureSituation`). The host is expected to keep
    /// it alongside whatever delayed action it is attached to and hand it
    /// back to `Vm::execute_situation` later. The default drops it, which is
    /// only correct for hosts that never schedule delayed actions.
    fn capture_situation(&mut self, _situation: Situation) {}
}

/// A no-op [`Host`] with no registered actions, for unit tests that only
/// exercise the stack machine or control flow. Mirrors
/// `revm-interpreter::DummyHost`.
#[derive(Debug, Default)]
pub struct DummyHost {
    pub abort: bool,
}

impl Host for DummyHost {
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
        EngineHandle::new(Box::new(NullEngineStructure(type_id)))
    }

    fn should_abort(&self) -> bool {
        self.abort
    }
}

#[derive(Debug, Clone)]
struct NullEngineStructure(EngineTypeId);

impl primitives::EngineStructure for NullEngineStructure {
    fn type_id(&self) -> EngineTypeId {
        self.0
    }
    fn clone_structure(&self) -> Box<dyn primitives::EngineStructure> {
        Box::new(self.clone())
    }
    fn structure_eq(&self, other: &dyn primitives::EngineStructure) -> bool {
        other.type_id() == self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_host_has_no_actions() {
        let host = DummyHost::default();
        assert!(host.action_signature(1).is_none());
    }

    #[test]
    fn dummy_host_actions_fail() {
        let mut host = DummyHost::default();
        assert_eq!(
            host.execute_action(7, &[], 0),
            Err(InterpreterError::ActionFailed { ordinal: 7 })
        );
    }
}
