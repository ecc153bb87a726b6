use std::sync::Arc;

use bytecode::detect_platform_native;
use interpreter::{Host, HostValue, StackMachine, Vm};
use primitives::ObjectId;
use tracing::{debug, instrument, warn};

use crate::action_table::HostActionTable;
use crate::cache::{ProgramCache, ProgramImage};
use crate::config::{EngineConfig, EngineSelect};
use crate::error::EngineError;

/// Ties the analyzer and interpreter crates together behind the host-facing
/// surface of spec §6: one `Engine` owns the program cache and the
/// configuration every call is executed under, the way `revm::Evm` owns a
/// `Context` and drives `revm-interpreter` over it per transaction.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    cache: ProgramCache,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, cache: ProgramCache::new() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    /// Analyzes `bytes` under `name` and stores the result, or marks the
    /// resource permanently broken (spec §6.4: `LoadProgram`). Returns the
    /// cached image either way it was already present.
    #[instrument(skip(self, bytes, host), fields(resource = name))]
    pub fn load_program(
        &mut self,
        name: &str,
        bytes: Arc<[u8]>,
        host: &dyn Host,
    ) -> Result<Arc<ProgramImage>, EngineError> {
        if let Some(cached) = self.cache.get(name) {
            return cached.map_err(|err| EngineError::ProgramBroken(name.to_string(), err));
        }

        if detect_platform_native(&bytes).is_some() {
            if !self.config.allow_native_engine_scripts {
                return Err(EngineError::NativeScriptsDisallowed(name.to_string()));
            }
            warn!(resource = name, "platform-native script requires an unimplemented backend");
            return Err(EngineError::NativeBackendUnavailable(name.to_string()));
        }

        if matches!(self.config.select_engine, EngineSelect::Native) {
            return Err(EngineError::NativeBackendUnavailable(name.to_string()));
        }

        let action_table = HostActionTable::new(host);
        match analyzer::analyze_program(&bytes, &action_table, self.config.enable_ir_optimizations) {
            Ok(program) => {
                debug!(
                    resource = name,
                    subroutines = program.subroutines.len(),
                    global_count = program.global_count,
                    "analyzed program"
                );
                let image = Arc::new(ProgramImage {
                    code: bytes,
                    script_name: crate::cache::canonicalize_resource_name(name),
                    global_count: program.global_count,
                    program,
                });
                self.cache.insert_loaded(name, image.clone());
                Ok(image)
            }
            Err(err) => {
                let script_err: primitives::ScriptError = err.into();
                warn!(resource = name, error = %script_err, "analysis failed, marking broken");
                self.cache.insert_broken(name, script_err);
                Err(EngineError::ProgramBroken(name.to_string(), script_err))
            }
        }
    }

    /// Loads (if needed) and runs `name`'s entry point with `params`
    /// (declaration order), returning its return value if it declares one
    /// (spec §6.4: `ExecuteScript`).
    #[instrument(skip(self, bytes, params, host), fields(resource = name))]
    pub fn execute_script(
        &mut self,
        name: &str,
        bytes: Arc<[u8]>,
        object_self: ObjectId,
        params: &[HostValue],
        host: &mut dyn Host,
    ) -> Result<Option<HostValue>, EngineError> {
        let image = self.load_program(name, bytes, host)?;
        self.run_entry(name, &image, object_self, params, host, 0)
    }

    /// Runs an already-cached program's entry point, for hosts that want to
    /// re-invoke a resource without re-supplying its bytes.
    pub fn execute_cached(
        &mut self,
        name: &str,
        object_self: ObjectId,
        params: &[HostValue],
        host: &mut dyn Host,
    ) -> Result<Option<HostValue>, EngineError> {
        let image = self
            .cache
            .get(name)
            .ok_or_else(|| EngineError::ProgramNotLoaded(name.to_string()))?
            .map_err(|err| EngineError::ProgramBroken(name.to_string(), err))?;
        self.run_entry(name, &image, object_self, params, host, 0)
    }

    /// Re-invokes `name`'s entry point on behalf of a host action that is
    /// itself executing inside another VM invocation (spec §4.4,
    /// "Re-entrancy"). `caller_depth` must be the `depth` the dispatching
    /// `Host::execute_action` call received; this runs the callee one level
    /// deeper, so a chain of re-entrant actions eventually trips
    /// `RecursionTooDeep` instead of recursing forever. The resource must
    /// already be cached — a re-entrant call cannot supply fresh bytes.
    pub fn execute_reentrant(
        &self,
        name: &str,
        object_self: ObjectId,
        params: &[HostValue],
        host: &mut dyn Host,
        caller_depth: u32,
    ) -> Result<Option<HostValue>, EngineError> {
        let image = self
            .cache
            .get(name)
            .ok_or_else(|| EngineError::ProgramNotLoaded(name.to_string()))?
            .map_err(|err| EngineError::ProgramBroken(name.to_string(), err))?;
        self.run_entry(name, &image, object_self, params, host, caller_depth + 1)
    }

    fn run_entry(
        &self,
        name: &str,
        image: &ProgramImage,
        object_self: ObjectId,
        params: &[HostValue],
        host: &mut dyn Host,
        recursion_depth: u32,
    ) -> Result<Option<HostValue>, EngineError> {
        let entry_pc = image.program.entry.entry_pc;
        let sub = image.program.subroutine_at(entry_pc);
        let declared = sub.and_then(|s| s.param_size).unwrap_or(0);

        let mut param_stack = StackMachine::new();
        if image.program.entry.has_int_return {
            param_stack.push_int(0);
        }
        let mut supplied = 0u32;
        for value in params {
            supplied += push_host_value(&mut param_stack, value);
        }
        let expected = declared + if image.program.entry.has_int_return { 1 } else { 0 };
        if param_stack.len() as i32 != expected {
            return Err(EngineError::ParamArityMismatch {
                name: name.to_string(),
                declared,
                supplied,
            });
        }

        let mut vm = Vm::new(
            image.code.clone(),
            image.script_name.clone(),
            image.global_count,
            self.config.vm_limits(),
            recursion_depth,
        )?;
        let result_stack = vm.execute(entry_pc, object_self, param_stack, host)?;

        if image.program.entry.has_int_return {
            let values = result_stack.as_slice();
            let ret = values
                .first()
                .and_then(|v| match v {
                    primitives::StackValue::Int(i) => Some(*i),
                    _ => None,
                })
                .ok_or_else(|| EngineError::NoReturnValue(name.to_string()))?;
            Ok(Some(HostValue::Int(ret)))
        } else {
            Ok(None)
        }
    }

    /// Resumes a continuation the host captured earlier via
    /// `Host::capture_situation`, for a resource that must already be loaded
    /// (spec §6.5: `ExecuteSituation`).
    #[instrument(skip(self, host_stack, host), fields(resource = name))]
    pub fn resume_situation(
        &self,
        name: &str,
        host_stack: &mut StackMachine,
        host: &mut dyn Host,
    ) -> Result<StackMachine, EngineError> {
        let image = self
            .cache
            .get(name)
            .ok_or_else(|| EngineError::ProgramNotLoaded(name.to_string()))?
            .map_err(|err| EngineError::ProgramBroken(name.to_string(), err))?;

        let mut vm = Vm::new(
            image.code.clone(),
            image.script_name.clone(),
            image.global_count,
            self.config.vm_limits(),
            0,
        )?;
        Ok(vm.execute_situation(host_stack, host)?)
    }
}

fn push_host_value(stack: &mut StackMachine, value: &HostValue) -> u32 {
    match value {
        HostValue::Int(v) => {
            stack.push_int(*v);
            1
        }
        HostValue::Float(v) => {
            stack.push_float(*v);
            1
        }
        HostValue::String(v) => {
            stack.push_string(v.clone());
            1
        }
        HostValue::Object(v) => {
            stack.push_object(*v);
            1
        }
        HostValue::Vector(x, y, z) => {
            stack.push_vector(*x, *y, *z);
            3
        }
        HostValue::Engine(handle) => {
            stack.push_engine(handle.clone());
            1
        }
        HostValue::Action => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::{type_suffix as ty, Opcode};
    use interpreter::DummyHost;

    fn void_main_program() -> Arc<[u8]> {
        // #loader: JSR main; main: RETN.
        let mut code = Vec::new();
        code.push(Opcode::Jsr.as_byte());
        code.push(ty::UNARY_NONE);
        let entry_pc = 6u32;
        code.extend_from_slice(&(entry_pc as i32).to_be_bytes());
        code.push(Opcode::Retn.as_byte());
        code.push(ty::UNARY_NONE);
        Arc::from(code)
    }

    #[test]
    fn loads_and_executes_a_void_entry_script() {
        let mut engine = Engine::new(EngineConfig::default());
        let mut host = DummyHost::default();
        let code = void_main_program();
        let result = engine
            .execute_script("nw_s0_void", code, ObjectId::SELF, &[], &mut host)
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn second_load_of_same_resource_hits_cache() {
        let mut engine = Engine::new(EngineConfig::default());
        let host = DummyHost::default();
        let code = void_main_program();
        engine.load_program("NW_S0_Void", code.clone(), &host).unwrap();
        assert_eq!(engine.cache().len(), 1);
        engine.load_program("nw_s0_void", code, &host).unwrap();
        assert_eq!(engine.cache().len(), 1);
    }

    #[test]
    fn reentrant_action_eventually_trips_recursion_ceiling() {
        use std::cell::{Cell, RefCell};
        use std::rc::Rc;

        use interpreter::InterpreterError;
        use primitives::{ActionSignature, ActionType, EngineHandle, EngineTypeId};

        // entry: ACTION 0, 0 args, void -> RETN. The action recurses back
        // into the same entry point one level deeper every time it runs.
        let mut code = Vec::new();
        code.push(Opcode::Jsr.as_byte());
        code.push(ty::UNARY_NONE);
        let entry_pc = 6u32;
        code.extend_from_slice(&(entry_pc as i32).to_be_bytes());
        code.push(Opcode::Action.as_byte());
        code.push(ty::UNARY_NONE);
        code.extend_from_slice(&0u16.to_be_bytes());
        code.push(0u8);
        code.push(Opcode::Retn.as_byte());
        code.push(ty::UNARY_NONE);
        let code: Arc<[u8]> = Arc::from(code);

        #[derive(Clone)]
        struct RecursiveHost {
            engine: Rc<RefCell<Engine>>,
            name: &'static str,
            signature: Rc<ActionSignature>,
            calls: Rc<Cell<u32>>,
        }

        impl Host for RecursiveHost {
            fn action_signature(&self, ordinal: u16) -> Option<&ActionSignature> {
                (ordinal == self.signature.ordinal).then_some(&*self.signature)
            }

            fn execute_action(
                &mut self,
                _ordinal: u16,
                _args: &[HostValue],
                depth: u32,
            ) -> Result<Option<HostValue>, InterpreterError> {
                self.calls.set(self.calls.get() + 1);
                let mut nested = self.clone();
                let result = self.engine.borrow().execute_reentrant(
                    self.name,
                    ObjectId::SELF,
                    &[],
                    &mut nested,
                    depth,
                );
                result
                    .map(|_| None)
                    .map_err(|_| InterpreterError::ActionFailed { ordinal: self.signature.ordinal })
            }

            fn create_engine_structure(&mut self, type_id: EngineTypeId) -> EngineHandle {
                unimplemented!("not exercised by this scenario: {type_id}")
            }
        }

        let config = EngineConfig { max_recursion_depth: 4, ..EngineConfig::default() };
        let engine = Rc::new(RefCell::new(Engine::new(config)));
        let mut host = RecursiveHost {
            engine: engine.clone(),
            name: "nw_s0_recurse",
            signature: Rc::new(ActionSignature {
                ordinal: 0,
                name: "Recurse".to_string(),
                min_params: 0,
                num_params: 0,
                parameter_types: vec![],
                return_type: ActionType::Void,
            }),
            calls: Rc::new(Cell::new(0)),
        };

        // Load once under a short-lived mutable borrow, then drive every
        // invocation — outer and re-entrant alike — through `&self` methods
        // only, exactly as `RecursiveHost::execute_action` must, so the
        // shared `RefCell` never sees two live borrows fight each other.
        engine.borrow_mut().load_program("nw_s0_recurse", code, &host).unwrap();
        let image = engine.borrow().cache().get("nw_s0_recurse").unwrap().unwrap();

        let result =
            engine.borrow().run_entry("nw_s0_recurse", &image, ObjectId::SELF, &[], &mut host, 0);

        assert!(result.is_err());
        assert_eq!(host.calls.get(), 4);
    }

    #[test]
    fn broken_program_stays_broken_on_repeat_load() {
        let mut engine = Engine::new(EngineConfig::default());
        let host = DummyHost::default();
        let garbage: Arc<[u8]> = Arc::from(&[0xFFu8][..]);
        let first = engine.load_program("bad", garbage.clone(), &host);
        assert!(first.is_err());
        let second = engine.load_program("bad", garbage, &host);
        assert!(matches!(second, Err(EngineError::ProgramBroken(_, _))));
    }
}
