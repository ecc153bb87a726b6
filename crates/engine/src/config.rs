use interpreter::VmLimits;

/// Which backend executes a loaded program: the bytecode interpreter this
/// workspace implements, or a host-native implementation the embedder
/// substitutes for a specific resource (spec §6.6, `SelectEngine`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum EngineSelect {
    #[default]
    Bytecode,
    Native,
}

/// Top-level controls for one [`crate::Engine`] instance (spec §6.6).
///
/// Mirrors `revm`'s `CfgEnv`: one plain struct of knobs threaded down into
/// every [`VmLimits`] a call constructs, rather than a trait with overridable
/// methods — there is exactly one implementation of "how strict is this
/// engine", just many possible values for it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub select_engine: EngineSelect,
    pub max_loop_iterations: u64,
    pub max_call_depth: u32,
    pub max_recursion_depth: u32,
    pub max_instructions: u64,
    /// Disables every resource guard below, trading safety for raw
    /// throughput on content the embedder already trusts (spec §6.6,
    /// `DisableExecutionGuards`).
    pub disable_execution_guards: bool,
    pub enable_ir_optimizations: bool,
    pub load_debug_symbols: bool,
    pub allow_native_engine_scripts: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            select_engine: EngineSelect::Bytecode,
            max_loop_iterations: 10_000_000,
            max_call_depth: 64,
            max_recursion_depth: 8,
            max_instructions: 0,
            disable_execution_guards: false,
            enable_ir_optimizations: true,
            load_debug_symbols: false,
            allow_native_engine_scripts: false,
        }
    }
}

impl EngineConfig {
    pub fn vm_limits(&self) -> VmLimits {
        if self.disable_execution_guards {
            return VmLimits {
                max_instructions: 0,
                max_call_depth: 0,
                max_loop_iterations: 0,
                max_recursion_depth: 0,
            };
        }
        VmLimits {
            max_instructions: self.max_instructions,
            max_call_depth: self.max_call_depth,
            max_loop_iterations: self.max_loop_iterations,
            max_recursion_depth: self.max_recursion_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabling_guards_zeroes_every_limit() {
        let cfg = EngineConfig {
            disable_execution_guards: true,
            ..Default::default()
        };
        let limits = cfg.vm_limits();
        assert_eq!(limits.max_instructions, 0);
        assert_eq!(limits.max_call_depth, 0);
        assert_eq!(limits.max_loop_iterations, 0);
        assert_eq!(limits.max_recursion_depth, 0);
    }
}
