use primitives::ScriptError;

/// Top-level error returned by [`crate::Engine`]. Wraps the narrower
/// per-crate errors the same way `revm`'s `EVMError` wraps
/// `InvalidTransaction`/`DatabaseError`: one variant per failure domain,
/// `#[from]` for the automatic conversions.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no program loaded for resource {0:?}")]
    ProgramNotLoaded(String),
    #[error("resource {0:?} failed analysis and is marked broken: {1}")]
    ProgramBroken(String, ScriptError),
    #[error(transparent)]
    Analysis(#[from] analyzer::AnalyzerError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("entry point {0:?} takes no declared return value")]
    NoReturnValue(String),
    #[error("resource {0:?} is a platform-native script and AllowNativeEngineScripts is disabled")]
    NativeScriptsDisallowed(String),
    #[error("resource {0:?} requires the native codegen backend, which this build does not implement")]
    NativeBackendUnavailable(String),
    #[error("resource {name:?} entry point declares {declared} parameter cells, caller supplied {supplied}")]
    ParamArityMismatch {
        name: String,
        declared: i32,
        supplied: u32,
    },
}
