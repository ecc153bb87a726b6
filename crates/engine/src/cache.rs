use std::collections::HashMap;
use std::sync::Arc;

use analyzer::Program;
use primitives::ScriptError;

/// Longest canonical resource name, in bytes (spec §6.4: "lower-cased,
/// truncated to 32 bytes").
pub const MAX_RESOURCE_NAME_LEN: usize = 32;

/// Lower-cases and truncates a resource name the way the host's resource
/// manager identifies a compiled script, so two spellings of the same
/// resource always hit the same cache slot.
pub fn canonicalize_resource_name(name: &str) -> Arc<[u8]> {
    let lower = name.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let end = bytes.len().min(MAX_RESOURCE_NAME_LEN);
    Arc::from(&bytes[..end])
}

/// A successfully analyzed program image, kept read-only and shared between
/// invocations (spec §5, "Shared resources").
#[derive(Debug)]
pub struct ProgramImage {
    pub code: Arc<[u8]>,
    pub script_name: Arc<[u8]>,
    pub global_count: u32,
    pub program: Program,
}

#[derive(Debug)]
enum Slot {
    Loaded(Arc<ProgramImage>),
    /// A resource that failed analysis once is never retried; it stays
    /// broken for the lifetime of the cache (spec §6.4, §7).
    Broken(ScriptError),
}

/// Maps canonicalized resource names to their analyzed image, owned by the
/// embedding host (spec §5, §6.4). Mirrors the way `revm` keeps compiled
/// bytecode in a `Bytecode` cache keyed by code hash rather than
/// re-analyzing on every call.
#[derive(Debug, Default)]
pub struct ProgramCache {
    slots: HashMap<Arc<[u8]>, Slot>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self { slots: HashMap::new() }
    }

    pub fn get(&self, name: &str) -> Option<Result<Arc<ProgramImage>, ScriptError>> {
        let key = canonicalize_resource_name(name);
        match self.slots.get(&key)? {
            Slot::Loaded(image) => Some(Ok(image.clone())),
            Slot::Broken(err) => Some(Err(err.clone())),
        }
    }

    pub fn insert_loaded(&mut self, name: &str, image: Arc<ProgramImage>) {
        let key = canonicalize_resource_name(name);
        self.slots.insert(key, Slot::Loaded(image));
    }

    pub fn insert_broken(&mut self, name: &str, err: ScriptError) {
        let key = canonicalize_resource_name(name);
        self.slots.insert(key, Slot::Broken(err));
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_case_and_length() {
        let a = canonicalize_resource_name("NW_S0_TALKTO");
        let b = canonicalize_resource_name("nw_s0_talkto");
        assert_eq!(a, b);

        let long = "x".repeat(64);
        let canon = canonicalize_resource_name(&long);
        assert_eq!(canon.len(), MAX_RESOURCE_NAME_LEN);
    }

    #[test]
    fn broken_entry_is_retrievable_and_distinct_from_loaded() {
        let mut cache = ProgramCache::new();
        assert!(cache.get("nw_s0_foo").is_none());
        cache.insert_broken(
            "nw_s0_foo",
            ScriptError::new(primitives::ScriptErrorKind::UnknownOpcode { opcode: 0xFF }),
        );
        match cache.get("nw_s0_foo") {
            Some(Err(_)) => {}
            other => panic!("expected broken slot, got {other:?}"),
        }
    }
}
