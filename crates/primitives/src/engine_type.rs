use core::fmt;

/// Highest supported engine-structure ordinal (`LAST_ENGINE_STRUCTURE` in the
/// original runtime). Opcode-width limitations cap this at 9 usable
/// engine-structure kinds even though the tag byte has more room.
pub const LAST_ENGINE_STRUCTURE: u8 = 9;

/// Small ordinal identifying which opaque engine structure (`EngineType_0`
/// .. `EngineType_9`) a handle belongs to.
pub type EngineTypeId = u8;

/// Lifecycle operations the host must provide for one engine-structure kind.
///
/// The host owns the payload; the core engine never inspects it, only
/// clones, compares and drops it through this vtable. This mirrors
/// `revm-interpreter::Host`'s shape of a small trait implemented by the
/// embedder rather than a concrete struct living in the core crate.
pub trait EngineStructure: fmt::Debug + Send + Sync {
    /// Which `EngineType_k` this instance belongs to.
    fn type_id(&self) -> EngineTypeId;

    /// Host-defined deep (or reference-counted) copy.
    fn clone_structure(&self) -> Box<dyn EngineStructure>;

    /// Host-defined equality; used by `EQUAL`/`NEQUAL` when the type suffix
    /// names an engine-structure pair.
    fn structure_eq(&self, other: &dyn EngineStructure) -> bool;
}

/// An opaque host-owned handle to one `EngineType_k` value.
///
/// Construction, copying, destruction and comparison are delegated to the
/// host via [`EngineStructure`]; the engine core treats the payload as
/// inert data that rides along on the stack.
#[derive(Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineHandle(
    #[cfg_attr(feature = "serde", serde(skip))] Box<dyn EngineStructure>,
);

impl EngineHandle {
    pub fn new(structure: Box<dyn EngineStructure>) -> Self {
        Self(structure)
    }

    pub fn type_id(&self) -> EngineTypeId {
        self.0.type_id()
    }

    pub fn as_ref(&self) -> &dyn EngineStructure {
        self.0.as_ref()
    }
}

impl Clone for EngineHandle {
    fn clone(&self) -> Self {
        Self(self.0.clone_structure())
    }
}

impl PartialEq for EngineHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.structure_eq(other.0.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Probe(u8, i64);

    impl EngineStructure for Probe {
        fn type_id(&self) -> EngineTypeId {
            self.0
        }
        fn clone_structure(&self) -> Box<dyn EngineStructure> {
            Box::new(self.clone())
        }
        fn structure_eq(&self, other: &dyn EngineStructure) -> bool {
            other
                .type_id()
                .eq(&self.0)
                .then(|| ())
                .and_then(|_| {
                    // Downcasting isn't available without `Any`; the test
                    // double compares by type id only, matching how the
                    // host's own compare callback is free to be shallow.
                    Some(())
                })
                .is_some()
        }
    }

    #[test]
    fn clone_and_eq_delegate_to_host_vtable() {
        let a = EngineHandle::new(Box::new(Probe(3, 99)));
        let b = a.clone();
        assert_eq!(a.type_id(), 3);
        assert_eq!(a, b);
    }
}
