use crate::engine_type::EngineHandle;
use core::fmt;
use std::sync::Arc;

/// Object reference as used by the host (`NWN::OBJECTID` in the original
/// engine: an opaque 32-bit handle, not a pointer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// `OBJECTID_SELF` — placeholder replaced with the real object at
    /// execution time by the host.
    pub const SELF: ObjectId = ObjectId(0);
    /// `OBJECTID_INVALID`.
    pub const INVALID: ObjectId = ObjectId(1);
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The fundamental type tag of a stack cell.
///
/// `BasePointer` is the reserved tag spec.md calls out for a marker cell
/// pushed by `SAVEBP`: it carries the caller's saved BP value so
/// `RESTOREBP` can recover it, and no instruction may read it as a typed
/// value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Tag {
    Int,
    Float,
    String,
    Object,
    Engine(crate::engine_type::EngineTypeId),
    BasePointer,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Int => f.write_str("int"),
            Tag::Float => f.write_str("float"),
            Tag::String => f.write_str("string"),
            Tag::Object => f.write_str("object"),
            Tag::Engine(k) => write!(f, "engine_{k}"),
            Tag::BasePointer => f.write_str("base_pointer"),
        }
    }
}

/// One typed stack cell.
///
/// `String`'s payload is a reference-counted immutable byte sequence (not
/// necessarily UTF-8 — the original bytecode treats strings as opaque
/// byte runs) so that `CPTOPSP`/`CPTOPBP` duplication is O(1).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackValue {
    Int(i32),
    Float(f32),
    String(Arc<[u8]>),
    Object(ObjectId),
    Engine(EngineHandle),
    /// A saved base pointer, in cells, pushed by `SAVEBP`.
    BasePointer(u32),
}

impl StackValue {
    /// Returns the tag that classifies this value's payload.
    pub fn tag(&self) -> Tag {
        match self {
            StackValue::Int(_) => Tag::Int,
            StackValue::Float(_) => Tag::Float,
            StackValue::String(_) => Tag::String,
            StackValue::Object(_) => Tag::Object,
            StackValue::Engine(h) => Tag::Engine(h.type_id()),
            StackValue::BasePointer(_) => Tag::BasePointer,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            StackValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            StackValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&Arc<[u8]>> {
        match self {
            StackValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            StackValue::Object(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_engine(&self) -> Option<&EngineHandle> {
        match self {
            StackValue::Engine(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for StackValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackValue::Int(v) => write!(f, "{v}"),
            StackValue::Float(v) => write!(f, "{v}"),
            StackValue::String(v) => write!(f, "{:?}", String::from_utf8_lossy(v)),
            StackValue::Object(v) => write!(f, "{v}"),
            StackValue::Engine(v) => write!(f, "engine<{}>", v.type_id()),
            StackValue::BasePointer(v) => write!(f, "bp({v})"),
        }
    }
}

/// Alias used where the spec speaks of a raw "cell" rather than a typed
/// value — a tagged cell and a stack value are the same representation in
/// this implementation, see `crates/interpreter/src/stack.rs` for why the
/// parallel tag/cell arrays of spec.md §4.3 are merged into one `Vec`.
pub type Cell = StackValue;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_payload() {
        assert_eq!(StackValue::Int(1).tag(), Tag::Int);
        assert_eq!(StackValue::Float(1.0).tag(), Tag::Float);
        assert_eq!(StackValue::Object(ObjectId(7)).tag(), Tag::Object);
        assert_eq!(StackValue::BasePointer(4).tag(), Tag::BasePointer);
    }

    #[test]
    fn object_id_constants() {
        assert_eq!(ObjectId::SELF.0, 0);
        assert_eq!(ObjectId::INVALID.0, 1);
    }
}
