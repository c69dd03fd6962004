//! Symbolic references, heap values and heap-object snapshots.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Position of an object in a heap.
pub type HeapPos = u64;

/// A symbolic reference: an unresolved reference read from the initial heap.
///
/// A reference is identified by its origin, the access path from a root
/// (e.g. `{ROOT}:this.head.next`). Two references with the same origin and
/// static type denote the same symbolic value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceSymbolic {
    origin: String,
    static_type: String,
}

impl ReferenceSymbolic {
    pub fn new(origin: impl Into<String>, static_type: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            static_type: static_type.into(),
        }
    }

    /// A root reference, e.g. `{ROOT}:this`.
    pub fn root(name: &str, static_type: impl Into<String>) -> Self {
        Self::new(format!("{{ROOT}}:{}", name), static_type)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The declared class of the reference.
    pub fn static_type(&self) -> &str {
        &self.static_type
    }

    /// The reference stored in field `name` of the object this reference
    /// resolves to.
    pub fn field(&self, name: &str, static_type: impl Into<String>) -> Self {
        Self::new(format!("{}.{}", self.origin, name), static_type)
    }

    /// Stable, backend-safe identifier derived from the origin.
    pub fn digest(&self) -> String {
        symbol_digest(&self.origin)
    }
}

impl fmt::Display for ReferenceSymbolic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.origin)
    }
}

/// Hex prefix of the SHA-256 digest of `text`, usable as a solver symbol suffix.
pub fn symbol_digest(text: &str) -> String {
    let hash = Sha256::digest(text.as_bytes());
    hash.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

/// A value stored in an object field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Null,
    /// A concrete reference to the object at a heap position.
    Ref(HeapPos),
    /// A symbolic reference not yet resolved.
    Symbolic(ReferenceSymbolic),
    /// A symbolic primitive, named by its origin.
    Term(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Ref(pos) => write!(f, "Object[{}]", pos),
            Value::Symbolic(r) => write!(f, "{}", r),
            Value::Term(name) => write!(f, "{}", name),
        }
    }
}

/// Snapshot of a heap object: its class, the symbolic reference it was
/// expanded from (if any) and its field values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapObject {
    class_name: String,
    origin: Option<ReferenceSymbolic>,
    fields: BTreeMap<String, Value>,
}

impl HeapObject {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            origin: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_origin(mut self, origin: ReferenceSymbolic) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn origin(&self) -> Option<&ReferenceSymbolic> {
        self.origin.as_ref()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for HeapObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{}({})", self.class_name, fields.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_reference_extends_origin() {
        let this = ReferenceSymbolic::root("this", "List");
        let head = this.field("head", "Node");
        assert_eq!(head.origin(), "{ROOT}:this.head");
        assert_eq!(head.static_type(), "Node");
    }

    #[test]
    fn digest_is_stable_and_distinct() {
        let a = ReferenceSymbolic::root("this", "List");
        let b = a.field("head", "Node");
        assert_eq!(a.digest(), ReferenceSymbolic::root("this", "List").digest());
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 16);
        assert!(a.digest().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn heap_object_display() {
        let obj = HeapObject::new("Node")
            .with_field("value", Value::Int(3))
            .with_field("next", Value::Null);
        assert_eq!(obj.to_string(), "Node(next: null, value: 3)");
    }
}
