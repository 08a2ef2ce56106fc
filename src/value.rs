//! A minimal opaque value handle (§3.2).
//!
//! The real object system — arithmetic dispatch, type identity, the builtin
//! type zoo — is an external collaborator. This handle supplies only what
//! the core itself relies on: cheap cloning, attribute-dictionary access for
//! module globals, and movability.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

/// A shallow, closed set of primitive shapes. Deliberately not a full type
/// system: no user classes, no iteration protocol, no arithmetic. Just
/// enough to let `Reference`/`Frame` tests construct and compare values.
#[derive(Debug, Clone)]
pub enum ValueKind {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// A bare object carrying only its attribute dictionary — stands in for
    /// `module`/class-instance handles the reference model addresses into.
    Object,
}

#[derive(Debug)]
struct ValueData {
    kind: ValueKind,
    attrs: AHashMap<String, Value>,
}

/// Shared-ownership handle to a dynamic value.
///
/// `Rc<RefCell<_>>` rather than a trait object: the core only ever clones,
/// reads attributes off, and moves these handles, so a single concrete type
/// is simpler to hold in `Frame`/`Reference` than a generic bound would be,
/// while remaining a stand-in rather than a real object system (§3.2).
#[derive(Debug, Clone)]
pub struct Value(Rc<RefCell<ValueData>>);

impl Value {
    #[must_use]
    pub fn new(kind: ValueKind) -> Self {
        Self(Rc::new(RefCell::new(ValueData {
            kind,
            attrs: AHashMap::default(),
        })))
    }

    #[must_use]
    pub fn none() -> Self {
        Self::new(ValueKind::None)
    }

    #[must_use]
    pub fn object() -> Self {
        Self::new(ValueKind::Object)
    }

    #[must_use]
    pub fn int(v: i64) -> Self {
        Self::new(ValueKind::Int(v))
    }

    #[must_use]
    pub fn str(v: impl Into<String>) -> Self {
        Self::new(ValueKind::Str(v.into()))
    }

    #[must_use]
    pub fn tuple(items: Vec<Value>) -> Self {
        Self::new(ValueKind::Tuple(items))
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.0.borrow().kind.clone()
    }

    /// Replaces this handle's payload in place. Used by container-protocol
    /// stand-ins (e.g. `Reference::Index`'s `List` mutation) that need to
    /// mutate through a shared handle rather than rebuild a new one.
    pub fn set_kind(&self, kind: ValueKind) {
        self.0.borrow_mut().kind = kind;
    }

    /// Reads an attribute from this value's attribute dictionary. Used by
    /// `Reference::Attr` and to model `frame.module.attribs`/globals.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<Value> {
        self.0.borrow().attrs.get(name).cloned()
    }

    pub fn set_attr(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().attrs.insert(name.into(), value);
    }

    pub fn del_attr(&self, name: &str) -> bool {
        self.0.borrow_mut().attrs.remove(name).is_some()
    }

    /// Identity comparison between handles (same underlying allocation),
    /// distinct from `py_eq`'s value comparison.
    #[must_use]
    pub fn is(&self, other: &Value) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Structural equality sufficient for the reference round-trip law
    /// (§8) and test assertions. Not a substitute for the external object
    /// system's real `__eq__` (e.g. no `__eq__` override dispatch).
    #[must_use]
    pub fn py_eq(&self, other: &Value) -> bool {
        match (&self.0.borrow().kind, &other.0.borrow().kind) {
            (ValueKind::None, ValueKind::None) => true,
            (ValueKind::Bool(a), ValueKind::Bool(b)) => a == b,
            (ValueKind::Int(a), ValueKind::Int(b)) => a == b,
            (ValueKind::Float(a), ValueKind::Float(b)) => a == b,
            (ValueKind::Str(a), ValueKind::Str(b)) => a == b,
            (ValueKind::List(a), ValueKind::List(b)) | (ValueKind::Tuple(a), ValueKind::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.py_eq(y))
            }
            (ValueKind::Object, ValueKind::Object) => self.is(other),
            _ => false,
        }
    }
}
