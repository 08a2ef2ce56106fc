//! The polymorphic "place" abstraction (§3.6, §4.2).
//!
//! A closed sum type rather than a trait object (§9 design note): the four
//! shapes are known in full at compile time and this lets `get`/`set`/`del`
//! dispatch without an indirect call on the `LOAD_NAME`/`STORE_NAME` hot
//! path.

use ahash::AHashMap;

use crate::bytecode::NameScope;
use crate::error::RuntimeError;
use crate::value::{Value, ValueKind};

/// The VM-provided builtins table consulted as the last resolution step for
/// both `Local` and `Global` name reads (§4.2). Owned by the embedder; the
/// core only ever reads it.
#[derive(Debug, Default)]
pub struct Builtins(AHashMap<String, Value>);

impl Builtins {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

/// The environment a `Reference` resolves against: a frame's locals plus
/// its module (globals) handle, plus the shared builtins table.
pub struct Env<'a> {
    pub locals: &'a mut AHashMap<String, Value>,
    pub module: &'a Value,
    pub builtins: &'a Builtins,
}

/// A four-variant polymorphic assignment target (§3.6).
#[derive(Debug, Clone)]
pub enum Reference {
    Name { name: String, scope: NameScope },
    Attr { base: Value, attr: String },
    Index { container: Value, index: Value },
    Tuple(Vec<Reference>),
}

impl Reference {
    #[must_use]
    pub fn name(name: impl Into<String>, scope: NameScope) -> Self {
        Self::Name { name: name.into(), scope }
    }

    #[must_use]
    pub fn attr(base: Value, attr: impl Into<String>) -> Self {
        Self::Attr { base, attr: attr.into() }
    }

    #[must_use]
    pub fn index(container: Value, index: Value) -> Self {
        Self::Index { container, index }
    }

    #[must_use]
    pub fn tuple(refs: Vec<Reference>) -> Self {
        Self::Tuple(refs)
    }

    /// Reads the value this reference denotes (§4.2).
    ///
    /// # Errors
    /// `NameError` if a `Name` reference resolves nowhere; `AttributeError`
    /// if an `Attr` reference names a missing attribute; `IndexError` if an
    /// `Index` reference is out of range.
    pub fn get(&self, env: &Env<'_>) -> Result<Value, RuntimeError> {
        match self {
            Self::Name { name, scope } => resolve_name(env, name, *scope),
            Self::Attr { base, attr } => base
                .get_attr(attr)
                .ok_or_else(|| RuntimeError::attribute_error(format!("'{attr}' not found"))),
            Self::Index { container, index } => index_get(container, index),
            Self::Tuple(refs) => {
                let mut items = Vec::with_capacity(refs.len());
                for r in refs {
                    items.push(r.get(env)?);
                }
                Ok(Value::tuple(items))
            }
        }
    }

    /// Writes `value` into this reference (§4.2).
    ///
    /// # Errors
    /// `ValueError` if a `Tuple` reference's right-hand side does not yield
    /// exactly as many items as sub-references; in that case no element is
    /// mutated.
    pub fn set(&self, env: &mut Env<'_>, value: Value) -> Result<(), RuntimeError> {
        match self {
            Self::Name { name, scope } => {
                store_name(env, name, *scope, value);
                Ok(())
            }
            Self::Attr { base, attr } => {
                base.set_attr(attr.clone(), value);
                Ok(())
            }
            Self::Index { container, index } => index_set(container, index, value),
            Self::Tuple(refs) => {
                let items = match value.kind() {
                    ValueKind::Tuple(items) | ValueKind::List(items) => items,
                    _ => return Err(RuntimeError::type_error("right-hand side is not iterable")),
                };
                if items.len() != refs.len() {
                    return Err(RuntimeError::value_error(format!(
                        "expected {} values to unpack, got {}",
                        refs.len(),
                        items.len()
                    )));
                }
                for (r, v) in refs.iter().zip(items) {
                    r.set(env, v)?;
                }
                Ok(())
            }
        }
    }

    /// Deletes this reference (§4.2).
    pub fn del(&self, env: &mut Env<'_>) -> Result<(), RuntimeError> {
        match self {
            Self::Name { name, scope } => delete_name(env, name, *scope),
            Self::Attr { base, attr } => {
                if base.del_attr(attr) {
                    Ok(())
                } else {
                    Err(RuntimeError::attribute_error(format!("'{attr}' not found")))
                }
            }
            Self::Index { container, index } => index_del(container, index),
            Self::Tuple(refs) => {
                for r in refs {
                    r.del(env)?;
                }
                Ok(())
            }
        }
    }
}

fn resolve_name(env: &Env<'_>, name: &str, scope: NameScope) -> Result<Value, RuntimeError> {
    match scope {
        NameScope::Local => env
            .locals
            .get(name)
            .cloned()
            .or_else(|| env.module.get_attr(name))
            .or_else(|| env.builtins.get(name))
            .ok_or_else(|| RuntimeError::name_error(format!("name '{name}' is not defined"))),
        NameScope::Global => env
            .module
            .get_attr(name)
            .or_else(|| env.builtins.get(name))
            .ok_or_else(|| RuntimeError::name_error(format!("name '{name}' is not defined"))),
        NameScope::Attr => unreachable!("Attr-scoped Name is only ever wrapped inside Reference::Attr"),
    }
}

fn store_name(env: &mut Env<'_>, name: &str, scope: NameScope, value: Value) {
    match scope {
        NameScope::Local => {
            env.locals.insert(name.to_string(), value);
        }
        NameScope::Global => env.module.set_attr(name, value),
        NameScope::Attr => unreachable!("Attr-scoped Name is only ever wrapped inside Reference::Attr"),
    }
}

fn delete_name(env: &mut Env<'_>, name: &str, scope: NameScope) -> Result<(), RuntimeError> {
    match scope {
        NameScope::Local => env
            .locals
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::name_error(format!("name '{name}' is not defined"))),
        NameScope::Global => {
            if env.module.del_attr(name) {
                Ok(())
            } else {
                Err(RuntimeError::name_error(format!("name '{name}' is not defined")))
            }
        }
        NameScope::Attr => unreachable!("Attr-scoped Name is only ever wrapped inside Reference::Attr"),
    }
}

// `Index` delegates to `__getitem__`/`__setitem__`/`__delitem__` in the real
// object system (§4.2); this stand-in only understands the `List` shape
// `Value` itself knows about, sufficient to exercise the reference laws
// without reimplementing the container protocol.
fn index_get(container: &Value, index: &Value) -> Result<Value, RuntimeError> {
    let items = list_items(container)?;
    let i = index_usize(index, items.len())?;
    Ok(items[i].clone())
}

fn index_set(container: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match container.kind() {
        ValueKind::List(mut items) => {
            let i = index_usize(index, items.len())?;
            items[i] = value;
            container.set_kind(ValueKind::List(items));
            Ok(())
        }
        _ => Err(RuntimeError::type_error("object does not support item assignment")),
    }
}

fn index_del(container: &Value, index: &Value) -> Result<(), RuntimeError> {
    match container.kind() {
        ValueKind::List(mut items) => {
            let i = index_usize(index, items.len())?;
            items.remove(i);
            container.set_kind(ValueKind::List(items));
            Ok(())
        }
        _ => Err(RuntimeError::type_error("object does not support item deletion")),
    }
}

fn list_items(container: &Value) -> Result<Vec<Value>, RuntimeError> {
    match container.kind() {
        ValueKind::List(items) | ValueKind::Tuple(items) => Ok(items),
        _ => Err(RuntimeError::type_error("object is not subscriptable")),
    }
}

fn index_usize(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    match index.kind() {
        ValueKind::Int(i) if i >= 0 && (i as usize) < len => Ok(i as usize),
        ValueKind::Int(_) => Err(RuntimeError::index_error("index out of range")),
        _ => Err(RuntimeError::type_error("index must be an integer")),
    }
}
