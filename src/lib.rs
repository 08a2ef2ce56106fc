//! Bytecode execution core for a small embeddable dynamic-language
//! interpreter modeled on Python semantics (§1).
//!
//! This crate owns the `CodeObject`/block tree, the `Frame` and its
//! safe-jump machinery, the four-variant `Reference` abstraction, and the
//! compile/runtime error taxonomy. The compiler front-end, parser/lexer,
//! built-in type zoo, arithmetic dispatch and embedding API are external
//! collaborators (§6.4) and are not part of this crate.

pub mod bytecode;
pub mod error;
pub mod frame;
pub mod limits;
pub mod reference;
pub mod source;
pub mod value;

pub use bytecode::{BlockType, Bytecode, CodeBlock, CodeObject, NameScope, OpCode};
pub use error::{CompileError, ExcKind, NeedMoreLines, PyRaiseEvent, RuntimeError};
pub use frame::Frame;
pub use limits::Limits;
pub use reference::{Builtins, Env, Reference};
pub use source::{CompileMode, Source};
pub use value::{Value, ValueKind};
