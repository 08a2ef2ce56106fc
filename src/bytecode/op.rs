//! Opcode enumeration (§6.2).
//!
//! A representative opcode set covering every operation this spec names by
//! name elsewhere (loads/stores through each `Reference` variant, the three
//! jump primitives, raise/return). A production compiler/interpreter pair
//! would extend this with the full arithmetic and control-flow opcode set;
//! that extension is out of scope here (§6.2) — the core's only contract is
//! that each bytecode occupies exactly one `Bytecode` record (§3.3).

/// One VM instruction. Each variant's integer discriminant is stable (it is
/// stored in compiled `CodeObject`s) and its `strum::Display`/`EnumString`
/// impls give it a disassembly name for free.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OpCode {
    /// Push `consts[arg]`.
    LoadConst,
    /// Build a `Reference::Name` for `names[arg]` and push its read.
    LoadName,
    /// Build a `Reference::Name` for `names[arg]` and store the top-of-stack into it.
    StoreName,
    /// Build a `Reference::Name` for `names[arg]` and delete it.
    DeleteName,
    /// Pop an attribute name base, build a `Reference::Attr`, and push its read.
    LoadAttr,
    /// Pop base then value; store value into the named attribute.
    StoreAttr,
    /// Pop base; delete the named attribute.
    DeleteAttr,
    /// Pop index then container; build a `Reference::Index`, push its read.
    LoadIndex,
    /// Pop index, container, then value; store value at the index.
    StoreIndex,
    /// Pop index then container; delete the indexed element.
    DeleteIndex,
    /// Pop `arg` sub-references (pushed in order) and build a `Reference::Tuple`.
    BuildTupleRef,
    /// Push a fresh iterator for the loop starting at this instruction's block.
    GetIter,
    /// Advance the top-of-stack iterator, pushing its next value, or jump `arg` on exhaustion.
    ForIter,
    /// `jump_abs(arg)`.
    JumpAbsolute,
    /// `jump_rel(arg)`.
    JumpRelative,
    /// `jump_abs` only if top-of-stack is falsy (consumed).
    PopJumpIfFalse,
    /// The block-aware jump used by `break`/`continue`/`return` (§4.3).
    JumpAbsoluteSafe,
    /// Raise the top-of-stack as an exception; dispatch looks for a handler via
    /// `jumpToNextExceptionHandler`.
    RaiseException,
    /// Pop the return value and unwind the frame.
    ReturnValue,
    /// Discard the top-of-stack.
    PopTop,
    /// No-op, used as a jump target placeholder by the compiler.
    Nop,
}
