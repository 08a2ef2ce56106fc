//! `CodeObject`: bytecode stream, constants, name table, and block tree (§3.5, §4.4).

use std::rc::Rc;

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;

use crate::bytecode::block::{BlockTree, BlockType, CodeBlock};
use crate::bytecode::op::OpCode;
use crate::limits::Limits;
use crate::source::Source;
use crate::value::Value;

/// The compile-time scope tag attached to a name reference (§3.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NameScope {
    Local,
    Global,
    Attr,
}

/// One executable instruction (§3.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Bytecode {
    pub op: OpCode,
    pub arg: i32,
    /// 1-based source line for tracebacks; `-1` when not applicable.
    pub line: i32,
    /// Index into `CodeObject::blocks` of the innermost enclosing block.
    pub block: u16,
}

/// Bytecode stream, constants pool, name table, label table, and block tree
/// for one function or module body.
pub struct CodeObject {
    pub src: Rc<Source>,
    pub name: String,

    code: Vec<Bytecode>,
    consts: Vec<Value>,
    names: IndexMap<(String, NameScope), ()>,
    global_names: AHashSet<String>,
    labels: AHashMap<String, usize>,
    blocks: BlockTree,
}

impl CodeObject {
    #[must_use]
    pub fn new(src: Rc<Source>, name: impl Into<String>) -> Self {
        Self::with_limits(src, name, Limits::default())
    }

    #[must_use]
    pub fn with_limits(src: Rc<Source>, name: impl Into<String>, limits: Limits) -> Self {
        Self {
            src,
            name: name.into(),
            code: Vec::new(),
            consts: Vec::new(),
            names: IndexMap::new(),
            global_names: AHashSet::default(),
            labels: AHashMap::default(),
            blocks: BlockTree::new(limits),
        }
    }

    #[must_use]
    pub fn code(&self) -> &[Bytecode] {
        &self.code
    }

    #[must_use]
    pub fn consts(&self) -> &[Value] {
        &self.consts
    }

    #[must_use]
    pub fn blocks(&self) -> &[CodeBlock] {
        self.blocks.blocks()
    }

    #[must_use]
    pub fn names(&self) -> impl Iterator<Item = (&str, NameScope)> {
        self.names.keys().map(|(n, s)| (n.as_str(), *s))
    }

    /// Declares `name` as `global` at compile time; affects subsequent
    /// `add_name(name, NameScope::Local)` calls (§4.4).
    pub fn declare_global(&mut self, name: impl Into<String>) {
        self.global_names.insert(name.into());
    }

    /// Registers (or finds) a `(name, scope)` entry, returning its stable
    /// index. `Local` is promoted to `Global` first if `name` was declared
    /// `global` — so a later `add_name(name, Global)` resolves to the same
    /// index (§8 scope-promotion law).
    pub fn add_name(&mut self, name: impl Into<String>, scope: NameScope) -> usize {
        let name = name.into();
        let scope = if scope == NameScope::Local && self.global_names.contains(&name) {
            NameScope::Global
        } else {
            scope
        };
        self.names.insert_full((name, scope), ()).0
    }

    pub fn add_const(&mut self, value: Value) -> usize {
        self.consts.push(value);
        self.consts.len() - 1
    }

    /// Records the current bytecode length as `label`'s jump target.
    ///
    /// # Panics
    /// Panics if `label` was already registered — a fatal compile-time error
    /// (§3.5, §7), not a recoverable `Result`.
    pub fn add_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        assert!(
            !self.labels.contains_key(&label),
            "label '{label}' already exists"
        );
        self.labels.insert(label, self.code.len());
    }

    #[must_use]
    pub fn label_target(&self, label: &str) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Opens a new lexical block, per §4.1.
    pub fn enter_block(&mut self, block_type: BlockType) {
        self.blocks.enter(block_type, self.code.len());
    }

    /// Closes the innermost open block, per §4.1.
    pub fn exit_block(&mut self) {
        self.blocks.exit(self.code.len());
    }

    #[must_use]
    pub fn is_current_block_loop(&self) -> bool {
        self.blocks.is_current_loop()
    }

    /// Appends a bytecode, stamping it with the currently-open block.
    pub fn emit(&mut self, op: OpCode, arg: i32, line: i32) -> usize {
        let block = u16::try_from(self.blocks.current()).expect("block index exceeds u16");
        self.code.push(Bytecode { op, arg, line, block });
        self.code.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CompileMode;

    fn code_object() -> CodeObject {
        let src = Rc::new(Source::new("pass\n", "<test>", CompileMode::Exec));
        CodeObject::new(src, "<module>")
    }

    /// Concrete scenario 1.
    #[test]
    fn scope_promotion_unifies_local_and_global_indices() {
        let mut co = code_object();
        co.declare_global("x");
        assert_eq!(co.add_name("x", NameScope::Local), 0);
        assert_eq!(co.add_name("x", NameScope::Global), 0);
        assert_eq!(co.add_name("x", NameScope::Attr), 1);
    }

    #[test]
    fn add_name_dedups_by_name_and_resolved_scope() {
        let mut co = code_object();
        let a = co.add_name("y", NameScope::Local);
        let b = co.add_name("y", NameScope::Local);
        assert_eq!(a, b);
        let c = co.add_name("y", NameScope::Attr);
        assert_ne!(a, c);
    }

    #[test]
    fn add_const_never_dedups() {
        let mut co = code_object();
        let a = co.add_const(Value::int(1));
        let b = co.add_const(Value::int(1));
        assert_ne!(a, b);
    }

    #[test]
    #[should_panic(expected = "already exists")]
    fn duplicate_label_is_fatal() {
        let mut co = code_object();
        co.add_label("top");
        co.add_label("top");
    }

    #[test]
    fn emit_stamps_current_block() {
        let mut co = code_object();
        co.emit(OpCode::Nop, 0, 1);
        co.enter_block(BlockType::ForLoop);
        let idx = co.emit(OpCode::GetIter, 0, 2);
        co.exit_block();
        assert_eq!(co.code()[idx].block, 1);
        assert_eq!(co.code()[0].block, 0);
    }

    /// Block coverage invariant (§8): every bytecode's `block` field names a
    /// block whose `[start, end)` range contains its index, and no deeper
    /// block also contains it.
    #[test]
    fn block_coverage_holds_for_nested_blocks() {
        let mut co = code_object();
        co.emit(OpCode::Nop, 0, 1); // index 0, root
        co.enter_block(BlockType::ForLoop);
        co.emit(OpCode::GetIter, 0, 2); // index 1, for-loop
        co.enter_block(BlockType::TryExcept);
        co.emit(OpCode::Nop, 0, 3); // index 2, try-except
        co.exit_block();
        co.emit(OpCode::Nop, 0, 4); // index 3, back to for-loop
        co.exit_block();
        co.emit(OpCode::Nop, 0, 5); // index 4, root

        for (index, bc) in co.code().iter().enumerate() {
            let block = &co.blocks()[bc.block as usize];
            assert!(block.start <= index && index < block.end);
            let deeper_contains = co
                .blocks()
                .iter()
                .enumerate()
                .any(|(i, b)| i != bc.block as usize && b.depth() > block.depth() && b.start <= index && index < b.end);
            assert!(!deeper_contains);
        }
    }

    #[test]
    fn names_yields_deduped_promoted_entries_in_insertion_order() {
        let mut co = code_object();
        co.declare_global("x");
        co.add_name("x", NameScope::Local); // promoted to Global, index 0
        co.add_name("y", NameScope::Attr); // index 1
        co.add_name("x", NameScope::Global); // same entry as index 0, no new insert

        let names: Vec<(&str, NameScope)> = co.names().collect();
        assert_eq!(names, vec![("x", NameScope::Global), ("y", NameScope::Attr)]);
    }

    #[test]
    fn label_target_round_trips_add_label() {
        let mut co = code_object();
        assert_eq!(co.label_target("top"), None);
        co.emit(OpCode::Nop, 0, 1);
        co.emit(OpCode::Nop, 0, 2);
        co.add_label("top");
        assert_eq!(co.label_target("top"), Some(2));
        assert_eq!(co.label_target("missing"), None);
    }

    #[test]
    fn is_current_block_loop_reflects_innermost_open_block() {
        let mut co = code_object();
        assert!(!co.is_current_block_loop());

        co.enter_block(BlockType::ForLoop);
        assert!(co.is_current_block_loop());

        co.enter_block(BlockType::TryExcept);
        assert!(!co.is_current_block_loop());
        co.exit_block();

        assert!(co.is_current_block_loop());
        co.exit_block();
        assert!(!co.is_current_block_loop());
    }
}
