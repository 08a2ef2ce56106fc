//! Per-invocation execution state: operand stack, instruction pointer, local
//! environment, and the safe-jump machinery that reconciles `ip` movement
//! with the block tree (§3.7, §4.3).

use std::rc::Rc;

use ahash::AHashMap;

use crate::bytecode::block::BlockType;
use crate::bytecode::code::{Bytecode, CodeObject};
use crate::reference::{Builtins, Env};
use crate::value::Value;

/// One function/module invocation. Owns everything an opcode handler reads
/// or mutates; single-owner, never shared across threads (§5).
pub struct Frame {
    pub code: Rc<CodeObject>,
    /// Attribute-dictionary handle backing the module (global) environment.
    pub module: Value,
    pub locals: AHashMap<String, Value>,
    stack: Vec<Value>,
    /// Index of the instruction currently being executed. `-1` means no
    /// instruction has been fetched yet.
    ip: i32,
    /// Index `next_bytecode` will fetch on its next call. Opcode handlers
    /// mutate this (not `ip`) to implement ordinary jumps, so the
    /// currently-executing instruction's metadata (line, block) stays
    /// available for tracebacks and block lookups until the next fetch.
    next_ip: i32,
}

impl Frame {
    #[must_use]
    pub fn new(code: Rc<CodeObject>, module: Value) -> Self {
        Self {
            code,
            module,
            locals: AHashMap::default(),
            stack: Vec::new(),
            ip: -1,
            next_ip: 0,
        }
    }

    #[must_use]
    pub fn ip(&self) -> i32 {
        self.ip
    }

    #[must_use]
    pub fn next_ip(&self) -> i32 {
        self.next_ip
    }

    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Builds the environment a `Reference` resolves name loads/stores
    /// against, borrowing this frame's locals and module alongside the
    /// VM-owned `builtins` table (§4.2).
    pub fn env<'a>(&'a mut self, builtins: &'a Builtins) -> Env<'a> {
        Env {
            locals: &mut self.locals,
            module: &self.module,
            builtins,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// # Panics
    /// Stack underflow is a fatal interpreter assertion, not a user-visible
    /// error (§4.3).
    pub fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    /// # Panics
    /// Same as [`Frame::pop`]: reading an empty stack is a fatal assertion.
    #[must_use]
    pub fn top(&self) -> &Value {
        self.stack.last().expect("operand stack is empty")
    }

    /// Reads the value `n` slots from the top, where `n` is zero or
    /// negative (`top_offset(0)` is the same as [`Frame::top`],
    /// `top_offset(-1)` the slot beneath it).
    ///
    /// # Panics
    /// Out-of-range offsets are a fatal interpreter assertion (§4.3).
    #[must_use]
    pub fn top_offset(&self, n: isize) -> &Value {
        assert!(n <= 0, "top_offset expects a zero or negative offset, got {n}");
        let len = self.stack.len() as isize;
        let idx = len - 1 + n;
        assert!(
            idx >= 0 && idx < len,
            "operand stack offset {n} out of range (depth {len})"
        );
        &self.stack[idx as usize]
    }

    /// Pops `n` operands, returning them in the order they were pushed
    /// (bottom of the popped window first) — the shape opcode handlers need
    /// to forward call arguments (§4.3).
    ///
    /// # Panics
    /// Underflow is a fatal interpreter assertion.
    pub fn pop_n(&mut self, n: usize) -> Vec<Value> {
        assert!(n <= self.stack.len(), "operand stack underflow popping {n} values");
        let start = self.stack.len() - n;
        self.stack.split_off(start)
    }

    /// Advances `ip`/`next_ip` and returns the instruction now current
    /// (§4.3).
    ///
    /// # Panics
    /// Fetching past the end of the bytecode stream is a fatal interpreter
    /// assertion — callers must check [`Frame::is_bytecode_ended`] first.
    pub fn next_bytecode(&mut self) -> Bytecode {
        self.ip = self.next_ip;
        self.next_ip = self.ip + 1;
        self.code.code()[self.ip as usize]
    }

    #[must_use]
    pub fn is_bytecode_ended(&self) -> bool {
        self.ip >= self.code.code().len() as i32
    }

    /// Unconditional jump with no block bookkeeping.
    pub fn jump_abs(&mut self, target: i32) {
        self.next_ip = target;
    }

    pub fn jump_rel(&mut self, delta: i32) {
        self.next_ip = self.ip + delta;
    }

    /// The block-aware jump underlying `break`/`continue`/`return` and
    /// handler entry (§4.3). Pops exactly the `FOR_LOOP` ancestors that lie
    /// between the current instruction's block and `target`'s block,
    /// releasing the loop's latent iterator once per exited loop.
    ///
    /// Sets both `ip` and `next_ip` to `target` (the spec text only
    /// describes `ip`; doing the same to `next_ip` is required for the
    /// following [`Frame::next_bytecode`] call to actually land on
    /// `target`, which is the only sensible reading of "jump").
    ///
    /// # Panics
    /// If `target` does not lie in the current frame's own block (or an
    /// ancestor of it), this is a fatal interpreter error — a cross-block
    /// jump that isn't a legal loop/try exit indicates a compiler bug, not
    /// a user-facing condition. The stack is left untouched when this
    /// panics (validity is checked before any pop).
    pub fn jump_absolute_safe(&mut self, target: i32) {
        let from = self.code.code()[self.ip as usize].block as usize;
        self.ip = target;

        let code_len = self.code.code().len() as i32;
        if target >= code_len {
            self.pop_for_loop_ancestors(from, None);
            self.next_ip = target;
            return;
        }

        let to = self.code.code()[target as usize].block as usize;
        assert!(
            self.is_ancestor(to, from),
            "invalid cross-block jump: block {:?} is not reachable from block {:?}",
            self.code.blocks()[to],
            self.code.blocks()[from],
        );
        self.pop_for_loop_ancestors(from, Some(to));
        self.next_ip = target;
    }

    /// Walks the block chain from the current instruction's block toward
    /// the root looking for the first enclosing `TRY_EXCEPT` block, and
    /// jumps to its `end` (where the compiler places the `except`
    /// dispatch) via [`Frame::jump_absolute_safe`] (§4.3).
    ///
    /// Returns `false` if no enclosing handler exists; the caller must then
    /// unwind to the previous frame.
    pub fn jump_to_next_exception_handler(&mut self) -> bool {
        let mut cur = Some(self.code.code()[self.ip as usize].block as usize);
        while let Some(b) = cur {
            let block = &self.code.blocks()[b];
            if block.block_type == BlockType::TryExcept {
                let target = block.end as i32;
                self.jump_absolute_safe(target);
                return true;
            }
            cur = block.parent;
        }
        false
    }

    /// Renders a source snapshot for the currently-executing instruction's
    /// line, for traceback accumulation (§4.3, §4.5).
    #[must_use]
    pub fn error_snapshot(&self) -> String {
        let line = self.code.code()[self.ip as usize].line;
        self.code.src.snapshot(line, None)
    }

    fn is_ancestor(&self, ancestor: usize, mut node: usize) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.code.blocks()[node].parent {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    /// Pops one operand per `FOR_LOOP` block walking from `from` up to (but
    /// not including) `stop_at`; `stop_at = None` walks all the way to the
    /// root, for the function-exit case.
    fn pop_for_loop_ancestors(&mut self, from: usize, stop_at: Option<usize>) {
        let mut cur = from;
        loop {
            if Some(cur) == stop_at {
                break;
            }
            if self.code.blocks()[cur].block_type == BlockType::ForLoop {
                self.pop();
            }
            match self.code.blocks()[cur].parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::code::NameScope;
    use crate::bytecode::op::OpCode;
    use crate::source::{CompileMode, Source};

    fn frame_over(build: impl FnOnce(&mut CodeObject)) -> Frame {
        let src = Rc::new(Source::new("pass\n", "<test>", CompileMode::Exec));
        let mut code = CodeObject::new(src, "<module>");
        build(&mut code);
        Frame::new(Rc::new(code), Value::object())
    }

    #[test]
    fn next_bytecode_advances_ip_and_next_ip() {
        let mut frame = frame_over(|co| {
            co.emit(OpCode::Nop, 0, 1);
            co.emit(OpCode::Nop, 0, 2);
        });
        assert_eq!(frame.ip(), -1);
        assert_eq!(frame.next_ip(), 0);
        frame.next_bytecode();
        assert_eq!(frame.ip(), 0);
        assert_eq!(frame.next_ip(), 1);
        frame.next_bytecode();
        assert_eq!(frame.ip(), 1);
        assert!(frame.is_bytecode_ended());
    }

    #[test]
    fn stack_push_pop_top_offset() {
        let mut frame = frame_over(|_| {});
        frame.push(Value::int(1));
        frame.push(Value::int(2));
        frame.push(Value::int(3));
        assert!(frame.top().py_eq(&Value::int(3)));
        assert!(frame.top_offset(-1).py_eq(&Value::int(2)));
        assert!(frame.top_offset(-2).py_eq(&Value::int(1)));
        let popped = frame.pop();
        assert!(popped.py_eq(&Value::int(3)));
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn pop_on_empty_stack_is_fatal() {
        let mut frame = frame_over(|_| {});
        frame.pop();
    }

    #[test]
    fn pop_n_returns_bottom_to_top_order() {
        let mut frame = frame_over(|_| {});
        frame.push(Value::int(1));
        frame.push(Value::int(2));
        frame.push(Value::int(3));
        let args = frame.pop_n(2);
        assert!(args[0].py_eq(&Value::int(2)));
        assert!(args[1].py_eq(&Value::int(3)));
        assert_eq!(frame.stack_depth(), 1);
    }

    /// Concrete scenario 3: a `break` out of a for-loop pops exactly its
    /// latent iterator.
    #[test]
    fn safe_jump_pops_one_iterator_breaking_out_of_for_loop() {
        let mut frame = frame_over(|co| {
            co.emit(OpCode::Nop, 0, 1); // 0: root
            co.enter_block(BlockType::ForLoop);
            co.emit(OpCode::GetIter, 0, 2); // 1: for-loop
            co.emit(OpCode::JumpAbsoluteSafe, 3, 3); // 2: the break itself
            co.exit_block();
            co.emit(OpCode::Nop, 0, 4); // 3: root, after the loop
        });

        frame.push(Value::object()); // two unrelated locals already on the stack
        frame.push(Value::object());
        frame.push(Value::object()); // the loop's latent iterator

        frame.next_bytecode(); // ip = 0
        frame.next_bytecode(); // ip = 1
        frame.next_bytecode(); // ip = 2, the break
        assert_eq!(frame.stack_depth(), 3);

        frame.jump_absolute_safe(3);
        assert_eq!(frame.stack_depth(), 2);
        assert_eq!(frame.next_ip(), 3);
    }

    #[test]
    fn safe_jump_within_same_block_leaves_stack_alone() {
        let mut frame = frame_over(|co| {
            co.enter_block(BlockType::ForLoop);
            co.emit(OpCode::Nop, 0, 1); // 0
            co.emit(OpCode::JumpAbsoluteSafe, 0, 2); // 1: jump back to 0, same block
            co.exit_block();
        });
        frame.push(Value::object());
        frame.next_bytecode();
        frame.next_bytecode();
        frame.jump_absolute_safe(0);
        assert_eq!(frame.stack_depth(), 1);
    }

    #[test]
    fn safe_jump_past_end_pops_every_enclosing_for_loop() {
        let mut frame = frame_over(|co| {
            co.enter_block(BlockType::ForLoop);
            co.enter_block(BlockType::ForLoop);
            co.emit(OpCode::ReturnValue, 0, 1); // 0, nested two for-loops deep
            co.exit_block();
            co.exit_block();
        });
        frame.push(Value::object()); // outer iterator
        frame.push(Value::object()); // inner iterator
        frame.push(Value::int(7)); // the return value itself
        frame.next_bytecode();

        let code_len = frame.code.code().len() as i32;
        frame.jump_absolute_safe(code_len);
        assert_eq!(frame.stack_depth(), 1);
        assert!(frame.top().py_eq(&Value::int(7)));
    }

    /// Concrete scenario 4: try/except dispatch jumps to the block's `end`.
    #[test]
    fn exception_handler_lookup_jumps_to_block_end() {
        let mut frame = frame_over(|co| {
            for _ in 0..10 {
                co.emit(OpCode::Nop, 0, 1); // 0..10, before the try
            }
            co.enter_block(BlockType::TryExcept);
            for _ in 10..40 {
                co.emit(OpCode::Nop, 0, 2); // 10..40
            }
            co.exit_block();
            co.emit(OpCode::Nop, 0, 3); // 40: the except dispatch
        });

        for _ in 0..26 {
            frame.next_bytecode();
        }
        assert_eq!(frame.ip(), 25);

        assert!(frame.jump_to_next_exception_handler());
        assert_eq!(frame.next_ip(), 40);
    }

    #[test]
    fn exception_handler_lookup_returns_false_without_a_handler() {
        let mut frame = frame_over(|co| {
            co.emit(OpCode::Nop, 0, 1);
        });
        frame.next_bytecode();
        assert!(!frame.jump_to_next_exception_handler());
    }

    /// Concrete scenario 5: jumping between unrelated sibling blocks is a
    /// fatal interpreter error, and the stack is untouched.
    #[test]
    fn safe_jump_between_sibling_blocks_is_fatal_and_stack_is_untouched() {
        let mut frame = frame_over(|co| {
            for _ in 0..10 {
                co.emit(OpCode::Nop, 0, 1); // 0..10: root
            }
            co.enter_block(BlockType::ForLoop);
            for _ in 10..20 {
                co.emit(OpCode::Nop, 0, 2); // 10..20: block A
            }
            co.exit_block();
            for _ in 20..30 {
                co.emit(OpCode::Nop, 0, 3); // 20..30: root
            }
            co.enter_block(BlockType::ForLoop);
            for _ in 30..40 {
                co.emit(OpCode::Nop, 0, 4); // 30..40: block B
            }
            co.exit_block();
        });

        for _ in 0..16 {
            frame.next_bytecode();
        }
        assert_eq!(frame.ip(), 15);
        frame.push(Value::object());
        let depth_before = frame.stack_depth();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            frame.jump_absolute_safe(35);
        }));
        assert!(result.is_err());
        assert_eq!(frame.stack_depth(), depth_before);
    }

    #[test]
    fn error_snapshot_uses_current_instruction_line() {
        let mut frame = frame_over(|co| {
            co.emit(OpCode::LoadName, 0, 7);
        });
        frame.next_bytecode();
        let snapshot = frame.error_snapshot();
        assert!(snapshot.contains("line 7"));
    }

    #[test]
    fn env_borrows_locals_and_module_for_reference_resolution() {
        let mut frame = frame_over(|_| {});
        let builtins = Builtins::new();
        let mut env = frame.env(&builtins);
        let r = crate::reference::Reference::name("x", NameScope::Local);
        r.set(&mut env, Value::int(5)).unwrap();
        assert!(r.get(&env).unwrap().py_eq(&Value::int(5)));
    }
}
