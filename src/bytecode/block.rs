//! The lexical block tree (§3.4, §4.1).
//!
//! Kept as a flat `Vec<CodeBlock>` with parent indices rather than a pointer
//! tree (§9 design note): it is built once during compilation, never mutated
//! afterward, indexed directly from bytecodes, and cheap to walk toward the
//! root.

use crate::limits::Limits;

/// The kind of lexical region a [`CodeBlock`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    /// The implicit root block covering the whole code object.
    None,
    ForLoop,
    WhileLoop,
    ContextManager,
    TryExcept,
}

impl BlockType {
    #[must_use]
    pub fn is_loop(self) -> bool {
        matches!(self, Self::ForLoop | Self::WhileLoop)
    }
}

/// A single lexical block opened during compilation (§3.4).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeBlock {
    pub block_type: BlockType,
    /// Path from the root. Siblings differ in their last element, chosen as
    /// the smallest unused non-negative integer among siblings sharing the
    /// same prefix.
    pub id: Vec<u32>,
    /// `None` for the root; otherwise the index of the enclosing block.
    pub parent: Option<usize>,
    /// Half-open `[start, end)` range of bytecode indices this block spans.
    pub start: usize,
    pub end: usize,
}

impl CodeBlock {
    #[must_use]
    pub fn depth(&self) -> usize {
        self.id.len()
    }

    fn root() -> Self {
        Self {
            block_type: BlockType::None,
            id: Vec::new(),
            parent: None,
            start: 0,
            end: 0,
        }
    }
}

/// The block tree of a single `CodeObject`, plus the compile-time cursor
/// used by `enter`/`exit` (§4.1).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BlockTree {
    blocks: Vec<CodeBlock>,
    current: usize,
    #[serde(skip, default)]
    max_depth: usize,
}

impl Default for BlockTree {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl BlockTree {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            blocks: vec![CodeBlock::root()],
            current: 0,
            max_depth: limits.max_block_depth,
        }
    }

    #[must_use]
    pub fn blocks(&self) -> &[CodeBlock] {
        &self.blocks
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn is_current_loop(&self) -> bool {
        self.blocks[self.current].block_type.is_loop()
    }

    /// Opens a new block of `block_type` as a child of the current block,
    /// and makes it current. `code_len` is the bytecode length so far
    /// (becomes the new block's `start`).
    ///
    /// # Panics
    /// Panics if nesting would exceed the configured `max_block_depth` — a
    /// fatal compiler invariant, not a user-facing error.
    pub fn enter(&mut self, block_type: BlockType, code_len: usize) {
        let parent_id = &self.blocks[self.current].id;
        let mut candidate = parent_id.clone();
        candidate.push(0);
        let last = candidate.len() - 1;

        let mut suffix = 0u32;
        loop {
            candidate[last] = suffix;
            let taken = self.blocks.iter().any(|b| b.id == candidate);
            if !taken {
                break;
            }
            suffix += 1;
        }

        assert!(
            candidate.len() <= self.max_depth,
            "block nesting exceeds configured max_block_depth ({})",
            self.max_depth
        );

        self.blocks.push(CodeBlock {
            block_type,
            id: candidate,
            parent: Some(self.current),
            start: code_len,
            end: code_len,
        });
        self.current = self.blocks.len() - 1;
    }

    /// Closes the current block, recording `code_len` as its exclusive end,
    /// and restores `current` to its parent.
    ///
    /// # Panics
    /// Panics if called while `current` is the root — a fatal compiler
    /// invariant violation (unbalanced `enter`/`exit`).
    pub fn exit(&mut self, code_len: usize) {
        self.blocks[self.current].end = code_len;
        self.current = self.blocks[self.current]
            .parent
            .expect("CodeBlock::exit called with no enclosing block (unbalanced enter/exit)");
    }
}
