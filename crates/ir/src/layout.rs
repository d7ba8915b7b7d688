//! This module contains function layout information including block order and
//! instruction order.
use cranelift_entity::SecondaryMap;

use super::{BlockId, InstId};

#[derive(Debug, Clone, Default)]
pub struct Layout {
    blocks: SecondaryMap<BlockId, BlockNode>,
    insts: SecondaryMap<InstId, InstNode>,
    entry_block: Option<BlockId>,
    last_block: Option<BlockId>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.entry_block
    }

    pub fn last_block(&self) -> Option<BlockId> {
        self.last_block
    }

    pub fn is_block_empty(&self, block: BlockId) -> bool {
        self.first_inst_of(block).is_none()
    }

    pub fn next_block_of(&self, block: BlockId) -> Option<BlockId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].next
    }

    pub fn is_block_inserted(&self, block: BlockId) -> bool {
        Some(block) == self.entry_block || self.blocks[block] != BlockNode::default()
    }

    pub fn first_inst_of(&self, block: BlockId) -> Option<InstId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].first_inst
    }

    pub fn last_inst_of(&self, block: BlockId) -> Option<InstId> {
        debug_assert!(self.is_block_inserted(block));
        self.blocks[block].last_inst
    }

    pub fn prev_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.insts[inst].prev
    }

    pub fn next_inst_of(&self, inst: InstId) -> Option<InstId> {
        debug_assert!(self.is_inst_inserted(inst));
        self.insts[inst].next
    }

    /// # Panic
    /// Panics if the instruction is not inserted.
    pub fn inst_block(&self, inst: InstId) -> BlockId {
        match self.insts[inst].block {
            Some(block) => block,
            None => panic!("{inst:?} is not inserted"),
        }
    }

    pub fn is_inst_inserted(&self, inst: InstId) -> bool {
        self.insts[inst] != InstNode::default()
    }

    pub fn iter_block(&self) -> impl Iterator<Item = BlockId> + '_ {
        BlockIter {
            next: self.entry_block,
            blocks: &self.blocks,
        }
    }

    pub fn iter_inst(&self, block: BlockId) -> impl Iterator<Item = InstId> + '_ {
        debug_assert!(self.is_block_inserted(block));
        InstIter {
            next: self.blocks[block].first_inst,
            insts: &self.insts,
        }
    }

    /// Iterates all instructions of the function in layout order.
    pub fn iter_all_inst(&self) -> impl Iterator<Item = InstId> + '_ {
        self.iter_block().flat_map(|block| self.iter_inst(block))
    }

    pub fn append_block(&mut self, block: BlockId) {
        debug_assert!(!self.is_block_inserted(block));

        let mut block_node = BlockNode::default();

        if let Some(last_block) = self.last_block {
            self.blocks[last_block].next = Some(block);
            block_node.prev = Some(last_block);
        } else {
            self.entry_block = Some(block);
        }

        self.blocks[block] = block_node;
        self.last_block = Some(block);
    }

    pub fn append_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(!self.is_inst_inserted(inst));

        let mut inst_node = InstNode::with_block(block);
        let block_node = &mut self.blocks[block];

        if let Some(last_inst) = block_node.last_inst {
            inst_node.prev = Some(last_inst);
            self.insts[last_inst].next = Some(inst);
        } else {
            block_node.first_inst = Some(inst);
        }

        block_node.last_inst = Some(inst);
        self.insts[inst] = inst_node;
    }

    pub fn prepend_inst(&mut self, inst: InstId, block: BlockId) {
        debug_assert!(self.is_block_inserted(block));
        debug_assert!(!self.is_inst_inserted(inst));

        let mut inst_node = InstNode::with_block(block);
        let block_node = &mut self.blocks[block];

        if let Some(first_inst) = block_node.first_inst {
            inst_node.next = Some(first_inst);
            self.insts[first_inst].prev = Some(inst);
        } else {
            block_node.last_inst = Some(inst);
        }

        block_node.first_inst = Some(inst);
        self.insts[inst] = inst_node;
    }

    pub fn insert_inst_before(&mut self, inst: InstId, before: InstId) {
        debug_assert!(self.is_inst_inserted(before));
        debug_assert!(!self.is_inst_inserted(inst));

        let block = self.inst_block(before);
        let mut inst_node = InstNode::with_block(block);

        match self.insts[before].prev {
            Some(prev) => {
                inst_node.prev = Some(prev);
                self.insts[prev].next = Some(inst);
            }
            None => self.blocks[block].first_inst = Some(inst),
        }

        inst_node.next = Some(before);
        self.insts[before].prev = Some(inst);
        self.insts[inst] = inst_node;
    }

    pub fn insert_inst_after(&mut self, inst: InstId, after: InstId) {
        debug_assert!(self.is_inst_inserted(after));
        debug_assert!(!self.is_inst_inserted(inst));

        let block = self.inst_block(after);
        let mut inst_node = InstNode::with_block(block);

        match self.insts[after].next {
            Some(next) => {
                inst_node.next = Some(next);
                self.insts[next].prev = Some(inst);
            }
            None => self.blocks[block].last_inst = Some(inst),
        }

        inst_node.prev = Some(after);
        self.insts[after].next = Some(inst);
        self.insts[inst] = inst_node;
    }
}

struct BlockIter<'a> {
    next: Option<BlockId>,
    blocks: &'a SecondaryMap<BlockId, BlockNode>,
}

impl Iterator for BlockIter<'_> {
    type Item = BlockId;

    fn next(&mut self) -> Option<BlockId> {
        let next = self.next?;
        self.next = self.blocks[next].next;
        Some(next)
    }
}

struct InstIter<'a> {
    next: Option<InstId>,
    insts: &'a SecondaryMap<InstId, InstNode>,
}

impl Iterator for InstIter<'_> {
    type Item = InstId;

    fn next(&mut self) -> Option<InstId> {
        let next = self.next?;
        self.next = self.insts[next].next;
        Some(next)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
struct BlockNode {
    prev: Option<BlockId>,
    next: Option<BlockId>,
    first_inst: Option<InstId>,
    last_inst: Option<InstId>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq)]
struct InstNode {
    /// An block in which the inst exists.
    block: Option<BlockId>,
    prev: Option<InstId>,
    next: Option<InstId>,
}

impl InstNode {
    fn with_block(block: BlockId) -> Self {
        Self {
            block: Some(block),
            prev: None,
            next: None,
        }
    }
}
