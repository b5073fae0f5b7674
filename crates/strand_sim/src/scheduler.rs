//! Work-list of pending combinational activations.
//!
//! The scheduler is either [`SchedulerState::Idle`] (nothing queued) or
//! [`SchedulerState::Draining`]. A change to a cell queues every block
//! sensitive to it unless that block is already queued. Blocks are popped
//! last-in first-out. A block may run more than once per settle when later
//! changes re-trigger it.

use strand_common::ArenaId;

use crate::ids::{BlockId, CellId};

/// Scheduler micro-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// The work-list is empty; all combinational logic has settled.
    Idle,
    /// Blocks are waiting to run.
    Draining,
}

#[derive(Debug)]
pub(crate) struct Scheduler {
    worklist: Vec<BlockId>,
    queued: Vec<bool>,
    sensitivity: Vec<Vec<BlockId>>,
    enqueues: u64,
}

impl Scheduler {
    pub fn new(block_count: usize, sensitivity: Vec<Vec<BlockId>>) -> Self {
        Self {
            worklist: Vec::new(),
            queued: vec![false; block_count],
            sensitivity,
            enqueues: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.worklist.is_empty() {
            SchedulerState::Idle
        } else {
            SchedulerState::Draining
        }
    }

    pub fn is_idle(&self) -> bool {
        self.worklist.is_empty()
    }

    /// Queues `block` unless it is already waiting.
    pub fn enqueue(&mut self, block: BlockId) {
        let flag = &mut self.queued[block.index()];
        if !*flag {
            *flag = true;
            self.worklist.push(block);
            self.enqueues += 1;
        }
    }

    /// Queues every block sensitive to `cell`.
    pub fn notify(&mut self, cell: CellId) {
        let Some(blocks) = self.sensitivity.get(cell.index()) else {
            return;
        };
        for &block in blocks {
            let flag = &mut self.queued[block.index()];
            if !*flag {
                *flag = true;
                self.worklist.push(block);
                self.enqueues += 1;
            }
        }
    }

    pub fn pop(&mut self) -> Option<BlockId> {
        let block = self.worklist.pop()?;
        self.queued[block.index()] = false;
        Some(block)
    }

    /// Blocks still queued, most recently queued first.
    pub fn pending(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.worklist.iter().rev().copied()
    }

    /// Total enqueues since construction.
    pub fn enqueues(&self) -> u64 {
        self.enqueues
    }

    /// Blocks sensitive to `cell`.
    pub fn sensitive_to(&self, cell: CellId) -> &[BlockId] {
        self.sensitivity
            .get(cell.index())
            .map_or(&[], Vec::as_slice)
    }
}
