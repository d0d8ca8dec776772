/*
 * loops.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! `#repeat` / `#loop` / `#break` / `#continue` bookkeeping.
//!
//! Loops are executed by moving the compiler's line cursor back to the line
//! after `#repeat`. Each frame remembers the condition depth it was opened
//! at; a `#loop` seen at any other depth means an `#if` block and a loop
//! block overlap instead of nesting.

use crate::condition::ConditionState;
use crate::error::StructureKind;

/// Iterations run by a `#repeat` without a count.
pub const UNBOUNDED_ITERATIONS: usize = 100_000;

/// One open `#repeat` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopFrame {
    start_line: usize,
    remaining: usize,
    iteration: usize,
    owner_depth: usize,
}

impl LoopFrame {
    pub fn new(start_line: usize, count: usize, owner_depth: usize) -> Self {
        Self {
            start_line,
            remaining: count,
            iteration: 1,
            owner_depth,
        }
    }

    /// Advance to the next iteration.
    ///
    /// Returns the line index to resume at, or `None` when the loop is done.
    pub fn iterate(&mut self) -> Option<usize> {
        if self.remaining <= 1 {
            return None;
        }
        self.remaining -= 1;
        self.iteration += 1;
        Some(self.start_line + 1)
    }

    pub fn stop(&mut self) {
        self.remaining = 0;
    }

    pub fn is_broken(&self) -> bool {
        self.remaining == 0
    }

    /// 1-based number of the pass currently running.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn owner_depth(&self) -> usize {
        self.owner_depth
    }
}

/// What a `#break` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakOutcome {
    /// The innermost loop was stopped.
    Loop,
    /// No loop is open; the document ends here.
    Document,
}

/// Stack of open loops during one pass.
#[derive(Debug)]
pub struct LoopState {
    frames: Vec<LoopFrame>,
    unbounded: usize,
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new(UNBOUNDED_ITERATIONS)
    }
}

impl LoopState {
    /// Create an empty stack. `unbounded` caps loops that have no count.
    pub fn new(unbounded: usize) -> Self {
        Self {
            frames: Vec::new(),
            unbounded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the innermost loop was stopped by `#break` or ran out.
    pub fn is_broken(&self) -> bool {
        self.frames.last().is_some_and(LoopFrame::is_broken)
    }

    /// Whether every open loop is still in its first iteration.
    ///
    /// Line anchors are only emitted then, so ids stay unique.
    pub fn is_first_iteration(&self) -> bool {
        self.frames.iter().all(|f| f.iteration == 1)
    }

    /// Open a loop at `line`. `None` means no count was given.
    pub fn open(&mut self, line: usize, count: Option<usize>, conditions: &ConditionState) {
        let count = count.unwrap_or(self.unbounded);
        self.frames
            .push(LoopFrame::new(line, count, conditions.depth()));
    }

    /// Handle `#loop`. Returns the line to jump back to, if any.
    ///
    /// An entangled `#loop` keeps a running loop open, but a loop that was
    /// already stopped is dropped so the lines after it render again.
    pub fn close(&mut self, conditions: &ConditionState) -> Result<Option<usize>, StructureKind> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(StructureKind::LoopWithoutRepeat)?;
        if frame.owner_depth != conditions.depth() {
            if frame.is_broken() {
                self.frames.pop();
            }
            return Err(StructureKind::Entangled);
        }
        let next = frame.iterate();
        if next.is_none() {
            self.frames.pop();
        }
        Ok(next)
    }

    /// Handle `#break`.
    pub fn stop(&mut self) -> BreakOutcome {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.stop();
                BreakOutcome::Loop
            }
            None => BreakOutcome::Document,
        }
    }

    /// Handle `#continue`. Returns the line to jump back to, if any.
    ///
    /// Blocks opened inside the body are closed before rewinding. On the
    /// last iteration the loop is stopped instead, so the rest of the body
    /// is skipped while its `#end if` lines still balance.
    pub fn skip(
        &mut self,
        conditions: &mut ConditionState,
    ) -> Result<Option<usize>, StructureKind> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(StructureKind::ContinueWithoutRepeat)?;
        if conditions.depth() < frame.owner_depth {
            return Err(StructureKind::Entangled);
        }
        match frame.iterate() {
            Some(next) => {
                conditions.unwind_to(frame.owner_depth);
                Ok(Some(next))
            }
            None => {
                frame.stop();
                Ok(None)
            }
        }
    }
}
