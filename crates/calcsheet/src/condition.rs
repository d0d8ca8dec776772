/*
 * condition.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Nested `#if` / `#else if` / `#else` / `#end if` tracking.
//!
//! Frames form a stack indexed by nesting depth. Depth 0 is a root frame that
//! is always satisfied. `active` is the deepest level whose whole ancestor
//! chain was entered while satisfied; a line renders only when the frame at
//! `active` is satisfied, which can only hold when `active == depth`.
//!
//! The state is fed one line at a time. Loops rewind the line cursor, so no
//! block tree is built up front.

use crate::engine::{CalculationError, CalculationResult, Complex};
use crate::error::StructureKind;
use crate::keyword::Directive;

/// Values closer to zero than this count as false.
const TRUTH_EPSILON: f64 = 1e-12;

/// Which part of an `#if` group a frame is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BranchKind {
    /// The root frame.
    None,
    /// An `#if` or re-armed `#else if` branch.
    If,
    Else,
}

#[derive(Debug, Clone, Copy)]
struct ConditionFrame {
    satisfied: bool,
    kind: BranchKind,
}

/// State of all open condition blocks during one pass.
#[derive(Debug)]
pub struct ConditionState {
    frames: Vec<ConditionFrame>,
    active: usize,
    found: bool,
    pending: bool,
    last: Directive,
}

impl Default for ConditionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionState {
    pub fn new() -> Self {
        Self {
            frames: vec![ConditionFrame {
                satisfied: true,
                kind: BranchKind::None,
            }],
            active: 0,
            found: false,
            pending: false,
            last: Directive::None,
        }
    }

    /// Current nesting depth. Zero outside of any `#if`.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Whether the current line lies in a chosen branch at every level.
    pub fn is_satisfied(&self) -> bool {
        self.frames[self.active].satisfied
    }

    /// Whether an `#if` or `#else if` still waits for its condition value.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether some branch of the current group already matched.
    pub fn is_found(&self) -> bool {
        self.found
    }

    /// Feed the directive of a line into the state machine.
    ///
    /// Lines that are not condition directives just clear the current label.
    pub fn enter(&mut self, directive: Directive) -> Result<(), StructureKind> {
        if !directive.is_condition() {
            self.last = Directive::None;
            return Ok(());
        }

        if directive != Directive::If && self.depth() == 0 {
            return Err(if directive == Directive::EndIf {
                StructureKind::UnmatchedEndIf
            } else {
                StructureKind::MissingIf
            });
        }
        if self.top().kind == BranchKind::Else {
            match directive {
                Directive::Else => return Err(StructureKind::DuplicateElse),
                Directive::ElseIf => return Err(StructureKind::ElseIfAfterElse),
                _ => {}
            }
        }

        match directive {
            Directive::If => self.push(),
            Directive::ElseIf => self.change(true, BranchKind::If),
            Directive::Else => self.change(!self.found, BranchKind::Else),
            Directive::EndIf => self.pop(),
            _ => unreachable!("guarded by is_condition"),
        }
        self.pending = matches!(directive, Directive::If | Directive::ElseIf);
        self.last = directive;
        Ok(())
    }

    /// Resolve a pending condition with a calculated value.
    ///
    /// An invalid value resolves the branch as not taken and is reported.
    pub fn check(&mut self, value: Complex) -> CalculationResult<()> {
        if !value.is_real() {
            self.resolve(false);
            return Err(CalculationError::new(
                "Condition cannot evaluate to a complex number.",
            ));
        }
        let d = value.re;
        if !d.is_finite() {
            self.resolve(false);
            return Err(CalculationError::new(format!(
                "Condition result is invalid: {d}."
            )));
        }
        self.resolve(d.abs() > TRUTH_EPSILON);
        Ok(())
    }

    /// Resolve a pending condition as not taken without evaluating it.
    pub fn reject(&mut self) {
        self.resolve(false);
    }

    /// Resolve a pending condition without a value (preview mode).
    pub fn skip_check(&mut self) {
        self.pending = false;
    }

    /// Close blocks opened deeper than `depth`, as `#continue` does.
    pub fn unwind_to(&mut self, depth: usize) {
        while self.depth() > depth {
            self.pop();
        }
        self.pending = false;
    }

    /// HTML label for the condition directive on the current line.
    pub fn keyword_html(&self) -> String {
        let label = match self.last {
            Directive::If => "#if ",
            Directive::ElseIf => "#else if ",
            Directive::Else => "#else",
            Directive::EndIf => "#end if",
            _ => return String::new(),
        };
        format!("<span class=\"cond\">{label}</span>")
    }

    fn top(&self) -> &ConditionFrame {
        &self.frames[self.depth()]
    }

    fn push(&mut self) {
        let parent_satisfied = self.is_satisfied();
        self.frames.push(ConditionFrame {
            satisfied: true,
            kind: BranchKind::If,
        });
        if parent_satisfied {
            self.active += 1;
            self.found = false;
        }
    }

    fn pop(&mut self) {
        self.frames.pop();
        if self.active > self.depth() {
            self.active -= 1;
            self.found = true;
        }
    }

    fn change(&mut self, satisfied: bool, kind: BranchKind) {
        let depth = self.depth();
        self.frames[depth] = ConditionFrame { satisfied, kind };
    }

    fn resolve(&mut self, result: bool) {
        if result {
            self.found = true;
        }
        let kind = self.top().kind;
        self.change(result, kind);
        self.pending = false;
    }
}
