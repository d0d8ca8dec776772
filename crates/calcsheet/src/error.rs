/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for worksheet compilation.
//!
//! None of these ever reach the caller of [`crate::Compiler::compile`]. Each
//! one is rendered as an inline `<p class="err">` fragment anchored to the
//! line that produced it.

use crate::engine::CalculationError;
use thiserror::Error;

/// Malformed control flow detected at a single directive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StructureKind {
    #[error("Condition block not initialized with \"#if\".")]
    MissingIf,

    #[error("Unmatched \"#end if\" without an open \"#if\".")]
    UnmatchedEndIf,

    #[error("Duplicate \"#else\" in condition block.")]
    DuplicateElse,

    #[error("\"#else if\" is not allowed after \"#else\" in condition block.")]
    ElseIfAfterElse,

    #[error("Condition cannot be empty.")]
    EmptyCondition,

    #[error("\"#loop\" without a corresponding \"#repeat\".")]
    LoopWithoutRepeat,

    #[error("\"#continue\" without a corresponding \"#repeat\".")]
    ContinueWithoutRepeat,

    #[error("Entangled \"#if - #end if\" and \"#repeat - #loop\" blocks.")]
    Entangled,
}

/// A block that was still open when the document ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnclosedBlock {
    #[error("Error: \"#if\" block not closed. Missing \"#end if\".")]
    If,

    #[error("Error: \"#repeat\" block not closed. Missing \"#loop\".")]
    Repeat,
}

/// Errors that can occur while compiling a worksheet.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A single expression failed to parse or evaluate.
    #[error(transparent)]
    Expression(#[from] CalculationError),

    /// Malformed control flow at one line.
    #[error(transparent)]
    Structure(#[from] StructureKind),

    /// A block left open at the end of the document.
    #[error(transparent)]
    Unclosed(#[from] UnclosedBlock),

    /// Anything else. Aborts the remaining lines of the pass.
    #[error("Unexpected error: {message} Please check the expression consistency.")]
    Unexpected { message: String },
}

impl CompileError {
    /// Create an unexpected error from any displayable cause.
    pub fn unexpected(message: impl Into<String>) -> Self {
        CompileError::Unexpected {
            message: message.into(),
        }
    }

    /// Whether this error stops the remaining lines of the pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CompileError::Unexpected { .. })
    }
}

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
