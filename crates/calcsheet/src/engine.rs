/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The evaluation engine contract.
//!
//! The interpreter never parses or computes math itself. It hands expression
//! text to a [`MathEngine`] and embeds whatever markup the engine produces.
//! This keeps the worksheet grammar (directives, quoting, layout) independent
//! of the expression grammar and unit system.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// A failure reported by the evaluation engine.
///
/// The message is shown to the user verbatim inside the error fragment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CalculationError {
    pub message: String,
}

impl CalculationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type CalculationResult<T> = Result<T, CalculationError>;

/// A calculated value. Real results have a zero imaginary part.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn real(re: f64) -> Self {
        Self { re, im: 0.0 }
    }

    pub fn is_real(&self) -> bool {
        self.im == 0.0
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_real() {
            write!(f, "{}", self.re)
        } else if self.im < 0.0 {
            write!(f, "{} - {}i", self.re, -self.im)
        } else {
            write!(f, "{} + {}i", self.re, self.im)
        }
    }
}

/// Unit used by trigonometric functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AngleMode {
    #[default]
    Degrees,
    Radians,
    Gradians,
}

/// Source of values for `?` placeholders.
///
/// The engine calls [`InputSource::next_input`] once for every placeholder
/// it meets while parsing.
pub trait InputSource {
    fn next_input(&mut self) -> String;
}

/// The contract the interpreter consumes from the math engine.
///
/// An engine keeps the last parsed expression and the last calculated value
/// as internal state; rendering and result accessors refer to those.
pub trait MathEngine {
    /// Parse an expression without evaluating it.
    fn parse(&mut self, expression: &str, inputs: &mut dyn InputSource) -> CalculationResult<()>;

    /// Evaluate the last parsed expression.
    fn calculate(&mut self) -> CalculationResult<()>;

    /// The value produced by the last successful [`MathEngine::calculate`].
    fn result(&self) -> Complex;

    /// Inline HTML rendering of the last parsed expression.
    fn to_html(&self) -> String;

    /// Structured XML rendering of the last parsed expression.
    fn to_xml(&self) -> String;

    /// Format the last result for value-only output.
    fn format_result(&self, decimals: u32) -> String;

    fn set_variable(&mut self, name: &str, value: f64);

    fn angle_mode(&self) -> AngleMode;

    fn set_angle_mode(&mut self, mode: AngleMode);

    /// Whether calculation is enabled for the current pass.
    fn set_enabled(&mut self, _enabled: bool) {}

    /// Set while a plot or map line is being rendered.
    fn set_plotting(&mut self, _plotting: bool) {}

    /// Engine-side cancellation, e.g. raised from inside a long calculation.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Lock-free cancellation flag shared with other threads.
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the running pass stops at the next line.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Clear a previous request so the token can be reused for another pass.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}
