/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Test support for calcsheet.
//!
//! [`ArithmeticEngine`] is a deliberately small [`MathEngine`]: real numbers,
//! variables, `+ - * / ^`, comparisons, a few functions and `?` inputs. It
//! renders an expression as its own text, followed by ` = value` once
//! calculated, which keeps expected HTML in tests easy to read.

mod arithmetic;

pub use arithmetic::ArithmeticEngine;

use calcsheet::{CalculationError, CalculationResult, MathEngine, PlotKind, PlotRenderer};

/// Plot renderer that records requests and emits a placeholder element.
#[derive(Debug, Default)]
pub struct StubPlotRenderer {
    pub requests: Vec<(PlotKind, String, bool)>,
    pub fail_with: Option<String>,
}

impl StubPlotRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A renderer whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            requests: Vec::new(),
            fail_with: Some(message.into()),
        }
    }
}

impl PlotRenderer for StubPlotRenderer {
    fn render(
        &mut self,
        kind: PlotKind,
        line: &str,
        calculate: bool,
        _engine: &mut dyn MathEngine,
    ) -> CalculationResult<String> {
        self.requests.push((kind, line.to_string(), calculate));
        if let Some(message) = &self.fail_with {
            return Err(CalculationError::new(message.clone()));
        }
        let class = match kind {
            PlotKind::Chart => "plot",
            PlotKind::Map => "map",
        };
        Ok(format!("<img class=\"{class}\" />"))
    }
}
