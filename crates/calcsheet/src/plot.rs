/*
 * plot.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The plot/map renderer contract.

use crate::engine::{CalculationResult, MathEngine};

/// Which sub-parser a `$...` line asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    /// `$plot{...}`: a function chart.
    Chart,
    /// `$map{...}`: a 2D color map.
    Map,
}

impl PlotKind {
    /// Detect a plot request from a lowercased, trimmed line.
    pub fn detect(lowercase: &str) -> Option<PlotKind> {
        if lowercase.starts_with("$plot") {
            Some(PlotKind::Chart)
        } else if lowercase.starts_with("$map") {
            Some(PlotKind::Map)
        } else {
            None
        }
    }
}

/// Renders a whole plot line to an HTML fragment.
///
/// The renderer drives the same engine as the rest of the sheet, so plotted
/// functions can refer to variables defined above them.
pub trait PlotRenderer {
    fn render(
        &mut self,
        kind: PlotKind,
        line: &str,
        calculate: bool,
        engine: &mut dyn MathEngine,
    ) -> CalculationResult<String>;
}
