/*
 * settings.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Worksheet settings.
//!
//! Settings can be built in code or read from a TOML file:
//!
//! ```toml
//! decimals = 3
//! format_equations = true
//! units = "cm"
//! max_iterations = 1000
//! ```

use crate::loops::UNBOUNDED_ITERATIONS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Options that shape a compile pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Decimal places for value-only output. `#round` overrides it.
    pub decimals: u32,

    /// Attach the engine's XML rendering to each equation as `data-xml`.
    pub format_equations: bool,

    /// Length units substituted for `%u`: `m`, `cm` or `mm`.
    pub units: String,

    /// Iteration cap for a `#repeat` without a count.
    pub max_iterations: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            decimals: 2,
            format_equations: false,
            units: "m".to_string(),
            max_iterations: UNBOUNDED_ITERATIONS,
        }
    }
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn with_decimals(mut self, decimals: u32) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_format_equations(mut self, format_equations: bool) -> Self {
        self.format_equations = format_equations;
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Length factor exposed to expressions as the `Units` variable.
    pub fn units_factor(&self) -> f64 {
        match self.units.as_str() {
            "mm" => 1000.0,
            "cm" => 100.0,
            "m" => 1.0,
            _ => 0.0,
        }
    }
}
