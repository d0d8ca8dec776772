/*
 * calculator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! A worksheet session that outlives single passes.
//!
//! Editors recompile the same sheet over and over. The session keeps what
//! must survive between those passes: settings (including precision changed
//! by `#round`), the values typed into `?` fields and the last result.

use crate::compiler::Compiler;
use crate::engine::{CancelToken, MathEngine};
use crate::input_fields::InputFieldQueue;
use crate::plot::PlotRenderer;
use crate::settings::Settings;

#[derive(Debug, Default)]
pub struct Calculator {
    settings: Settings,
    input_fields: InputFieldQueue,
    cancel: CancelToken,
    html: String,
}

impl Calculator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Append the value for the next `?` placeholder.
    pub fn set_input_field(&mut self, value: impl Into<String>) {
        self.input_fields.push(value);
    }

    pub fn clear_input_fields(&mut self) {
        self.input_fields.clear();
    }

    pub fn input_fields(&self) -> &[String] {
        self.input_fields.values()
    }

    /// A handle that stops the next or running pass from another thread.
    ///
    /// The flag is cleared when that pass ends.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// HTML of the last pass.
    pub fn html_result(&self) -> &str {
        &self.html
    }

    /// Run one pass over `source` and keep its HTML.
    pub fn parse(
        &mut self,
        source: &str,
        calculate: bool,
        engine: &mut dyn MathEngine,
        plots: Option<&mut dyn PlotRenderer>,
    ) -> &str {
        let mut compiler = Compiler::new(engine, self.settings.clone())
            .with_cancel_token(self.cancel.clone());
        if let Some(plots) = plots {
            compiler = compiler.with_plot_renderer(plots);
        }
        self.html = compiler.compile(source, calculate, self.input_fields.values());
        self.settings = compiler.into_settings();
        self.cancel.reset();
        &self.html
    }
}
