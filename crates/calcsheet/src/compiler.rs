/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The worksheet compiler.
//!
//! A pass walks the source one line at a time with a cursor that loops can
//! move backwards. Each line is classified, fed through the condition and
//! loop state machines and, when it renders, tokenized and emitted as HTML.
//!
//! A failure never leaves the line that caused it. Expression, directive and
//! structure errors become `<p class="err">` fragments that link back to the
//! line number, and the pass goes on with the next line. Only an unexpected
//! failure (a panic inside the engine, say) stops the pass, and even then the
//! HTML produced so far is returned.

use crate::condition::ConditionState;
use crate::engine::{AngleMode, CalculationError, CalculationResult, CancelToken, Complex, MathEngine};
use crate::error::{CompileError, CompileResult, StructureKind, UnclosedBlock};
use crate::html;
use crate::input_fields::InputFieldQueue;
use crate::keyword::Directive;
use crate::loops::{BreakOutcome, LoopState};
use crate::plot::{PlotKind, PlotRenderer};
use crate::settings::Settings;
use crate::tokenizer::{SegmentKind, count_placeholders, tokenize};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Largest precision `#round` accepts.
const MAX_DECIMALS: i64 = 15;

/// How expressions are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Equation and result (`#equ`).
    #[default]
    Equation,
    /// Result only (`#val`).
    ValueOnly,
    /// Equation only, not calculated (`#noc`).
    NoCalc,
}

/// What the driver does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Jump(usize),
    Stop,
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Stopped,
    Cancelled,
    Aborted,
}

/// State owned by a single pass.
struct Pass {
    calculate: bool,
    html: String,
    conditions: ConditionState,
    loops: LoopState,
    inputs: InputFieldQueue,
    visible: bool,
    mode: OutputMode,
    /// 1-based number of the line being processed.
    line: usize,
    /// The trimmed text of that line, quoted in error messages.
    source: String,
}

impl Pass {
    fn new(calculate: bool, inputs: &[String], settings: &Settings, line_count: usize) -> Self {
        Self {
            calculate,
            html: String::with_capacity(line_count * 80),
            conditions: ConditionState::new(),
            loops: LoopState::new(settings.max_iterations),
            inputs: InputFieldQueue::from_values(inputs.iter().cloned()),
            visible: true,
            mode: OutputMode::default(),
            line: 0,
            source: String::new(),
        }
    }

    /// Whether content at this point is rendered in calculate mode.
    fn is_live(&self) -> bool {
        self.conditions.is_satisfied() && !self.loops.is_broken()
    }

    fn renders(&self) -> bool {
        !self.calculate || self.is_live()
    }

    fn report(&mut self, err: &CompileError) {
        let fragment = html::line_error(&self.source, self.line, &err.to_string());
        self.html.push_str(&fragment);
    }

    /// Blocks still open at the end of the document have no line to point at.
    fn report_unclosed(&mut self, block: UnclosedBlock) {
        let err = CompileError::from(block);
        self.html.push_str(&html::error_paragraph(&err.to_string()));
    }
}

/// Compiles worksheets with a borrowed engine.
///
/// Settings persist across passes on the same compiler, so a `#round` in one
/// pass carries over to the next, like it would in an editor session.
pub struct Compiler<'a> {
    engine: &'a mut dyn MathEngine,
    plots: Option<&'a mut dyn PlotRenderer>,
    settings: Settings,
    cancel: CancelToken,
}

impl<'a> Compiler<'a> {
    pub fn new(engine: &'a mut dyn MathEngine, settings: Settings) -> Self {
        Self {
            engine,
            plots: None,
            settings,
            cancel: CancelToken::new(),
        }
    }

    /// Use `plots` for `$plot` and `$map` lines.
    pub fn with_plot_renderer(mut self, plots: &'a mut dyn PlotRenderer) -> Self {
        self.plots = Some(plots);
        self
    }

    /// Share a cancellation flag with another thread.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Compile `source` to HTML.
    ///
    /// With `calculate` unset the pass renders a preview: every branch and
    /// loop body is shown once, with directive labels, and nothing is
    /// evaluated. `inputs` supplies values for `?` placeholders in order.
    pub fn compile(&mut self, source: &str, calculate: bool, inputs: &[String]) -> String {
        let lines = split_lines(source);
        let mut pass = Pass::new(calculate, inputs, &self.settings, lines.len());
        tracing::debug!(lines = lines.len(), calculate, "Compiling worksheet");

        self.engine.set_enabled(calculate);
        self.engine
            .set_variable("Units", self.settings.units_factor());

        let outcome = self.run(&mut pass, &lines);
        if outcome == Outcome::Completed {
            if pass.conditions.depth() > 0 {
                pass.report_unclosed(UnclosedBlock::If);
            }
            if !pass.loops.is_empty() {
                pass.report_unclosed(UnclosedBlock::Repeat);
            }
        }
        html::apply_units(&mut pass.html, &self.settings.units, calculate);

        tracing::debug!(?outcome, bytes = pass.html.len(), "Worksheet compiled");
        pass.html
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.engine.is_cancelled()
    }

    fn run(&mut self, pass: &mut Pass, lines: &[&str]) -> Outcome {
        let mut cursor = 0;
        while cursor < lines.len() {
            if self.is_cancelled() {
                tracing::warn!(line = cursor + 1, "Compilation cancelled");
                return Outcome::Cancelled;
            }
            let index = cursor;
            cursor += 1;
            pass.line = index + 1;

            let result = catch_unwind(AssertUnwindSafe(|| {
                self.compile_line(pass, lines[index], index)
            }))
            .unwrap_or_else(|payload| Err(CompileError::unexpected(panic_message(&*payload))));

            match result {
                Ok(Flow::Next) => {}
                Ok(Flow::Jump(next)) => cursor = next,
                Ok(Flow::Stop) => return Outcome::Stopped,
                Err(err) if err.is_fatal() => {
                    tracing::warn!(line = pass.line, error = %err, "Compilation aborted");
                    pass.html.push_str(&html::error_paragraph(&err.to_string()));
                    return Outcome::Aborted;
                }
                Err(err) => pass.report(&err),
            }
        }
        Outcome::Completed
    }

    fn compile_line(&mut self, pass: &mut Pass, raw: &str, index: usize) -> CompileResult<Flow> {
        let id = if pass.loops.is_first_iteration() {
            html::line_id(pass.line)
        } else {
            String::new()
        };
        let s = raw.trim();
        pass.source = s.to_string();

        if s.is_empty() {
            if pass.visible && pass.renders() {
                pass.html.push_str(&format!("<p{id}>&nbsp;</p>\n"));
            }
            return Ok(Flow::Next);
        }

        let directive = Directive::classify(s);
        if directive != Directive::None {
            tracing::trace!(line = pass.line, ?directive, "Directive");
        }
        if directive.is_mode_toggle() {
            self.apply_mode(pass, directive);
            return Ok(Flow::Next);
        }
        match directive {
            Directive::Round => return self.round(pass, s).map(|_| Flow::Next),
            Directive::Repeat => return self.repeat(pass, s, index, &id),
            Directive::Loop => return self.close_loop(pass, &id),
            Directive::Break => return Ok(self.break_loop(pass, &id)),
            Directive::Continue => return self.continue_loop(pass, &id),
            _ => {}
        }

        if let Some(kind) = PlotKind::detect(&s.to_lowercase()) {
            self.plot(pass, kind, s, &id)?;
            return Ok(Flow::Next);
        }

        pass.conditions.enter(directive)?;
        self.content(pass, s, directive, &id)?;
        Ok(Flow::Next)
    }

    fn apply_mode(&mut self, pass: &mut Pass, directive: Directive) {
        match directive {
            Directive::Hide => pass.visible = false,
            Directive::Show => pass.visible = true,
            Directive::Pre => pass.visible = !pass.calculate,
            Directive::Post => pass.visible = pass.calculate,
            Directive::ValueOnly => pass.mode = OutputMode::ValueOnly,
            Directive::Equation => pass.mode = OutputMode::Equation,
            Directive::NoCalc => pass.mode = OutputMode::NoCalc,
            Directive::Degrees => self.engine.set_angle_mode(AngleMode::Degrees),
            Directive::Radians => self.engine.set_angle_mode(AngleMode::Radians),
            Directive::Gradians => self.engine.set_angle_mode(AngleMode::Gradians),
            // Variable scoping is the engine's business; the lines are consumed.
            _ => {}
        }
    }

    /// `#round n` or `#round expression`.
    fn round(&mut self, pass: &mut Pass, s: &str) -> CompileResult<()> {
        let argument = argument(s, Directive::Round);
        if argument.is_empty() {
            return Ok(());
        }
        let decimals = match argument.parse::<i64>() {
            Ok(n) => n,
            Err(_) if pass.calculate => {
                let value = self.evaluate(pass, argument)?;
                value.re.round() as i64
            }
            Err(_) => return Ok(()),
        };
        let decimals = decimals.clamp(0, MAX_DECIMALS) as u32;
        self.settings.decimals = decimals;
        Ok(())
    }

    fn repeat(&mut self, pass: &mut Pass, s: &str, index: usize, id: &str) -> CompileResult<Flow> {
        let expression = argument(s, Directive::Repeat);
        if pass.calculate {
            if !pass.conditions.is_satisfied() {
                return Ok(Flow::Next);
            }
            if pass.loops.is_broken() {
                pass.loops.open(index, Some(0), &pass.conditions);
                return Ok(Flow::Next);
            }
            let count = if expression.is_empty() {
                Ok(None)
            } else {
                self.iteration_count(pass, expression).map(Some)
            };
            match count {
                Ok(count) => {
                    pass.loops.open(index, count, &pass.conditions);
                    tracing::trace!(line = pass.line, ?count, depth = pass.loops.len(), "Loop opened");
                }
                Err(err) => {
                    // The matching #loop must still find a frame to close.
                    pass.loops.open(index, Some(0), &pass.conditions);
                    return Err(err.into());
                }
            }
        } else if pass.visible {
            if expression.is_empty() {
                pass.html
                    .push_str(&format!("<p{id} class=\"cond\">#repeat</p><div class=\"indent\">"));
            } else {
                let parsed = self.engine.parse(expression, &mut pass.inputs);
                let label = match &parsed {
                    Ok(()) => format!(" {}", self.engine.to_html()),
                    Err(_) => String::new(),
                };
                pass.html.push_str(&format!(
                    "<p{id}><span class=\"cond\">#repeat</span>{label}</p><div class=\"indent\">"
                ));
                parsed?;
            }
        }
        Ok(Flow::Next)
    }

    fn iteration_count(&mut self, pass: &mut Pass, expression: &str) -> CalculationResult<usize> {
        let value = self.evaluate(pass, expression)?.re;
        if value.is_nan() || value < 0.0 {
            return Err(CalculationError::new(format!(
                "Invalid number of iterations: {value}."
            )));
        }
        if value > f64::from(i32::MAX) {
            return Err(CalculationError::new(format!(
                "Number of iterations exceeds the maximum {}.",
                i32::MAX
            )));
        }
        Ok(value.round() as usize)
    }

    fn close_loop(&mut self, pass: &mut Pass, id: &str) -> CompileResult<Flow> {
        if pass.calculate {
            if pass.conditions.is_satisfied() {
                if let Some(next) = pass.loops.close(&pass.conditions)? {
                    return Ok(Flow::Jump(next));
                }
            }
        } else if pass.visible {
            pass.html
                .push_str(&format!("</div><p{id} class=\"cond\">#loop</p>"));
        }
        Ok(Flow::Next)
    }

    fn break_loop(&mut self, pass: &mut Pass, id: &str) -> Flow {
        if pass.calculate {
            if pass.is_live() && pass.loops.stop() == BreakOutcome::Document {
                return Flow::Stop;
            }
        } else if pass.visible {
            pass.html
                .push_str(&format!("<p{id} class=\"cond\">#break</p>"));
        }
        Flow::Next
    }

    fn continue_loop(&mut self, pass: &mut Pass, id: &str) -> CompileResult<Flow> {
        if pass.calculate {
            if pass.is_live() {
                if let Some(next) = pass.loops.skip(&mut pass.conditions)? {
                    return Ok(Flow::Jump(next));
                }
            }
        } else if pass.visible {
            pass.html
                .push_str(&format!("<p{id} class=\"cond\">#continue</p>"));
        }
        Ok(Flow::Next)
    }

    fn plot(&mut self, pass: &mut Pass, kind: PlotKind, s: &str, id: &str) -> CompileResult<()> {
        if !(pass.visible && pass.renders()) {
            return Ok(());
        }
        let Some(plots) = self.plots.as_deref_mut() else {
            return Err(CalculationError::new("Plotting is not available.").into());
        };
        self.engine.set_plotting(true);
        let rendered = plots.render(kind, s, pass.calculate, &mut *self.engine);
        self.engine.set_plotting(false);
        pass.html.push_str(&html::insert_attribute(&rendered?, id));
        Ok(())
    }

    /// Content lines, including `#if`-family lines and their conditions.
    fn content(&mut self, pass: &mut Pass, s: &str, directive: Directive, id: &str) -> CompileResult<()> {
        let calculate = pass.calculate;
        if !pass.renders() {
            // Keep later placeholders lined up with their values.
            pass.inputs.skip(count_placeholders(s));
            return Ok(());
        }

        let keyword_len = if directive.is_condition() {
            directive.keyword_len()
        } else {
            0
        };

        if keyword_len == s.len() {
            if pass.conditions.is_pending() {
                pass.conditions.reject();
                return Err(StructureKind::EmptyCondition.into());
            }
            if pass.visible && !calculate {
                let label = pass.conditions.keyword_html();
                let reopen = if directive == Directive::Else {
                    "<div class=\"indent\">"
                } else {
                    ""
                };
                pass.html
                    .push_str(&format!("</div><p{id}>{label}</p>{reopen}"));
            }
            return Ok(());
        }

        // A branch of this group already matched; later ones are not evaluated.
        if keyword_len > 0 && calculate && pass.conditions.is_found() && pass.conditions.is_pending() {
            pass.conditions.reject();
            return Ok(());
        }

        let mut segments = tokenize(s, keyword_len, pass.mode == OutputMode::ValueOnly);
        let first = segments.first().map_or(SegmentKind::Text, |seg| seg.kind);
        let is_output = pass.visible && (!calculate || keyword_len == 0);

        if is_output {
            if matches!(directive, Directive::ElseIf | Directive::EndIf) {
                pass.html.push_str("</div>");
            }
            match first {
                SegmentKind::Heading => pass.html.push_str(&format!("<h3{id}>")),
                SegmentKind::Markup => segments[0].text = html::insert_attribute(&segments[0].text, id),
                _ => pass.html.push_str(&format!("<p{id}>")),
            }
            if keyword_len > 0 && !calculate {
                pass.html.push_str(&pass.conditions.keyword_html());
            }
        }

        let is_condition = keyword_len > 0;
        let mut value = None;
        for segment in &segments {
            if segment.kind != SegmentKind::Expression {
                if is_output {
                    pass.html.push_str(&segment.text);
                }
                continue;
            }
            match self.expression(pass, &segment.text, is_output, is_condition) {
                Ok(result) => value = result.or(value),
                Err(err) => {
                    value = None;
                    let text = segment.text.trim();
                    let text = if !calculate && text.contains('?') {
                        text.replace('?', html::INPUT_CONTROL)
                    } else {
                        text.to_string()
                    };
                    pass.html
                        .push_str(&html::line_error(&text, pass.line, &err.message));
                }
            }
        }

        if is_output {
            match first {
                SegmentKind::Heading => pass.html.push_str("</h3>"),
                SegmentKind::Markup => {}
                _ => pass.html.push_str("</p>"),
            }
            if matches!(directive, Directive::If | Directive::ElseIf) {
                pass.html.push_str("<div class=\"indent\">");
            }
            pass.html.push('\n');
        }

        if pass.conditions.is_pending() {
            if !calculate {
                pass.conditions.skip_check();
            } else if let Some(value) = value {
                pass.conditions.check(value)?;
            } else {
                // The condition failed to evaluate and was reported above.
                pass.conditions.reject();
            }
        }
        Ok(())
    }

    /// Parse, maybe calculate and maybe render one expression.
    ///
    /// Returns the calculated value when the expression was calculated.
    fn expression(
        &mut self,
        pass: &mut Pass,
        text: &str,
        is_output: bool,
        is_condition: bool,
    ) -> CalculationResult<Option<Complex>> {
        self.engine.parse(text, &mut pass.inputs)?;
        let calculated = pass.calculate && (pass.mode != OutputMode::NoCalc || is_condition);
        if calculated {
            self.engine.calculate()?;
        }
        if is_output {
            let rendered = if pass.mode == OutputMode::ValueOnly && pass.calculate {
                self.engine.format_result(self.settings.decimals)
            } else if self.settings.format_equations {
                format!(
                    "<span class=\"eq\" data-xml='{}'>{}</span>",
                    self.engine.to_xml(),
                    self.engine.to_html()
                )
            } else {
                format!("<span class=\"eq\">{}</span>", self.engine.to_html())
            };
            pass.html.push_str(&rendered);
        }
        Ok(calculated.then(|| self.engine.result()))
    }

    fn evaluate(&mut self, pass: &mut Pass, expression: &str) -> CalculationResult<Complex> {
        self.engine.parse(expression, &mut pass.inputs)?;
        self.engine.calculate()?;
        Ok(self.engine.result())
    }
}

/// Text after a directive keyword, trimmed.
fn argument(s: &str, directive: Directive) -> &str {
    s.get(directive.keyword_len()..).unwrap_or("").trim()
}

/// Split on `\r\n`, `\r` or `\n`. A final line break does not start a line.
fn split_lines(source: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = source;
    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(&rest[..pos]);
        let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + skip..];
    }
    if !rest.is_empty() {
        lines.push(rest);
    }
    lines
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown failure.".to_string()
    }
}
