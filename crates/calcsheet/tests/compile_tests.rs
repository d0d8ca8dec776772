/*
 * compile_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end compilation tests against the reference arithmetic engine.
 */

use calcsheet::{
    AngleMode, CalculationResult, CancelToken, Compiler, Complex, InputSource, MathEngine, PlotKind,
    Settings,
};
use calcsheet_testkit::{ArithmeticEngine, StubPlotRenderer};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test-fixtures")
        .join(name)
}

/// Route compiler logs to the test output. Set `RUST_LOG=calcsheet=trace`
/// to see every directive.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn calculate(source: &str) -> String {
    init_tracing();
    let mut engine = ArithmeticEngine::new();
    Compiler::new(&mut engine, Settings::default()).compile(source, true, &[])
}

fn preview(source: &str) -> String {
    init_tracing();
    let mut engine = ArithmeticEngine::new();
    Compiler::new(&mut engine, Settings::default()).compile(source, false, &[])
}

fn line_error(source: &str, line: usize, message: &str) -> String {
    format!(
        "<p class=\"err\">Error in \"{source}\" on line [<a href=\"#0\" data-text=\"{line}\">{line}</a>]: {message}</p>"
    )
}

#[test]
fn test_false_condition_takes_else() {
    let html = calculate("#if 0\n'a'\n#else\n'b'\n#end if");
    assert_eq!(html, "<p id=\"line4\">b </p>\n");
}

#[test]
fn test_true_condition_skips_else() {
    let html = calculate("#if 1\n'a'\n#else\n'b'\n#end if");
    assert_eq!(html, "<p id=\"line2\">a </p>\n");
}

#[test]
fn test_else_if_chain_picks_first_match() {
    let source = "x = 5\n#if x < 3\n'small'\n#else if x < 10\n'medium'\n#else if x < 100\n'large'\n#else\n'huge'\n#end if";
    let html = calculate(source);
    assert_eq!(
        html,
        "<p id=\"line1\"><span class=\"eq\">x = 5 = 5</span></p>\n<p id=\"line5\">medium </p>\n"
    );
}

#[test]
fn test_nested_conditions() {
    let source = "#if 1\n#if 0\n'a'\n#else\n'b'\n#end if\n#else\n'c'\n#end if";
    assert_eq!(calculate(source), "<p id=\"line5\">b </p>\n");
}

#[test]
fn test_repeat_suppresses_ids_after_first_iteration() {
    let html = calculate("i = 0\n#repeat 3\ni = i + 1\n#loop\n'done' i");
    assert_eq!(
        html,
        concat!(
            "<p id=\"line1\"><span class=\"eq\">i = 0 = 0</span></p>\n",
            "<p id=\"line3\"><span class=\"eq\">i = i + 1 = 1</span></p>\n",
            "<p><span class=\"eq\">i = i + 1 = 2</span></p>\n",
            "<p><span class=\"eq\">i = i + 1 = 3</span></p>\n",
            "<p id=\"line5\">done <span class=\"eq\">i = 3</span></p>\n",
        )
    );
}

#[test]
fn test_zero_repeat_skips_body() {
    assert_eq!(calculate("#repeat 0\n'a'\n#loop\n'b'"), "<p id=\"line4\">b </p>\n");
}

#[test]
fn test_break_leaves_loop() {
    let source = "i = 0\n#repeat\ni = i + 1\n#if i == 2\n#break\n#end if\n#loop\n'end' i";
    assert_eq!(
        calculate(source),
        concat!(
            "<p id=\"line1\"><span class=\"eq\">i = 0 = 0</span></p>\n",
            "<p id=\"line3\"><span class=\"eq\">i = i + 1 = 1</span></p>\n",
            "<p><span class=\"eq\">i = i + 1 = 2</span></p>\n",
            "<p id=\"line8\">end <span class=\"eq\">i = 2</span></p>\n",
        )
    );
}

#[test]
fn test_break_outside_loop_ends_document() {
    assert_eq!(calculate("'a'\n#break\n'b'\n#if 1"), "<p id=\"line1\">a </p>\n");
}

#[test]
fn test_continue_skips_rest_of_iteration() {
    let source = "i = 0\n#repeat 3\ni = i + 1\n#if i == 2\n#continue\n#end if\n'i' i\n#loop";
    assert_eq!(
        calculate(source),
        concat!(
            "<p id=\"line1\"><span class=\"eq\">i = 0 = 0</span></p>\n",
            "<p id=\"line3\"><span class=\"eq\">i = i + 1 = 1</span></p>\n",
            "<p id=\"line7\">i <span class=\"eq\">i = 1</span></p>\n",
            "<p><span class=\"eq\">i = i + 1 = 2</span></p>\n",
            "<p><span class=\"eq\">i = i + 1 = 3</span></p>\n",
            "<p>i <span class=\"eq\">i = 3</span></p>\n",
        )
    );
}

#[test]
fn test_continue_on_last_iteration_keeps_blocks_balanced() {
    let source = "#repeat 1\n#if 1\n#continue\n#end if\n'x'\n#loop\n'after'";
    assert_eq!(calculate(source), "<p id=\"line7\">after </p>\n");
}

#[test]
fn test_entangled_blocks() {
    let html = calculate("#repeat 2\n#if 1\n#loop\n#end if");
    assert_eq!(
        html,
        format!(
            "{}<p class=\"err\">Error: \"#repeat\" block not closed. Missing \"#loop\".</p>",
            line_error(
                "#loop",
                3,
                "Entangled \"#if - #end if\" and \"#repeat - #loop\" blocks."
            )
        )
    );
}

#[test]
fn test_continue_with_open_if_is_entangled() {
    let html = calculate("#repeat 3\n#if 1\n#continue\n#loop");
    assert_eq!(
        html,
        format!(
            "{}<p class=\"err\">Error: \"#if\" block not closed. Missing \"#end if\".</p>",
            line_error(
                "#loop",
                4,
                "Entangled \"#if - #end if\" and \"#repeat - #loop\" blocks."
            )
        )
    );
}

#[test]
fn test_lines_after_entangled_stopped_loop_render() {
    let html = calculate("#repeat 3\n#if 1\n#continue\n#loop\n'after'");
    assert_eq!(
        html,
        format!(
            "{}<p id=\"line5\">after </p>\n<p class=\"err\">Error: \"#if\" block not closed. Missing \"#end if\".</p>",
            line_error(
                "#loop",
                4,
                "Entangled \"#if - #end if\" and \"#repeat - #loop\" blocks."
            )
        )
    );
}

#[test]
fn test_repeat_count_above_limit() {
    let html = calculate("#repeat 3000000000\n'a'\n#loop\n'b'");
    assert_eq!(
        html,
        format!(
            "{}<p id=\"line4\">b </p>\n",
            line_error(
                "#repeat 3000000000",
                1,
                "Number of iterations exceeds the maximum 2147483647."
            )
        )
    );
}

#[test]
fn test_failing_repeat_count_keeps_loop_balanced() {
    let html = calculate("#repeat 1/0\n'a'\n#loop\n'b'");
    assert_eq!(
        html,
        format!(
            "{}<p id=\"line4\">b </p>\n",
            line_error("#repeat 1/0", 1, "Division by zero.")
        )
    );
}

#[test]
fn test_structure_errors_are_reported_inline() {
    let html = calculate("#else\n#loop\n#continue\n'still here'");
    assert_eq!(
        html,
        format!(
            "{}{}{}<p id=\"line4\">still here </p>\n",
            line_error("#else", 1, "Condition block not initialized with \"#if\"."),
            line_error("#loop", 2, "\"#loop\" without a corresponding \"#repeat\"."),
            line_error(
                "#continue",
                3,
                "\"#continue\" without a corresponding \"#repeat\"."
            ),
        )
    );
}

#[test]
fn test_duplicate_else() {
    let html = calculate("#if 0\n#else\n#else\n#end if");
    assert_eq!(
        html,
        line_error("#else", 3, "Duplicate \"#else\" in condition block.")
    );
}

#[test]
fn test_empty_condition_rejects_branch() {
    let html = calculate("#if\n'a'\n#end if");
    assert_eq!(html, line_error("#if", 1, "Condition cannot be empty."));
}

#[test]
fn test_unclosed_if() {
    assert_eq!(
        calculate("#if 1\n'a'"),
        "<p id=\"line2\">a </p>\n<p class=\"err\">Error: \"#if\" block not closed. Missing \"#end if\".</p>"
    );
}

#[test]
fn test_segments_render_in_source_order() {
    assert_eq!(
        calculate("'a' 1 \"b\" 2 'c'"),
        "<p id=\"line1\">a <span class=\"eq\">1 = 1</span> b <span class=\"eq\">2 = 2</span> c </p>\n"
    );
}

#[test]
fn test_expression_error_keeps_rest_of_document() {
    let html = calculate("'a' 1/0\n'b'");
    assert_eq!(
        html,
        format!(
            "<p id=\"line1\">a {}</p>\n<p id=\"line2\">b </p>\n",
            line_error("1/0", 1, "Division by zero.")
        )
    );
}

#[test]
fn test_failed_condition_is_not_taken() {
    let html = calculate("#if y\n'a'\n#else\n'b'\n#end if");
    assert_eq!(
        html,
        format!(
            "{}<p id=\"line4\">b </p>\n",
            line_error("y", 1, "Undefined variable \"y\".")
        )
    );
}

#[test]
fn test_skipped_line_consumes_inputs() {
    let mut engine = ArithmeticEngine::new();
    let inputs = vec!["1".to_string(), "2".to_string(), "3".to_string()];
    let html = Compiler::new(&mut engine, Settings::default()).compile(
        "#if 0\na = ? + ?\n#end if\nb = ?",
        true,
        &inputs,
    );
    assert_eq!(html, "<p id=\"line4\"><span class=\"eq\">b = 3 = 3</span></p>\n");
    assert_eq!(engine.variable("a"), None);
}

#[test]
fn test_preview_shows_every_branch_without_calculating() {
    let mut engine = ArithmeticEngine::new();
    let html = Compiler::new(&mut engine, Settings::default())
        .compile("#if x > 1\n'a'\n#else\n'b'\n#end if", false, &[]);
    assert_eq!(
        html,
        concat!(
            "<p id=\"line1\"><span class=\"cond\">#if </span><span class=\"eq\">x &gt; 1</span></p><div class=\"indent\">\n",
            "<p id=\"line2\">a </p>\n",
            "</div><p id=\"line3\"><span class=\"cond\">#else</span></p><div class=\"indent\">",
            "<p id=\"line4\">b </p>\n",
            "</div><p id=\"line5\"><span class=\"cond\">#end if</span></p>",
        )
    );
    assert_eq!(engine.calculations, 0);
}

#[test]
fn test_preview_shows_loop_markers_once() {
    let html = preview("#repeat 3\n'body'\n#break\n#loop");
    assert_eq!(
        html,
        concat!(
            "<p id=\"line1\"><span class=\"cond\">#repeat</span> 3</p><div class=\"indent\">",
            "<p id=\"line2\">body </p>\n",
            "<p id=\"line3\" class=\"cond\">#break</p>",
            "</div><p id=\"line4\" class=\"cond\">#loop</p>",
        )
    );
}

#[test]
fn test_pre_and_post_sections() {
    let source = "#pre\n'p'\n#post\n'q'\n#show\n'r'";
    assert_eq!(
        calculate(source),
        "<p id=\"line4\">q </p>\n<p id=\"line6\">r </p>\n"
    );
    assert_eq!(
        preview(source),
        "<p id=\"line2\">p </p>\n<p id=\"line6\">r </p>\n"
    );
}

#[test]
fn test_hidden_lines_still_calculate() {
    assert_eq!(
        calculate("#hide\nx = 5\n#show\nx"),
        "<p id=\"line4\"><span class=\"eq\">x = 5</span></p>\n"
    );
}

#[test]
fn test_no_calc_mode_renders_equation_only() {
    let mut engine = ArithmeticEngine::new();
    let html = Compiler::new(&mut engine, Settings::default()).compile("#noc\n2 + 3\n#equ\n4", true, &[]);
    assert_eq!(
        html,
        "<p id=\"line2\"><span class=\"eq\">2 + 3</span></p>\n<p id=\"line4\"><span class=\"eq\">4 = 4</span></p>\n"
    );
    assert_eq!(engine.calculations, 1);
}

#[test]
fn test_round_with_expression() {
    assert_eq!(
        calculate("d = 3\n#hide\n#round d\n#show\n#val\n1/3"),
        "<p id=\"line1\"><span class=\"eq\">d = 3 = 3</span></p>\n<p id=\"line6\">0.333</p>\n"
    );
}

#[test]
fn test_plot_line_gets_id() {
    let mut engine = ArithmeticEngine::new();
    let mut plots = StubPlotRenderer::new();
    let html = Compiler::new(&mut engine, Settings::default())
        .with_plot_renderer(&mut plots)
        .compile("$Plot{x|0|1}\n$map{x*y|0|1|0|1}", true, &[]);
    assert_eq!(
        html,
        "<img class=\"plot\"  id=\"line1\"/><img class=\"map\"  id=\"line2\"/>"
    );
    assert_eq!(
        plots.requests,
        vec![
            (PlotKind::Chart, "$Plot{x|0|1}".to_string(), true),
            (PlotKind::Map, "$map{x*y|0|1|0|1}".to_string(), true),
        ]
    );
}

#[test]
fn test_plot_errors() {
    let source = "$plot{x|0|1}";
    assert_eq!(
        calculate(source),
        line_error(source, 1, "Plotting is not available.")
    );

    let mut engine = ArithmeticEngine::new();
    let mut plots = StubPlotRenderer::failing("Invalid plot limits.");
    let html = Compiler::new(&mut engine, Settings::default())
        .with_plot_renderer(&mut plots)
        .compile(source, true, &[]);
    assert_eq!(html, line_error(source, 1, "Invalid plot limits."));
}

#[test]
fn test_units_substitution() {
    let mut engine = ArithmeticEngine::new();
    let settings = Settings::default().with_units("cm");
    let html = Compiler::new(&mut engine, settings).compile("'L' 2 '%u'", true, &[]);
    assert_eq!(
        html,
        "<p id=\"line1\">L <span class=\"eq\">2 = 2</span> cm </p>\n"
    );
    assert_eq!(engine.variable("Units"), Some(100.0));
}

#[test]
fn test_unbounded_repeat_uses_iteration_cap() {
    let mut engine = ArithmeticEngine::new();
    let settings = Settings::default().with_max_iterations(10);
    let html = Compiler::new(&mut engine, settings).compile(
        "#hide\nn = 0\n#repeat\nn = n + 1\n#loop",
        true,
        &[],
    );
    assert_eq!(html, "");
    assert_eq!(engine.variable("n"), Some(10.0));
}

#[test]
fn test_fixture_with_settings_file() {
    let source = std::fs::read_to_string(fixture_path("loop_sum.txt")).unwrap();
    let settings = Settings::from_file(&fixture_path("settings.toml")).unwrap();
    assert_eq!(settings.units, "mm");

    let mut engine = ArithmeticEngine::new();
    let html = Compiler::new(&mut engine, settings).compile(&source, true, &[]);
    assert_eq!(
        html,
        concat!(
            "<h3 id=\"line1\">Sum of the first n integers </h3>\n",
            "<p id=\"line2\"><span class=\"eq\">n = 4 = 4</span></p>\n",
            "<p id=\"line3\"><span class=\"eq\">s = 0 = 0</span></p>\n",
            "<p id=\"line10\">Total <span class=\"eq\">s = 10</span></p>\n",
        )
    );
}

#[test]
fn test_cancel_from_another_thread() {
    let token = CancelToken::new();
    let remote = token.clone();
    let html = std::thread::scope(|scope| {
        let worker = scope.spawn(move || {
            let mut engine = CancellingEngine {
                inner: ArithmeticEngine::new(),
                after: 2,
                token: remote.clone(),
            };
            Compiler::new(&mut engine, Settings::default())
                .with_cancel_token(remote)
                .compile("#if 1\n5\n6\n7", true, &[])
        });
        worker.join().unwrap()
    });
    assert!(token.is_cancelled());
    // No unclosed-block error after a cancelled pass.
    assert_eq!(html, "<p id=\"line2\"><span class=\"eq\">5 = 5</span></p>\n");
}

/// Cancels the pass once `after` calculations have run.
struct CancellingEngine {
    inner: ArithmeticEngine,
    after: usize,
    token: CancelToken,
}

impl MathEngine for CancellingEngine {
    fn parse(
        &mut self,
        expression: &str,
        inputs: &mut dyn InputSource,
    ) -> CalculationResult<()> {
        self.inner.parse(expression, inputs)
    }

    fn calculate(&mut self) -> CalculationResult<()> {
        self.inner.calculate()?;
        if self.inner.calculations >= self.after {
            self.token.cancel();
        }
        Ok(())
    }

    fn result(&self) -> Complex {
        self.inner.result()
    }

    fn to_html(&self) -> String {
        self.inner.to_html()
    }

    fn to_xml(&self) -> String {
        self.inner.to_xml()
    }

    fn format_result(&self, decimals: u32) -> String {
        self.inner.format_result(decimals)
    }

    fn set_variable(&mut self, name: &str, value: f64) {
        self.inner.set_variable(name, value);
    }

    fn angle_mode(&self) -> AngleMode {
        self.inner.angle_mode()
    }

    fn set_angle_mode(&mut self, mode: AngleMode) {
        self.inner.set_angle_mode(mode);
    }
}
