/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Calculation worksheet interpreter.
//!
//! A worksheet is plain text where every line is narrative, a heading, a
//! math expression or a mix of them:
//!
//! ```text
//! "Beam check"
//! 'Span' L = 6 'm'
//! #if L > 5
//!     'Long span, use the heavy section'
//! #else
//!     'Standard section'
//! #end if
//! #repeat 3
//!     i = i + 1
//! #loop
//! ```
//!
//! This crate turns such a sheet into HTML. It supports:
//!
//! - Text (`'...'`), headings (`"..."`) and raw HTML (`'<img ...>'`)
//! - Conditionals: `#if`, `#else if`, `#else`, `#end if`
//! - Loops: `#repeat n` ... `#loop`, with `#break` and `#continue`
//! - Output switches: `#hide`/`#show`, `#pre`/`#post`, `#val`/`#equ`/`#noc`
//! - Angle units `#deg`/`#rad`/`#gra` and precision `#round n`
//! - Positional `?` input fields
//! - `$plot` / `$map` lines handed to a plot renderer
//!
//! # Architecture
//!
//! The interpreter does not know any math. Expressions are passed to a
//! [`MathEngine`] supplied by the caller, plots to a [`PlotRenderer`]. Errors
//! never escape a pass: each one is rendered in place as an error paragraph
//! that links to its line.
//!
//! # Example
//!
//! ```ignore
//! use calcsheet::{Compiler, Settings};
//!
//! let mut engine = MyEngine::new();
//! let html = Compiler::new(&mut engine, Settings::default())
//!     .compile("'Area' A = 2*3", true, &[]);
//! ```

pub mod calculator;
pub mod compiler;
pub mod condition;
pub mod engine;
pub mod error;
pub mod html;
pub mod input_fields;
pub mod keyword;
pub mod loops;
pub mod plot;
pub mod settings;
pub mod tokenizer;

// Re-export main types at crate root
pub use calculator::Calculator;
pub use compiler::{Compiler, OutputMode};
pub use condition::ConditionState;
pub use engine::{
    AngleMode, CalculationError, CalculationResult, CancelToken, Complex, InputSource, MathEngine,
};
pub use error::{CompileError, CompileResult, StructureKind, UnclosedBlock};
pub use input_fields::InputFieldQueue;
pub use keyword::Directive;
pub use loops::{LoopState, UNBOUNDED_ITERATIONS};
pub use plot::{PlotKind, PlotRenderer};
pub use settings::{Settings, SettingsError};
pub use tokenizer::{Segment, SegmentKind, tokenize};
