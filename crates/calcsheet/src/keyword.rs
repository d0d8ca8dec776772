/*
 * keyword.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive recognition.
//!
//! A directive is a line that starts with `#` followed by one of a fixed set
//! of words. Anything else that happens to start with `#` is ordinary
//! content and is rendered as such.

/// The kind of directive that leads a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    None,
    Hide,
    Show,
    Pre,
    Post,
    ValueOnly,
    Equation,
    NoCalc,
    Degrees,
    Radians,
    Gradians,
    Repeat,
    Loop,
    Break,
    Continue,
    If,
    ElseIf,
    Else,
    EndIf,
    Local,
    Global,
    Round,
}

/// Directive literals, longest first wherever one is a prefix of another.
const KEYWORDS: &[(&str, Directive)] = &[
    ("#else if", Directive::ElseIf),
    ("#end if", Directive::EndIf),
    ("#continue", Directive::Continue),
    ("#repeat", Directive::Repeat),
    ("#global", Directive::Global),
    ("#local", Directive::Local),
    ("#round", Directive::Round),
    ("#break", Directive::Break),
    ("#else", Directive::Else),
    ("#loop", Directive::Loop),
    ("#hide", Directive::Hide),
    ("#show", Directive::Show),
    ("#post", Directive::Post),
    ("#pre", Directive::Pre),
    ("#val", Directive::ValueOnly),
    ("#equ", Directive::Equation),
    ("#noc", Directive::NoCalc),
    ("#deg", Directive::Degrees),
    ("#rad", Directive::Radians),
    ("#gra", Directive::Gradians),
    ("#if", Directive::If),
];

impl Directive {
    /// Classify a line. Matching is case-insensitive.
    pub fn classify(line: &str) -> Directive {
        if !line.starts_with('#') {
            return Directive::None;
        }
        for (literal, directive) in KEYWORDS {
            let Some(head) = line.get(..literal.len()) else {
                continue;
            };
            if head.eq_ignore_ascii_case(literal) && is_boundary(&line[literal.len()..]) {
                return *directive;
            }
        }
        Directive::None
    }

    /// The literal keyword, as written in canonical form.
    pub fn keyword(&self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, d)| d == self)
            .map_or("", |(literal, _)| literal)
    }

    /// Byte length of the keyword. Argument text starts right after it.
    pub fn keyword_len(&self) -> usize {
        self.keyword().len()
    }

    pub fn is_condition(&self) -> bool {
        matches!(
            self,
            Directive::If | Directive::ElseIf | Directive::Else | Directive::EndIf
        )
    }

    /// Directives that only toggle a mode flag and never render anything.
    pub fn is_mode_toggle(&self) -> bool {
        matches!(
            self,
            Directive::Hide
                | Directive::Show
                | Directive::Pre
                | Directive::Post
                | Directive::ValueOnly
                | Directive::Equation
                | Directive::NoCalc
                | Directive::Degrees
                | Directive::Radians
                | Directive::Gradians
                | Directive::Local
                | Directive::Global
        )
    }
}

fn is_boundary(rest: &str) -> bool {
    rest.chars()
        .next()
        .is_none_or(|c| !(c.is_alphanumeric() || c == '_'))
}
