/*
 * tokenizer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Splitting a content line into segments.
//!
//! Single quotes delimit text, double quotes delimit headings and everything
//! outside quotes is a math expression:
//!
//! ```text
//! 'Area of the section' A = b*h 'with' "Results"
//! ```
//!
//! There is no nesting and no escaping. A quote that does not close the open
//! region is plain content inside it.

/// What a segment contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Expression,
    Heading,
    Text,
    /// Text that starts with `<`; passed through as raw HTML.
    Markup,
}

/// A classified run of characters within one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub kind: SegmentKind,
}

impl Segment {
    pub fn new(text: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// Tokenize `line` starting at byte offset `start`.
///
/// In value-only mode text and headings are not padded with spaces, since
/// results are meant to be printed bare.
pub fn tokenize(line: &str, start: usize, value_only: bool) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut open: Option<char> = None;

    for c in line.get(start..).unwrap_or("").chars() {
        if c == '\'' || c == '"' {
            match open {
                Some(delimiter) if delimiter != c => buffer.push(c),
                Some(_) => {
                    // Closing: empty text and headings still take up space.
                    push_segment(&mut segments, std::mem::take(&mut buffer), open, value_only);
                    open = None;
                }
                None => {
                    if !buffer.is_empty() {
                        push_segment(&mut segments, std::mem::take(&mut buffer), open, value_only);
                    }
                    open = Some(c);
                }
            }
        } else {
            buffer.push(c);
        }
    }
    if !buffer.is_empty() {
        push_segment(&mut segments, buffer, open, value_only);
    }
    segments
}

fn push_segment(segments: &mut Vec<Segment>, text: String, open: Option<char>, value_only: bool) {
    let kind = match open {
        None => SegmentKind::Expression,
        Some('"') => SegmentKind::Heading,
        Some(_) => SegmentKind::Text,
    };

    if kind == SegmentKind::Expression {
        if text.trim().is_empty() {
            return;
        }
        segments.push(Segment::new(text, kind));
        return;
    }

    let text = if text.is_empty() {
        " ".to_string()
    } else if value_only {
        text
    } else if segments.is_empty() {
        format!("{text} ")
    } else {
        format!(" {text} ")
    };

    let kind = if kind == SegmentKind::Text && text.trim_start().starts_with('<') {
        SegmentKind::Markup
    } else {
        kind
    };
    segments.push(Segment::new(text, kind));
}

/// Count `?` placeholders outside quoted regions.
///
/// Any quote toggles the expression state here, which is enough to find the
/// placeholders an engine would have consumed on a line that is skipped.
pub fn count_placeholders(line: &str) -> usize {
    let mut in_expression = true;
    let mut count = 0;
    for c in line.chars() {
        match c {
            '\'' | '"' => in_expression = !in_expression,
            '?' if in_expression => count += 1,
            _ => {}
        }
    }
    count
}
