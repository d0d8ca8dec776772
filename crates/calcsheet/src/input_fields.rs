/*
 * input_fields.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Values for `?` placeholders.
//!
//! Placeholders are matched to values by position in the document. The
//! cursor moves for every placeholder the pass meets, rendered or not, so
//! the n-th `?` of the sheet always gets the n-th value.

use crate::engine::InputSource;

/// What an empty queue hands out.
pub const PLACEHOLDER: &str = "?";

/// Ordered placeholder values with a wrapping read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputFieldQueue {
    values: Vec<String>,
    cursor: usize,
}

impl InputFieldQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            cursor: 0,
        }
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.values.push(value.into());
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.cursor = 0;
    }

    /// All values, in placeholder order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Take the next value, wrapping to the first one when exhausted.
    pub fn next_value(&mut self) -> String {
        if self.values.is_empty() {
            return PLACEHOLDER.to_string();
        }
        if self.cursor >= self.values.len() {
            self.cursor = 0;
        }
        let value = self.values[self.cursor].clone();
        self.cursor += 1;
        value
    }

    /// Move past `count` placeholders without using their values.
    pub fn skip(&mut self, count: usize) {
        for _ in 0..count {
            self.next_value();
        }
    }
}

impl InputSource for InputFieldQueue {
    fn next_input(&mut self) -> String {
        self.next_value()
    }
}
