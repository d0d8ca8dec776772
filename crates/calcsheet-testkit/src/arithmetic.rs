/*
 * arithmetic.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! A small real-number expression engine.

use calcsheet::{AngleMode, CalculationError, CalculationResult, Complex, InputSource, MathEngine};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Call(String, Box<Expr>),
    Assign(String, Box<Expr>),
}

const OPERATORS: &[&str] = &["<=", ">=", "==", "!=", "+", "-", "*", "/", "^", "<", ">", "="];
const FUNCTIONS: &[&str] = &["sqrt", "abs", "sin", "cos", "round"];

/// Reference engine for tests.
#[derive(Debug, Default)]
pub struct ArithmeticEngine {
    variables: HashMap<String, f64>,
    parsed: Option<Expr>,
    display: String,
    result: Complex,
    calculated: bool,
    angle: AngleMode,
    enabled: bool,
    plotting: bool,
    /// Number of successful `calculate` calls.
    pub calculations: usize,
}

impl ArithmeticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&self, name: &str) -> Option<f64> {
        self.variables.get(name).copied()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_plotting(&self) -> bool {
        self.plotting
    }

    fn eval(&mut self, expr: &Expr) -> CalculationResult<f64> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Var(name) => self
                .variables
                .get(name)
                .copied()
                .ok_or_else(|| CalculationError::new(format!("Undefined variable \"{name}\"."))),
            Expr::Neg(inner) => Ok(-self.eval(inner)?),
            Expr::Assign(name, value) => {
                let value = self.eval(value)?;
                self.variables.insert(name.clone(), value);
                Ok(value)
            }
            Expr::Call(name, arg) => {
                let x = self.eval(arg)?;
                let radians = match self.angle {
                    AngleMode::Degrees => x.to_radians(),
                    AngleMode::Radians => x,
                    AngleMode::Gradians => x * std::f64::consts::PI / 200.0,
                };
                match name.as_str() {
                    "sqrt" if x < 0.0 => Err(CalculationError::new("Square root of a negative number.")),
                    "sqrt" => Ok(x.sqrt()),
                    "abs" => Ok(x.abs()),
                    "sin" => Ok(radians.sin()),
                    "cos" => Ok(radians.cos()),
                    "round" => Ok(x.round()),
                    _ => Err(CalculationError::new(format!("Unknown function \"{name}\"."))),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                let truth = |c: bool| if c { 1.0 } else { 0.0 };
                match *op {
                    "+" => Ok(a + b),
                    "-" => Ok(a - b),
                    "*" => Ok(a * b),
                    "/" if b == 0.0 => Err(CalculationError::new("Division by zero.")),
                    "/" => Ok(a / b),
                    "^" => Ok(a.powf(b)),
                    "<" => Ok(truth(a < b)),
                    ">" => Ok(truth(a > b)),
                    "<=" => Ok(truth(a <= b)),
                    ">=" => Ok(truth(a >= b)),
                    "==" => Ok(truth(a == b)),
                    "!=" => Ok(truth(a != b)),
                    _ => Err(CalculationError::new(format!("Invalid operator \"{op}\"."))),
                }
            }
        }
    }
}

impl MathEngine for ArithmeticEngine {
    fn parse(&mut self, expression: &str, inputs: &mut dyn InputSource) -> CalculationResult<()> {
        self.parsed = None;
        self.calculated = false;
        let (tokens, display) = lex(expression, inputs)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.statement()?;
        if parser.pos != parser.tokens.len() {
            return Err(CalculationError::new(format!(
                "Unexpected symbol in \"{}\".",
                display
            )));
        }
        self.parsed = Some(expr);
        self.display = display;
        Ok(())
    }

    fn calculate(&mut self) -> CalculationResult<()> {
        let expr = self
            .parsed
            .clone()
            .ok_or_else(|| CalculationError::new("Nothing to calculate."))?;
        let value = self.eval(&expr)?;
        self.result = Complex::real(value);
        self.calculated = true;
        self.calculations += 1;
        Ok(())
    }

    fn result(&self) -> Complex {
        self.result
    }

    fn to_html(&self) -> String {
        let text = escape(&self.display);
        if self.calculated {
            format!("{text} = {}", self.result.re)
        } else {
            text
        }
    }

    fn to_xml(&self) -> String {
        format!("<math>{}</math>", escape(&self.display))
    }

    fn format_result(&self, decimals: u32) -> String {
        format!("{:.*}", decimals as usize, self.result.re)
    }

    fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }

    fn angle_mode(&self) -> AngleMode {
        self.angle
    }

    fn set_angle_mode(&mut self, mode: AngleMode) {
        self.angle = mode;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_plotting(&mut self, plotting: bool) {
        self.plotting = plotting;
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Tokenize, pulling a value for every `?`. Also returns the display text
/// with inputs filled in.
fn lex(expression: &str, inputs: &mut dyn InputSource) -> CalculationResult<(Vec<Token>, String)> {
    let mut tokens = Vec::new();
    let mut display = String::new();
    let text = expression.trim();
    let mut rest = text;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            display.push(c);
            rest = &rest[c.len_utf8()..];
            continue;
        }
        if c == '?' {
            let value = inputs.next_input();
            let number = value
                .trim()
                .parse::<f64>()
                .map_err(|_| CalculationError::new("Missing input value."))?;
            tokens.push(Token::Number(number));
            display.push_str(value.trim());
            rest = &rest[1..];
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            let end = rest
                .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
                .unwrap_or(rest.len());
            let number = rest[..end]
                .parse::<f64>()
                .map_err(|_| CalculationError::new(format!("Invalid number \"{}\".", &rest[..end])))?;
            tokens.push(Token::Number(number));
            display.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }
        if c.is_alphabetic() || c == '_' {
            let end = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..end].to_string()));
            display.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }
        if c == '(' || c == ')' {
            tokens.push(if c == '(' { Token::LParen } else { Token::RParen });
            display.push(c);
            rest = &rest[1..];
            continue;
        }
        match OPERATORS.iter().find(|op| rest.starts_with(*op)) {
            Some(op) => {
                tokens.push(Token::Op(*op));
                display.push_str(op);
                rest = &rest[op.len()..];
            }
            None => {
                return Err(CalculationError::new(format!("Invalid symbol \"{c}\".")));
            }
        }
    }
    if tokens.is_empty() {
        return Err(CalculationError::new("Empty expression."));
    }
    Ok((tokens, display))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Token::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn statement(&mut self) -> CalculationResult<Expr> {
        if let (Some(Token::Ident(name)), Some(Token::Op("="))) =
            (self.tokens.first(), self.tokens.get(1))
        {
            let name = name.clone();
            self.pos = 2;
            let value = self.comparison()?;
            return Ok(Expr::Assign(name, Box::new(value)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> CalculationResult<Expr> {
        let lhs = self.additive()?;
        match self.eat_op(&["<", ">", "<=", ">=", "==", "!="]) {
            Some(op) => {
                let rhs = self.additive()?;
                Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
            }
            None => Ok(lhs),
        }
    }

    fn additive(&mut self) -> CalculationResult<Expr> {
        let mut lhs = self.term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> CalculationResult<Expr> {
        let mut lhs = self.power()?;
        while let Some(op) = self.eat_op(&["*", "/"]) {
            let rhs = self.power()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn power(&mut self) -> CalculationResult<Expr> {
        let base = self.unary()?;
        if let Some(op) = self.eat_op(&["^"]) {
            let exponent = self.power()?;
            return Ok(Expr::Binary(op, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn unary(&mut self) -> CalculationResult<Expr> {
        if self.eat_op(&["-"]).is_some() {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> CalculationResult<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    if !FUNCTIONS.contains(&name.as_str()) {
                        return Err(CalculationError::new(format!("Unknown function \"{name}\".")));
                    }
                    self.pos += 1;
                    let arg = self.comparison()?;
                    self.expect_rparen()?;
                    return Ok(Expr::Call(name, Box::new(arg)));
                }
                Ok(Expr::Var(name))
            }
            Some(Token::LParen) => {
                let inner = self.comparison()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            _ => Err(CalculationError::new("Incomplete expression.")),
        }
    }

    fn expect_rparen(&mut self) -> CalculationResult<()> {
        match self.next() {
            Some(Token::RParen) => Ok(()),
            _ => Err(CalculationError::new("Missing right bracket \")\".")),
        }
    }
}
