//! Arithmetic for derived fields.
//!
//! Supports `+`, `-`, `*`, `/`, parentheses, unary negation, decimal
//! literals, field references and `SUM(a, b, ...)`. Uses a
//! recursive-descent parser; evaluation is exact decimal arithmetic.

use peticiona_core::{FieldLookup, parse_decimal};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// A parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Num(Decimal),
    Field(String),
    Neg(Box<Formula>),
    Add(Box<Formula>, Box<Formula>),
    Sub(Box<Formula>, Box<Formula>),
    Mul(Box<Formula>, Box<Formula>),
    Div(Box<Formula>, Box<Formula>),
    /// Sum of the arguments that have a value.
    Sum(Vec<Formula>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    #[error("field '{0}' has no numeric value")]
    Absent(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,
}

impl Formula {
    pub fn evaluate<L: FieldLookup + ?Sized>(&self, ctx: &L) -> Result<Decimal, FormulaError> {
        match self {
            Formula::Num(n) => Ok(*n),
            Formula::Field(name) => ctx
                .lookup(name)
                .and_then(|v| v.as_decimal())
                .ok_or_else(|| FormulaError::Absent(name.clone())),
            Formula::Neg(inner) => Ok(-inner.evaluate(ctx)?),
            Formula::Add(a, b) => a.evaluate(ctx)?.checked_add(b.evaluate(ctx)?).ok_or(FormulaError::Overflow),
            Formula::Sub(a, b) => a.evaluate(ctx)?.checked_sub(b.evaluate(ctx)?).ok_or(FormulaError::Overflow),
            Formula::Mul(a, b) => a.evaluate(ctx)?.checked_mul(b.evaluate(ctx)?).ok_or(FormulaError::Overflow),
            Formula::Div(a, b) => {
                let left = a.evaluate(ctx)?;
                let right = b.evaluate(ctx)?;
                if right.is_zero() {
                    return Err(FormulaError::DivisionByZero);
                }
                left.checked_div(right).ok_or(FormulaError::Overflow)
            }
            Formula::Sum(args) => {
                let mut total = Decimal::ZERO;
                for arg in args {
                    match arg.evaluate(ctx) {
                        Ok(value) => total = total.checked_add(value).ok_or(FormulaError::Overflow)?,
                        Err(FormulaError::Absent(_)) => continue,
                        Err(other) => return Err(other),
                    }
                }
                Ok(total)
            }
        }
    }

    /// Field names the formula reads.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Formula::Num(_) => {}
            Formula::Field(name) => {
                out.insert(name.clone());
            }
            Formula::Neg(inner) => inner.collect_fields(out),
            Formula::Add(a, b) | Formula::Sub(a, b) | Formula::Mul(a, b) | Formula::Div(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Formula::Sum(args) => args.iter().for_each(|a| a.collect_fields(out)),
        }
    }
}

// ── Recursive-descent parser ──────────────────────────────────────────────

/// Parse a formula string.
pub fn parse_formula(input: &str) -> Result<Formula, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser::new(&tokens);
    let formula = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(format!(
            "Unexpected token at position {}: {:?}",
            parser.pos, parser.tokens[parser.pos]
        ));
    }
    Ok(formula)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(Decimal),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || (chars[i] == ',' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())))
                {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num = parse_decimal(&num_str).ok_or_else(|| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            c => return Err(format!("Unexpected character: '{}'", c)),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Formula, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    left = Formula::Add(Box::new(left), Box::new(self.parse_term()?));
                }
                Token::Minus => {
                    self.consume();
                    left = Formula::Sub(Box::new(left), Box::new(self.parse_term()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<Formula, String> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.consume();
                    left = Formula::Mul(Box::new(left), Box::new(self.parse_unary()?));
                }
                Token::Slash => {
                    self.consume();
                    left = Formula::Div(Box::new(left), Box::new(self.parse_unary()?));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = '-' unary | primary
    fn parse_unary(&mut self) -> Result<Formula, String> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let inner = self.parse_unary()?;
            return Ok(Formula::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    // primary = NUMBER | IDENT | SUM '(' expr (',' expr)* ')' | '(' expr ')'
    fn parse_primary(&mut self) -> Result<Formula, String> {
        match self.consume().cloned() {
            Some(Token::Number(n)) => Ok(Formula::Num(n)),
            Some(Token::Ident(name)) => {
                let is_call = self.peek() == Some(&Token::LParen);
                match (is_call, name.to_uppercase().as_str()) {
                    (true, "SUM" | "SOMA") => {
                        self.consume();
                        self.parse_sum_args()
                    }
                    (true, _) => Err(format!("Unknown function: {}", name)),
                    (false, _) => Ok(Formula::Field(name)),
                }
            }
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.consume() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {:?}", tok)),
            None => Err("Unexpected end of expression".into()),
        }
    }

    fn parse_sum_args(&mut self) -> Result<Formula, String> {
        let mut args = vec![self.parse_expr()?];
        loop {
            match self.consume() {
                Some(Token::Comma) => args.push(self.parse_expr()?),
                Some(Token::RParen) => return Ok(Formula::Sum(args)),
                _ => return Err("Expected ',' or ')' in SUM".into()),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
