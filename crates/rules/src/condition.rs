//! Condition expression parser and evaluator.
//!
//! Activation rules and visibility rules are written in a small fixed
//! grammar and evaluated against one record:
//!
//! ```text
//! tipo_acao == "indenizacao"
//! valor_causa > 40.000,00 AND possui_tutela
//! NOT (estado_civil = casado) || OR(menor_idade, interditado)
//! ```
//!
//! Grammar (informal):
//! ```text
//! expr       = or
//! or         = and (("OR" | "||") and)*
//! and        = unary (("AND" | "&&") unary)*
//! unary      = ("NOT" | "!") unary | primary
//! primary    = "(" expr ")" | ("AND" | "OR") "(" expr ("," expr)* ")" | comparison
//! comparison = operand [OP operand]
//! OP         = "==" | "=" | "!=" | "<" | "<=" | ">" | ">="
//! operand    = IDENT | QUOTED_STRING | NUMBER | "true" | "false" | "sim" | "não"
//! ```
//!
//! A field the record lacks (or leaves blank) is *absent*: every comparison
//! involving it is false and its truthiness is false. Evaluation never
//! touches anything outside the record.

use peticiona_core::{FieldLookup, FieldValue, parse_bool_word, parse_decimal};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `left OP right`
    Compare {
        left: Operand,
        op: CmpOp,
        right: Operand,
    },
    /// A lone operand, tested for truthiness.
    Truthy(Operand),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    /// Always true (empty condition).
    Always,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A field reference.
    Field(String),
    /// A bare word on the right of a comparison: the field when the record
    /// has it, its own text otherwise.
    Word(String),
    Str(String),
    Num(Decimal),
    Bool(bool),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
        }
    }
}

/// A condition that parsed but cannot be decided for this record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("cannot order '{left}' {op} '{right}': operands are not numeric")]
    NotOrderable {
        left: String,
        op: &'static str,
        right: String,
    },
}

/// An operand after looking it up in the record.
#[derive(Debug, Clone, PartialEq)]
enum Value {
    Absent,
    Text(String),
    Num(Decimal),
    Bool(bool),
}

impl Value {
    fn from_field(value: &FieldValue) -> Self {
        match value {
            FieldValue::Null => Value::Absent,
            FieldValue::Text(s) if s.trim().is_empty() => Value::Absent,
            FieldValue::Text(s) => Value::Text(s.trim().to_string()),
            FieldValue::Number(n) => Value::Num(*n),
            FieldValue::Bool(b) => Value::Bool(*b),
        }
    }

    fn as_number(&self) -> Option<Decimal> {
        match self {
            Value::Num(n) => Some(*n),
            Value::Text(t) => parse_decimal(t),
            _ => None,
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Absent => false,
            Value::Bool(b) => *b,
            Value::Num(n) => !n.is_zero(),
            Value::Text(t) => parse_bool_word(t).unwrap_or(!t.is_empty()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Value::Absent => String::new(),
            Value::Text(t) => t.clone(),
            Value::Num(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }
}

fn text_eq(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Absent, _) | (_, Value::Absent) => false,
        (Value::Num(x), Value::Num(y)) => x == y,
        (Value::Num(x), Value::Text(t)) | (Value::Text(t), Value::Num(x)) => match parse_decimal(t) {
            Some(y) => y == *x,
            None => text_eq(t, &x.to_string()),
        },
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Bool(x), Value::Text(t)) | (Value::Text(t), Value::Bool(x)) => {
            parse_bool_word(t) == Some(*x)
        }
        (Value::Bool(x), Value::Num(n)) | (Value::Num(n), Value::Bool(x)) => !n.is_zero() == *x,
        (Value::Text(x), Value::Text(y)) => {
            text_eq(x, y)
                || matches!((parse_decimal(x), parse_decimal(y)), (Some(p), Some(q)) if p == q)
        }
    }
}

impl Operand {
    fn resolve<L: FieldLookup + ?Sized>(&self, ctx: &L) -> Value {
        match self {
            Operand::Field(name) => ctx.lookup(name).map_or(Value::Absent, Value::from_field),
            Operand::Word(word) => match ctx.lookup(word) {
                Some(value) => Value::from_field(value),
                None => Value::Text(word.clone()),
            },
            Operand::Str(s) => Value::Text(s.clone()),
            Operand::Num(n) => Value::Num(*n),
            Operand::Bool(b) => Value::Bool(*b),
        }
    }

    fn collect_fields(&self, out: &mut BTreeSet<String>) {
        if let Operand::Field(name) | Operand::Word(name) = self {
            out.insert(name.clone());
        }
    }
}

impl Condition {
    /// Evaluate this condition against a record.
    pub fn evaluate<L: FieldLookup + ?Sized>(&self, ctx: &L) -> Result<bool, EvalError> {
        match self {
            Condition::Always => Ok(true),
            Condition::Truthy(operand) => Ok(operand.resolve(ctx).truthy()),
            Condition::Compare { left, op, right } => compare(*op, left.resolve(ctx), right.resolve(ctx)),
            Condition::And(a, b) => Ok(a.evaluate(ctx)? && b.evaluate(ctx)?),
            Condition::Or(a, b) => Ok(a.evaluate(ctx)? || b.evaluate(ctx)?),
            Condition::Not(inner) => Ok(!inner.evaluate(ctx)?),
        }
    }

    /// Names this condition may read from the record.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            Condition::Always => {}
            Condition::Truthy(operand) => operand.collect_fields(out),
            Condition::Compare { left, right, .. } => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Condition::Not(inner) => inner.collect_fields(out),
        }
    }
}

fn compare(op: CmpOp, left: Value, right: Value) -> Result<bool, EvalError> {
    if left == Value::Absent || right == Value::Absent {
        return Ok(false);
    }
    match op {
        CmpOp::Eq => Ok(equals(&left, &right)),
        CmpOp::NotEq => Ok(!equals(&left, &right)),
        _ => {
            let (Some(x), Some(y)) = (left.as_number(), right.as_number()) else {
                return Err(EvalError::NotOrderable {
                    left: left.describe(),
                    op: op.symbol(),
                    right: right.describe(),
                });
            };
            Ok(match op {
                CmpOp::Lt => x < y,
                CmpOp::Lte => x <= y,
                CmpOp::Gt => x > y,
                _ => x >= y,
            })
        }
    }
}

// ─── Parser ──────────────────────────────────────────────────────────

/// Parse a condition expression string into a [`Condition`] tree.
///
/// Returns `Ok(Condition::Always)` for empty input.
pub fn parse_condition(input: &str) -> Result<Condition, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Condition::Always);
    }
    let tokens = tokenize(input)?;
    let (cond, rest) = parse_or(&tokens)?;
    if !rest.is_empty() {
        return Err(format!("unexpected tokens after expression: {rest:?}"));
    }
    Ok(cond)
}

/// Token types for the condition grammar.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(Decimal),
    Bool(bool),
    And,
    Or,
    Not,
    Eq,
    NotEq,
    Gt,
    Lt,
    Gte,
    Lte,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string literal".into()),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '>' | '<' => {
                chars.next();
                let or_equal = chars.peek() == Some(&'=');
                if or_equal {
                    chars.next();
                }
                tokens.push(match (c, or_equal) {
                    ('>', true) => Token::Gte,
                    ('>', false) => Token::Gt,
                    (_, true) => Token::Lte,
                    _ => Token::Lt,
                });
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Not);
                }
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(format!("expected '{c}{c}'"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            _ if c.is_ascii_digit() || c == '-' => {
                let mut num_str = String::new();
                num_str.push(c);
                chars.next();
                loop {
                    match chars.peek() {
                        Some(&nc) if nc.is_ascii_digit() || nc == '.' => {
                            num_str.push(nc);
                            chars.next();
                        }
                        // A comma glued to a digit is a decimal comma; otherwise it separates arguments.
                        Some(&',') => {
                            let mut lookahead = chars.clone();
                            lookahead.next();
                            if lookahead.peek().is_some_and(|d| d.is_ascii_digit()) {
                                num_str.push(',');
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        _ => break,
                    }
                }
                match parse_decimal(&num_str) {
                    Some(n) => tokens.push(Token::Num(n)),
                    None => return Err(format!("invalid number: {num_str}")),
                }
            }
            _ if c.is_alphanumeric() || c == '_' => {
                let mut word = String::new();
                while let Some(&wc) = chars.peek() {
                    if wc.is_alphanumeric() || wc == '_' {
                        word.push(wc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = match word.to_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "TRUE" | "SIM" => Token::Bool(true),
                    "FALSE" | "NÃO" | "NAO" => Token::Bool(false),
                    _ => Token::Ident(word),
                };
                tokens.push(token);
            }
            _ => return Err(format!("unexpected character: {c}")),
        }
    }

    Ok(tokens)
}

fn parse_or(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    let (mut left, mut rest) = parse_and(tokens)?;
    while rest.first() == Some(&Token::Or) {
        let (right, remaining) = parse_and(&rest[1..])?;
        left = Condition::Or(Box::new(left), Box::new(right));
        rest = remaining;
    }
    Ok((left, rest))
}

fn parse_and(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    let (mut left, mut rest) = parse_unary(tokens)?;
    while rest.first() == Some(&Token::And) {
        let (right, remaining) = parse_unary(&rest[1..])?;
        left = Condition::And(Box::new(left), Box::new(right));
        rest = remaining;
    }
    Ok((left, rest))
}

fn parse_unary(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    if tokens.first() == Some(&Token::Not) {
        let (inner, rest) = parse_unary(&tokens[1..])?;
        return Ok((Condition::Not(Box::new(inner)), rest));
    }
    parse_primary(tokens)
}

fn parse_primary(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    match tokens {
        [Token::LParen, rest @ ..] => {
            let (inner, rest) = parse_or(rest)?;
            expect_rparen(rest).map(|rest| (inner, rest))
        }
        [connective @ (Token::And | Token::Or), Token::LParen, rest @ ..] => {
            let (mut acc, mut rest) = parse_or(rest)?;
            while rest.first() == Some(&Token::Comma) {
                let (next, remaining) = parse_or(&rest[1..])?;
                acc = if *connective == Token::And {
                    Condition::And(Box::new(acc), Box::new(next))
                } else {
                    Condition::Or(Box::new(acc), Box::new(next))
                };
                rest = remaining;
            }
            expect_rparen(rest).map(|rest| (acc, rest))
        }
        _ => parse_comparison(tokens),
    }
}

fn expect_rparen(tokens: &[Token]) -> Result<&[Token], String> {
    match tokens.first() {
        Some(Token::RParen) => Ok(&tokens[1..]),
        _ => Err("expected closing parenthesis".into()),
    }
}

fn parse_comparison(tokens: &[Token]) -> Result<(Condition, &[Token]), String> {
    let (left, rest) = parse_operand(tokens, false)?;
    let op = match rest.first() {
        Some(Token::Eq) => CmpOp::Eq,
        Some(Token::NotEq) => CmpOp::NotEq,
        Some(Token::Gt) => CmpOp::Gt,
        Some(Token::Lt) => CmpOp::Lt,
        Some(Token::Gte) => CmpOp::Gte,
        Some(Token::Lte) => CmpOp::Lte,
        _ => return Ok((Condition::Truthy(left), rest)),
    };
    let (right, rest) = parse_operand(&rest[1..], true)?;
    Ok((Condition::Compare { left, op, right }, rest))
}

fn parse_operand(tokens: &[Token], right_side: bool) -> Result<(Operand, &[Token]), String> {
    let operand = match tokens.first() {
        Some(Token::Ident(name)) if right_side => Operand::Word(name.clone()),
        Some(Token::Ident(name)) => Operand::Field(name.clone()),
        Some(Token::Str(s)) => Operand::Str(s.clone()),
        Some(Token::Num(n)) => Operand::Num(*n),
        Some(Token::Bool(b)) => Operand::Bool(*b),
        other => return Err(format!("expected operand, got {other:?}")),
    };
    Ok((operand, &tokens[1..]))
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use peticiona_core::Record;

    fn record(pairs: &[(&str, FieldValue)]) -> Record {
        Record::new(0, pairs.iter().map(|(k, v)| (k.to_string(), v.clone())))
    }

    fn eval(expr: &str, rec: &Record) -> Result<bool, EvalError> {
        parse_condition(expr).unwrap().evaluate(rec)
    }

    fn sample() -> Record {
        record(&[
            ("tipo_acao", FieldValue::text(" Indenizacao ")),
            ("valor_causa", FieldValue::text("45.000,00")),
            ("possui_tutela", FieldValue::text("sim")),
            ("menor_idade", FieldValue::Bool(false)),
            ("parcelas", FieldValue::from(3)),
            ("observacao", FieldValue::Null),
            ("estado_civil", FieldValue::text("casado")),
        ])
    }

    #[test]
    fn empty_condition_is_always() {
        assert_eq!(parse_condition("  ").unwrap(), Condition::Always);
        assert!(eval("", &sample()).unwrap());
    }

    #[test]
    fn text_equality_trims_and_ignores_case() {
        let rec = sample();
        assert!(eval(r#"tipo_acao == "indenizacao""#, &rec).unwrap());
        assert!(eval("tipo_acao = 'INDENIZACAO'", &rec).unwrap());
        assert!(!eval("tipo_acao != 'indenizacao'", &rec).unwrap());
    }

    #[test]
    fn numeric_comparisons_accept_brazilian_numbers() {
        let rec = sample();
        assert!(eval("valor_causa > 40.000,00", &rec).unwrap());
        assert!(eval("valor_causa >= 45000", &rec).unwrap());
        assert!(!eval("valor_causa < 1000.5", &rec).unwrap());
        assert!(eval("parcelas == 3", &rec).unwrap());
        assert!(eval("parcelas <= 3.0", &rec).unwrap());
    }

    #[test]
    fn truthiness_of_lone_operands() {
        let rec = sample();
        assert!(eval("possui_tutela", &rec).unwrap());
        assert!(!eval("menor_idade", &rec).unwrap());
        assert!(!eval("observacao", &rec).unwrap());
        assert!(!eval("inexistente", &rec).unwrap());
        assert!(eval("parcelas", &rec).unwrap());
    }

    #[test]
    fn boolean_words_coerce() {
        let rec = sample();
        assert!(eval("possui_tutela == true", &rec).unwrap());
        assert!(eval("menor_idade == não", &rec).unwrap());
        assert!(eval("menor_idade = 'n'", &rec).unwrap());
    }

    #[test]
    fn absent_operands_make_comparisons_false() {
        let rec = sample();
        assert!(!eval("inexistente == 'x'", &rec).unwrap());
        assert!(!eval("inexistente != 'x'", &rec).unwrap());
        assert!(!eval("observacao > 10", &rec).unwrap());
        assert!(eval("NOT (observacao != '')", &rec).unwrap());
        assert!(eval("tipo_acao != ''", &rec).unwrap());
    }

    #[test]
    fn bare_word_on_right_is_field_or_literal() {
        let rec = record(&[
            ("estado_civil", FieldValue::text("casado")),
            ("estado_civil_conjuge", FieldValue::text("Casado")),
        ]);
        assert!(eval("estado_civil == casado", &rec).unwrap());
        assert!(eval("estado_civil == estado_civil_conjuge", &rec).unwrap());
        assert!(!eval("estado_civil == solteiro", &rec).unwrap());
    }

    #[test]
    fn connectives_and_precedence() {
        let rec = sample();
        assert!(eval("possui_tutela AND parcelas > 2", &rec).unwrap());
        assert!(eval("menor_idade OR possui_tutela && parcelas == 3", &rec).unwrap());
        assert!(!eval("(menor_idade OR possui_tutela) AND NOT possui_tutela", &rec).unwrap());
        assert!(eval("!menor_idade", &rec).unwrap());
        assert!(eval("menor_idade || estado_civil == casado", &rec).unwrap());
    }

    #[test]
    fn function_form_connectives() {
        let rec = sample();
        assert!(eval("AND(possui_tutela, parcelas == 3, tipo_acao == 'indenizacao')", &rec).unwrap());
        assert!(!eval("AND(possui_tutela, menor_idade)", &rec).unwrap());
        assert!(eval("OR(menor_idade, observacao, parcelas > 1)", &rec).unwrap());
        assert!(eval("or(menor_idade, AND(possui_tutela, parcelas == 3))", &rec).unwrap());
    }

    #[test]
    fn ordering_text_is_an_eval_error() {
        let rec = sample();
        let err = eval("estado_civil > 3", &rec).unwrap_err();
        assert!(matches!(err, EvalError::NotOrderable { .. }));
    }

    #[test]
    fn parse_errors() {
        assert!(parse_condition("tipo_acao ==").is_err());
        assert!(parse_condition("(a == 1").is_err());
        assert!(parse_condition("a == 'x").is_err());
        assert!(parse_condition("a & b").is_err());
        assert!(parse_condition("a == 1 b").is_err());
        assert!(parse_condition("AND()").is_err());
        assert!(parse_condition("a # b").is_err());
    }

    #[test]
    fn referenced_fields_include_bare_words() {
        let cond = parse_condition("a == b AND NOT c OR d > 1").unwrap();
        let fields: Vec<String> = cond.referenced_fields().into_iter().collect();
        assert_eq!(fields, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let rec = sample();
        let cond = parse_condition("possui_tutela AND valor_causa > 40000").unwrap();
        let first = cond.evaluate(&rec);
        for _ in 0..5 {
            assert_eq!(cond.evaluate(&rec), first);
        }
    }
}
