//! Brazilian number and currency rendering: `.` groups thousands, `,`
//! separates decimals.

use rust_decimal::{Decimal, RoundingStrategy};

/// Group the digits of an unsigned integer string with `.` every three places.
pub fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Round to cents, half away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `1234.5` → `R$ 1.234,50`, `-3` → `-R$ 3,00`.
pub fn currency(value: Decimal, symbol: &str) -> String {
    let rounded = round_cents(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let body = decimal_body(rounded.abs(), Some(2));
    if symbol.is_empty() {
        format!("{sign}{body}")
    } else {
        format!("{sign}{symbol} {body}")
    }
}

/// Plain number with Brazilian separators, trailing zeros dropped.
pub fn number(value: Decimal) -> String {
    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    format!("{sign}{}", decimal_body(value.abs().normalize(), None))
}

fn decimal_body(value: Decimal, places: Option<usize>) -> String {
    let text = match places {
        Some(p) => format!("{value:.p$}"),
        None => value.to_string(),
    };
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (text.as_str(), None),
    };
    let grouped = group_thousands(int_part);
    match frac_part {
        Some(f) if !f.is_empty() => format!("{grouped},{f}"),
        _ => grouped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_thousands("1"), "1");
        assert_eq!(group_thousands("123"), "123");
        assert_eq!(group_thousands("1234"), "1.234");
        assert_eq!(group_thousands("1234567"), "1.234.567");
    }

    #[test]
    fn currency_rendering() {
        assert_eq!(currency(d("1234.5"), "R$"), "R$ 1.234,50");
        assert_eq!(currency(Decimal::ZERO, "R$"), "R$ 0,00");
        assert_eq!(currency(d("0.005"), "R$"), "R$ 0,01");
        assert_eq!(currency(d("1000000"), "R$"), "R$ 1.000.000,00");
        assert_eq!(currency(d("-3"), "R$"), "-R$ 3,00");
        assert_eq!(currency(d("-0.001"), "R$"), "R$ 0,00");
    }

    #[test]
    fn number_rendering() {
        assert_eq!(number(d("1234.50")), "1.234,5");
        assert_eq!(number(d("42")), "42");
        assert_eq!(number(d("-1500")), "-1.500");
    }
}
