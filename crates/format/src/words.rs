//! Portuguese cardinal numbers in full ("por extenso").

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

const UNITS: [&str; 20] = [
    "zero", "um", "dois", "três", "quatro", "cinco", "seis", "sete", "oito", "nove", "dez", "onze",
    "doze", "treze", "quatorze", "quinze", "dezesseis", "dezessete", "dezoito", "dezenove",
];

const TENS: [&str; 10] = [
    "", "", "vinte", "trinta", "quarenta", "cinquenta", "sessenta", "setenta", "oitenta", "noventa",
];

const HUNDREDS: [&str; 10] = [
    "", "cento", "duzentos", "trezentos", "quatrocentos", "quinhentos", "seiscentos", "setecentos",
    "oitocentos", "novecentos",
];

/// (singular, plural) names of each power of one thousand, from 10^6 up.
const SCALES: [(&str, &str); 8] = [
    ("milhão", "milhões"),
    ("bilhão", "bilhões"),
    ("trilhão", "trilhões"),
    ("quatrilhão", "quatrilhões"),
    ("quintilhão", "quintilhões"),
    ("sextilhão", "sextilhões"),
    ("septilhão", "septilhões"),
    ("octilhão", "octilhões"),
];

/// 1..=999 in words.
fn below_thousand(n: u32) -> String {
    debug_assert!((1..1000).contains(&n));
    if n == 100 {
        return "cem".into();
    }
    let mut parts: Vec<&str> = Vec::with_capacity(3);
    let (h, rest) = (n / 100, n % 100);
    if h > 0 {
        parts.push(HUNDREDS[h as usize]);
    }
    if rest >= 20 {
        parts.push(TENS[(rest / 10) as usize]);
        if rest % 10 > 0 {
            parts.push(UNITS[(rest % 10) as usize]);
        }
    } else if rest > 0 {
        parts.push(UNITS[rest as usize]);
    }
    parts.join(" e ")
}

fn group_words(value: u32, power: usize) -> String {
    match power {
        0 => below_thousand(value),
        1 if value == 1 => "mil".into(),
        1 => format!("{} mil", below_thousand(value)),
        _ => {
            let (singular, plural) = SCALES[power - 2];
            let noun = if value == 1 { singular } else { plural };
            format!("{} {noun}", below_thousand(value))
        }
    }
}

/// Spell a non-negative integer. `None` when it is beyond the octilhões.
pub fn spell_integer(n: u128) -> Option<String> {
    if n == 0 {
        return Some(UNITS[0].into());
    }
    let mut groups = Vec::new();
    let mut rest = n;
    while rest > 0 {
        groups.push((rest % 1000) as u32);
        rest /= 1000;
    }
    if groups.len() > SCALES.len() + 2 {
        return None;
    }

    let nonzero: Vec<(usize, u32)> = groups
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, g)| **g > 0)
        .map(|(power, g)| (power, *g))
        .collect();

    let mut out = String::new();
    for (i, &(power, value)) in nonzero.iter().enumerate() {
        if i > 0 {
            // The last group takes "e" when it is below one hundred or whole hundreds.
            let last = i == nonzero.len() - 1;
            out.push_str(if last && (value < 100 || value % 100 == 0) { " e " } else { " " });
        }
        out.push_str(&group_words(value, power));
    }
    Some(out)
}

/// Spell a number; fractional digits are read as a whole after "vírgula".
pub fn spell_number(value: Decimal) -> Option<String> {
    let value = value.normalize();
    let negative = value.is_sign_negative() && !value.is_zero();
    let abs = value.abs();
    let integer = spell_integer(abs.trunc().to_u128()?)?;
    let fraction = abs.fract();
    let mut out = if negative { format!("menos {integer}") } else { integer };
    if !fraction.is_zero() {
        let digits = fraction.to_string();
        let digits = digits.trim_start_matches("0.");
        let leading_zeros = digits.chars().take_while(|c| *c == '0').count();
        out.push_str(" vírgula");
        for _ in 0..leading_zeros {
            out.push_str(" zero");
        }
        let rest: u128 = digits[leading_zeros..].parse().ok()?;
        out.push(' ');
        out.push_str(&spell_integer(rest)?);
    }
    Some(out)
}

/// Spell an amount of money: `1.234,56` → "mil duzentos e trinta e quatro
/// reais e cinquenta e seis centavos". Rounded to cents first.
pub fn spell_currency(value: Decimal) -> Option<String> {
    let rounded = crate::number::round_cents(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();
    let whole = abs.trunc().to_u128()?;
    let cents = (abs.fract() * Decimal::ONE_HUNDRED).trunc().to_u32()?;

    let reais = if whole == 0 {
        None
    } else {
        let words = spell_integer(whole)?;
        let noun = if whole == 1 { "real" } else { "reais" };
        // "um milhão de reais", but "um milhão e mil reais"
        let de = if whole >= 1_000_000 && whole % 1_000_000 == 0 { " de" } else { "" };
        Some(format!("{words}{de} {noun}"))
    };
    let centavos = match cents {
        0 => None,
        1 => Some("um centavo".to_string()),
        c => Some(format!("{} centavos", below_thousand(c))),
    };

    let text = match (reais, centavos) {
        (Some(r), Some(c)) => format!("{r} e {c}"),
        (Some(r), None) => r,
        (None, Some(c)) => c,
        (None, None) => "zero reais".into(),
    };
    Some(if negative { format!("menos {text}") } else { text })
}
