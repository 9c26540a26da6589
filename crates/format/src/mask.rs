//! Digit masks such as `###.###.###-##`.

/// Pour the digits of `raw` into the `#` slots of `mask`. Other mask
/// characters are copied literally. The digit count must match exactly.
pub fn apply_mask(raw: &str, mask: &str) -> Result<String, String> {
    let digits: Vec<char> = raw.chars().filter(char::is_ascii_digit).collect();
    let slots = mask.chars().filter(|c| *c == '#').count();
    if digits.len() != slots {
        return Err(format!("expected {slots} digits for mask '{mask}', found {}", digits.len()));
    }
    let mut next = digits.into_iter();
    Ok(mask
        .chars()
        .map(|c| if c == '#' { next.next().unwrap_or('#') } else { c })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_document_numbers() {
        assert_eq!(apply_mask("12345678909", "###.###.###-##").unwrap(), "123.456.789-09");
        assert_eq!(apply_mask("123.456.789-09", "###.###.###-##").unwrap(), "123.456.789-09");
        assert_eq!(apply_mask("01310100", "#####-###").unwrap(), "01310-100");
    }

    #[test]
    fn rejects_wrong_digit_count() {
        assert!(apply_mask("1234", "###.###.###-##").is_err());
        assert!(apply_mask("abc", "#####-###").is_err());
    }
}
