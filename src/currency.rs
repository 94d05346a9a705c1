// ===============================
// src/currency.rs
// ===============================
pub const BASE_CURRENCY: &str = "USD";

const SYMBOLS: [(&str, &str); 6] = [
    ("USD", "$"),
    ("EUR", "€"),
    ("GBP", "£"),
    ("CAD", "C$"),
    ("AUD", "A$"),
    ("JPY", "¥"),
];

/// Symbol for rendering; unknown codes render with `$`.
pub fn symbol_for(code: &str) -> &'static str {
    SYMBOLS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| *s)
        .unwrap_or("$")
}

/// Trim + uppercase a currency code. `None` unless it is three ASCII letters.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols() {
        assert_eq!(symbol_for("USD"), "$");
        assert_eq!(symbol_for("EUR"), "€");
        assert_eq!(symbol_for("CAD"), "C$");
        assert_eq!(symbol_for("JPY"), "¥");
    }

    #[test]
    fn unknown_code_falls_back_to_dollar() {
        assert_eq!(symbol_for("CHF"), "$");
    }

    #[test]
    fn normalize_accepts_three_letters_only() {
        assert_eq!(normalize_code(" eur "), Some("EUR".to_string()));
        assert_eq!(normalize_code("EURO"), None);
        assert_eq!(normalize_code("E1R"), None);
        assert_eq!(normalize_code(""), None);
    }
}
