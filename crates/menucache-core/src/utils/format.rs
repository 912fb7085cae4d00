/// Currency symbol shown in front of prices
pub const CURRENCY_SYMBOL: &str = "₹";

/// Format a price for display: whole amounts without decimals, others as-is.
pub fn format_price(price: f64) -> String {
    format!("{}{}", CURRENCY_SYMBOL, price)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Case-insensitive substring check
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Format a rating for the card corner, or an empty string if there is none
pub fn format_rating(rating: &str) -> String {
    let rating = rating.trim();
    if rating.is_empty() {
        String::new()
    } else {
        format!("⭐ {}", rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(20.0), "₹20");
        assert_eq!(format_price(49.5), "₹49.5");
        assert_eq!(format_price(0.0), "₹0");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Paneer Tikka", 3), "Pan");
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Masala Tea", "TEA"));
        assert!(contains_ignore_case("Masala Tea", ""));
        assert!(!contains_ignore_case("Samosa", "tea"));
    }

    #[test]
    fn test_format_rating() {
        assert_eq!(format_rating("4.5"), "⭐ 4.5");
        assert_eq!(format_rating("  "), "");
    }
}
