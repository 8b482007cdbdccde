/// Normalizes a phone number to international dialing form without `+`.
///
/// Non-digits are stripped. A local leading `0` is replaced by the country
/// code and a bare mobile prefix (`8`) gets it prepended. Returns `None` when
/// nothing dialable is left.
pub fn normalize_phone(raw: &str, country_code: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    let normalized = if digits.starts_with(country_code) {
        digits
    } else if let Some(local) = digits.strip_prefix('0') {
        format!("{country_code}{local}")
    } else if digits.starts_with('8') {
        format!("{country_code}{digits}")
    } else {
        digits
    };

    Some(normalized)
}

/// Compares two numbers after normalization.
pub fn same_phone(a: &str, b: &str, country_code: &str) -> bool {
    match (normalize_phone(a, country_code), normalize_phone(b, country_code)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_formats() {
        assert_eq!(normalize_phone("08123456789", "62").as_deref(), Some("628123456789"));
        assert_eq!(normalize_phone("8123456789", "62").as_deref(), Some("628123456789"));
        assert_eq!(normalize_phone("628123456789", "62").as_deref(), Some("628123456789"));
    }

    #[test]
    fn test_strips_formatting() {
        assert_eq!(
            normalize_phone("+62 812-3456-789", "62").as_deref(),
            Some("628123456789")
        );
        assert_eq!(
            normalize_phone("(0812) 3456 789", "62").as_deref(),
            Some("628123456789")
        );
        assert_eq!(normalize_phone("n/a", "62"), None);
    }

    #[test]
    fn test_other_country_code() {
        assert_eq!(normalize_phone("0612345678", "31").as_deref(), Some("31612345678"));
        assert_eq!(normalize_phone("14155550100", "62").as_deref(), Some("14155550100"));
    }

    #[test]
    fn test_same_phone() {
        assert!(same_phone("0812-3456-789", "628123456789", "62"));
        assert!(!same_phone("0812-3456-780", "628123456789", "62"));
        assert!(!same_phone("", "", "62"));
    }
}
