// Input validators - pure string predicates used before anything hits the database

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Grades accepted on academic records.
pub const VALID_GRADES: [&str; 13] = [
    "A+", "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D+", "D", "D-", "F",
];

/// Format for every date column: YYYY-MM-DD
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Basic email shape: `local@domain.tld`, tld at least two letters.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("Invalid email regex")
});

/// Optional `+`, optional country code `1`, then 9-15 digits.
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("Invalid phone regex"));

pub fn validate_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Dashes and spaces are ignored.
pub fn validate_phone(phone: &str) -> bool {
    let cleaned: String = phone.chars().filter(|c| *c != '-' && *c != ' ').collect();
    PHONE_PATTERN.is_match(&cleaned)
}

pub fn validate_date(date: &str) -> bool {
    NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok()
}

pub fn validate_grade(grade: &str) -> bool {
    let upper = grade.trim().to_uppercase();
    VALID_GRADES.contains(&upper.as_str())
}

pub fn validate_score(score: &str) -> bool {
    match score.trim().parse::<f64>() {
        Ok(value) => (0.0..=100.0).contains(&value),
        Err(_) => false,
    }
}

pub fn validate_positive_integer(value: &str) -> bool {
    matches!(value.trim().parse::<i64>(), Ok(n) if n > 0)
}

pub fn validate_year(year: &str) -> bool {
    matches!(year.trim().parse::<i32>(), Ok(y) if (1900..=2100).contains(&y))
}

pub fn validate_status(status: &str) -> bool {
    crate::entities::StudentStatus::parse(status).is_some()
}

pub fn validate_attendance_status(status: &str) -> bool {
    crate::entities::AttendanceStatus::parse(status).is_some()
}

/// Parse a positive id typed by the operator.
pub fn parse_id(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ada@example.com", true)]
    #[case("first.last+tag@uni.edu.au", true)]
    #[case("a_b%c-d@sub-domain.io", true)]
    #[case("no-at-sign.com", false)]
    #[case("@example.com", false)]
    #[case("user@localhost", false)]
    #[case("user@example.c", false)]
    #[case("user@exa mple.com", false)]
    #[case("user@example.c0m", false)]
    #[case("two@@example.com", false)]
    fn test_validate_email(#[case] email: &str, #[case] expected: bool) {
        assert_eq!(validate_email(email), expected, "{email}");
    }

    #[rstest]
    #[case("555-123-4567", true)]
    #[case("5551234567", true)]
    #[case("+44 20 7946 0958", true)]
    #[case("1-800-555-01234", true)]
    #[case("12345678", false)]
    #[case("1234567890123456", true)]
    #[case("2234567890123456", false)]
    #[case("phone", false)]
    #[case("+1+5551234567", false)]
    #[case("", false)]
    fn test_validate_phone(#[case] phone: &str, #[case] expected: bool) {
        assert_eq!(validate_phone(phone), expected, "{phone}");
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2024-02-29"));
        assert!(!validate_date("2023-02-29"));
        assert!(!validate_date("29/02/2024"));
        assert!(!validate_date(""));
    }

    #[test]
    fn test_validate_grade_and_score() {
        assert!(validate_grade("a-"));
        assert!(validate_grade("F"));
        assert!(!validate_grade("E"));

        assert!(validate_score("0"));
        assert!(validate_score("100"));
        assert!(validate_score("89.5"));
        assert!(!validate_score("100.01"));
        assert!(!validate_score("-1"));
        assert!(!validate_score("ninety"));
    }

    #[test]
    fn test_validate_numbers() {
        assert!(validate_positive_integer("3"));
        assert!(!validate_positive_integer("0"));
        assert!(!validate_positive_integer("x"));

        assert!(validate_year("1900"));
        assert!(validate_year("2100"));
        assert!(!validate_year("1899"));

        assert_eq!(parse_id(" 12 "), Some(12));
        assert_eq!(parse_id("-4"), None);
    }

    #[test]
    fn test_validate_statuses() {
        assert!(validate_status("Graduated"));
        assert!(!validate_status("suspended"));
        assert!(validate_attendance_status("late"));
        assert!(!validate_attendance_status("sick"));
    }
}
