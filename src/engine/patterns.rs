// ==========================================
// 多格式表格合并系统 - 值模式识别
// ==========================================
// 清洗（standardize_date）、验证（type）与预览（类型推断）共用
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\.-]+@[\w\.-]+\.\w+$").expect("valid email regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{11}$|^\d{3}-\d{8}$|^\d{4}-\d{7}$").expect("valid phone regex")
});
/// 只看开头的日期形态（预览用，不校验日期是否合法）
static DATE_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d{4}-\d{2}-\d{2}|\d{4}/\d{2}/\d{2}|\d{2}/\d{2}/\d{4}|\d{2}-\d{2}-\d{4})")
        .expect("valid date shape regex")
});

/// 按优先级排列的输入格式
pub const DATE_PATTERNS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

fn has_time(pattern: &str) -> bool {
    pattern.contains("%H")
}

/// 按顺序尝试所有格式，第一个成功的胜出
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    DATE_PATTERNS.iter().find_map(|pattern| {
        if has_time(pattern) {
            NaiveDateTime::parse_from_str(text, pattern).ok()
        } else {
            NaiveDate::parse_from_str(text, pattern)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    })
}

pub fn is_email(text: &str) -> bool {
    EMAIL_RE.is_match(text)
}

/// 11 位手机号或 3-8 / 4-7 位固话
pub fn is_phone(text: &str) -> bool {
    PHONE_RE.is_match(text)
}

pub fn looks_like_date(text: &str) -> bool {
    DATE_SHAPE_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_patterns() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_date("2024-03-05"), Some(expected));
        assert_eq!(parse_date("2024/03/05"), Some(expected));
        assert_eq!(parse_date("05/03/2024"), Some(expected));
        assert_eq!(parse_date("05-03-2024"), Some(expected));
    }

    #[test]
    fn test_parse_datetime_patterns() {
        let parsed = parse_date("2024/03/05 14:20:00").unwrap();
        assert_eq!(parsed.format("%H:%M").to_string(), "14:20");
    }

    #[test]
    fn test_email_and_phone() {
        assert!(is_email("zhang.san@example.com"));
        assert!(!is_email("zhang@localhost"));
        assert!(is_phone("13800138000"));
        assert!(is_phone("010-12345678"));
        assert!(is_phone("0755-1234567"));
        assert!(!is_phone("1380013800"));
    }

    #[test]
    fn test_looks_like_date_checks_prefix_only() {
        assert!(looks_like_date("2024-03-05"));
        assert!(looks_like_date("2024-99-99 trailing"));
        assert!(!looks_like_date("3/5/2024"));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date("2024-13-40"), None);
        assert_eq!(parse_date("hello"), None);
        assert_eq!(parse_date(""), None);
    }
}
