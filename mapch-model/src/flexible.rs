//! Lenient scalar decoding for a backend whose field types drift between
//! numbers and strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A JSON scalar that may arrive as a number or as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexibleScalar {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl FlexibleScalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FlexibleScalar::Int(n) => Some(*n as f64),
            FlexibleScalar::Float(n) => Some(*n),
            FlexibleScalar::Text(s) => {
                normalize_digits(s.trim()).parse::<f64>().ok()
            }
            FlexibleScalar::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlexibleScalar::Int(n) => Some(*n),
            FlexibleScalar::Float(n) if n.is_finite() => Some(n.trunc() as i64),
            FlexibleScalar::Float(_) => None,
            FlexibleScalar::Text(s) => {
                let normalized = normalize_digits(s.trim());
                normalized.parse::<i64>().ok().or_else(|| {
                    normalized.parse::<f64>().ok().map(|n| n.trunc() as i64)
                })
            }
            FlexibleScalar::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            FlexibleScalar::Int(n) => n.to_string(),
            FlexibleScalar::Float(n) => n.to_string(),
            FlexibleScalar::Text(s) => s.clone(),
            FlexibleScalar::Bool(b) => b.to_string(),
        }
    }
}

/// Fold full-width digits, sign and decimal point to their ASCII forms.
pub fn normalize_digits(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '０'..='９' => {
                char::from(b'0' + (c as u32 - '０' as u32) as u8)
            }
            '－' => '-',
            '．' => '.',
            '＋' => '+',
            other => other,
        })
        .collect()
}

/// First candidate that is present and non-empty after trimming.
pub fn first_non_empty<'a, I>(candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Option<String>>,
{
    candidates
        .into_iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse the timestamp shapes the backend has been seen to emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn full_width_digits_parse_as_numbers() {
        let v = FlexibleScalar::Text("４".to_string());
        assert_eq!(v.as_i64(), Some(4));
        let v = FlexibleScalar::Text(" 35.６８ ".to_string());
        assert_eq!(v.as_f64(), Some(35.68));
    }

    #[test]
    fn timestamps_in_every_known_shape() {
        let cases = [
            "2025-08-21T10:15:00Z",
            "2025-08-21T10:15:00+0000",
            "2025-08-21 10:15:00",
            "2025/08/21 10:15",
        ];
        for raw in cases {
            let ts = parse_timestamp(raw).unwrap_or_else(|| panic!("{raw}"));
            assert_eq!((ts.year(), ts.month(), ts.day()), (2025, 8, 21));
            assert_eq!((ts.hour(), ts.minute()), (10, 15));
        }
        let day = parse_timestamp("2025-08-21").expect("date only");
        assert_eq!(day.hour(), 0);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn first_non_empty_skips_blank_candidates() {
        let a = Some("   ".to_string());
        let b = None;
        let c = Some(" hello ".to_string());
        assert_eq!(first_non_empty([&a, &b, &c]), Some("hello".to_string()));
    }
}
