//! Guanajuato plate format validation.
//!
//! Formats, tried in order (first match wins):
//!
//! | cleaned    | vehicle   | tier  | canonical   |
//! |------------|-----------|-------|-------------|
//! | `LLLDDDL`  | AUTO      | ALTA  | `LLL-DDD-L` |
//! | `LLDDDDL`  | CAMIONETA | ALTA  | `LL-DDDD-L` |
//! | `LLLDDD`   | AUTO      | MEDIA | `LLL-DDD`   |
//! | `LLDDDD`   | CAMIONETA | MEDIA | `LL-DDDD`   |

use common::plates::{ConfidenceLevel, PlateValidation, VehicleType};
use once_cell::sync::Lazy;
use regex::Regex;

struct PlateFormat {
    pattern: Regex,
    /// Lengths of the dash-separated groups of the canonical form
    groups: &'static [usize],
    vehicle_type: VehicleType,
    confidence_level: ConfidenceLevel,
}

const FORMAT_TABLE: [(&str, &[usize], VehicleType, ConfidenceLevel); 4] = [
    (r"^[A-Z]{3}[0-9]{3}[A-Z]$", &[3, 3, 1], VehicleType::Auto, ConfidenceLevel::Alta),
    (r"^[A-Z]{2}[0-9]{4}[A-Z]$", &[2, 4, 1], VehicleType::Camioneta, ConfidenceLevel::Alta),
    (r"^[A-Z]{3}[0-9]{3}$", &[3, 3], VehicleType::Auto, ConfidenceLevel::Media),
    (r"^[A-Z]{2}[0-9]{4}$", &[2, 4], VehicleType::Camioneta, ConfidenceLevel::Media),
];

static FORMATS: Lazy<Vec<PlateFormat>> = Lazy::new(|| {
    FORMAT_TABLE
        .into_iter()
        .filter_map(|(pattern, groups, vehicle_type, confidence_level)| {
            Regex::new(pattern).ok().map(|pattern| PlateFormat {
                pattern,
                groups,
                vehicle_type,
                confidence_level,
            })
        })
        .collect()
});

/// Uppercase and keep only `A-Z` / `0-9`.
///
/// Non-ASCII letters are dropped rather than transliterated (`Ñ` disappears).
pub fn clean_text(text: &str) -> String {
    text.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect()
}

/// Validate arbitrary engine text against the plate formats. Never fails.
pub fn validate(text: &str) -> PlateValidation {
    let cleaned = clean_text(text);

    if cleaned.len() != 6 && cleaned.len() != 7 {
        return PlateValidation::invalid(cleaned);
    }

    FORMATS
        .iter()
        .find(|format| format.pattern.is_match(&cleaned))
        .map(|format| {
            PlateValidation::matched(
                cleaned.clone(),
                canonical_form(&cleaned, format.groups),
                format.vehicle_type,
                format.confidence_level,
            )
        })
        .unwrap_or_else(|| PlateValidation::invalid(cleaned))
}

/// Join consecutive groups of an ASCII string with dashes
fn canonical_form(cleaned: &str, groups: &[usize]) -> String {
    let mut parts = Vec::with_capacity(groups.len());
    let mut start = 0;
    for len in groups {
        let end = (start + len).min(cleaned.len());
        parts.push(&cleaned[start..end]);
        start = end;
    }
    parts.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_plate(
        input: &str,
        canonical: &str,
        vehicle_type: VehicleType,
        level: ConfidenceLevel,
    ) {
        let v = validate(input);
        assert!(v.is_valid(), "{input} should validate");
        assert_eq!(v.canonical_plate(), Some(canonical));
        assert_eq!(v.vehicle_type(), Some(vehicle_type));
        assert_eq!(v.confidence_level(), Some(level));
    }

    #[test]
    fn test_full_auto_plate() {
        assert_plate("abc123d", "ABC-123-D", VehicleType::Auto, ConfidenceLevel::Alta);
        assert_eq!(validate("abc123d").raw_text(), "ABC123D");
    }

    #[test]
    fn test_full_camioneta_plate() {
        assert_plate("ab1234c", "AB-1234-C", VehicleType::Camioneta, ConfidenceLevel::Alta);
    }

    #[test]
    fn test_short_plates_are_media() {
        assert_plate("xyz999", "XYZ-999", VehicleType::Auto, ConfidenceLevel::Media);
        assert_plate("zz0001", "ZZ-0001", VehicleType::Camioneta, ConfidenceLevel::Media);
    }

    #[test]
    fn test_punctuation_and_spacing_are_stripped() {
        assert_plate(" GTO·123-a ", "GTO-123-A", VehicleType::Auto, ConfidenceLevel::Alta);
        assert_plate("gh 12.34 x", "GH-1234-X", VehicleType::Camioneta, ConfidenceLevel::Alta);
    }

    #[test]
    fn test_diacritics_are_dropped_not_transliterated() {
        // Ñ is removed, leaving only five characters
        let v = validate("ÑAB123");
        assert!(!v.is_valid());
        assert_eq!(v.raw_text(), "AB123");

        assert_plate("Ábc1234", "BC-1234", VehicleType::Camioneta, ConfidenceLevel::Media);
    }

    #[test]
    fn test_rejections_keep_cleaned_text() {
        let too_long = validate("zz00011");
        assert!(!too_long.is_valid());
        assert_eq!(too_long.raw_text(), "ZZ00011");

        for input in ["", "   ", "1234567", "ABCDEFG", "A1B2C3D", "ABCD12", "a-b"] {
            let v = validate(input);
            assert!(!v.is_valid(), "{input:?} must not validate");
            assert!(v.canonical_plate().is_none());
            assert!(v.vehicle_type().is_none());
            assert!(v.confidence_level().is_none());
        }
    }

    #[test]
    fn test_valid_implies_length_and_pattern() {
        let samples = [
            "abc123d", "ab1234c", "xyz999", "zz0001", "zz00011", "a1", "GTO 001 Q",
            "QQ-9999", "QQQ-9999", "🚗ABC123", "abc\n123\td",
        ];
        for s in samples {
            let v = validate(s);
            if v.is_valid() {
                let len = v.raw_text().len();
                assert!(len == 6 || len == 7);
                assert!(FORMATS.iter().any(|f| f.pattern.is_match(v.raw_text())));
            }
        }
    }
}
