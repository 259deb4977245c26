//! Closed vocabularies for the categorical persona fields and the
//! normalizers that coerce loosely-typed model output into them.
//!
//! None of the functions here fail: malformed values degrade to a safe
//! default or are dropped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_TECH_SAVVINESS: u8 = 3;
pub const MIN_TECH_SAVVINESS: i64 = 1;
pub const MAX_TECH_SAVVINESS: i64 = 5;
pub const MAX_AGE: i64 = 100;

/// A closed set of allowed labels.
pub trait Vocabulary: Copy + PartialEq + Sized + 'static {
    const ALL: &'static [Self];

    fn label(self) -> &'static str;

    /// Membership ignores ASCII case and surrounding whitespace on purpose:
    /// model output like `"female"` maps to the canonical label.
    fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.label().eq_ignore_ascii_case(trimmed))
    }

    fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|item| item.label()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
    #[serde(rename = "Non-Binary")]
    NonBinary,
    Other,
}

impl Vocabulary for Gender {
    const ALL: &'static [Self] = &[Self::Male, Self::Female, Self::NonBinary, Self::Other];

    fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::NonBinary => "Non-Binary",
            Self::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interest {
    Technology,
    Design,
    Music,
    Sports,
    Reading,
    Travel,
    Gaming,
    Fitness,
}

impl Vocabulary for Interest {
    const ALL: &'static [Self] = &[
        Self::Technology,
        Self::Design,
        Self::Music,
        Self::Sports,
        Self::Reading,
        Self::Travel,
        Self::Gaming,
        Self::Fitness,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Technology => "Technology",
            Self::Design => "Design",
            Self::Music => "Music",
            Self::Sports => "Sports",
            Self::Reading => "Reading",
            Self::Travel => "Travel",
            Self::Gaming => "Gaming",
            Self::Fitness => "Fitness",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Mobile,
    Desktop,
    Tablet,
    Smartwatch,
    #[serde(rename = "VR/AR")]
    VrAr,
}

impl Vocabulary for Platform {
    const ALL: &'static [Self] = &[
        Self::Mobile,
        Self::Desktop,
        Self::Tablet,
        Self::Smartwatch,
        Self::VrAr,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Mobile => "Mobile",
            Self::Desktop => "Desktop",
            Self::Tablet => "Tablet",
            Self::Smartwatch => "Smartwatch",
            Self::VrAr => "VR/AR",
        }
    }
}

/// Filters a collection (or a comma-separated string) down to members of
/// the vocabulary. Unknown entries are dropped, duplicates keep their first
/// position.
pub fn normalize_list_field<T: Vocabulary>(value: &Value) -> Vec<T> {
    let candidates: Vec<String> = match value {
        Value::String(text) => text.split(',').map(|item| item.trim().to_string()).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(|item| item.trim().to_string())
            .collect(),
        _ => Vec::new(),
    };

    let mut accepted: Vec<T> = Vec::new();
    for candidate in candidates {
        if let Some(item) = T::parse(&candidate) {
            if !accepted.contains(&item) {
                accepted.push(item);
            }
        }
    }
    accepted
}

pub fn normalize_gender(value: &Value) -> Gender {
    value.as_str().and_then(Gender::parse).unwrap_or(Gender::Other)
}

/// Integer conversion shared by the numeric fields: integers, floats
/// (truncated toward zero) and numeric strings. Anything else is `None`.
pub fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float.trunc() as i64)),
        Value::String(text) => {
            let trimmed = text.trim();
            trimmed.parse::<i64>().ok().or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|float| float.is_finite())
                    .map(|float| float.trunc() as i64)
            })
        }
        _ => None,
    }
}

pub fn normalize_tech_savviness(value: &Value) -> u8 {
    match coerce_integer(value) {
        Some(level) => level.clamp(MIN_TECH_SAVVINESS, MAX_TECH_SAVVINESS) as u8,
        None => DEFAULT_TECH_SAVVINESS,
    }
}

pub fn normalize_age(value: &Value) -> Option<u8> {
    coerce_integer(value).map(|age| age.clamp(0, MAX_AGE) as u8)
}

/// Renders a free-text field. `null` yields `None` so the previous value is
/// kept.
pub fn normalize_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.trim().to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(normalize_text)
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tech_savviness_is_always_within_bounds() {
        assert_eq!(normalize_tech_savviness(&json!(-5)), 1);
        assert_eq!(normalize_tech_savviness(&json!(0)), 1);
        assert_eq!(normalize_tech_savviness(&json!("abc")), 3);
        assert_eq!(normalize_tech_savviness(&json!(3)), 3);
        assert_eq!(normalize_tech_savviness(&json!(7)), 5);
        assert_eq!(normalize_tech_savviness(&json!(5.9)), 5);
        assert_eq!(normalize_tech_savviness(&json!("4")), 4);
        assert_eq!(normalize_tech_savviness(&json!(null)), 3);
        assert_eq!(normalize_tech_savviness(&json!([2])), 3);
    }

    #[test]
    fn comma_separated_interests_drop_unknown_entries() {
        let interests: Vec<Interest> =
            normalize_list_field(&json!("Design, Music, Alien-ology"));
        assert_eq!(interests.len(), 2);
        assert!(interests.contains(&Interest::Design));
        assert!(interests.contains(&Interest::Music));
    }

    #[test]
    fn list_field_accepts_arrays_and_dedupes() {
        let platforms: Vec<Platform> =
            normalize_list_field(&json!(["vr/ar", "Desktop", "Fridge", 7, "desktop "]));
        assert_eq!(platforms, vec![Platform::VrAr, Platform::Desktop]);
    }

    #[test]
    fn list_field_of_wrong_type_is_empty() {
        let interests: Vec<Interest> = normalize_list_field(&json!({"a": 1}));
        assert!(interests.is_empty());
        let interests: Vec<Interest> = normalize_list_field(&json!(""));
        assert!(interests.is_empty());
    }

    #[test]
    fn gender_outside_vocabulary_becomes_other() {
        assert_eq!(normalize_gender(&json!("Robot")), Gender::Other);
        assert_eq!(normalize_gender(&json!("Female")), Gender::Female);
        assert_eq!(normalize_gender(&json!("non-binary")), Gender::NonBinary);
        assert_eq!(normalize_gender(&json!(42)), Gender::Other);
    }

    #[test]
    fn vocabulary_matching_ignores_case_but_emits_canonical_labels() {
        assert_eq!(Gender::parse("female"), Some(Gender::Female));
        assert_eq!(Gender::parse("Femme"), None);
        let interests: Vec<Interest> = normalize_list_field(&json!("design, MUSIC"));
        assert_eq!(interests, vec![Interest::Design, Interest::Music]);
        assert_eq!(
            interests.iter().map(|item| item.label()).collect::<Vec<_>>(),
            vec!["Design", "Music"]
        );
    }

    #[test]
    fn age_is_clamped_and_unusable_age_is_none() {
        assert_eq!(normalize_age(&json!(28)), Some(28));
        assert_eq!(normalize_age(&json!(-3)), Some(0));
        assert_eq!(normalize_age(&json!("130")), Some(100));
        assert_eq!(normalize_age(&json!("thirty")), None);
    }

    #[test]
    fn text_fields_render_non_strings() {
        assert_eq!(normalize_text(&json!(" Berlin ")), Some("Berlin".to_string()));
        assert_eq!(
            normalize_text(&json!(["Figma", "User Research"])),
            Some("Figma, User Research".to_string())
        );
        assert_eq!(normalize_text(&json!(12)), Some("12".to_string()));
        assert_eq!(normalize_text(&json!(null)), None);
    }

    #[test]
    fn gender_labels_match_wire_format() {
        assert_eq!(
            serde_json::to_value(Gender::NonBinary).unwrap(),
            json!(Gender::NonBinary.label())
        );
        assert_eq!(
            serde_json::to_value(Platform::VrAr).unwrap(),
            json!(Platform::VrAr.label())
        );
    }
}
