//! Deterministic summary used when the summarizer is unavailable.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use locality_lens_analysis_models::{Statistics, UserIntent};
use locality_lens_metrics::catalog;

/// Lines listed per section.
const MAX_LINES: usize = 8;

/// `senior_citizen` -> `Senior Citizen`.
fn title_case(key: &str) -> String {
    key.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the templated summary.
///
/// Statistics are listed in selection order, facilities in category order
/// skipping zero counts; each section holds at most eight lines.
#[must_use]
pub fn fallback_summary(
    statistics: &Statistics,
    selected_metric_keys: &[String],
    poi_category_counts: &BTreeMap<String, usize>,
    intent: Option<&UserIntent>,
) -> String {
    let mut text = String::from("Locality Analysis Summary\n");

    if let Some(intent) = intent {
        let _ = writeln!(text, "\nAnalysis for: {}", title_case(&intent.profile_type));
    }

    let stats: Vec<_> = selected_metric_keys
        .iter()
        .filter_map(|key| statistics.get(key).map(|value| (key, value)))
        .take(MAX_LINES)
        .collect();
    if !stats.is_empty() {
        text.push_str("\nKey Statistics:\n");
        for (key, value) in stats {
            let name = catalog()
                .get(key)
                .map_or_else(|| title_case(key), |m| m.name.clone());
            match value {
                Some(value) => {
                    let _ = writeln!(text, "- {name}: {value}");
                }
                None => {
                    let _ = writeln!(text, "- {name}: N/A");
                }
            }
        }
    }

    let facilities: Vec<_> = poi_category_counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .take(MAX_LINES)
        .collect();
    if !facilities.is_empty() {
        text.push_str("\nNearby Facilities:\n");
        for (category, count) in facilities {
            let _ = writeln!(text, "- {}: {count}", title_case(category));
        }
    }

    text.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_splits_on_underscores() {
        assert_eq!(title_case("senior_citizen"), "Senior Citizen");
        assert_eq!(title_case("FAMILY"), "Family");
        assert_eq!(title_case("fast_food"), "Fast Food");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn sections_follow_selection_and_skip_zero_counts() {
        let keys: Vec<String> = ["school_count", "safety_rating", "cafe_count"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let statistics = Statistics::from([
            ("cafe_count".to_string(), Some(3.0)),
            ("safety_rating".to_string(), None),
            ("school_count".to_string(), Some(12.0)),
        ]);
        let counts = BTreeMap::from([("cafe".to_string(), 3), ("hospital".to_string(), 0)]);
        let intent = UserIntent::general("senior_citizen", None);

        let text = fallback_summary(&statistics, &keys, &counts, Some(&intent));

        assert!(text.starts_with("Locality Analysis Summary"));
        assert!(text.contains("Analysis for: Senior Citizen"));
        assert!(text.contains("- Safety Rating: N/A"));
        assert!(text.contains("- Cafe: 3"));
        assert!(!text.contains("Hospital"));

        let school = text.find("School").unwrap();
        let safety = text.find("Safety Rating").unwrap();
        assert!(school < safety);
    }

    #[test]
    fn sections_are_capped() {
        let keys: Vec<String> = (0..12).map(|i| format!("metric_{i:02}")).collect();
        let statistics: Statistics = keys.iter().map(|k| (k.clone(), Some(1.0))).collect();
        let counts: BTreeMap<String, usize> =
            (0..12).map(|i| (format!("category_{i:02}"), 1)).collect();

        let text = fallback_summary(&statistics, &keys, &counts, None);
        assert_eq!(text.lines().filter(|l| l.starts_with("- Metric")).count(), MAX_LINES);
        assert_eq!(text.lines().filter(|l| l.starts_with("- Category")).count(), MAX_LINES);
        assert!(!text.contains("Analysis for"));
    }

    #[test]
    fn empty_inputs_yield_the_heading_only() {
        let text = fallback_summary(&Statistics::new(), &[], &BTreeMap::new(), None);
        assert_eq!(text, "Locality Analysis Summary");
    }
}
