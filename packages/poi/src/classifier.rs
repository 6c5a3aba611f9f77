//! Single-category classification of raw features.

use locality_lens_analysis_models::{PoiCategory, RawFeature, TagFamily};

/// Classifies a feature by the first tag family, in
/// [`TagFamily::PRIORITY`] order, that carries a non-empty value.
///
/// Returns `None` for unclassified features, which belong to no bucket.
#[must_use]
pub fn classify(feature: &RawFeature) -> Option<PoiCategory> {
    TagFamily::PRIORITY.iter().find_map(|&family| {
        feature.tag(family.key()).map(|value| PoiCategory {
            family,
            value: value.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn feature(tags: &[(&str, &str)]) -> RawFeature {
        RawFeature {
            id: "node/1".to_string(),
            tags: tags
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect::<BTreeMap<_, _>>(),
            geometry: None,
        }
    }

    #[test]
    fn amenity_wins_over_shop() {
        let category = classify(&feature(&[("shop", "bakery"), ("amenity", "cafe")])).unwrap();
        assert_eq!(category.family, TagFamily::Amenity);
        assert_eq!(category.value, "cafe");
    }

    #[test]
    fn empty_value_is_skipped() {
        let category = classify(&feature(&[("amenity", "  "), ("leisure", "park")])).unwrap();
        assert_eq!(category.family, TagFamily::Leisure);
        assert_eq!(category.to_string(), "park");
    }

    #[test]
    fn railway_before_tourism() {
        let category =
            classify(&feature(&[("tourism", "attraction"), ("railway", "station")])).unwrap();
        assert_eq!(category.family, TagFamily::Railway);
    }

    #[test]
    fn unknown_tags_are_unclassified() {
        assert!(classify(&feature(&[("name", "Somewhere"), ("landuse", "grass")])).is_none());
        assert!(classify(&feature(&[])).is_none());
    }
}
