//! OSM tag families, selectors, and the merged filter set sent to the
//! geodata provider.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{PoiCategory, PointOfInterest};

/// An OSM tag family that can classify a feature.
///
/// Declaration order is the classification priority order: a feature
/// carrying several families is classified by the first one listed here.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TagFamily {
    /// `amenity=*`
    Amenity,
    /// `leisure=*`
    Leisure,
    /// `shop=*`
    Shop,
    /// `highway=*`
    Highway,
    /// `railway=*`
    Railway,
    /// `tourism=*`
    Tourism,
    /// `building=*`
    Building,
}

impl TagFamily {
    /// The fixed classification priority order.
    pub const PRIORITY: [Self; 7] = [
        Self::Amenity,
        Self::Leisure,
        Self::Shop,
        Self::Highway,
        Self::Railway,
        Self::Tourism,
        Self::Building,
    ];

    /// The OSM tag key for this family.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Amenity => "amenity",
            Self::Leisure => "leisure",
            Self::Shop => "shop",
            Self::Highway => "highway",
            Self::Railway => "railway",
            Self::Tourism => "tourism",
            Self::Building => "building",
        }
    }
}

/// An extra tag condition a member must satisfy beyond its category, e.g.
/// `station ∈ {subway, metro}` for metro stations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagQualifier {
    /// Tag key to inspect.
    pub key: String,
    /// Accepted values.
    pub values: Vec<String>,
}

/// Selects points of interest by category, optionally narrowed by a
/// qualifier tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSelector {
    /// Tag family the category must come from.
    pub family: TagFamily,
    /// Accepted category values; absent means any value.
    #[serde(default)]
    pub values: Option<Vec<String>>,
    /// Optional extra tag condition.
    #[serde(default)]
    pub qualifier: Option<TagQualifier>,
}

impl TagSelector {
    /// Whether a category falls under this selector (qualifier ignored).
    #[must_use]
    pub fn matches_category(&self, category: &PoiCategory) -> bool {
        category.family == self.family
            && self
                .values
                .as_ref()
                .is_none_or(|values| values.iter().any(|v| *v == category.value))
    }

    /// Whether a point of interest satisfies the selector.
    #[must_use]
    pub fn matches(&self, poi: &PointOfInterest) -> bool {
        self.matches_category(&poi.category)
            && self.qualifier.as_ref().is_none_or(|q| {
                poi.tags
                    .get(&q.key)
                    .is_some_and(|value| q.values.iter().any(|v| v == value))
            })
    }
}

/// Values requested for one tag family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValues {
    /// Every feature carrying the tag.
    Any,
    /// Only these values.
    OneOf(BTreeSet<String>),
}

/// The union of tag selectors one request needs, merged per family.
///
/// Merging never drops a requested value: explicit value lists are unioned,
/// and [`TagValues::Any`] absorbs any list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilterSet {
    families: BTreeMap<TagFamily, TagValues>,
}

impl TagFilterSet {
    /// Creates an empty filter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            families: BTreeMap::new(),
        }
    }

    /// Merges a selector into the set.
    pub fn insert(&mut self, selector: &TagSelector) {
        let incoming = selector.values.as_ref().map_or(TagValues::Any, |values| {
            TagValues::OneOf(values.iter().cloned().collect())
        });

        match self.families.entry(selector.family) {
            Entry::Vacant(entry) => {
                entry.insert(incoming);
            }
            Entry::Occupied(mut entry) => match (entry.get_mut(), incoming) {
                (existing, TagValues::Any) => *existing = TagValues::Any,
                (TagValues::Any, TagValues::OneOf(_)) => {}
                (TagValues::OneOf(current), TagValues::OneOf(values)) => current.extend(values),
            },
        }
    }

    /// Iterates families in priority order with their requested values.
    pub fn iter(&self) -> impl Iterator<Item = (TagFamily, &TagValues)> {
        self.families.iter().map(|(family, values)| (*family, values))
    }

    /// Whether nothing is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Number of families requested.
    #[must_use]
    pub fn len(&self) -> usize {
        self.families.len()
    }
}

impl<'a> FromIterator<&'a TagSelector> for TagFilterSet {
    fn from_iter<I: IntoIterator<Item = &'a TagSelector>>(iter: I) -> Self {
        let mut set = Self::new();
        for selector in iter {
            set.insert(selector);
        }
        set
    }
}
