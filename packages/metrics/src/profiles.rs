//! Profile archetypes and their default metric selections.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use serde::Deserialize;

use crate::CatalogError;

/// Fewest metrics a selection may hold.
pub const MIN_SELECTION: usize = 5;

/// Most metrics a selection may hold.
pub const MAX_SELECTION: usize = 8;

/// Id of the catch-all archetype.
pub const GENERAL_PROFILE: &str = "general";

const PROFILES_TOML: &str = include_str!("../catalog/profiles.toml");

static PROFILES: LazyLock<ProfileTable> = LazyLock::new(|| {
    ProfileTable::from_toml(PROFILES_TOML)
        .unwrap_or_else(|e| panic!("Failed to load profiles.toml: {e}"))
});

/// Returns the process-wide archetype table.
///
/// # Panics
///
/// Panics on first access if the embedded table is malformed.
#[must_use]
pub fn profiles() -> &'static ProfileTable {
    &PROFILES
}

/// A user archetype with a static default metric selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileArchetype {
    /// Machine id reported as the profile type, e.g. `senior_citizen`.
    pub id: String,
    /// Display label, e.g. `Senior Citizen`.
    pub label: String,
    /// Lowercase fragments that select this archetype in the fallback.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Default metric keys, in priority order.
    pub defaults: Vec<String>,
}

#[derive(Deserialize)]
struct ProfilesFile {
    profile: Vec<ProfileArchetype>,
}

/// Ordered archetypes; always contains [`GENERAL_PROFILE`].
#[derive(Debug, Clone)]
pub struct ProfileTable {
    profiles: Vec<ProfileArchetype>,
    general: usize,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('_', " ")
}

impl ProfileTable {
    /// Parses and validates an archetype table.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the TOML is malformed, ids repeat, or the
    /// general archetype is missing.
    pub fn from_toml(toml_str: &str) -> Result<Self, CatalogError> {
        let file: ProfilesFile = toml::from_str(toml_str)?;

        let mut ids = BTreeSet::new();
        for profile in &file.profile {
            if !ids.insert(profile.id.as_str()) {
                return Err(CatalogError::InvalidProfiles {
                    message: format!("duplicate profile id '{}'", profile.id),
                });
            }
        }

        let general = file
            .profile
            .iter()
            .position(|p| p.id == GENERAL_PROFILE)
            .ok_or_else(|| CatalogError::InvalidProfiles {
                message: format!("missing '{GENERAL_PROFILE}' profile"),
            })?;

        Ok(Self {
            profiles: file.profile,
            general,
        })
    }

    /// The catch-all archetype.
    #[must_use]
    pub fn general(&self) -> &ProfileArchetype {
        &self.profiles[self.general]
    }

    /// Looks up an archetype by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ProfileArchetype> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Iterates archetypes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProfileArchetype> {
        self.profiles.iter()
    }

    /// Picks an archetype from free profile text by keyword containment.
    ///
    /// Archetypes are tried in declaration order; no match yields
    /// [`ProfileTable::general`].
    #[must_use]
    pub fn keyword_fallback(&self, profile_text: &str) -> &ProfileArchetype {
        let lower = profile_text.to_lowercase();
        self.profiles
            .iter()
            .find(|p| p.keywords.iter().any(|k| lower.contains(k.as_str())))
            .unwrap_or_else(|| self.general())
    }

    /// Resolves profile text to an archetype.
    ///
    /// An exact id or label match (case-insensitive, `_` read as a space)
    /// wins over [`ProfileTable::keyword_fallback`], so a fixed label such
    /// as `senior_citizen` always maps to its own archetype.
    #[must_use]
    pub fn archetype_for(&self, profile: &str) -> &ProfileArchetype {
        let wanted = normalize(profile);
        self.profiles
            .iter()
            .find(|p| normalize(&p.id) == wanted || normalize(&p.label) == wanted)
            .unwrap_or_else(|| self.keyword_fallback(profile))
    }

    /// Bounds a selection to [`MIN_SELECTION`]..=[`MAX_SELECTION`] keys.
    ///
    /// Duplicates are removed, long selections truncated, and short ones
    /// padded from the general defaults.
    #[must_use]
    pub fn bound_selection(&self, keys: Vec<String>) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut bounded: Vec<String> = keys
            .into_iter()
            .filter(|k| seen.insert(k.clone()))
            .take(MAX_SELECTION)
            .collect();

        for key in &self.general().defaults {
            if bounded.len() >= MIN_SELECTION {
                break;
            }
            if !bounded.contains(key) {
                bounded.push(key.clone());
            }
        }

        bounded
    }
}
