use serde::{Deserialize, Serialize};

use crate::valuation::domain::{GeoScope, UnitSpec};

/// One level of the widening search: the geographic scope to query and the
/// sample size that makes the tier's population statistically usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTier {
    pub scope: GeoScope,
    pub min_samples: usize,
}

/// Minimum qualifying-sample thresholds per scope. These are market tuning
/// knobs, not engine constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierMinimums {
    pub building: usize,
    pub community: usize,
    pub municipality: usize,
    pub region: usize,
}

impl TierMinimums {
    pub const fn for_scope(&self, scope: GeoScope) -> usize {
        match scope {
            GeoScope::Building => self.building,
            GeoScope::Community => self.community,
            GeoScope::Municipality => self.municipality,
            GeoScope::Region => self.region,
        }
    }
}

impl Default for TierMinimums {
    fn default() -> Self {
        Self {
            building: 5,
            community: 5,
            municipality: 8,
            region: 12,
        }
    }
}

/// Build the ordered tier ladder for a subject, narrowest scope first.
///
/// Building-centric stock leads with its building when one is identified;
/// home-type stock leads with its community, since detached homes rarely
/// close twice at a single address. Scopes the subject cannot address are
/// skipped entirely, so the ladder never reaches below the spec's own
/// geographic precision.
pub fn ladder_for(subject: &UnitSpec, minimums: &TierMinimums) -> Vec<SearchTier> {
    let narrowest = if subject.category.is_building_centric()
        && subject.geography.key_for(GeoScope::Building).is_some()
    {
        GeoScope::Building
    } else {
        GeoScope::Community
    };

    [narrowest, GeoScope::Municipality, GeoScope::Region]
        .into_iter()
        .filter(|scope| subject.geography.key_for(*scope).is_some())
        .map(|scope| SearchTier {
            scope,
            min_samples: minimums.for_scope(scope),
        })
        .collect()
}
