//! Per-slide feature store layout and bag sampling
//!
//! Every slide is a group holding one `[n_patches, d]` array per feature
//! variant plus the patch coordinates:
//!
//! ```text
//! <slide>/
//!   coords                 [n_patches, 2]
//!   feats                  original features
//!   feats_norm             colour-normalised features
//!   feats_augs/<name>      one array per augmentation
//! ```
//!
//! A bag draws patches across all slides of a patient and picks one feature
//! variant per patch.

use rand::seq::index;
use rand::Rng;
use std::fmt;
use thiserror::Error;

/// Name selecting the unaugmented features
pub const ORIGINAL_FEATURES: &str = "ORIGINAL";
/// Name selecting the colour-normalised features
pub const NORMALIZED_FEATURES: &str = "NORMALIZED";
/// Coordinates array of a slide group
pub const COORDS_ARRAY: &str = "coords";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    #[error("at least one feature variant must be selected")]
    NoFeatureGroups,
}

/// One feature variant stored per slide
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureGroup {
    Original,
    Normalized,
    Augmented(String),
}

impl FeatureGroup {
    pub fn from_augmentation_name(name: &str) -> Self {
        match name {
            ORIGINAL_FEATURES => FeatureGroup::Original,
            NORMALIZED_FEATURES => FeatureGroup::Normalized,
            other => FeatureGroup::Augmented(other.to_string()),
        }
    }

    /// Array path inside the slide group
    pub fn path(&self) -> String {
        match self {
            FeatureGroup::Original => "feats".to_string(),
            FeatureGroup::Normalized => "feats_norm".to_string(),
            FeatureGroup::Augmented(name) => format!("feats_augs/{}", name),
        }
    }
}

impl fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureGroup::Original => f.write_str(ORIGINAL_FEATURES),
            FeatureGroup::Normalized => f.write_str(NORMALIZED_FEATURES),
            FeatureGroup::Augmented(name) => f.write_str(name),
        }
    }
}

/// Which feature variants a bag may draw from, and how many patches
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSelection {
    groups: Vec<FeatureGroup>,
    instances_per_bag: Option<usize>,
}

impl FeatureSelection {
    pub fn new<S: AsRef<str>>(
        augmentations: &[S],
        instances_per_bag: Option<usize>,
    ) -> Result<Self, SamplingError> {
        if augmentations.is_empty() {
            return Err(SamplingError::NoFeatureGroups);
        }
        let groups: Vec<FeatureGroup> = augmentations
            .iter()
            .map(|name| FeatureGroup::from_augmentation_name(name.as_ref()))
            .collect();
        if !groups.contains(&FeatureGroup::Original) {
            tracing::warn!(
                "Feature selection without {} never yields unaugmented features",
                ORIGINAL_FEATURES
            );
        }
        Ok(Self {
            groups,
            instances_per_bag,
        })
    }

    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    pub fn instances_per_bag(&self) -> Option<usize> {
        self.instances_per_bag
    }

    /// Draw a bag from slides holding `patches_per_slide` patches each.
    ///
    /// Picks `min(total, instances_per_bag)` distinct (slide, patch) pairs
    /// uniformly and a feature variant per pick.
    pub fn plan<R: Rng + ?Sized>(&self, patches_per_slide: &[usize], rng: &mut R) -> SamplingPlan {
        let total: usize = patches_per_slide.iter().sum();
        let amount = self.instances_per_bag.map_or(total, |cap| cap.min(total));

        let mut picks: Vec<PatchPick> = index::sample(rng, total, amount)
            .into_iter()
            .map(|flat| {
                let (slide, patch) = locate(patches_per_slide, flat);
                PatchPick {
                    slide,
                    patch,
                    group: rng.gen_range(0..self.groups.len()),
                }
            })
            .collect();
        picks.sort();

        SamplingPlan {
            groups: self.groups.clone(),
            picks,
        }
    }
}

/// Map a flat patch index onto (slide, patch-within-slide).
fn locate(patches_per_slide: &[usize], mut flat: usize) -> (usize, usize) {
    for (slide, &n) in patches_per_slide.iter().enumerate() {
        if flat < n {
            return (slide, flat);
        }
        flat -= n;
    }
    unreachable!("sampled index lies within the total patch count")
}

/// One sampled patch; ordering groups reads by slide, then variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PatchPick {
    pub slide: usize,
    /// Index into the selection's feature groups
    pub group: usize,
    pub patch: usize,
}

/// Patches to read from one array of one slide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayRead<'p> {
    pub slide: usize,
    pub group: &'p FeatureGroup,
    pub patches: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingPlan {
    groups: Vec<FeatureGroup>,
    picks: Vec<PatchPick>,
}

impl SamplingPlan {
    pub fn picks(&self) -> &[PatchPick] {
        &self.picks
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    /// Picks batched per (slide, feature array), in read order.
    pub fn reads(&self) -> Vec<ArrayRead<'_>> {
        let mut reads: Vec<ArrayRead<'_>> = Vec::new();
        for pick in &self.picks {
            match reads.last_mut() {
                Some(last)
                    if last.slide == pick.slide && *last.group == self.groups[pick.group] =>
                {
                    last.patches.push(pick.patch)
                }
                _ => reads.push(ArrayRead {
                    slide: pick.slide,
                    group: &self.groups[pick.group],
                    patches: vec![pick.patch],
                }),
            }
        }
        reads
    }
}
