pub mod stage1_profiles;
pub mod stage2_genes;
pub mod stage3_flat;
pub mod stage4_taxonomy;
pub mod stage5_hierarchy;
pub mod stage6_threshold;
pub mod stage7_report;
pub mod workers;

use crate::error::ReferenceError;
use crate::model::config::ClassifierConfig;
use crate::model::reference::ReferenceBundle;
use crate::pipeline::stage1_profiles::{ReferenceSet, build_profile_store};
use crate::pipeline::stage4_taxonomy::build_taxonomy;

/// Profile store and taxonomy for one labelled reference, built once and read-only afterwards.
pub fn build_reference(
    name: &str,
    sets: &[ReferenceSet<'_>],
    config: &ClassifierConfig,
) -> Result<ReferenceBundle, ReferenceError> {
    config.validate()?;
    let profiles = build_profile_store(sets, config.scale)?;
    let taxonomy = build_taxonomy(&profiles, config)?;
    ReferenceBundle::new(name, profiles, taxonomy)
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/fixtures.rs"]
pub(crate) mod fixtures;

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;
