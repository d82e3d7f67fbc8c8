use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, ReferenceError};
use crate::model::config::ProfileScale;

/// Aggregate expression of one reference cell type, aligned to the store's gene universe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub n_cells: usize,
    pub values: Vec<f32>,
}

/// Read-only set of reference profiles sharing one sorted gene universe.
///
/// Gene order is lexicographic, so gene index order doubles as the identifier order used for
/// deterministic tie-breaking. Profiles are kept sorted by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStore {
    scale: ProfileScale,
    genes: Vec<String>,
    profiles: Vec<Profile>,
}

impl ProfileStore {
    pub fn new(
        scale: ProfileScale,
        genes: Vec<String>,
        mut profiles: Vec<Profile>,
    ) -> Result<Self, ReferenceError> {
        if genes.is_empty() {
            return Err(ReferenceError::EmptyGeneUniverse);
        }
        for profile in &profiles {
            if profile.values.len() != genes.len() {
                return Err(ReferenceError::LengthMismatch {
                    name: profile.name.clone(),
                    got: profile.values.len(),
                    expected: genes.len(),
                });
            }
        }

        let mut order: Vec<usize> = (0..genes.len()).collect();
        order.sort_by(|&a, &b| genes[a].cmp(&genes[b]));
        let sorted_genes: Vec<String> = order.iter().map(|&i| genes[i].clone()).collect();
        for profile in &mut profiles {
            profile.values = order.iter().map(|&i| profile.values[i]).collect();
        }
        profiles.sort_by(|a, b| a.name.cmp(&b.name));

        let store = Self {
            scale,
            genes: sorted_genes,
            profiles,
        };
        store.validate()?;
        Ok(store)
    }

    /// Re-checks the invariants; used after loading a persisted bundle.
    pub fn validate(&self) -> Result<(), ReferenceError> {
        if self.genes.is_empty() {
            return Err(ReferenceError::EmptyGeneUniverse);
        }
        for pair in self.genes.windows(2) {
            if pair[0] == pair[1] {
                return Err(MatrixError::DuplicateGene(pair[0].clone()).into());
            }
            if pair[0] > pair[1] {
                return Err(ReferenceError::InvalidTaxonomy(
                    "profile store genes are not sorted".to_string(),
                ));
            }
        }
        for pair in self.profiles.windows(2) {
            if pair[0].name >= pair[1].name {
                return Err(ReferenceError::InvalidTaxonomy(format!(
                    "profile names are duplicated or unsorted near '{}'",
                    pair[1].name
                )));
            }
        }
        for profile in &self.profiles {
            if profile.values.len() != self.genes.len() {
                return Err(ReferenceError::LengthMismatch {
                    name: profile.name.clone(),
                    got: profile.values.len(),
                    expected: self.genes.len(),
                });
            }
        }
        Ok(())
    }

    pub fn scale(&self) -> ProfileScale {
        self.scale
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn gene_index(&self, gene: &str) -> Option<usize> {
        self.genes.binary_search_by(|g| g.as_str().cmp(gene)).ok()
    }

    pub fn find(&self, name: &str) -> Option<&Profile> {
        self.profiles
            .binary_search_by(|p| p.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.profiles[idx])
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/profile.rs"]
mod tests;
