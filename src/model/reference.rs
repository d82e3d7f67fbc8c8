use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;
use crate::model::profile::ProfileStore;
use crate::model::taxonomy::{NodeId, Taxonomy};

/// Profiles plus the taxonomy built from them. Persisted as an opaque JSON cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceBundle {
    pub name: String,
    pub tool_version: String,
    pub profiles: ProfileStore,
    pub taxonomy: Taxonomy,
}

impl ReferenceBundle {
    pub fn new(
        name: impl Into<String>,
        profiles: ProfileStore,
        taxonomy: Taxonomy,
    ) -> Result<Self, ReferenceError> {
        let bundle = Self {
            name: name.into(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            profiles,
            taxonomy,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<(), ReferenceError> {
        self.profiles.validate()?;
        self.taxonomy.validate()?;

        if self.taxonomy.n_leaves() != self.profiles.len() {
            return Err(ReferenceError::InvalidTaxonomy(format!(
                "{} leaves for {} profiles",
                self.taxonomy.n_leaves(),
                self.profiles.len()
            )));
        }
        for (idx, profile) in self.profiles.profiles().iter().enumerate() {
            let leaf = self.taxonomy.node(NodeId(idx));
            if leaf.name.as_deref() != Some(profile.name.as_str()) {
                return Err(ReferenceError::InvalidTaxonomy(format!(
                    "leaf {} does not match profile '{}'",
                    leaf.id, profile.name
                )));
            }
        }
        if self.taxonomy.node(NodeId(0)).profile.len() != self.profiles.n_genes() {
            return Err(ReferenceError::InvalidTaxonomy(
                "taxonomy profiles do not span the gene universe".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), ReferenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut w = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let reader = BufReader::new(File::open(path)?);
        let bundle: ReferenceBundle = serde_json::from_reader(reader)?;
        bundle.validate()?;
        tracing::info!(
            name = %bundle.name,
            types = bundle.profiles.len(),
            genes = bundle.profiles.n_genes(),
            "loaded reference bundle {}",
            path.display()
        );
        Ok(bundle)
    }
}
