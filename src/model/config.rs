use std::fs;
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ReferenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
        }
    }
}

/// Numeric scale on which cells are aggregated into profiles and queries are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileScale {
    Linear,
    Log1p,
}

impl ProfileScale {
    #[inline]
    pub fn apply(self, value: f32) -> f32 {
        match self {
            ProfileScale::Linear => value,
            ProfileScale::Log1p => value.ln_1p(),
        }
    }
}

/// How leaf profiles are combined into internal taxonomy nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProfileWeighting {
    /// Every member leaf counts once.
    Leaves,
    /// Member leaves are weighted by their reference cell counts.
    Cells,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub method: CorrelationMethod,
    pub n_genes: usize,
    pub threshold: f32,
    pub fine_tune: bool,
    pub fine_tune_margin: f32,
    pub fine_tune_epsilon: f32,
    pub fine_tune_genes_per_pair: usize,
    pub min_shared_genes: usize,
    pub gene_loss_warn_fraction: f32,
    pub scale: ProfileScale,
    pub weighting: ProfileWeighting,
    /// 0 uses every available core.
    pub workers: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            method: CorrelationMethod::Spearman,
            n_genes: 200,
            threshold: 0.1,
            fine_tune: true,
            fine_tune_margin: 0.05,
            fine_tune_epsilon: 1e-3,
            fine_tune_genes_per_pair: 50,
            min_shared_genes: 10,
            gene_loss_warn_fraction: 0.2,
            scale: ProfileScale::Log1p,
            weighting: ProfileWeighting::Leaves,
            workers: 0,
        }
    }
}

impl ClassifierConfig {
    pub fn load(path: &Path) -> Result<Self, ReferenceError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ReferenceError::Config(format!("{}: {e}", path.display())))?;
        let config: ClassifierConfig = serde_json::from_str(&content)
            .map_err(|e| ReferenceError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReferenceError> {
        if self.n_genes == 0 {
            return Err(ReferenceError::Config("n_genes must be > 0".to_string()));
        }
        if self.min_shared_genes == 0 {
            return Err(ReferenceError::Config(
                "min_shared_genes must be > 0".to_string(),
            ));
        }
        if self.fine_tune_genes_per_pair == 0 {
            return Err(ReferenceError::Config(
                "fine_tune_genes_per_pair must be > 0".to_string(),
            ));
        }
        if !self.threshold.is_finite() {
            return Err(ReferenceError::Config("threshold must be finite".to_string()));
        }
        if !(0.0..=1.0).contains(&self.gene_loss_warn_fraction) {
            return Err(ReferenceError::Config(
                "gene_loss_warn_fraction must be within [0, 1]".to_string(),
            ));
        }
        if !(self.fine_tune_margin >= 0.0 && self.fine_tune_epsilon >= 0.0) {
            return Err(ReferenceError::Config(
                "fine-tuning margin and epsilon must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/config.rs"]
mod tests;
