use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::model::config::{CorrelationMethod, ProfileScale};
use crate::model::profile::{Profile, ProfileStore};
use crate::model::taxonomy::NodeId;
use crate::pipeline::fixtures::*;

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_dir() -> std::path::PathBuf {
    let idx = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "kira_celltyper_pipeline_{}_{}",
        std::process::id(),
        idx
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_build_reference_from_labelled_cells() {
    let (matrix, labels) = abc_reference();
    let config = linear_config(CorrelationMethod::Pearson);
    let bundle = build_reference(
        "abc",
        &[ReferenceSet {
            matrix: &matrix,
            labels: &labels,
        }],
        &config,
    )
    .unwrap();

    assert_eq!(bundle.name, "abc");
    assert_eq!(bundle.profiles, abc_store());
    assert_eq!(bundle.taxonomy.root(), NodeId(4));
    assert_eq!(
        bundle.taxonomy.node(NodeId(3)).children,
        Some([NodeId(0), NodeId(1)])
    );
}

#[test]
fn test_build_reference_rejects_invalid_config() {
    let (matrix, labels) = abc_reference();
    let mut config = linear_config(CorrelationMethod::Pearson);
    config.n_genes = 0;
    let err = build_reference(
        "abc",
        &[ReferenceSet {
            matrix: &matrix,
            labels: &labels,
        }],
        &config,
    )
    .unwrap_err();
    assert!(matches!(err, ReferenceError::Config(_)));
}

#[test]
fn test_bundle_survives_save_and_load() {
    let (matrix, labels) = abc_reference();
    let bundle = build_reference(
        "abc",
        &[ReferenceSet {
            matrix: &matrix,
            labels: &labels,
        }],
        &linear_config(CorrelationMethod::Spearman),
    )
    .unwrap();

    let path = temp_dir().join("nested").join("abc.json");
    bundle.save(&path).unwrap();
    let loaded = ReferenceBundle::load(&path).unwrap();
    assert_eq!(loaded, bundle);
}

#[test]
fn test_corrupt_bundle_is_rejected() {
    let dir = temp_dir();
    let path = dir.join("broken.json");
    std::fs::write(&path, "{\"name\": \"abc\"").unwrap();
    assert!(matches!(
        ReferenceBundle::load(&path),
        Err(ReferenceError::Json(_))
    ));

    let (matrix, labels) = abc_reference();
    let mut bundle = build_reference(
        "abc",
        &[ReferenceSet {
            matrix: &matrix,
            labels: &labels,
        }],
        &linear_config(CorrelationMethod::Pearson),
    )
    .unwrap();
    let other = ProfileStore::new(
        ProfileScale::Linear,
        vec!["x".to_string()],
        vec![Profile {
            name: "Z".to_string(),
            n_cells: 1,
            values: vec![1.0],
        }],
    )
    .unwrap();
    bundle.taxonomy =
        build_taxonomy(&other, &linear_config(CorrelationMethod::Pearson)).unwrap();
    let path = dir.join("mismatch.json");
    bundle.save(&path).unwrap();
    assert!(matches!(
        ReferenceBundle::load(&path),
        Err(ReferenceError::InvalidTaxonomy(_))
    ));
}
