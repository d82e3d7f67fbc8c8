use assert_matches::assert_matches;

use super::*;

fn profile(name: &str, values: &[f32]) -> Profile {
    Profile {
        name: name.to_string(),
        n_cells: 1,
        values: values.to_vec(),
    }
}

#[test]
fn test_new_sorts_genes_and_profiles() {
    let store = ProfileStore::new(
        ProfileScale::Linear,
        vec!["ZFP".to_string(), "ACTB".to_string(), "MYC".to_string()],
        vec![profile("T", &[1.0, 2.0, 3.0]), profile("B", &[4.0, 5.0, 6.0])],
    )
    .unwrap();

    assert_eq!(store.genes(), &["ACTB", "MYC", "ZFP"]);
    assert_eq!(store.profiles()[0].name, "B");
    assert_eq!(store.profiles()[0].values, vec![5.0, 6.0, 4.0]);
    assert_eq!(store.find("T").unwrap().values, vec![2.0, 3.0, 1.0]);
    assert_eq!(store.gene_index("MYC"), Some(1));
    assert_eq!(store.gene_index("CD3E"), None);
}

#[test]
fn test_new_rejects_length_mismatch() {
    let err = ProfileStore::new(
        ProfileScale::Linear,
        vec!["A".to_string(), "B".to_string()],
        vec![profile("X", &[1.0])],
    )
    .unwrap_err();
    assert_matches!(err, ReferenceError::LengthMismatch { .. });
}

#[test]
fn test_new_rejects_duplicates() {
    let genes = ProfileStore::new(
        ProfileScale::Linear,
        vec!["A".to_string(), "A".to_string()],
        vec![],
    );
    assert!(matches!(
        genes,
        Err(ReferenceError::Matrix(MatrixError::DuplicateGene(_)))
    ));

    let names = ProfileStore::new(
        ProfileScale::Linear,
        vec!["A".to_string()],
        vec![profile("X", &[1.0]), profile("X", &[2.0])],
    );
    assert!(names.is_err());
}

#[test]
fn test_empty_universe() {
    let err = ProfileStore::new(ProfileScale::Log1p, vec![], vec![]).unwrap_err();
    assert_matches!(err, ReferenceError::EmptyGeneUniverse);
}
