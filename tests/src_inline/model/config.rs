use super::*;

#[test]
fn test_defaults() {
    let cfg = ClassifierConfig::default();
    assert_eq!(cfg.n_genes, 200);
    assert_eq!(cfg.threshold, 0.1);
    assert_eq!(cfg.min_shared_genes, 10);
    assert_eq!(cfg.gene_loss_warn_fraction, 0.2);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let cfg: ClassifierConfig =
        serde_json::from_str(r#"{"method":"pearson","threshold":0.25}"#).unwrap();
    assert_eq!(cfg.method, CorrelationMethod::Pearson);
    assert_eq!(cfg.threshold, 0.25);
    assert_eq!(cfg.n_genes, 200);
    assert_eq!(cfg.scale, ProfileScale::Log1p);
}

#[test]
fn test_validate_rejects_bad_values() {
    let mut cfg = ClassifierConfig::default();
    cfg.n_genes = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = ClassifierConfig::default();
    cfg.gene_loss_warn_fraction = 1.5;
    assert!(cfg.validate().is_err());

    let mut cfg = ClassifierConfig::default();
    cfg.threshold = f32::NAN;
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scale_apply() {
    assert_eq!(ProfileScale::Linear.apply(3.0), 3.0);
    assert_eq!(ProfileScale::Log1p.apply(0.0), 0.0);
}
