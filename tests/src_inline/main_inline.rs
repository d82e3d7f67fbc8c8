use super::*;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("kira-celltyper").chain(args.iter().copied())).unwrap()
}

#[test]
fn test_classify_defaults_to_both_modes() {
    let cli = parse(&[
        "classify", "--bundle", "ref.json", "--input", "data", "--out", "out",
    ]);
    let Commands::Classify(args) = cli.command else {
        panic!("expected classify");
    };
    assert_eq!(args.mode, Mode::Both);
    assert_eq!(args.bundle, vec![PathBuf::from("ref.json")]);
    assert!(!args.normalize);

    let config = args.config.resolve().unwrap();
    assert_eq!(config, ClassifierConfig::default());
}

#[test]
fn test_classify_overrides() {
    let cli = parse(&[
        "classify",
        "--bundle",
        "a.json",
        "--bundle",
        "b.json",
        "--input",
        "data",
        "--out",
        "out",
        "--mode",
        "flat",
        "--method",
        "pearson",
        "--threshold",
        "0.3",
        "--n-genes",
        "50",
        "--no-fine-tune",
        "--threads",
        "4",
    ]);
    let Commands::Classify(args) = cli.command else {
        panic!("expected classify");
    };
    assert_eq!(args.mode, Mode::Flat);
    assert_eq!(args.bundle.len(), 2);

    let config = args.config.resolve().unwrap();
    assert_eq!(config.method, CorrelationMethod::Pearson);
    assert_eq!(config.threshold, 0.3);
    assert_eq!(config.n_genes, 50);
    assert!(!config.fine_tune);
    assert_eq!(config.workers, 4);
}

#[test]
fn test_build_accepts_scale_and_weighting() {
    let cli = parse(&[
        "build",
        "--reference",
        "ref",
        "--labels",
        "labels.tsv",
        "--out",
        "ref.json",
        "--scale",
        "linear",
        "--weighting",
        "cells",
        "--label-column",
        "fine",
    ]);
    let Commands::Build(args) = cli.command else {
        panic!("expected build");
    };
    assert_eq!(args.label_column.as_deref(), Some("fine"));
    let config = args.config.resolve().unwrap();
    assert_eq!(config.scale, ProfileScale::Linear);
    assert_eq!(config.weighting, ProfileWeighting::Cells);
}

#[test]
fn test_invalid_override_is_rejected() {
    let args = ConfigArgs {
        n_genes: Some(0),
        ..ConfigArgs::default()
    };
    assert!(matches!(args.resolve(), Err(ReferenceError::Config(_))));
}

#[test]
fn test_relabel_requires_threshold() {
    let res = Cli::try_parse_from([
        "kira-celltyper",
        "relabel",
        "--bundle",
        "ref.json",
        "--scores",
        "scores.json",
        "--out",
        "out",
    ]);
    assert!(res.is_err());
}
