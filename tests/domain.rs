use assert_matches::assert_matches;

use rnaseq_load::domain::{
    BiologicalAttributes, ExperimentId, ExpressionLevel, GeneId, ReplicateKey, RunId, SampleId,
};
use rnaseq_load::error::LoadError;

#[test]
fn parse_experiment_id_valid() {
    let id: ExperimentId = "E-GEOD-43721".parse().unwrap();
    assert_eq!(id.as_str(), "E-GEOD-43721");
    assert_eq!(id.to_string(), "E-GEOD-43721");
}

#[test]
fn parse_experiment_id_invalid() {
    for value in ["", "E-MTAB", "E-MTA-1", "E-MTAB-12a", "SRP000001"] {
        let err = value.parse::<ExperimentId>().unwrap_err();
        assert_matches!(err, LoadError::InvalidExperimentId(_));
    }
}

#[test]
fn identifiers_are_trimmed() {
    let sample: SampleId = " liver_rep1 ".parse().unwrap();
    let run: RunId = "ERR1234\r".parse().unwrap();
    assert_eq!(sample.as_str(), "liver_rep1");
    assert_eq!(run.as_str(), "ERR1234");
}

#[test]
fn empty_identifier_is_rejected() {
    let err = "   ".parse::<GeneId>().unwrap_err();
    assert_matches!(err, LoadError::InvalidIdentifier { kind: "gene", .. });
}

#[test]
fn expression_level_labels() {
    assert_eq!(ExpressionLevel::BelowCutoff.to_string(), "Below Cutoff");
    assert_eq!(ExpressionLevel::High.as_str(), "High");
    assert_eq!(
        serde_json::to_string(&ExpressionLevel::BelowCutoff).unwrap(),
        "\"Below Cutoff\""
    );
}

#[test]
fn replicate_keys_order_by_attributes() {
    let experiment: ExperimentId = "E-MTAB-1".parse().unwrap();
    let heart = BiologicalAttributes {
        structure: "heart".to_string(),
        ..BiologicalAttributes::default()
    };
    let liver = BiologicalAttributes {
        structure: "liver".to_string(),
        ..BiologicalAttributes::default()
    };
    assert!(ReplicateKey::new(&experiment, &heart) < ReplicateKey::new(&experiment, &liver));
}
