use std::fs;

use camino::Utf8PathBuf;
use chrono::NaiveDate;

use rnaseq_load::domain::{BiologicalAttributes, ExperimentId, ExpressionLevel, ReplicateKey};
use rnaseq_load::emit::{
    DetailRecord, RecordStreams, SetAssociationRecord, SetMemberRecord, SetRecord, SetStreams,
    SummaryRecord,
};
use rnaseq_load::store::{
    DETAIL_FILE, LoadStamp, SET_CACHE_FILE, SET_MEMBER_FILE, SUMMARY_FILE, Store,
};

fn store() -> (tempfile::TempDir, Store) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("output")).unwrap();
    (temp, Store::new(root))
}

fn stamp() -> LoadStamp {
    LoadStamp::on(1613, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap())
}

#[test]
fn layout_paths() {
    let (_temp, store) = store();
    assert!(store.path(SUMMARY_FILE).ends_with("output/rnaseq_combined.bcp"));
    assert!(store.path(DETAIL_FILE).ends_with("output/rnaseq.bcp"));
}

#[test]
fn write_records_as_tab_delimited_rows() {
    let (_temp, store) = store();
    let experiment: ExperimentId = "E-MTAB-1".parse().unwrap();
    let streams = RecordStreams {
        summaries: vec![SummaryRecord {
            id: 1,
            set_id: Some(3),
            experiment,
            gene: "ENSMUSG00000000001".parse().unwrap(),
            marker: Some("MGI:95773".to_string()),
            level: ExpressionLevel::Medium,
            num_replicates: 2,
            average_tpm: 42.0,
        }],
        details: vec![DetailRecord {
            id: 1,
            summary_id: 1,
            sample: "liver_1".parse().unwrap(),
            gene: "ENSMUSG00000000001".parse().unwrap(),
            raw_tpm: 40.25,
            normalized_tpm: 42.5,
        }],
        associations: vec![SetAssociationRecord {
            id: 1,
            summary_id: 1,
            set_id: 3,
        }],
    };

    let written = store.write_records(&streams, &stamp()).unwrap();

    let suffix = "1613\t1613\t10/01/2026\t10/01/2026\n";
    assert_eq!(written.len(), 3);
    assert_eq!(
        fs::read_to_string(store.path(SUMMARY_FILE).as_std_path()).unwrap(),
        format!("1\tE-MTAB-1\tENSMUSG00000000001\tMGI:95773\tMedium\t2\t42\t3\t{suffix}")
    );
    assert_eq!(
        fs::read_to_string(store.path(DETAIL_FILE).as_std_path()).unwrap(),
        format!("1\t1\tliver_1\tENSMUSG00000000001\t40.25\t42.5\t{suffix}")
    );
    assert_eq!(
        fs::read_to_string(store.path(SET_CACHE_FILE).as_std_path()).unwrap(),
        format!("1\t1\t3\t{suffix}")
    );
}

#[test]
fn write_sets_includes_members() {
    let (_temp, store) = store();
    let experiment: ExperimentId = "E-MTAB-1".parse().unwrap();
    let attributes = BiologicalAttributes {
        structure: "liver".to_string(),
        note: Some("pooled".to_string()),
        ..BiologicalAttributes::default()
    };
    let streams = SetStreams {
        sets: vec![SetRecord {
            id: 1,
            key: ReplicateKey::new(&experiment, &attributes),
        }],
        members: vec![SetMemberRecord {
            id: 1,
            set_id: 1,
            sample: "liver_1".parse().unwrap(),
        }],
    };

    store.write_sets(&streams, &stamp()).unwrap();

    let members = fs::read_to_string(store.path(SET_MEMBER_FILE).as_std_path()).unwrap();
    assert_eq!(members, "1\t1\tliver_1\t1613\t1613\t10/01/2026\t10/01/2026\n");
}
