//! Written files read back to the same records.

use pretty_assertions::assert_eq;
use sysrev_merge::{
    assemble, merge, ExtractionMethod, ExtractionRecord, FieldSchema, Normaliser, RawCandidate,
    SourceTag,
};
use sysrev_store::{
    processed_ids, read_records, read_screening, write_records, write_screening, Decision,
    ProgressStore, ScreeningRow,
};

fn record(schema: &FieldSchema, id: &str) -> ExtractionRecord {
    let n = Normaliser::default();
    let table = n.normalise_all(schema, &[
        RawCandidate::new("scanner_strength", SourceTag::Table, Some("1.5T".into())),
        RawCandidate::new("group_comparison_p_value", SourceTag::Table, Some("0.42".into())),
        RawCandidate::new("mean_age_patient", SourceTag::Table, None),
        RawCandidate::new("title", SourceTag::Table, Some("Free water, \"corrected\" FA\nin PD".into())),
        RawCandidate::new("te", SourceTag::Table, Some("p < 0.05".into())),
    ]);
    let text = n.normalise_all(schema, &[
        RawCandidate::new("scanner_strength", SourceTag::Text, Some("3T".into())),
        RawCandidate::new("group_comparison_p_value", SourceTag::Text, Some("0.420".into())),
        RawCandidate::new("mean_age_patient", SourceTag::Text, Some("68 ± 5 years".into())),
        RawCandidate::new("doi", SourceTag::Text, Some("See Table 2".into())),
        RawCandidate::new("te", SourceTag::Text, Some("P < 0.05".into())),
    ]);
    assemble(id, merge(schema, &table, &text))
        .with_method(ExtractionMethod::Hybrid)
        .with_notes("table source: 2 tables")
}

#[test]
fn extraction_records_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("extraction.csv");
    let schema = FieldSchema::builtin();

    let failed = ExtractionRecord::failed(&schema, "broken.pdf", "conversion failed; text extraction failed");
    let written = vec![record(&schema, "a.pdf"), failed];
    write_records(&path, &schema, &written).unwrap();

    let read = read_records(&path, &schema).unwrap();
    assert_eq!(read, written);

    let ids = processed_ids(&path).unwrap();
    assert!(ids.contains("a.pdf") && ids.contains("broken.pdf"));
}

#[test]
fn header_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extraction.csv");
    let schema = FieldSchema::builtin();
    write_records(&path, &schema, &[record(&schema, "a.pdf")]).unwrap();

    let narrow = FieldSchema::from_toml_str(
        r#"
        [[field]]
        name = "title"
        section = "identification"
        label = "Title"
        preferred_source = "either"
        value_type = "string"
        "#,
    )
    .unwrap();
    assert!(read_records(&path, &narrow).is_err());
    // Resume still works off the filename column.
    assert_eq!(processed_ids(&path).unwrap().len(), 1);
}

#[test]
fn missing_output_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nothing.csv");
    assert!(read_records(&path, &FieldSchema::builtin()).unwrap().is_empty());
    assert!(processed_ids(&path).unwrap().is_empty());
}

#[test]
fn screening_rows_and_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let rows = vec![
        ScreeningRow::new("a.pdf", "Free water in PD", "2021", Decision::Include, "Human FW study."),
        ScreeningRow::new("b.pdf", "Title not found", "Year not found", Decision::ExtractionError, "Very little text"),
    ];

    let csv_path = dir.path().join("screening.csv");
    write_screening(&csv_path, &rows).unwrap();
    assert_eq!(read_screening(&csv_path).unwrap(), rows);
    let header = std::fs::read_to_string(&csv_path).unwrap();
    assert!(header.starts_with("Filename,Title,Year,Decision,Justification"));

    let progress = ProgressStore::new(dir.path().join("progress.json"));
    assert!(progress.load().is_empty());
    progress.save(&rows).unwrap();
    assert_eq!(progress.load(), rows);
    progress.clear().unwrap();
    assert!(!progress.path().exists());
    progress.clear().unwrap();
}

#[test]
fn corrupt_checkpoint_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    std::fs::write(&path, "{not json").unwrap();
    assert!(ProgressStore::new(&path).load().is_empty());
}
