//! Field-by-field merge behaviour over the built-in schema.

use pretty_assertions::assert_eq;
use sysrev_common::Confidence;
use sysrev_merge::{
    assemble, merge, CandidateMap, FieldSchema, FieldValue, MergedField, Normaliser, Quantity, RawCandidate,
    SourceTag, WinningSource,
};

fn candidates(schema: &FieldSchema, source: SourceTag, pairs: &[(&str, Option<&str>)]) -> CandidateMap {
    let raws: Vec<_> = pairs
        .iter()
        .map(|(name, v)| RawCandidate::new(*name, source, v.map(String::from)))
        .collect();
    Normaliser::default().normalise_all(schema, &raws)
}

fn merge_one(field: &str, table: Option<&str>, text: Option<&str>) -> sysrev_merge::MergedField {
    let schema = FieldSchema::builtin();
    let t = candidates(&schema, SourceTag::Table, &[(field, table)]);
    let x = candidates(&schema, SourceTag::Text, &[(field, text)]);
    merge(&schema, &t, &x)
        .into_iter()
        .find(|m| m.field_name() == field)
        .unwrap()
}

#[test]
fn numeric_agreement_takes_table_value() {
    let m = merge_one("group_comparison_p_value", Some("0.42"), Some("0.420"));
    assert_eq!(m.winning_source(), WinningSource::BothAgree);
    assert_eq!(m.confidence(), Confidence::High);
    assert_eq!(m.value_str(), Some("0.42"));
    assert!(m.discarded().is_none());
}

#[test]
fn single_text_source_keeps_verbatim_and_parsed() {
    let m = merge_one("mean_age_patient", None, Some("68 ± 5 years"));
    assert_eq!(m.winning_source(), WinningSource::Text);
    assert_eq!(m.confidence(), Confidence::Medium);
    let v = m.final_value().unwrap();
    assert_eq!(v.text, "68 ± 5 years");
    assert_eq!(v.quantity, Some(Quantity::MeanSd { mean: 68.0, sd: 5.0 }));
}

#[test]
fn table_preferred_conflict_keeps_text_as_provenance() {
    let m = merge_one("scanner_strength", Some("1.5T"), Some("3T"));
    assert_eq!(m.winning_source(), WinningSource::Table);
    assert_eq!(m.confidence(), Confidence::Medium);
    assert_eq!(m.value_str(), Some("1.5T"));
    let lost = m.discarded().unwrap();
    assert_eq!(lost.source, SourceTag::Text);
    assert_eq!(lost.value.text, "3T");
}

#[test]
fn cross_reference_text_falls_back_to_table() {
    let m = merge_one("tr", Some("8500 ms"), Some("See Table 2"));
    assert_eq!(m.winning_source(), WinningSource::Table);
    assert_eq!(m.confidence(), Confidence::Medium);
    assert_eq!(m.value_str(), Some("8500 ms"));
}

#[test]
fn mean_and_mean_sd_of_the_same_age_agree() {
    let m = merge_one("mean_age_patient", Some("68.2"), Some("68.2 ± 5.1 years"));
    assert_eq!(m.winning_source(), WinningSource::BothAgree);
    assert_eq!(m.confidence(), Confidence::High);
    assert_eq!(m.value_str(), Some("68.2"));
}

#[test]
fn prose_finding_opening_with_a_figure_survives() {
    let finding = "Figure 2 shows increased free water in the posterior substantia nigra of patients";
    let m = merge_one("primary_finding", None, Some(finding));
    assert_eq!(m.winning_source(), WinningSource::Text);
    assert_eq!(m.confidence(), Confidence::Medium);
    assert_eq!(m.value_str(), Some(finding));
}

#[test]
fn persisted_parts_must_pair_value_with_source() {
    let orphan = MergedField::from_parts("tr", None, WinningSource::Table, Confidence::Medium, None);
    assert!(orphan.is_err());
    let ghost = MergedField::from_parts("tr", Some(FieldValue::text("8000")), WinningSource::Neither, Confidence::Low, None);
    assert!(ghost.is_err());

    let m = MergedField::neither("tr");
    assert_eq!((m.field_name(), m.final_value(), m.winning_source()), ("tr", None, WinningSource::Neither));
}

#[test]
fn both_missing_is_neither_low() {
    let m = merge_one("doi", None, Some("not reported"));
    assert_eq!(m.final_value(), None);
    assert_eq!(m.winning_source(), WinningSource::Neither);
    assert_eq!(m.confidence(), Confidence::Low);
}

#[test]
fn null_value_iff_neither_across_schema() {
    let schema = FieldSchema::builtin();
    let names: Vec<&str> = schema.names().collect();
    // Alternate presence patterns so every branch of the ladder is hit.
    let table: Vec<(&str, Option<&str>)> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (*n, [Some("12"), None, Some("n/a"), Some("7")][i % 4]))
        .collect();
    let text: Vec<(&str, Option<&str>)> = names
        .iter()
        .enumerate()
        .map(|(i, n)| (*n, [Some("12.0"), Some("See Fig. 3"), None, Some("9 patients")][i % 4]))
        .collect();

    let t = candidates(&schema, SourceTag::Table, &table);
    let x = candidates(&schema, SourceTag::Text, &text);
    let merged = merge(&schema, &t, &x);

    assert_eq!(merged.len(), schema.len());
    for m in &merged {
        assert_eq!(m.final_value().is_none(), m.winning_source() == WinningSource::Neither, "{}", m.field_name());
    }
    let order: Vec<&str> = merged.iter().map(|m| m.field_name()).collect();
    assert_eq!(order, names);
}

#[test]
fn merge_is_deterministic() {
    let schema = FieldSchema::builtin();
    let t = candidates(&schema, SourceTag::Table, &[("title", Some("Free water in PD")), ("tr", Some("8000"))]);
    let x = candidates(&schema, SourceTag::Text, &[("title", Some("Free-water imaging in PD")), ("tr", Some("8.5 s"))]);
    let first = merge(&schema, &t, &x);
    for _ in 0..5 {
        assert_eq!(merge(&schema, &t, &x), first);
    }
}

#[test]
fn one_silent_adapter_degrades_to_single_source() {
    let schema = FieldSchema::builtin();
    let x = candidates(&schema, SourceTag::Text, &[("country", Some("Germany")), ("n_overall", Some("40"))]);
    let record = assemble("paper.pdf", merge(&schema, &CandidateMap::new(), &x));

    assert_eq!(record.fields.len(), schema.len());
    assert_eq!(record.value("country"), Some("Germany"));
    assert_eq!(record.field("n_overall").unwrap().winning_source(), WinningSource::Text);
    assert_eq!(record.resolved_count(), 2);
    assert_eq!(record.quality, 0.0);
}
