//! Extraction record CSV.
//!
//! Columns: `filename, extraction_method, quality, <schema fields>, provenance, notes`.
//! A field cell holds the merged value text (empty when unresolved). The
//! `provenance` cell is a JSON object keyed by field name recording which
//! source won, the confidence tag, and any discarded conflicting value.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sysrev_common::Confidence;
use sysrev_merge::value::parse_quantity;
use sysrev_merge::{
    assemble, Discarded, ExtractionMethod, ExtractionRecord, FieldSchema, FieldValue, MergedField,
    SourceTag, ValueType, WinningSource,
};
use tracing::{debug, info};

use crate::atomic::replace_file;
use crate::error::{Result, StoreError};

pub const COL_FILENAME: &str = "filename";
pub const COL_METHOD: &str = "extraction_method";
pub const COL_QUALITY: &str = "quality";
pub const COL_PROVENANCE: &str = "provenance";
pub const COL_NOTES: &str = "notes";

/// Per-field provenance, one entry per schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: WinningSource,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded_source: Option<SourceTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discarded_value: Option<String>,
}

impl From<&MergedField> for Provenance {
    fn from(f: &MergedField) -> Self {
        Self {
            source: f.winning_source(),
            confidence: f.confidence(),
            discarded_source: f.discarded().map(|d| d.source),
            discarded_value: f.discarded().map(|d| d.value.text.clone()),
        }
    }
}

/// Header row for a schema.
pub fn header(schema: &FieldSchema) -> Vec<String> {
    let mut cols = vec![COL_FILENAME.to_string(), COL_METHOD.to_string(), COL_QUALITY.to_string()];
    cols.extend(schema.names().map(String::from));
    cols.push(COL_PROVENANCE.to_string());
    cols.push(COL_NOTES.to_string());
    cols
}

/// Serialise one record into a row in header order.
pub fn record_to_row(schema: &FieldSchema, record: &ExtractionRecord) -> Result<Vec<String>> {
    let mut row = Vec::with_capacity(schema.len() + 5);
    row.push(record.document_id.clone());
    row.push(record.method.as_str().to_string());
    row.push(format!("{:.3}", record.quality));

    let mut provenance = BTreeMap::new();
    for def in schema.fields() {
        match record.field(&def.name) {
            Some(f) => {
                row.push(f.value_str().unwrap_or_default().to_string());
                provenance.insert(def.name.clone(), Provenance::from(f));
            }
            None => {
                row.push(String::new());
                provenance.insert(def.name.clone(), Provenance::from(&MergedField::neither(&def.name)));
            }
        }
    }

    row.push(serde_json::to_string(&provenance)?);
    row.push(record.notes.clone());
    Ok(row)
}

fn restore_value(text: &str, value_type: ValueType) -> FieldValue {
    if value_type.is_numeric() {
        if let Some(q) = parse_quantity(text) {
            return FieldValue::numeric(text, q);
        }
    }
    FieldValue::text(text)
}

/// Rebuild a record from a row. `row_no` is 1-based, for error messages.
pub fn row_to_record(schema: &FieldSchema, row: &csv::StringRecord, row_no: usize) -> Result<ExtractionRecord> {
    let expected = schema.len() + 5;
    if row.len() != expected {
        return Err(StoreError::malformed(row_no, format!("expected {expected} columns, found {}", row.len())));
    }

    let document_id = row.get(0).unwrap_or_default().to_string();
    let method: ExtractionMethod = row
        .get(1)
        .unwrap_or_default()
        .parse()
        .map_err(|e: String| StoreError::malformed(row_no, e))?;

    let prov_cell = row.get(schema.len() + 3).unwrap_or_default();
    let mut provenance: BTreeMap<String, Provenance> = serde_json::from_str(prov_cell)
        .map_err(|e| StoreError::malformed(row_no, format!("provenance: {e}")))?;
    let notes = row.get(schema.len() + 4).unwrap_or_default().to_string();

    let mut merged = Vec::with_capacity(schema.len());
    for (i, def) in schema.fields().iter().enumerate() {
        let cell = row.get(i + 3).unwrap_or_default();
        let prov = provenance
            .remove(&def.name)
            .ok_or_else(|| StoreError::malformed(row_no, format!("no provenance for '{}'", def.name)))?;

        let value = (!cell.is_empty()).then(|| restore_value(cell, def.value_type));
        let discarded = match (prov.discarded_source, prov.discarded_value) {
            (Some(source), Some(text)) => Some(Discarded { source, value: restore_value(&text, def.value_type) }),
            _ => None,
        };
        let field = MergedField::from_parts(&def.name, value, prov.source, prov.confidence, discarded)
            .map_err(|e| StoreError::malformed(row_no, e.to_string()))?;
        merged.push(field);
    }

    Ok(assemble(document_id, merged).with_method(method).with_notes(notes))
}

/// Write all records, replacing `path` atomically.
pub fn write_records(path: &Path, schema: &FieldSchema, records: &[ExtractionRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header(schema))?;
    for record in records {
        writer.write_record(record_to_row(schema, record)?)?;
    }
    let bytes = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;
    replace_file(path, &bytes)?;
    info!(path = %path.display(), records = records.len(), "Extraction results written");
    Ok(())
}

/// Read a file written by `write_records` with the same schema.
/// A missing file is an empty batch.
pub fn read_records(path: &Path, schema: &FieldSchema) -> Result<Vec<ExtractionRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let found: Vec<String> = reader.headers()?.iter().map(String::from).collect();
    let expected = header(schema);
    if found != expected {
        return Err(StoreError::HeaderMismatch(format!(
            "{} has {} columns, schema expects {}",
            path.display(), found.len(), expected.len()
        )));
    }

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        records.push(row_to_record(schema, &row?, i + 1)?);
    }
    debug!(path = %path.display(), records = records.len(), "Prior extraction results loaded");
    Ok(records)
}

/// Document ids already present in an output file. Only the first column is
/// consulted, so this works across schema changes.
pub fn processed_ids(path: &Path) -> Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut ids = HashSet::new();
    for row in reader.records() {
        if let Some(id) = row?.get(0) {
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }
    }
    Ok(ids)
}
