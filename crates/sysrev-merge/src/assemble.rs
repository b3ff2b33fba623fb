//! Per-document record assembly.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sysrev_common::quality_summary;

use crate::merge::MergedField;
use crate::schema::FieldSchema;

/// Which sources actually contributed to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionMethod {
    Hybrid,
    TableOnly,
    TextOnly,
    Failed,
}

impl ExtractionMethod {
    pub fn from_availability(table_ok: bool, text_ok: bool) -> Self {
        match (table_ok, text_ok) {
            (true, true)   => ExtractionMethod::Hybrid,
            (true, false)  => ExtractionMethod::TableOnly,
            (false, true)  => ExtractionMethod::TextOnly,
            (false, false) => ExtractionMethod::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Hybrid    => "HYBRID",
            ExtractionMethod::TableOnly => "TABLE_ONLY",
            ExtractionMethod::TextOnly  => "TEXT_ONLY",
            ExtractionMethod::Failed    => "FAILED",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HYBRID"     => Ok(ExtractionMethod::Hybrid),
            "TABLE_ONLY" => Ok(ExtractionMethod::TableOnly),
            "TEXT_ONLY"  => Ok(ExtractionMethod::TextOnly),
            "FAILED"     => Ok(ExtractionMethod::Failed),
            other        => Err(format!("unknown extraction method '{other}'")),
        }
    }
}

/// One output row: document identity, merged fields in schema order, and
/// the fraction of fields tagged HIGH.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
    pub document_id: String,
    pub method: ExtractionMethod,
    pub fields: Vec<MergedField>,
    pub quality: f64,
    /// Adapter failures and other per-document remarks, `; `-joined.
    pub notes: String,
}

impl ExtractionRecord {
    /// A record for a document that produced nothing: every field NEITHER/LOW.
    pub fn failed(schema: &FieldSchema, document_id: impl Into<String>, notes: impl Into<String>) -> Self {
        let merged = schema.names().map(MergedField::neither).collect();
        assemble(document_id, merged)
            .with_method(ExtractionMethod::Failed)
            .with_notes(notes)
    }

    pub fn with_method(mut self, method: ExtractionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn field(&self, name: &str) -> Option<&MergedField> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|f| f.value_str())
    }

    pub fn resolved_count(&self) -> usize {
        self.fields.iter().filter(|f| f.is_resolved()).count()
    }
}

/// Fold merged fields into a record. Order is preserved as given.
pub fn assemble(document_id: impl Into<String>, merged: Vec<MergedField>) -> ExtractionRecord {
    let tags: Vec<_> = merged.iter().map(|f| f.confidence).collect();
    ExtractionRecord {
        document_id: document_id.into(),
        method: ExtractionMethod::Hybrid,
        quality: quality_summary(&tags),
        fields: merged,
        notes: String::new(),
    }
}
