//! Per-source candidate values, before and after normalisation.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// The extractor a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceTag {
    /// Structured conversion output (markdown + table grids).
    Table,
    /// Full free-text analysis.
    Text,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Table => "TABLE",
            SourceTag::Text  => "TEXT",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TABLE" => Ok(SourceTag::Table),
            "TEXT"  => Ok(SourceTag::Text),
            other   => Err(format!("unknown source tag '{other}'")),
        }
    }
}

/// A field value exactly as one source adapter proposed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub field_name: String,
    pub source: SourceTag,
    pub raw_value: Option<String>,
    /// Free-form pointer back into the source, e.g. which tables were seen.
    pub origin_note: Option<String>,
}

impl RawCandidate {
    pub fn new(field_name: impl Into<String>, source: SourceTag, raw_value: Option<String>) -> Self {
        Self {
            field_name: field_name.into(),
            source,
            raw_value,
            origin_note: None,
        }
    }

    pub fn with_origin(mut self, note: impl Into<String>) -> Self {
        self.origin_note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalisedCandidate {
    pub field_name: String,
    pub source: SourceTag,
    /// `None` exactly when `is_missing`.
    pub value: Option<FieldValue>,
    pub is_missing: bool,
    /// Numeric field whose text did not parse; kept as opaque text.
    pub degraded: bool,
    pub origin_note: Option<String>,
}

impl NormalisedCandidate {
    pub fn missing(field_name: impl Into<String>, source: SourceTag) -> Self {
        Self {
            field_name: field_name.into(),
            source,
            value: None,
            is_missing: true,
            degraded: false,
            origin_note: None,
        }
    }

    /// The usable value, if any.
    pub fn present(&self) -> Option<&FieldValue> {
        if self.is_missing {
            None
        } else {
            self.value.as_ref()
        }
    }
}

/// One source's normalised candidates for one document, keyed by field name.
pub type CandidateMap = HashMap<String, NormalisedCandidate>;
