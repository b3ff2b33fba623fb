//! Screening decision rows and their CSV file.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::atomic::replace_file;
use crate::error::{Result, StoreError};

/// Outcome of screening one document. The error variants are written to the
/// `Decision` column verbatim so failed documents stay visible in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Decision {
    Include,
    Exclude,
    #[serde(rename = "JSON Error")]
    JsonError,
    #[serde(rename = "Parse Error")]
    ParseError,
    #[serde(rename = "API Error")]
    ApiError,
    #[serde(rename = "File Error")]
    FileError,
    #[serde(rename = "Extraction Error")]
    ExtractionError,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Include         => "Include",
            Decision::Exclude         => "Exclude",
            Decision::JsonError       => "JSON Error",
            Decision::ParseError      => "Parse Error",
            Decision::ApiError        => "API Error",
            Decision::FileError       => "File Error",
            Decision::ExtractionError => "Extraction Error",
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Decision::Include | Decision::Exclude)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "Include"          => Ok(Decision::Include),
            "Exclude"          => Ok(Decision::Exclude),
            "JSON Error"       => Ok(Decision::JsonError),
            "Parse Error"      => Ok(Decision::ParseError),
            "API Error"        => Ok(Decision::ApiError),
            "File Error"       => Ok(Decision::FileError),
            "Extraction Error" => Ok(Decision::ExtractionError),
            other              => Err(format!("unknown decision '{other}'")),
        }
    }
}

/// One screening output row. Column names match the CSV header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRow {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "Decision")]
    pub decision: Decision,
    #[serde(rename = "Justification")]
    pub justification: String,
}

impl ScreeningRow {
    pub fn new(
        filename: impl Into<String>,
        title: impl Into<String>,
        year: impl Into<String>,
        decision: Decision,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            title: title.into(),
            year: year.into(),
            decision,
            justification: justification.into(),
        }
    }
}

pub fn write_screening(path: &Path, rows: &[ScreeningRow]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;
    replace_file(path, &bytes)?;
    info!(path = %path.display(), rows = rows.len(), "Screening results written");
    Ok(())
}

/// Missing file reads as empty.
pub fn read_screening(path: &Path) -> Result<Vec<ScreeningRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader.deserialize().collect::<std::result::Result<Vec<ScreeningRow>, _>>()?;
    Ok(rows)
}

pub fn processed_filenames(rows: &[ScreeningRow]) -> HashSet<String> {
    rows.iter().map(|r| r.filename.clone()).collect()
}

/// Count per decision, ordered by decision.
pub fn decision_summary(rows: &[ScreeningRow]) -> BTreeMap<Decision, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.decision).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_strings() {
        for d in [Decision::Include, Decision::JsonError, Decision::ExtractionError] {
            assert_eq!(d.as_str().parse::<Decision>().unwrap(), d);
        }
        assert!(Decision::ApiError.is_error());
        assert!(!Decision::Exclude.is_error());
        assert!("include".parse::<Decision>().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let rows = vec![
            ScreeningRow::new("a.pdf", "A", "2020", Decision::Include, "ok"),
            ScreeningRow::new("b.pdf", "B", "2021", Decision::Exclude, "animal study"),
            ScreeningRow::new("c.pdf", "C", "2019", Decision::Include, "ok"),
        ];
        let summary = decision_summary(&rows);
        assert_eq!(summary[&Decision::Include], 2);
        assert_eq!(summary[&Decision::Exclude], 1);
        assert_eq!(processed_filenames(&rows).len(), 3);
    }
}
