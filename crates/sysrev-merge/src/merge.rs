//! Per-field reconciliation of the table and text candidates.
//!
//! Precedence, strongest first:
//!   both agree > single source present > preferred source wins a conflict
//!   > completeness tiebreak > both missing
//!
//! Fields are merged independently; no field looks at another.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sysrev_common::{Confidence, Result, SysrevError};

use crate::candidate::{CandidateMap, NormalisedCandidate, SourceTag};
use crate::schema::{FieldDefinition, FieldSchema, PreferredSource, ValueType};
use crate::value::{FieldValue, Quantity};

/// Relative tolerance for numeric agreement (rounding and formatting noise).
pub const NUMERIC_REL_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinningSource {
    Table,
    Text,
    BothAgree,
    Neither,
}

impl WinningSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WinningSource::Table     => "TABLE",
            WinningSource::Text      => "TEXT",
            WinningSource::BothAgree => "BOTH_AGREE",
            WinningSource::Neither   => "NEITHER",
        }
    }
}

impl From<SourceTag> for WinningSource {
    fn from(tag: SourceTag) -> Self {
        match tag {
            SourceTag::Table => WinningSource::Table,
            SourceTag::Text  => WinningSource::Text,
        }
    }
}

impl fmt::Display for WinningSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WinningSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TABLE"      => Ok(WinningSource::Table),
            "TEXT"       => Ok(WinningSource::Text),
            "BOTH_AGREE" => Ok(WinningSource::BothAgree),
            "NEITHER"    => Ok(WinningSource::Neither),
            other        => Err(format!("unknown winning source '{other}'")),
        }
    }
}

/// The losing value of a conflict, kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discarded {
    pub source: SourceTag,
    pub value: FieldValue,
}

/// Reconciled value for one field of one document.
///
/// `final_value` is `None` exactly when `winning_source` is `Neither`.
/// Outside this crate a field can only come from `neither`, `from_parts`
/// or `merge_field`, so the pairing always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedField {
    pub(crate) field_name: String,
    pub(crate) final_value: Option<FieldValue>,
    pub(crate) winning_source: WinningSource,
    pub(crate) confidence: Confidence,
    pub(crate) discarded: Option<Discarded>,
}

impl MergedField {
    pub fn neither(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            final_value: None,
            winning_source: WinningSource::Neither,
            confidence: Confidence::Low,
            discarded: None,
        }
    }

    fn resolved(
        field_name: &str,
        value: FieldValue,
        winning_source: WinningSource,
        confidence: Confidence,
        discarded: Option<Discarded>,
    ) -> Self {
        debug_assert_ne!(winning_source, WinningSource::Neither);
        Self {
            field_name: field_name.to_string(),
            final_value: Some(value),
            winning_source,
            confidence,
            discarded,
        }
    }

    /// Rebuild a merged field from persisted parts, checking the invariant.
    pub fn from_parts(
        field_name: impl Into<String>,
        final_value: Option<FieldValue>,
        winning_source: WinningSource,
        confidence: Confidence,
        discarded: Option<Discarded>,
    ) -> Result<Self> {
        let field_name = field_name.into();
        match (&final_value, winning_source) {
            (None, WinningSource::Neither) | (Some(_), WinningSource::Table)
            | (Some(_), WinningSource::Text) | (Some(_), WinningSource::BothAgree) => Ok(Self {
                field_name,
                final_value,
                winning_source,
                confidence,
                discarded,
            }),
            _ => Err(SysrevError::ParseDegradation(format!(
                "field '{field_name}': value presence does not match source {winning_source}"
            ))),
        }
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn final_value(&self) -> Option<&FieldValue> {
        self.final_value.as_ref()
    }

    pub fn winning_source(&self) -> WinningSource {
        self.winning_source
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// The conflict loser, if the sources disagreed.
    pub fn discarded(&self) -> Option<&Discarded> {
        self.discarded.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.final_value.is_some()
    }

    pub fn value_str(&self) -> Option<&str> {
        self.final_value.as_ref().map(|v| v.as_str())
    }
}

/// Type-aware equality of two present values.
/// Number fields compare the leading component, so "68.2" agrees with
/// "68.2 ± 5.1"; numeric ranges must match in shape. Anything else, or a
/// numeric value that did not parse, compares trimmed text ignoring case.
pub fn values_agree(value_type: ValueType, a: &FieldValue, b: &FieldValue) -> bool {
    if value_type == ValueType::Number {
        if let (Some(va), Some(vb)) = (a.scalar(), b.scalar()) {
            return approx_eq_scalar(va, vb);
        }
    }
    if value_type.is_numeric() {
        if let (Some(qa), Some(qb)) = (&a.quantity, &b.quantity) {
            return qa.approx_eq(qb, NUMERIC_REL_TOLERANCE);
        }
    }
    a.text.trim().to_lowercase() == b.text.trim().to_lowercase()
}

fn approx_eq_scalar(a: f64, b: f64) -> bool {
    Quantity::Scalar { value: a }.approx_eq(&Quantity::Scalar { value: b }, NUMERIC_REL_TOLERANCE)
}

/// Merge one field.
pub fn merge_field(
    def: &FieldDefinition,
    table: Option<&NormalisedCandidate>,
    text: Option<&NormalisedCandidate>,
) -> MergedField {
    let t = table.and_then(|c| c.present().map(|v| (v, c.degraded)));
    let x = text.and_then(|c| c.present().map(|v| (v, c.degraded)));

    match (t, x) {
        (None, None) => MergedField::neither(&def.name),

        (Some((tv, _)), None) => MergedField::resolved(
            &def.name, tv.clone(), WinningSource::Table, Confidence::Medium, None,
        ),

        (None, Some((xv, _))) => MergedField::resolved(
            &def.name, xv.clone(), WinningSource::Text, Confidence::Medium, None,
        ),

        (Some((tv, t_degraded)), Some((xv, x_degraded))) => {
            if values_agree(def.value_type, tv, xv) {
                let confidence = if t_degraded || x_degraded {
                    Confidence::High.capped_at(Confidence::Medium)
                } else {
                    Confidence::High
                };
                // Tables keep precision better; equal text values make the choice moot.
                return MergedField::resolved(
                    &def.name, tv.clone(), WinningSource::BothAgree, confidence, None,
                );
            }

            let (winner, confidence) = match def.preferred_source {
                PreferredSource::Table => (SourceTag::Table, Confidence::Medium),
                PreferredSource::Text  => (SourceTag::Text, Confidence::Medium),
                PreferredSource::Either => {
                    if tv.char_len() >= xv.char_len() {
                        (SourceTag::Table, Confidence::Low)
                    } else {
                        (SourceTag::Text, Confidence::Low)
                    }
                }
            };

            let (kept, lost, lost_source) = match winner {
                SourceTag::Table => (tv, xv, SourceTag::Text),
                SourceTag::Text  => (xv, tv, SourceTag::Table),
            };
            tracing::debug!(
                field = %def.name,
                winner = %winner,
                kept = %kept,
                discarded = %lost,
                "Source conflict resolved"
            );
            MergedField::resolved(
                &def.name,
                kept.clone(),
                winner.into(),
                confidence,
                Some(Discarded { source: lost_source, value: lost.clone() }),
            )
        }
    }
}

/// Merge every schema field, in schema order.
pub fn merge(schema: &FieldSchema, table: &CandidateMap, text: &CandidateMap) -> Vec<MergedField> {
    schema
        .fields()
        .iter()
        .map(|def| merge_field(def, table.get(&def.name), text.get(&def.name)))
        .collect()
}
