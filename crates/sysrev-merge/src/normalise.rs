//! Candidate normalisation.
//!
//! Cleans a raw value, decides whether it actually carries data, and parses
//! the numeric payload for numeric fields. A value that fails to parse is
//! kept as text and flagged `degraded`; it is never dropped here.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::candidate::{CandidateMap, NormalisedCandidate, RawCandidate};
use crate::schema::{FieldSchema, ValueType};
use crate::value::{parse_quantity, FieldValue};

/// Phrases that mean "no value", compared case-insensitively after cleaning.
pub const DEFAULT_MISSING: &[&str] = &[
    "",
    "not reported",
    "n/a",
    "na",
    "nr",
    "not applicable",
    "not specified",
    "not available",
    "not stated",
    "unknown",
    "none",
    "-",
    "—",
];

#[derive(Debug, Clone)]
pub struct Normaliser {
    missing: HashSet<String>,
}

impl Default for Normaliser {
    fn default() -> Self {
        Self {
            missing: DEFAULT_MISSING.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Normaliser {
    /// Default sentinels plus deployment-specific ones.
    pub fn with_extra_missing<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut n = Self::default();
        for phrase in extra {
            n.missing.insert(sentinel_key(&clean(phrase.as_ref())));
        }
        n
    }

    /// True if a cleaned value is one of the missing sentinels.
    pub fn is_sentinel(&self, cleaned: &str) -> bool {
        self.missing.contains(&sentinel_key(cleaned))
    }

    pub fn normalise(&self, raw: &RawCandidate, value_type: ValueType) -> NormalisedCandidate {
        let mut missing = NormalisedCandidate::missing(&raw.field_name, raw.source);
        missing.origin_note = raw.origin_note.clone();

        let Some(raw_value) = raw.raw_value.as_deref() else {
            return missing;
        };

        let cleaned = clean(raw_value);
        if self.is_sentinel(&cleaned) || is_cross_reference(&cleaned) {
            return missing;
        }

        let (value, degraded) = if value_type.is_numeric() {
            match parse_quantity(&cleaned) {
                Some(q) => (FieldValue::numeric(cleaned, q), false),
                None => {
                    debug!(field = %raw.field_name, source = %raw.source, value = %cleaned,
                        "Numeric value did not parse, keeping as text");
                    (FieldValue::text(cleaned), true)
                }
            }
        } else {
            (FieldValue::text(cleaned), false)
        };

        NormalisedCandidate {
            field_name: raw.field_name.clone(),
            source: raw.source,
            value: Some(value),
            is_missing: false,
            degraded,
            origin_note: raw.origin_note.clone(),
        }
    }

    /// Normalise a source's raw candidates against the schema.
    /// Fields outside the schema are dropped; the first candidate per field wins.
    pub fn normalise_all(&self, schema: &FieldSchema, raws: &[RawCandidate]) -> CandidateMap {
        let mut out = CandidateMap::new();
        for raw in raws {
            let Some(def) = schema.get(&raw.field_name) else {
                debug!(field = %raw.field_name, "Candidate for unknown field dropped");
                continue;
            };
            if out.contains_key(&def.name) {
                debug!(field = %def.name, source = %raw.source, "Duplicate candidate ignored");
                continue;
            }
            out.insert(def.name.clone(), self.normalise(raw, def.value_type));
        }
        out
    }
}

fn sentinel_key(cleaned: &str) -> String {
    cleaned
        .to_lowercase()
        .trim_end_matches(['.', ',', ';', ':'])
        .trim()
        .to_string()
}

const QUOTE_PAIRS: &[(char, char)] = &[('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];

/// Trim, drop markdown emphasis and code ticks, collapse whitespace and peel
/// wrapping quotes. Idempotent.
pub fn clean(raw: &str) -> String {
    let stripped = raw.replace("**", "").replace('`', "");
    let mut s = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    loop {
        let mut peeled = false;
        for &(open, close) in QUOTE_PAIRS {
            if s.chars().count() >= 2 && s.starts_with(open) && s.ends_with(close) {
                s = s[open.len_utf8()..s.len() - close.len_utf8()].trim().to_string();
                peeled = true;
                break;
            }
        }
        if !peeled {
            return s;
        }
    }
}

fn cross_reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?ix)^\(?\s*
              (?:(?:see|refer\s+to|cf\.?|shown\s+in|reported\s+in|as\s+in)\s+)?
              (?:the\s+)?(?:supplementary\s+|supplemental\s+)?
              (?:tables?|figures?|figs?\.?|tab\.)
              (?:\s*(?:s?\d+[a-z]?|[ivx]+)(?:\s*(?:,|and|&)\s*(?:s?\d+[a-z]?|[ivx]+))*)?
              \s*\)?
              (?:\s*(?:for\s+(?:details|values|results|more\s+information)
                     |in\s+the\s+(?:supplement|supplementary\s+material|appendix)
                     |above|below))?
              [\s.;:)]*$",
        )
        .unwrap()
    })
}

/// A bare pointer to a table or figure ("See Table 2", "Table 1 for
/// details") and nothing else. Any other content after the reference means
/// the value carries data and is kept.
pub fn is_cross_reference(cleaned: &str) -> bool {
    cross_reference_regex().is_match(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SourceTag;
    use crate::value::Quantity;

    fn raw(value: Option<&str>) -> RawCandidate {
        RawCandidate::new("mean_age_patient", SourceTag::Text, value.map(String::from))
    }

    #[test]
    fn test_sentinels_are_missing() {
        let n = Normaliser::default();
        for v in ["Not reported", "  N/A ", "not specified.", "NONE", "", "Unknown", "NR"] {
            let c = n.normalise(&raw(Some(v)), ValueType::FreeText);
            assert!(c.is_missing, "{v:?} should be missing");
            assert!(c.value.is_none());
        }
        assert!(n.normalise(&raw(None), ValueType::Number).is_missing);
    }

    #[test]
    fn test_extra_sentinels() {
        let n = Normaliser::with_extra_missing(["not mentioned"]);
        assert!(n.normalise(&raw(Some("Not mentioned")), ValueType::String).is_missing);
        assert!(!Normaliser::default().normalise(&raw(Some("Not mentioned")), ValueType::String).is_missing);
    }

    #[test]
    fn test_cross_reference_detection() {
        assert!(is_cross_reference("See Table 2"));
        assert!(is_cross_reference("(see Supplementary Table S3)"));
        assert!(is_cross_reference("see figure 4 for details"));
        assert!(is_cross_reference("Table 1"));
        assert!(is_cross_reference("See Tables 2 and 3"));
        assert!(is_cross_reference("See Fig. 3"));
        assert!(is_cross_reference("Table S2 in the supplement."));
        assert!(!is_cross_reference("See Table 2: 0.42 ± 0.03"));
        assert!(!is_cross_reference("0.42"));
        assert!(!is_cross_reference("Tablet-based cognitive battery"));
    }

    #[test]
    fn test_prose_starting_with_a_reference_is_kept() {
        let n = Normaliser::default();
        for v in [
            "Figure 2 shows increased free water in the posterior substantia nigra of patients",
            "In the table of results, free water was elevated in patients versus controls",
            "Tables and figures show widespread FW increases in white matter",
            "See Table 2; FW was higher in the putamen",
        ] {
            assert!(!is_cross_reference(v), "{v:?} is a finding, not a pointer");
            let c = n.normalise(&raw(Some(v)), ValueType::FreeText);
            assert!(!c.is_missing, "{v:?} was dropped");
            assert_eq!(c.present().unwrap().text, v);
        }
    }

    #[test]
    fn test_numeric_parse_keeps_verbatim_text() {
        let c = Normaliser::default().normalise(&raw(Some("68 ± 5 years")), ValueType::Number);
        let v = c.present().unwrap();
        assert_eq!(v.text, "68 ± 5 years");
        assert_eq!(v.quantity, Some(Quantity::MeanSd { mean: 68.0, sd: 5.0 }));
        assert!(!c.degraded);
    }

    #[test]
    fn test_unparsed_numeric_degrades_but_is_kept() {
        let c = Normaliser::default().normalise(&raw(Some("p < 0.001")), ValueType::Number);
        assert!(!c.is_missing);
        assert!(c.degraded);
        assert_eq!(c.present().unwrap().text, "p < 0.001");
        assert_eq!(c.present().unwrap().quantity, None);
    }

    #[test]
    fn test_clean_is_idempotent() {
        for v in ["  **3T**  ", "\"'Siemens'\"", "a\n\tb", "“quoted”", "\"", "x"] {
            let once = clean(v);
            assert_eq!(clean(&once), once, "clean not idempotent for {v:?}");
        }
        assert_eq!(clean("  **3T**  "), "3T");
        assert_eq!(clean("\"'Siemens'\""), "Siemens");
    }

    #[test]
    fn test_normalise_all_drops_unknown_fields() {
        let schema = FieldSchema::builtin();
        let raws = vec![
            RawCandidate::new("tr", SourceTag::Table, Some("8000 ms".into())),
            RawCandidate::new("tr", SourceTag::Table, Some("9000 ms".into())),
            RawCandidate::new("funding", SourceTag::Table, Some("NIH".into())),
        ];
        let map = Normaliser::default().normalise_all(&schema, &raws);
        assert_eq!(map.len(), 1);
        assert_eq!(map["tr"].present().unwrap().scalar(), Some(8000.0));
    }
}
