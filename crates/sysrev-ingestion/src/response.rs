//! Model response parsing.
//!
//! Extraction responses are accepted in two shapes only: a JSON object keyed
//! by field name or label, or `- Label: value` lines. Anything else is
//! counted and dropped. A response with no recognised field degrades to an
//! empty candidate set rather than guessing.

use std::collections::HashSet;

use serde_json::Value;
use sysrev_common::SysrevError;
use sysrev_merge::{FieldDefinition, FieldSchema, RawCandidate, SourceTag};
use sysrev_store::Decision;
use tracing::debug;

/// Labels models commonly use instead of the prompted ones.
const LABEL_ALIASES: &[(&str, &str)] = &[
    ("year of publication", "year"),
    ("publication year",    "year"),
    ("journal name",        "journal"),
    ("aim",                 "study_aim"),
    ("first author",        "lead_author"),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub candidates: Vec<RawCandidate>,
    pub recognised: usize,
    pub unrecognised: usize,
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

fn resolve<'a>(schema: &'a FieldSchema, key: &str) -> Option<&'a FieldDefinition> {
    let key = key.trim().trim_matches('*').trim();
    schema.resolve_key(key).or_else(|| {
        let lower = key.to_lowercase();
        LABEL_ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .and_then(|(_, name)| schema.get(name))
    })
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null      => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(json_scalar)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// Parse one extraction response into raw candidates for `source`.
pub fn parse_extraction_response(
    schema: &FieldSchema,
    source: SourceTag,
    text: &str,
) -> Result<ParsedResponse, SysrevError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(SysrevError::ParseDegradation(format!("{source} response was empty")));
    }

    let mut out = ParsedResponse::default();
    let mut seen = HashSet::new();
    let mut push = |out: &mut ParsedResponse, def: &FieldDefinition, value: Option<String>| {
        if seen.insert(def.name.clone()) {
            out.candidates.push(RawCandidate::new(&def.name, source, value));
            out.recognised += 1;
        }
    };

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for (key, value) in &map {
            match resolve(schema, key) {
                Some(def) => push(&mut out, def, json_scalar(value)),
                None => out.unrecognised += 1,
            }
        }
    } else {
        for line in body.lines().map(str::trim) {
            if line.is_empty() || line.starts_with("**") || line.starts_with("---") || line.starts_with('#') {
                continue;
            }
            let line = line.trim_start_matches(['-', '*', '•']).trim_start();
            let Some((label, value)) = line.split_once(':') else {
                out.unrecognised += 1;
                continue;
            };
            match resolve(schema, label) {
                Some(def) => {
                    let value = value.trim();
                    push(&mut out, def, (!value.is_empty()).then(|| value.to_string()));
                }
                None => out.unrecognised += 1,
            }
        }
    }

    debug!(
        source = %source,
        recognised = out.recognised,
        unrecognised = out.unrecognised,
        "Parsed extraction response"
    );

    if out.recognised == 0 {
        return Err(SysrevError::ParseDegradation(format!(
            "{source} response contained no recognised field ({} lines ignored)",
            out.unrecognised
        )));
    }
    Ok(out)
}

/// Screening verdict: decision plus justification. Malformed answers map to
/// the error decisions instead of failing.
pub fn parse_screening_decision(text: &str, provider: &str) -> (Decision, String) {
    let value: Value = match serde_json::from_str(strip_code_fence(text)) {
        Ok(v) => v,
        Err(e) => {
            return (Decision::JsonError, format!("Invalid JSON response from {provider}: {e}"));
        }
    };

    let (Some(decision), Some(justification)) = (value.get("decision"), value.get("justification")) else {
        return (Decision::ParseError, "Missing required keys in model response".to_string());
    };

    let justification = match justification {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match decision.as_str() {
        Some("Include") => (Decision::Include, justification),
        Some("Exclude") => (Decision::Exclude, justification),
        _ => {
            let shown = decision.as_str().map(String::from).unwrap_or_else(|| decision.to_string());
            (Decision::ParseError, format!("Invalid decision value: {shown}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn value_of<'a>(parsed: &'a ParsedResponse, field: &str) -> Option<&'a str> {
        parsed
            .candidates
            .iter()
            .find(|c| c.field_name == field)
            .and_then(|c| c.raw_value.as_deref())
    }

    #[test]
    fn test_label_lines() {
        let schema = FieldSchema::builtin();
        let text = "**STUDY IDENTIFICATION**\n\
                    - Title: Free-water in PD\n\
                    - Year of publication: 2019\n\
                    ---\n\
                    - TR: 8000 ms\n\
                    - Clinical group FW values: Putamen: 0.21 ± 0.03\n\
                    Some chatter without a colon\n\
                    - Made-up field: 3\n";
        let parsed = parse_extraction_response(&schema, SourceTag::Text, text).unwrap();
        assert_eq!(parsed.recognised, 4);
        assert_eq!(parsed.unrecognised, 2);
        assert_eq!(value_of(&parsed, "year"), Some("2019"));
        assert_eq!(value_of(&parsed, "tr"), Some("8000 ms"));
        assert_eq!(value_of(&parsed, "clinical_group_fw_values"), Some("Putamen: 0.21 ± 0.03"));
        assert!(parsed.candidates.iter().all(|c| c.source == SourceTag::Text));
    }

    #[test]
    fn test_fenced_json_object() {
        let schema = FieldSchema::builtin();
        let text = "```json\n{\"title\": \"A study\", \"N overall\": 40, \"doi\": null, \"b_values\": [0, 1000], \"extra\": 1}\n```";
        let parsed = parse_extraction_response(&schema, SourceTag::Table, text).unwrap();
        assert_eq!(parsed.recognised, 4);
        assert_eq!(parsed.unrecognised, 1);
        assert_eq!(value_of(&parsed, "n_overall"), Some("40"));
        assert_eq!(value_of(&parsed, "b_values"), Some("0, 1000"));
        assert_eq!(value_of(&parsed, "doi"), None);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let schema = FieldSchema::builtin();
        let parsed = parse_extraction_response(&schema, SourceTag::Text, "TE: 89\nTE: 90\n").unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(value_of(&parsed, "te"), Some("89"));
    }

    #[test]
    fn test_unrecognised_response_degrades() {
        let schema = FieldSchema::builtin();
        let err = parse_extraction_response(&schema, SourceTag::Text, "I could not read this paper.").unwrap_err();
        assert!(matches!(err, SysrevError::ParseDegradation(_)));
        assert!(parse_extraction_response(&schema, SourceTag::Text, "  ").is_err());
    }

    #[test]
    fn test_screening_decisions() {
        let ok = parse_screening_decision(r#"{"decision": "Include", "justification": "Human FW study."}"#, "Claude");
        assert_eq!(ok, (Decision::Include, "Human FW study.".to_string()));

        let (d, j) = parse_screening_decision("Include, obviously", "Claude");
        assert_eq!(d, Decision::JsonError);
        assert!(j.starts_with("Invalid JSON response from Claude"));

        let (d, _) = parse_screening_decision(r#"{"decision": "Include"}"#, "Claude");
        assert_eq!(d, Decision::ParseError);

        let (d, j) = parse_screening_decision(r#"{"decision": "Maybe", "justification": "x"}"#, "Claude");
        assert_eq!((d, j.as_str()), (Decision::ParseError, "Invalid decision value: Maybe"));
    }
}
