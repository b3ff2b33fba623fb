//! Prompt rendering.
//!
//! The field list in both extraction prompts is generated from the schema,
//! so the labels the model is asked for are exactly the labels the response
//! parser accepts.

use anyhow::{Context, Result};
use minijinja::{context, Environment};
use serde::Serialize;
use sysrev_merge::{FieldSchema, Section};

const TABLE_EXTRACTION: &str = r#"You are a meticulous research assistant conducting systematic data extraction for a meta-analysis on free water diffusion MRI studies.

CRITICAL INSTRUCTION: You have access to both the full paper text AND extracted table data. Use BOTH sources to extract the most accurate information. For numerical values, prioritize the table data which contains exact values.

{% include "fields" %}
Here is the full text of the paper:
---
{{ paper_text }}
---

Here are the extracted tables (CSV format):
---
{{ table_data }}
---

REMEMBER: Use the table data to extract exact numerical values for free water measurements and demographics. Combine information from both the paper text and the structured table data for the most accurate extraction.
"#;

const TEXT_EXTRACTION: &str = r#"You are a meticulous research assistant conducting systematic data extraction for a meta-analysis on free water diffusion MRI studies.

CRITICAL INSTRUCTION: Focus on extracting information from the complete text, including values that may be embedded in paragraphs, figure captions, or results sections. Pay special attention to free water values that may be described in text rather than tables.

{% include "fields" %}
Here is the full text of the paper:
---
{{ paper_text }}
---

REMEMBER: Focus on comprehensive text analysis. Extract any numerical values mentioned anywhere in the document, especially free water measurements that may be embedded in results paragraphs or figure descriptions.
"#;

const FIELDS: &str = r#"Extract the following information from the provided paper. Write "Not reported" if unavailable.
Answer with one line per field in the form "- Label: value", keeping the labels exactly as written.
{% for section in sections %}
**{{ section.heading }}**
{% if section.note %}{{ section.note }}
{% endif %}
{% for f in section.fields %}- {{ f.label }}:{% if f.hint %} [{{ f.hint }}]{% endif %}

{% endfor %}{% endfor %}"#;

const SCREENING_SYSTEM: &str = r#"You are an expert assistant conducting a full-text review for a systematic review on Free Water diffusion MRI.
Your task is to determine if a research paper meets the specified criteria based on its full text.

**Inclusion criteria:**
{% for c in inclusion %}- {{ c }}
{% endfor %}
**Exclusion criteria:**
{% for c in exclusion %}- {{ c }}
{% endfor %}
Your response must ONLY be a single, valid JSON object with no additional text, explanations, or markdown formatting. The JSON object must have exactly two keys:
- "decision": either "Include" or "Exclude"
- "justification": a 2-3 sentence explanation for the decision

Example response:
{"decision": "Include", "justification": "This is a peer-reviewed human study that explicitly applies free-water modeling to diffusion MRI data and reports quantitative FW metrics including FW fraction."}
"#;

pub const DEFAULT_INCLUSION: &[&str] = &[
    "Human studies",
    "Free Water modeling applied to diffusion MRI",
    "Quantitative FW metrics reported (e.g., FW fraction, FW-corrected FA)",
    "Peer-reviewed publication",
];

pub const DEFAULT_EXCLUSION: &[&str] = &[
    "Non-human studies",
    "No mention of FW modeling or metrics",
    "Conference abstracts, reviews, or editorials",
];

const TABLE_FW_NOTE: &str =
    "CRITICAL: Use the extracted table data to provide exact numerical values for each brain region.";
const TEXT_FW_NOTE: &str =
    "CRITICAL: Look for free water values anywhere in the text - in results sections, figure captions, tables, or embedded in paragraphs. Include exact numerical values with error bars.";

#[derive(Serialize)]
struct PromptField<'a> {
    label: &'a str,
    hint: &'a str,
}

#[derive(Serialize)]
struct PromptSection<'a> {
    heading: String,
    note: Option<&'static str>,
    fields: Vec<PromptField<'a>>,
}

/// Which extractor a prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Table,
    Text,
}

/// Compiled templates.
pub struct PromptBuilder {
    env: Environment<'static>,
    inclusion: Vec<String>,
    exclusion: Vec<String>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_template("fields", FIELDS).context("fields template")?;
        env.add_template("table_extraction", TABLE_EXTRACTION).context("table template")?;
        env.add_template("text_extraction", TEXT_EXTRACTION).context("text template")?;
        env.add_template("screening_system", SCREENING_SYSTEM).context("screening template")?;
        Ok(Self {
            env,
            inclusion: DEFAULT_INCLUSION.iter().map(|s| s.to_string()).collect(),
            exclusion: DEFAULT_EXCLUSION.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn with_criteria(mut self, inclusion: Vec<String>, exclusion: Vec<String>) -> Self {
        if !inclusion.is_empty() {
            self.inclusion = inclusion;
        }
        if !exclusion.is_empty() {
            self.exclusion = exclusion;
        }
        self
    }

    fn sections<'a>(schema: &'a FieldSchema, kind: PromptKind) -> Vec<PromptSection<'a>> {
        Section::ALL
            .iter()
            .filter_map(|&section| {
                let fields: Vec<_> = schema
                    .section(section)
                    .map(|f| PromptField { label: &f.label, hint: &f.hint })
                    .collect();
                if fields.is_empty() {
                    return None;
                }
                let (heading, note) = match (section, kind) {
                    (Section::FreeWaterResults, PromptKind::Table) => {
                        (format!("{} - USE TABLE DATA", section.heading()), Some(TABLE_FW_NOTE))
                    }
                    (Section::FreeWaterResults, PromptKind::Text) => {
                        (format!("{} - COMPREHENSIVE TEXT SEARCH", section.heading()), Some(TEXT_FW_NOTE))
                    }
                    _ => (section.heading().to_string(), None),
                };
                Some(PromptSection { heading, note, fields })
            })
            .collect()
    }

    pub fn table_extraction(&self, schema: &FieldSchema, paper_text: &str, table_data: &str) -> Result<String> {
        let tmpl = self.env.get_template("table_extraction")?;
        Ok(tmpl.render(context! {
            sections => Self::sections(schema, PromptKind::Table),
            paper_text => paper_text,
            table_data => table_data,
        })?)
    }

    pub fn text_extraction(&self, schema: &FieldSchema, paper_text: &str) -> Result<String> {
        let tmpl = self.env.get_template("text_extraction")?;
        Ok(tmpl.render(context! {
            sections => Self::sections(schema, PromptKind::Text),
            paper_text => paper_text,
        })?)
    }

    pub fn screening_system(&self) -> Result<String> {
        let tmpl = self.env.get_template("screening_system")?;
        Ok(tmpl.render(context! {
            inclusion => &self.inclusion,
            exclusion => &self.exclusion,
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_label_is_prompted() {
        let schema = FieldSchema::builtin();
        let p = PromptBuilder::new().unwrap();
        let prompt = p.text_extraction(&schema, "PAPER BODY").unwrap();
        for f in schema.fields() {
            assert!(prompt.contains(&format!("- {}:", f.label)), "missing label {}", f.label);
        }
        assert!(prompt.contains("**STUDY IDENTIFICATION**"));
        assert!(prompt.contains("- TR: [milliseconds]\n"));
        assert!(prompt.contains("COMPREHENSIVE TEXT SEARCH"));
        assert!(prompt.contains("---\nPAPER BODY\n---"));
        assert!(!prompt.contains("extracted tables"));
    }

    #[test]
    fn test_table_prompt_carries_tables() {
        let schema = FieldSchema::builtin();
        let p = PromptBuilder::new().unwrap();
        let prompt = p.table_extraction(&schema, "BODY", "Table 1:\nTR,TE\n").unwrap();
        assert!(prompt.contains("USE TABLE DATA"));
        assert!(prompt.contains("Table 1:\nTR,TE"));
    }

    #[test]
    fn test_screening_criteria_override() {
        let p = PromptBuilder::new()
            .unwrap()
            .with_criteria(vec!["Adults only".into()], vec![]);
        let sys = p.screening_system().unwrap();
        assert!(sys.contains("- Adults only\n"));
        assert!(sys.contains("- Non-human studies\n"));
        assert!(!sys.contains("- Human studies\n"));
        assert!(sys.contains("\"decision\""));
    }
}
