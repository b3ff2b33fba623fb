//! Output field schema.
//!
//! The schema is a fixed, ordered list of fields. Column order in the output
//! CSV and field order in the prompts both follow it. Each field carries the
//! source policy the merge engine applies when the two extractors disagree.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sysrev_common::{Result, SysrevError};

/// Column names the record writer owns; schema fields may not reuse them.
pub const RESERVED_COLUMNS: &[&str] = &["filename", "extraction_method", "quality", "provenance", "notes"];

/// Which extractor a field trusts when both report a value and they differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredSource {
    Table,
    Text,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Number,
    NumericRange,
    Categorical,
    FreeText,
}

impl ValueType {
    /// Numeric fields get quantity parsing and tolerance-based equality.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::NumericRange)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String       => "string",
            ValueType::Number       => "number",
            ValueType::NumericRange => "numeric_range",
            ValueType::Categorical  => "categorical",
            ValueType::FreeText     => "free_text",
        }
    }
}

/// Prompt section a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Identification,
    Characteristics,
    Participants,
    MriAcquisition,
    AnalysisMethods,
    FreeWaterResults,
    Correlations,
    KeyFindings,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::Identification,
        Section::Characteristics,
        Section::Participants,
        Section::MriAcquisition,
        Section::AnalysisMethods,
        Section::FreeWaterResults,
        Section::Correlations,
        Section::KeyFindings,
    ];

    pub fn heading(&self) -> &'static str {
        match self {
            Section::Identification   => "STUDY IDENTIFICATION",
            Section::Characteristics  => "STUDY CHARACTERISTICS",
            Section::Participants     => "PARTICIPANTS",
            Section::MriAcquisition   => "MRI ACQUISITION",
            Section::AnalysisMethods  => "ANALYSIS METHODS",
            Section::FreeWaterResults => "FREE WATER RESULTS",
            Section::Correlations     => "CORRELATIONS",
            Section::KeyFindings      => "KEY FINDINGS",
        }
    }
}

/// One output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    /// Unique key and CSV column name.
    pub name: String,
    pub section: Section,
    /// Label used in prompts and accepted back in `Label: value` responses.
    pub label: String,
    /// Bracketed instruction shown after the label in prompts.
    #[serde(default)]
    pub hint: String,
    pub preferred_source: PreferredSource,
    pub value_type: ValueType,
}

use PreferredSource::{Either, Table, Text};
use ValueType::{Categorical, FreeText, Number, NumericRange, String as Str};

/// Built-in field table: (name, section, label, hint, preferred source, value type).
const BUILTIN_FIELDS: &[(&str, Section, &str, &str, PreferredSource, ValueType)] = &[
    ("title",                       Section::Identification,   "Title",                       "Exact title",                                        Either, Str),
    ("lead_author",                 Section::Identification,   "Lead author",                 "First author surname, initials",                     Either, Str),
    ("year",                        Section::Identification,   "Year",                        "YYYY",                                               Either, Number),
    ("journal",                     Section::Identification,   "Journal",                     "Full name",                                          Either, Str),
    ("doi",                         Section::Identification,   "DOI",                         "Complete DOI",                                       Either, Str),
    ("country",                     Section::Identification,   "Country",                     "specify",                                            Either, Str),
    ("study_aim",                   Section::Characteristics,  "Study aim",                   "One sentence describing primary objective",          Either, FreeText),
    ("followup_duration",           Section::Characteristics,  "Follow-up duration",          "If longitudinal, specify duration",                  Either, Str),
    ("multisite_study",             Section::Characteristics,  "Multi-site study",            "Yes/No",                                             Either, Categorical),
    ("clinical_population",         Section::Participants,     "Clinical population",         "Specific clinical condition/disease",                Either, Str),
    ("n_patient_group",             Section::Participants,     "N patient group",             "Number of patients",                                 Either, Number),
    ("n_control_group",             Section::Participants,     "N control group",             "Number of controls",                                 Either, Number),
    ("n_overall",                   Section::Participants,     "N overall",                   "Total number of participants",                       Either, Number),
    ("mean_age_patient",            Section::Participants,     "Mean age patient",            "Mean age of patient group",                          Either, Number),
    ("sd_age_patient",              Section::Participants,     "SD age patient",              "Standard deviation of patient age",                  Either, Number),
    ("mean_age_control",            Section::Participants,     "Mean age control",            "Mean age of control group",                          Either, Number),
    ("sd_age_control",              Section::Participants,     "SD age control",              "Standard deviation of control age",                  Either, Number),
    ("age_range_patient",           Section::Participants,     "Age range patient",           "Age range of patient group, e.g., \"25-65 years\"",  Either, NumericRange),
    ("age_range_control",           Section::Participants,     "Age range control",           "Age range of control group",                         Either, NumericRange),
    ("gender_distribution_patient", Section::Participants,     "Gender distribution patient", "e.g., \"12M/8F\" or \"60% male\"",                   Either, Str),
    ("gender_distribution_control", Section::Participants,     "Gender distribution control", "e.g., \"10M/10F\" or \"50% male\"",                  Either, Str),
    ("scanner_strength",            Section::MriAcquisition,   "Scanner strength",            "1.5T/3T/7T",                                         Table,  Number),
    ("scanner_manufacturer",        Section::MriAcquisition,   "Scanner manufacturer",        "Siemens/GE/Philips/Other",                           Table,  Categorical),
    ("b_values",                    Section::MriAcquisition,   "b-values",                    "List all b-values used, e.g., \"0, 1000, 2000 s/mm²\"", Table, Str),
    ("gradient_directions",         Section::MriAcquisition,   "Gradient directions",         "Total number of gradient directions",                Table,  Number),
    ("reverse_phase_encoding",      Section::MriAcquisition,   "Reverse phase-encoding",      "Yes/No",                                             Either, Categorical),
    ("voxel_size",                  Section::MriAcquisition,   "Voxel size",                  "e.g., \"2×2×2 mm³\"",                                Table,  Str),
    ("tr",                          Section::MriAcquisition,   "TR",                          "milliseconds",                                       Table,  Number),
    ("te",                          Section::MriAcquisition,   "TE",                          "milliseconds",                                       Table,  Number),
    ("acquisition_time",            Section::MriAcquisition,   "Acquisition time",            "minutes",                                            Either, Number),
    ("preprocessing_steps",         Section::AnalysisMethods,  "Preprocessing steps",         "Software/methods used for preprocessing, e.g., \"FSL\", \"SPM\"", Either, FreeText),
    ("analysis_software",           Section::AnalysisMethods,  "Analysis software",           "Software used for analysis, e.g., \"MATLAB\", \"Python\"", Either, Str),
    ("analysis_approach",           Section::AnalysisMethods,  "Analysis approach",           "Whole-brain/ROI/Tract-based/Voxel-wise",             Either, Categorical),
    ("free_water_method",           Section::AnalysisMethods,  "Free-water method",           "Free-water imaging/NODDI/DBSI/Other - specify method", Either, Str),
    ("regions_analyzed",            Section::AnalysisMethods,  "Regions analyzed",            "List specific brain regions/tracts analyzed",        Either, FreeText),
    ("free_water_metrics_reported", Section::AnalysisMethods,  "Free-water metrics reported", "Specific metrics like \"FW fraction\", \"ISOVF\", \"ICVF\" etc.", Either, Str),
    ("if_atlas_name_of_atlas",      Section::AnalysisMethods,  "If atlas name of atlas",      "If brain atlas was used, specify name e.g., \"JH-ICBM-DTI-81\", \"AAL\", \"Harvard-Oxford\"", Either, Str),
    ("roi_definition_method",       Section::AnalysisMethods,  "ROI definition method",       "How ROIs were defined, e.g., \"Manual\", \"Atlas-based\", \"Automated\"", Either, Str),
    ("clinical_group_fw_values",    Section::FreeWaterResults, "Clinical group FW values",    "Exact values for each region, format: \"Region: Mean ± SD\"", Text, FreeText),
    ("control_group_fw_values",     Section::FreeWaterResults, "Control group FW values",     "Exact values for each region, format: \"Region: Mean ± SD\"", Text, FreeText),
    ("group_comparison_p_value",    Section::FreeWaterResults, "Group comparison p-value",    "p-values for the group comparisons",                 Text,   Number),
    ("correlations_reported",       Section::Correlations,     "Correlations reported",       "Yes/No - whether correlations with clinical measures were reported", Either, Categorical),
    ("correlation_coefficients",    Section::Correlations,     "Correlation coefficients",    "If correlations reported, list the correlation values and associated measures", Text, FreeText),
    ("longitudinal_data_available", Section::KeyFindings,      "Longitudinal data available", "Yes/No - whether the study collected longitudinal data", Either, Categorical),
    ("longitudinal_data_results",   Section::KeyFindings,      "Longitudinal data results",   "If longitudinal data available, summarize key longitudinal findings", Either, FreeText),
    ("primary_finding",             Section::KeyFindings,      "Primary finding",             "One sentence summary of main result",                Either, FreeText),
    ("main_interpretation",         Section::KeyFindings,      "Main interpretation",         "Authors' conclusion",                                Text,   FreeText),
    ("key_limitations",             Section::KeyFindings,      "Key limitations",             "Main limitations mentioned",                         Text,   FreeText),
    ("other_measures",              Section::KeyFindings,      "Other measures",              "ROC AUC, mediation, effect sizes etc. if reported",  Either, FreeText),
];

/// Validated, ordered field list.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    fields: Vec<FieldDefinition>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    #[serde(rename = "field")]
    fields: Vec<FieldDefinition>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldSchema {
    /// The built-in free-water diffusion MRI extraction schema.
    pub fn builtin() -> Self {
        let fields = BUILTIN_FIELDS
            .iter()
            .map(|&(name, section, label, hint, preferred_source, value_type)| FieldDefinition {
                name: name.to_string(),
                section,
                label: label.to_string(),
                hint: hint.to_string(),
                preferred_source,
                value_type,
            })
            .collect();
        Self { fields }
    }

    /// Validate a field list: non-empty, unique non-blank names, no reserved columns.
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self> {
        if fields.is_empty() {
            return Err(SysrevError::config("schema defines no fields"));
        }
        let mut seen = HashSet::new();
        for field in &fields {
            let name = field.name.trim();
            if name.is_empty() {
                return Err(SysrevError::config("schema field with empty name"));
            }
            if name != field.name {
                return Err(SysrevError::config(format!(
                    "schema field name '{}' has surrounding whitespace", field.name
                )));
            }
            if RESERVED_COLUMNS.contains(&name) {
                return Err(SysrevError::config(format!(
                    "schema field '{name}' collides with a reserved output column"
                )));
            }
            if field.label.trim().is_empty() {
                return Err(SysrevError::config(format!("schema field '{name}' has an empty label")));
            }
            if !seen.insert(name.to_string()) {
                return Err(SysrevError::config(format!("duplicate schema field '{name}'")));
            }
        }
        Ok(Self { fields })
    }

    /// Parse a TOML schema made of `[[field]]` tables.
    /// Unknown value types or source policies are configuration errors.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SchemaFile = toml::from_str(content)
            .map_err(|e| SysrevError::config(format!("invalid schema: {e}")))?;
        Self::new(file.fields)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SysrevError::config(format!("cannot read schema {}: {e}", path.display()))
        })?;
        let schema = Self::from_toml_str(&content)?;
        tracing::info!(path = %path.display(), fields = schema.len(), "Schema loaded");
        Ok(schema)
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolve a response key: exact name, or label / name ignoring case.
    pub fn resolve_key(&self, key: &str) -> Option<&FieldDefinition> {
        let key = key.trim();
        self.get(key).or_else(|| {
            self.fields.iter().find(|f| {
                f.label.eq_ignore_ascii_case(key) || f.name.eq_ignore_ascii_case(key)
            })
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fields of one section, in schema order.
    pub fn section(&self, section: Section) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(move |f| f.section == section)
    }
}
