//! sysrev-merge — Hybrid extraction merge engine.
//!
//! Reconciles the table-oriented and the full-text candidate sets of one
//! document into a single record:
//!   schema     → ordered output fields with per-field source policy
//!   normalise  → raw candidate cleaning, missing detection, numeric parsing
//!   merge      → per-field reconciliation with confidence tags
//!   assemble   → one `ExtractionRecord` per document
//!
//! Everything in this crate is pure; no I/O happens after schema load.

pub mod schema;
pub mod value;
pub mod candidate;
pub mod normalise;
pub mod merge;
pub mod assemble;

pub use assemble::{assemble, ExtractionMethod, ExtractionRecord};
pub use candidate::{CandidateMap, NormalisedCandidate, RawCandidate, SourceTag};
pub use merge::{merge, merge_field, Discarded, MergedField, WinningSource};
pub use normalise::Normaliser;
pub use schema::{FieldDefinition, FieldSchema, PreferredSource, Section, ValueType};
pub use value::{FieldValue, Quantity};
