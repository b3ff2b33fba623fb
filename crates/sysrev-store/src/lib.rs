//! sysrev-store — CSV and checkpoint persistence.
//!
//! - `records`: one extraction row per document, schema-ordered columns plus
//!   a JSON provenance cell; reading a written file reproduces the records.
//! - `screening`: include/exclude decision rows.
//! - `progress`: JSON checkpoint for resumable screening batches.
//!
//! All writes replace the target file atomically.

mod atomic;
pub mod error;
pub mod records;
pub mod screening;
pub mod progress;

pub use error::{Result, StoreError};
pub use progress::{Checkpoint, ProgressStore};
pub use records::{processed_ids, read_records, write_records, Provenance};
pub use screening::{
    decision_summary, processed_filenames, read_screening, write_screening, Decision, ScreeningRow,
};
