//! sysrev-common — Shared error and confidence types used across all sysrev crates.

pub mod error;
pub mod confidence;

pub use confidence::{quality_summary, Confidence};
pub use error::{Result, SysrevError};
