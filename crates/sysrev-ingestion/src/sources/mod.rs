//! Extraction source adapters.
//!
//! Each adapter turns one PDF into raw field candidates for its own
//! `SourceTag`. Failures come back as `SourceUnavailable`; the pipeline
//! treats them as "no data from this source", never as a document failure.

pub mod table;
pub mod text;

use async_trait::async_trait;
use sysrev_common::SysrevError;
use sysrev_merge::{RawCandidate, SourceTag};

use crate::models::Document;

pub use table::TableSource;
pub use text::TextSource;

/// Common interface for the two extraction paths.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Raw candidates for one document, or `SourceUnavailable`.
    async fn extract(&self, doc: &Document) -> Result<Vec<RawCandidate>, SysrevError>;
}

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub(crate) fn unavailable(tag: SourceTag, reason: impl std::fmt::Display) -> SysrevError {
    SysrevError::source_unavailable(tag.as_str(), reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("0.21 ± 0.03", 6), "0.21 ±");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
