//! Coarse confidence tags attached to merged field values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Trust label for a merged value.
/// Ordering follows trust: `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low    => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High   => "HIGH",
        }
    }

    /// Lower this tag to at most `ceiling`.
    pub fn capped_at(self, ceiling: Confidence) -> Confidence {
        self.min(ceiling)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW"    => Ok(Confidence::Low),
            "MEDIUM" => Ok(Confidence::Medium),
            "HIGH"   => Ok(Confidence::High),
            other    => Err(format!("unknown confidence tag '{other}'")),
        }
    }
}

/// Fraction of tags that are HIGH. Returns 0.0 for an empty slice.
pub fn quality_summary(tags: &[Confidence]) -> f64 {
    if tags.is_empty() {
        return 0.0;
    }
    let high = tags.iter().filter(|c| **c == Confidence::High).count();
    high as f64 / tags.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_summary_fraction() {
        let tags = [Confidence::High, Confidence::Medium, Confidence::High, Confidence::Low];
        assert!((quality_summary(&tags) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_quality_summary_empty_is_zero() {
        assert_eq!(quality_summary(&[]), 0.0);
    }

    #[test]
    fn test_cap_never_raises() {
        assert_eq!(Confidence::High.capped_at(Confidence::Medium), Confidence::Medium);
        assert_eq!(Confidence::Low.capped_at(Confidence::Medium), Confidence::Low);
    }

    #[test]
    fn test_parse_tag_case_insensitive() {
        assert_eq!("medium".parse::<Confidence>(), Ok(Confidence::Medium));
        assert!("certain".parse::<Confidence>().is_err());
    }
}
