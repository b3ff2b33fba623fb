//! Field values and numeric payload parsing.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Numeric payload recognised in a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Quantity {
    Scalar { value: f64 },
    MeanSd { mean: f64, sd: f64 },
    Range { low: f64, high: f64 },
}

impl Quantity {
    /// Same shape and every component equal within `rel_tol`.
    pub fn approx_eq(&self, other: &Quantity, rel_tol: f64) -> bool {
        match (self, other) {
            (Quantity::Scalar { value: a }, Quantity::Scalar { value: b }) => close(*a, *b, rel_tol),
            (Quantity::MeanSd { mean: m1, sd: s1 }, Quantity::MeanSd { mean: m2, sd: s2 }) => {
                close(*m1, *m2, rel_tol) && close(*s1, *s2, rel_tol)
            }
            (Quantity::Range { low: l1, high: h1 }, Quantity::Range { low: l2, high: h2 }) => {
                close(*l1, *l2, rel_tol) && close(*h1, *h2, rel_tol)
            }
            _ => false,
        }
    }
}

fn close(a: f64, b: f64, rel_tol: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= rel_tol * a.abs().max(b.abs())
}

/// A cleaned value. `text` is what gets written out; `quantity` is only
/// present for numeric fields whose text parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Quantity>,
}

impl FieldValue {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into(), quantity: None }
    }

    pub fn numeric(text: impl Into<String>, quantity: Quantity) -> Self {
        Self { text: text.into(), quantity: Some(quantity) }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters, used by the completeness heuristic.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn scalar(&self) -> Option<f64> {
        match self.quantity {
            Some(Quantity::Scalar { value }) => Some(value),
            Some(Quantity::MeanSd { mean, .. }) => Some(mean),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// Signed decimal with optional thousands separators and exponent.
const NUM: &str = r"[-+]?(?:\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?|\.\d+)(?:[eE][-+]?\d+)?";
// Optional "n =", "p =", "=", "~" lead-in.
const LEAD: &str = r"(?:[np]\s*=\s*|[=~≈]\s*)?";

fn mean_sd_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)^{LEAD}({NUM})\s*(?:±|\+/-|\+/−|\+-)\s*({NUM})|^{LEAD}({NUM})\s*\(\s*(?:sd\s*[=:]?\s*)?({NUM})\s*\)"
        );
        Regex::new(&pattern).unwrap()
    })
}

fn range_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)^{LEAD}({NUM})\s*(?:-|–|—|to)\s*({NUM})");
        Regex::new(&pattern).unwrap()
    })
}

fn leading_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)^{LEAD}({NUM})");
        Regex::new(&pattern).unwrap()
    })
}

fn to_f64(s: &str) -> Option<f64> {
    s.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the numeric payload at the start of a cleaned value.
/// Tries `mean ± sd`, then `low-high`, then a bare leading number.
pub fn parse_quantity(text: &str) -> Option<Quantity> {
    let text = text.trim();

    if let Some(cap) = mean_sd_regex().captures(text) {
        let (mean, sd) = match (cap.get(1), cap.get(2)) {
            (Some(m), Some(s)) => (m.as_str(), s.as_str()),
            _ => (cap.get(3)?.as_str(), cap.get(4)?.as_str()),
        };
        return Some(Quantity::MeanSd { mean: to_f64(mean)?, sd: to_f64(sd)? });
    }

    if let Some(cap) = range_regex().captures(text) {
        return Some(Quantity::Range {
            low: to_f64(cap.get(1)?.as_str())?,
            high: to_f64(cap.get(2)?.as_str())?,
        });
    }

    let cap = leading_number_regex().captures(text)?;
    Some(Quantity::Scalar { value: to_f64(cap.get(1)?.as_str())? })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_number_ignores_units() {
        assert_eq!(parse_quantity("1.5T"), Some(Quantity::Scalar { value: 1.5 }));
        assert_eq!(parse_quantity("3 T"), Some(Quantity::Scalar { value: 3.0 }));
        assert_eq!(parse_quantity("0.420"), Some(Quantity::Scalar { value: 0.42 }));
        assert_eq!(parse_quantity("n = 1,204"), Some(Quantity::Scalar { value: 1204.0 }));
        assert_eq!(parse_quantity("1e-5"), Some(Quantity::Scalar { value: 1e-5 }));
    }

    #[test]
    fn test_mean_sd_forms() {
        let expected = Some(Quantity::MeanSd { mean: 68.0, sd: 5.0 });
        assert_eq!(parse_quantity("68 ± 5 years"), expected);
        assert_eq!(parse_quantity("68 +/- 5"), expected);
        assert_eq!(parse_quantity("68 (SD 5)"), expected);
    }

    #[test]
    fn test_range_forms() {
        let expected = Some(Quantity::Range { low: 25.0, high: 65.0 });
        assert_eq!(parse_quantity("25-65 years"), expected);
        assert_eq!(parse_quantity("25 – 65"), expected);
        assert_eq!(parse_quantity("25 to 65"), expected);
    }

    #[test]
    fn test_unparseable_is_none() {
        assert_eq!(parse_quantity("p < 0.001"), None);
        assert_eq!(parse_quantity("Siemens Prisma"), None);
        assert_eq!(parse_quantity(""), None);
    }

    #[test]
    fn test_approx_eq_tolerance() {
        let a = Quantity::Scalar { value: 0.421 };
        let b = Quantity::Scalar { value: 0.4212 };
        assert!(a.approx_eq(&b, 1e-3));
        assert!(!a.approx_eq(&Quantity::Scalar { value: 0.43 }, 1e-3));
        assert!(!a.approx_eq(&Quantity::Range { low: 0.421, high: 0.5 }, 1e-3));
    }
}
