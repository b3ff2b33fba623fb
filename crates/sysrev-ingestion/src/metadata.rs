//! First-page title and year heuristics for screening output.

use std::sync::OnceLock;

use chrono::Datelike;
use regex::Regex;

pub const TITLE_NOT_FOUND: &str = "Title not found";
pub const YEAR_NOT_FOUND: &str = "Year not found";

/// Running headers and footers that look like titles but are not.
const TITLE_SKIP: &[&str] = &["page", "doi:", "http", "www.", "journal", "volume", "issue"];

/// Lines of the first page considered for the title.
const TITLE_SCAN_LINES: usize = 20;

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(19[89]\d|20\d\d)").unwrap())
}

/// Latest plausible publication year (1980 to next year) on the page.
pub fn find_year(text: &str, current_year: i32) -> Option<i32> {
    year_regex()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| (1980..=current_year + 1).contains(y))
        .max()
}

pub fn find_year_now(text: &str) -> String {
    find_year(text, chrono::Local::now().year())
        .map(|y| y.to_string())
        .unwrap_or_else(|| YEAR_NOT_FOUND.to_string())
}

fn is_all_caps(line: &str) -> bool {
    let mut letters = line.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| !c.is_lowercase())
}

/// First line on the page that reads like a title: 10 to 200 characters,
/// more than three words, not shouting, not a header or footer.
pub fn find_title(first_page: &str) -> Option<String> {
    first_page
        .lines()
        .take(TITLE_SCAN_LINES)
        .map(str::trim)
        .find(|line| {
            let len = line.chars().count();
            let lower = line.to_lowercase();
            (10..=200).contains(&len)
                && !is_all_caps(line)
                && line.split_whitespace().count() > 3
                && !TITLE_SKIP.iter().any(|p| lower.contains(p))
        })
        .map(String::from)
}

/// Embedded document title, unless empty or a placeholder; otherwise the
/// first-page heuristic.
pub fn resolve_title(info_title: Option<&str>, first_page: &str) -> String {
    if let Some(t) = info_title.map(str::trim) {
        let lower = t.to_lowercase();
        if !t.is_empty() && lower != "untitled" && lower != TITLE_NOT_FOUND.to_lowercase() {
            return t.to_string();
        }
    }
    find_title(first_page).unwrap_or_else(|| TITLE_NOT_FOUND.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "Journal of Neuroimaging 2019; Volume 12\n\
        NEUROIMAGE CLINICAL\n\
        Free-water imaging in early Parkinson's disease\n\
        J. Smith, A. Doe\n\
        Received 2018, accepted 2019, cited work from 1975 and 2031";

    #[test]
    fn test_title_skips_headers_and_caps() {
        assert_eq!(find_title(PAGE).as_deref(), Some("Free-water imaging in early Parkinson's disease"));
        assert_eq!(find_title("Short\nA B C\n"), None);
    }

    #[test]
    fn test_year_is_latest_plausible() {
        assert_eq!(find_year(PAGE, 2025), Some(2019));
        assert_eq!(find_year("no digits here", 2025), None);
        assert_eq!(find_year("Published 2026", 2025), Some(2026));
        assert_eq!(find_year("Published 2027", 2025), None);
    }

    #[test]
    fn test_info_title_preferred_unless_placeholder() {
        assert_eq!(resolve_title(Some("  Real Title  "), PAGE), "Real Title");
        assert_eq!(resolve_title(Some("untitled"), PAGE), "Free-water imaging in early Parkinson's disease");
        assert_eq!(resolve_title(None, ""), TITLE_NOT_FOUND);
    }
}
