use regex::{Regex, RegexBuilder};

use crate::errors::{SearchError, SearchResult};

/// Finds a literal term in text, ignoring case
///
/// The term is escaped before it is compiled, so characters such as `.` or `*` only
/// ever match themselves. Case folding is Unicode-aware and works one character at a
/// time, so `"ÉTÉ"` finds `"été"`.
#[derive(Debug, Clone)]
pub struct TermMatcher {
    term: String,
    regex: Regex,
}

impl TermMatcher {
    /// Creates a matcher for `term`; the term must not be empty
    pub fn new(term: &str) -> SearchResult<Self> {
        if term.is_empty() {
            return Err(SearchError::config_error("search term must not be empty"));
        }

        let regex = RegexBuilder::new(&regex::escape(term))
            .case_insensitive(true)
            .build()
            .map_err(|e| SearchError::config_error(format!("unusable search term: {}", e)))?;

        Ok(Self {
            term: term.to_string(),
            regex,
        })
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// Byte ranges of all non-overlapping matches, left to right
    ///
    /// After a match the search resumes where the match ended.
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        self.regex
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect()
    }

    /// 1-based character columns at which matches start
    pub fn find_columns<'t>(&'t self, line: &'t str) -> impl Iterator<Item = usize> + 't {
        let mut consumed = 0;
        let mut column = 1;
        self.regex.find_iter(line).map(move |m| {
            column += line[consumed..m.start()].chars().count();
            consumed = m.start();
            column
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(term: &str, line: &str) -> Vec<usize> {
        TermMatcher::new(term).unwrap().find_columns(line).collect()
    }

    #[test]
    fn test_simple_term_matching() {
        let matcher = TermMatcher::new("test").unwrap();
        let text = "this is a test string with test pattern";
        let matches = matcher.find_matches(text);
        assert_eq!(matches.len(), 2);

        assert_eq!(&text[matches[0].0..matches[0].1], "test");
        assert_eq!(&text[matches[1].0..matches[1].1], "test");
    }

    #[test]
    fn test_non_overlapping_advance() {
        assert_eq!(columns("aa", "aaaa"), vec![1, 3]);
        assert_eq!(columns("aa", "aaa"), vec![1]);
        assert_eq!(columns("aba", "ababa"), vec![1]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(columns("API", "api Api aPI"), vec![1, 5, 9]);
        assert_eq!(columns("api", "foo API bar"), vec![5]);
        assert_eq!(columns("ÉTÉ", "un été"), vec![4]);
    }

    #[test]
    fn test_term_is_literal() {
        assert_eq!(columns("a.c", "abc a.c"), vec![5]);
        assert_eq!(columns("(x)*", "x (x)* (X)*"), vec![3, 8]);
        assert!(!TermMatcher::new("[").unwrap().is_match("no bracket"));
    }

    #[test]
    fn test_columns_count_characters() {
        // 'é' is two bytes but one column
        assert_eq!(columns("x", "éx éx"), vec![2, 5]);
        assert_eq!(columns("🦀", "a🦀b🦀"), vec![2, 4]);
    }

    #[test]
    fn test_empty_term_rejected() {
        assert!(matches!(
            TermMatcher::new(""),
            Err(SearchError::ConfigError(_))
        ));
    }

    #[test]
    fn test_no_matches() {
        let matcher = TermMatcher::new("needle").unwrap();
        assert_eq!(matcher.term(), "needle");
        assert!(matcher.find_matches("haystack").is_empty());
        assert_eq!(matcher.find_columns("").count(), 0);
    }
}
