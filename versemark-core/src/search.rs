use std::str::MatchIndices;

use crate::error::{Error, Result};

/// A match span as byte offsets into the searched content, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

/// Lazy left-to-right scan for a literal term. After a hit the scan resumes
/// at the end of that hit, so overlapping occurrences are not reported.
pub struct Matches<'a> {
    inner: MatchIndices<'a, &'a str>,
}

impl Iterator for Matches<'_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.inner.next().map(|(start, hit)| Match {
            start,
            end: start + hit.len(),
        })
    }
}

/// Case-sensitive literal search. An empty term is rejected before scanning.
pub fn find_all<'a>(content: &'a str, term: &'a str) -> Result<Matches<'a>> {
    if term.is_empty() {
        return Err(Error::invalid("search term is empty"));
    }
    Ok(Matches {
        inner: content.match_indices(term),
    })
}

/// Converts a byte offset into a 1-based line and 0-based character column.
pub fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(content.len());
    let before = &content[..offset];
    let line_start = before.rfind('\n').map(|idx| idx + 1).unwrap_or(0);
    let line = before.matches('\n').count() + 1;
    let column = before[line_start..].chars().count();
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(content: &str, term: &str) -> Vec<(usize, usize)> {
        find_all(content, term)
            .unwrap()
            .map(|m| (m.start, m.end))
            .collect()
    }

    #[test]
    fn adjacent_matches_are_both_reported() {
        assert_eq!(spans("abcabc", "abc"), vec![(0, 3), (3, 6)]);
    }

    #[test]
    fn overlapping_occurrences_resume_after_match() {
        assert_eq!(spans("aaa", "aa"), vec![(0, 2)]);
    }

    #[test]
    fn match_is_case_sensitive_and_literal() {
        assert_eq!(spans("Light light LIGHT", "light"), vec![(6, 11)]);
        assert!(spans("a.c abc", "a.c") == vec![(0, 3)]);
    }

    #[test]
    fn no_match_is_empty_not_error() {
        assert!(spans("In the beginning", "whale").is_empty());
    }

    #[test]
    fn empty_term_is_rejected() {
        assert!(matches!(find_all("text", ""), Err(Error::Validation(_))));
    }

    #[test]
    fn line_column_counts_characters() {
        let content = "first\nsécond line\nthird";
        let offset = content.find("line").unwrap();
        assert_eq!(line_column(content, offset), (2, 7));
        assert_eq!(line_column(content, 0), (1, 0));
        assert_eq!(line_column(content, content.len()), (3, 5));
    }
}
