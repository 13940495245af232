use std::fmt::Debug;

use regex::Regex;

use crate::error::BuildError;

/// A set of anchored regexes, each tagged with a handle, queried together so
/// that the longest match can be found in one pass. One `RegexMatcher` backs
/// each start-condition of a [`crate::tokenizer::Tokenizer`], with the
/// handle being the declaring token's index (so the lowest handle among a
/// tie is exactly "earliest declared wins").
#[derive(Debug, Default)]
pub struct RegexMatcher<H: Copy + Ord + Debug> {
    lexemes: Vec<(H, Regex)>,
}

impl<H: Copy + Ord + Debug> RegexMatcher<H> {
    pub fn new(lexeme_patterns: &[(H, &str)]) -> Result<Self, BuildError> {
        let mut lexemes = vec![];
        for (handle, pattern) in lexeme_patterns.iter() {
            if pattern.is_empty() {
                return Err(BuildError::EmptyPattern);
            };
            let anchored = format!("\\A(?:{})", pattern);
            let regex = Regex::new(&anchored)
                .map_err(|error| BuildError::Regex((*pattern).to_string(), error))?;
            lexemes.push((*handle, regex));
        }
        Ok(Self { lexemes })
    }

    /// Returns the handle and length of the longest match at the start of
    /// `text`, breaking ties in favour of the lowest handle.
    pub fn longest_match(&self, text: &str) -> Option<(H, usize)> {
        let mut best: Option<(H, usize)> = None;
        for (handle, regex) in self.lexemes.iter() {
            if let Some(m) = regex.find(text) {
                let len = m.end();
                best = match best {
                    None => Some((*handle, len)),
                    Some((best_handle, best_len)) => {
                        if len > best_len || (len == best_len && *handle < best_handle) {
                            Some((*handle, len))
                        } else {
                            Some((best_handle, best_len))
                        }
                    }
                };
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_match_picks_longest() {
        let matcher = RegexMatcher::new(&[(1usize, "ab"), (2usize, "abc")]).unwrap();
        assert_eq!(matcher.longest_match("abcdef"), Some((2, 3)));
    }

    #[test]
    fn longest_match_breaks_ties_by_lowest_handle() {
        let matcher = RegexMatcher::new(&[(0usize, "if"), (1usize, "[a-z]+")]).unwrap();
        assert_eq!(matcher.longest_match("if"), Some((0, 2)));
    }

    #[test]
    fn longest_match_none_when_nothing_matches() {
        let matcher = RegexMatcher::new(&[(0usize, "[0-9]+")]).unwrap();
        assert_eq!(matcher.longest_match("abc"), None);
    }

    #[test]
    fn rejects_empty_pattern() {
        assert!(matches!(
            RegexMatcher::<usize>::new(&[(0usize, "")]),
            Err(BuildError::EmptyPattern)
        ));
    }
}
