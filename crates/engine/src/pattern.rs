//! Blob path patterns — parse, match, resolve.
//!
//! A pattern has the form `container/path-with-{captures}`. The container
//! segment is a literal; the remainder may contain `{name}` captures which
//! match one or more characters within a single path segment (never `/`) and
//! are extracted positionally on match. Output patterns reuse the same
//! syntax and are resolved by substituting captured values.

use std::collections::BTreeMap;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Capture(String),
}

/// A parsed `container/blob` path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobPattern {
    raw: String,
    container: String,
    tokens: Vec<Token>,
}

impl BlobPattern {
    /// Parse and validate a pattern string.
    ///
    /// # Errors
    /// [`ValidationError::InvalidPattern`] for an empty container segment,
    /// a missing blob segment, unbalanced/nested/empty braces, captures in
    /// the container, duplicate capture names, or adjacent captures (which
    /// would make matching ambiguous).
    pub fn parse(pattern: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: reason.to_owned(),
        };

        let (container, blob) = pattern
            .split_once('/')
            .ok_or_else(|| invalid("expected 'container/blob' form"))?;
        if container.is_empty() {
            return Err(invalid("empty container segment"));
        }
        if container.contains(['{', '}']) {
            return Err(invalid("container segment cannot contain captures"));
        }
        if blob.is_empty() {
            return Err(invalid("empty blob segment"));
        }

        let mut tokens: Vec<Token> = Vec::new();
        let mut literal = String::new();
        let mut chars = blob.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') => return Err(invalid("nested '{'")),
                            Some(c) => name.push(c),
                            None => return Err(invalid("unbalanced '{'")),
                        }
                    }
                    if name.is_empty() {
                        return Err(invalid("empty capture name"));
                    }
                    if matches!(tokens.last(), Some(Token::Capture(_))) {
                        return Err(invalid("adjacent captures"));
                    }
                    if tokens
                        .iter()
                        .any(|t| matches!(t, Token::Capture(n) if *n == name))
                    {
                        return Err(invalid("duplicate capture name"));
                    }
                    tokens.push(Token::Capture(name));
                }
                '}' => return Err(invalid("unbalanced '}'")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        Ok(Self {
            raw: pattern.to_owned(),
            container: container.to_owned(),
            tokens,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Capture names in positional order.
    pub fn captures(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Capture(name) => Some(name.as_str()),
                Token::Literal(_) => None,
            })
            .collect()
    }

    /// The literal path prefix before the first capture; used to narrow
    /// listings.
    pub fn literal_prefix(&self) -> &str {
        match self.tokens.first() {
            Some(Token::Literal(lit)) => lit,
            _ => "",
        }
    }

    /// Match a container-relative blob path, extracting capture values.
    ///
    /// Captures prefer the longest value within their path segment and
    /// backtrack to shorter splits when the rest of the pattern cannot
    /// match; a capture never matches an empty string or crosses a `/`.
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let mut bindings = BTreeMap::new();
        Self::match_tokens(&self.tokens, path, &mut bindings).then_some(bindings)
    }

    fn match_tokens(
        tokens: &[Token],
        rest: &str,
        bindings: &mut BTreeMap<String, String>,
    ) -> bool {
        match tokens.split_first() {
            None => rest.is_empty(),
            Some((Token::Literal(lit), tail)) => match rest.strip_prefix(lit.as_str()) {
                Some(rest) => Self::match_tokens(tail, rest, bindings),
                None => false,
            },
            Some((Token::Capture(name), tail)) => {
                let segment_end = rest.find('/').unwrap_or(rest.len());
                // Longest candidate first, shrinking until the remaining
                // tokens match.
                for end in (1..=segment_end).rev() {
                    if !rest.is_char_boundary(end) {
                        continue;
                    }
                    bindings.insert(name.clone(), rest[..end].to_owned());
                    if Self::match_tokens(tail, &rest[end..], bindings) {
                        return true;
                    }
                }
                bindings.remove(name);
                false
            }
        }
    }

    /// Substitute capture values to produce a concrete container-relative
    /// path.
    pub fn resolve(&self, bindings: &BTreeMap<String, String>) -> Result<String, ValidationError> {
        let mut path = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(lit) => path.push_str(lit),
                Token::Capture(name) => {
                    let value = bindings.get(name).ok_or_else(|| {
                        ValidationError::UnboundCapture {
                            pattern: self.raw.clone(),
                            name: name.clone(),
                        }
                    })?;
                    path.push_str(value);
                }
            }
        }
        Ok(path)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for BlobPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn plain_literal_pattern_round_trips() {
        let p = BlobPattern::parse("c/in/data.csv").unwrap();
        assert_eq!(p.container(), "c");
        assert_eq!(p.literal_prefix(), "in/data.csv");
        assert!(p.captures().is_empty());
        assert_eq!(p.matches("in/data.csv"), Some(BTreeMap::new()));
        assert_eq!(p.matches("in/other.csv"), None);
    }

    #[test]
    fn single_capture_extracts_value() {
        let p = BlobPattern::parse("c/{name}.txt").unwrap();
        assert_eq!(p.matches("a.txt"), Some(bindings(&[("name", "a")])));
        // Greedy within the segment: the whole stem is captured.
        assert_eq!(p.matches("a.b.txt"), Some(bindings(&[("name", "a.b")])));
        // A capture never crosses a segment boundary.
        assert_eq!(p.matches("sub/a.txt"), None);
        // Nor matches empty.
        assert_eq!(p.matches(".txt"), None);
    }

    #[test]
    fn multi_capture_pattern() {
        let p = BlobPattern::parse("data/in/{region}-{day}.csv").unwrap();
        assert_eq!(p.literal_prefix(), "in/");
        assert_eq!(
            p.matches("in/emea-07.csv"),
            Some(bindings(&[("region", "emea"), ("day", "07")]))
        );
        assert_eq!(p.matches("in/emea.csv"), None);
    }

    #[test]
    fn capture_bounded_by_next_segment() {
        let p = BlobPattern::parse("c/in/{name}/done.txt").unwrap();
        assert_eq!(
            p.matches("in/batch-1/done.txt"),
            Some(bindings(&[("name", "batch-1")]))
        );
        assert_eq!(p.matches("in/batch-1/extra/done.txt"), None);
    }

    #[test]
    fn backtracks_when_longest_split_fails() {
        // Greedy on its own would give a = "pxq" and leave nothing for b.
        let p = BlobPattern::parse("c/{a}x{b}").unwrap();
        assert_eq!(p.matches("pxqx"), Some(bindings(&[("a", "p"), ("b", "qx")])));
        // Longest split still wins when it can complete the match.
        let p = BlobPattern::parse("c/{a}x{b}y").unwrap();
        assert_eq!(
            p.matches("pxqxry"),
            Some(bindings(&[("a", "pxq"), ("b", "r")]))
        );
    }

    #[test]
    fn resolve_substitutes_captures() {
        let p = BlobPattern::parse("c/out/{name}.txt").unwrap();
        assert_eq!(
            p.resolve(&bindings(&[("name", "a")])).unwrap(),
            "out/a.txt"
        );
        assert!(matches!(
            p.resolve(&BTreeMap::new()),
            Err(ValidationError::UnboundCapture { name, .. }) if name == "name"
        ));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        for bad in [
            "no-slash",
            "/leading-slash",
            "c/",
            "c/{open.txt",
            "c/close}.txt",
            "c/{a{b}}.txt",
            "c/{}.txt",
            "c/{a}{b}.txt",
            "c/{a}-{a}.txt",
            "{cap}/blob.txt",
        ] {
            assert!(BlobPattern::parse(bad).is_err(), "accepted: {bad}");
        }
    }
}
