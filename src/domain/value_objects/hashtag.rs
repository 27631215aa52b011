use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized hashtag text as stored in the `hashtags` table.
///
/// Normalization trims surrounding whitespace and strips one leading `#`.
/// Case is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hashtag(String);

impl Hashtag {
    /// Normalize raw user input; returns `None` when nothing remains.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let tag = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
        if tag.is_empty() { None } else { Some(Self(tag.to_string())) }
    }

    /// Normalize a list of tags, skipping empty ones and collapsing duplicates
    /// while keeping first-seen order.
    pub fn parse_all<'a, I>(raw: I) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tags: Vec<Self> = Vec::new();
        for tag in raw.into_iter().filter_map(Self::parse) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hashtag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("#rust", Some("rust"))]
    #[case("rust", Some("rust"))]
    #[case("  #Rust  ", Some("Rust"))]
    #[case("##double", Some("#double"))]
    #[case("#", None)]
    #[case("   ", None)]
    #[case("", None)]
    fn parse_normalizes_input(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(Hashtag::parse(raw).as_ref().map(Hashtag::as_str), expected);
    }

    #[test]
    fn parse_all_skips_blanks_and_collapses_duplicates() {
        let tags = Hashtag::parse_all(["#rust", "", "rust", "#", "tokio", "#tokio"]);

        let names: Vec<&str> = tags.iter().map(Hashtag::as_str).collect();
        assert_eq!(names, vec!["rust", "tokio"]);
    }
}
