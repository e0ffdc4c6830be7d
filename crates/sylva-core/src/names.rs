//! Label normalization.
//!
//! Two forms are needed: a Newick-safe label for export, and a
//! whitespace-folded label that keeps multi-word taxon names together
//! as a single term in the search indexes.

use once_cell::sync::Lazy;
use regex::Regex;

/// Replacement used for runs of whitespace in folded names.
pub const WHITESPACE_SUBSTITUTE: &str = "%s%";

static OFFENDING_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s"_~`:;/\[\]{}|<>,.!@#$%^&*()?+=\\]+"#).unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Replaces every run of punctuation or whitespace (except `-`) with a
/// single `_`, so the label can be written into Newick unquoted.
pub fn clean_name(name: &str) -> String {
    OFFENDING_CHARS.replace_all(name, "_").into_owned()
}

/// Replaces every run of whitespace with [`WHITESPACE_SUBSTITUTE`].
pub fn fold_whitespace(name: &str) -> String {
    WHITESPACE.replace_all(name, WHITESPACE_SUBSTITUTE).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name_collapses_runs() {
        assert_eq!(clean_name("Homo sapiens"), "Homo_sapiens");
        assert_eq!(clean_name("Pan  (troglodytes)"), "Pan_troglodytes_");
        assert_eq!(clean_name("a__b"), "a_b");
    }

    #[test]
    fn test_clean_name_keeps_hyphen() {
        assert_eq!(clean_name("Ficus-sp.1"), "Ficus-sp_1");
    }

    #[test]
    fn test_fold_whitespace() {
        assert_eq!(fold_whitespace("Homo sapiens"), "Homo%s%sapiens");
        assert_eq!(fold_whitespace("Homo \t sapiens"), "Homo%s%sapiens");
        assert_eq!(fold_whitespace("Homo_sapiens"), "Homo_sapiens");
    }
}
