//! Adverse-event term normalization.

/// Normalize a provider term into its aggregation key: trimmed, lower-cased,
/// with internal whitespace runs collapsed to a single space.
///
/// Returns an empty string for blank input; callers skip those terms.
#[must_use]
pub fn normalize_term(term: &str) -> String {
    term.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("HEADACHE", "headache")]
    #[case("  Nausea ", "nausea")]
    #[case("Drug\tineffective", "drug ineffective")]
    #[case("DRUG   HYPERSENSITIVITY\n", "drug hypersensitivity")]
    #[case("   ", "")]
    fn normalizes_terms(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_term(raw), expected);
    }
}
