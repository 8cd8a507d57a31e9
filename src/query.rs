//! Query classification.
//!
//! Decides which search path a raw query takes: pure-digit queries are
//! student identifiers and go through the indexed prefix lookup; everything
//! else is treated as a name/keyword query.

/// The two kinds of query the engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// The query is a (possibly partial) student identifier.
    Identifier,
    /// The query is a name or free-text keyword string.
    Name,
}

/// Classify a raw query string.
///
/// A query that, after trimming, consists entirely of ASCII digits (length
/// at least 1) is an [`QueryKind::Identifier`]. Anything else, including
/// mixed strings like `"sv2012345"`, is a [`QueryKind::Name`].
pub fn classify(query: &str) -> QueryKind {
    let trimmed = query.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        QueryKind::Identifier
    } else {
        QueryKind::Name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_digits_are_identifier() {
        assert_eq!(classify("2012345"), QueryKind::Identifier);
        assert_eq!(classify("1"), QueryKind::Identifier);
        assert_eq!(classify("  123456  "), QueryKind::Identifier);
    }

    #[test]
    fn test_names_are_name() {
        assert_eq!(classify("Nguyễn"), QueryKind::Name);
        assert_eq!(classify("nguyen van a"), QueryKind::Name);
    }

    #[test]
    fn test_mixed_digits_and_letters_are_name() {
        assert_eq!(classify("sv2012345"), QueryKind::Name);
        assert_eq!(classify("2012345a"), QueryKind::Name);
        assert_eq!(classify("20 12345"), QueryKind::Name);
    }

    #[test]
    fn test_empty_is_name() {
        // The engine rejects sub-minimum queries before classification;
        // classify itself is total.
        assert_eq!(classify(""), QueryKind::Name);
        assert_eq!(classify("   "), QueryKind::Name);
    }
}
