//! Title matching policy for KOFIC to TMDB mapping.

use unicode_normalization::UnicodeNormalization;

/// Canonical form of a title: NFC, lowercase, whitespace removed.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title
        .nfc()
        .flat_map(char::to_lowercase)
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Whether two titles name the same movie under the matching policy.
///
/// Empty titles never match.
#[must_use]
pub fn titles_match(left: &str, right: &str) -> bool {
    let left = normalize_title(left);
    !left.is_empty() && left == normalize_title(right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_and_case_are_ignored() {
        // Arrange & Act & Assert
        assert!(titles_match("서울의 봄", "서울의봄"));
        assert!(titles_match("Fight Club", "fight\tclub"));
        assert!(titles_match("  Parasite ", "PARASITE"));
    }

    #[test]
    fn test_composed_and_decomposed_hangul_match() {
        // Arrange
        let composed = "괴물";
        let decomposed: String = composed.nfd().collect();

        // Act & Assert
        assert_ne!(composed, decomposed);
        assert!(titles_match(composed, &decomposed));
    }

    #[test]
    fn test_different_titles_do_not_match() {
        // Arrange & Act & Assert
        assert!(!titles_match("노량: 죽음의 바다", "노량"));
        assert!(!titles_match("Alien", "Aliens"));
    }

    #[test]
    fn test_empty_titles_never_match() {
        // Arrange & Act & Assert
        assert!(!titles_match("", ""));
        assert!(!titles_match(" ", "\t"));
    }

    #[test]
    fn test_normalize_title() {
        // Arrange & Act & Assert
        assert_eq!(normalize_title("Spider-Man: No Way Home"), "spider-man:nowayhome");
    }
}
