//! Title similarity used by the write-path matcher.

use crate::geocode::normalize_name;

/// Titles at least this similar (normalized Levenshtein) may describe the
/// same occurrence.
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.80;

/// Two events closer than this are at the same place.
pub const SAME_PLACE_RADIUS_KM: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DedupConfig {
    pub title_threshold: f64,
    pub same_place_radius_km: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            title_threshold: TITLE_SIMILARITY_THRESHOLD,
            same_place_radius_km: SAME_PLACE_RADIUS_KM,
        }
    }
}

/// Case, accents and punctuation stripped.
pub fn normalize_title(title: &str) -> String {
    normalize_name(title)
}

/// Similarity of two already normalized titles in `[0, 1]`.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("  Concert : JAZZ au Sunset !"),
            "concert jazz au sunset"
        );
        assert_eq!(normalize_title("Fête de la Musique"), "fete de la musique");
    }

    #[test]
    fn test_similarity_threshold() {
        let a = normalize_title("Nuit Blanche Paris");
        let b = normalize_title("Nuit Blanche à Paris");
        assert!(title_similarity(&a, &b) >= TITLE_SIMILARITY_THRESHOLD);

        let c = normalize_title("Marché de Noël");
        assert!(title_similarity(&a, &c) < TITLE_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_empty_titles_never_match() {
        assert_eq!(title_similarity("", ""), 0.0);
        assert_eq!(title_similarity("expo", ""), 0.0);
    }
}
