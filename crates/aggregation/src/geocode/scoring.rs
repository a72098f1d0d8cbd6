//! Pure venue-name scoring used by the curated tiers.
//!
//! Names are normalized (case, accents, punctuation) and reduced to
//! keywords with the generic venue vocabulary stripped, so "Cinéma Le
//! Grand Rex" and "le grand rex" share the keywords `grand` and `rex`.

use std::collections::BTreeSet;

use lazy_static::lazy_static;

/// Textual score a candidate must reach to be accepted.
pub const MIN_VENUE_SCORE: u32 = 20;
/// Normalized names are identical.
pub const EXACT_NAME_SCORE: u32 = 100;
/// One normalized name contains the other.
pub const SUBSTRING_SCORE: u32 = 50;
/// Per keyword shared by both names.
pub const KEYWORD_SCORE: u32 = 10;
/// Candidate lies in the region the query expects. Only ranks candidates
/// that already passed [`MIN_VENUE_SCORE`].
pub const REGION_BONUS: u32 = 200;

lazy_static! {
    static ref STOPWORDS: BTreeSet<&'static str> = [
        // articles and prepositions
        "le", "la", "les", "l", "de", "du", "des", "d", "a", "au", "aux", "et", "en", "sur",
        "the", "of",
        // generic venue vocabulary
        "cinema", "cine", "salle", "salles", "theatre", "espace", "centre", "complexe",
        "multiplexe",
    ]
    .into_iter()
    .collect();
}

/// Lowercase, strip accents, turn punctuation into spaces, collapse runs.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .flat_map(char::to_lowercase)
        .map(fold_accent)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' => 'i',
        'ô' | 'ö' | 'ó' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        'ÿ' => 'y',
        'œ' => 'o',
        other => other,
    }
}

/// Significant tokens of a name.
pub fn keywords(name: &str) -> BTreeSet<String> {
    normalize_name(name)
        .split(' ')
        .filter(|token| !token.is_empty() && !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Textual similarity of two venue names.
///
/// Exact match and containment take precedence over keyword overlap.
pub fn score_venue(query: &str, candidate: &str) -> u32 {
    let query_norm = normalize_name(query);
    let candidate_norm = normalize_name(candidate);
    if query_norm.is_empty() || candidate_norm.is_empty() {
        return 0;
    }

    if query_norm == candidate_norm {
        return EXACT_NAME_SCORE;
    }
    if query_norm.contains(&candidate_norm) || candidate_norm.contains(&query_norm) {
        return SUBSTRING_SCORE;
    }

    let shared = keywords(&query_norm)
        .intersection(&keywords(&candidate_norm))
        .count() as u32;
    shared * KEYWORD_SCORE
}
