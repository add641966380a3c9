//! Label canonicalization
//!
//! Two labels name the same concept iff their canonical forms are identical.
//! Comparison stays case-sensitive, so "Machine Learning" and
//! "machine learning" are distinct labels.

/// Known plural suffixes and their singular replacement.
const SINGULAR_SUFFIXES: &[(&str, &str)] = &[
    ("Sciences", "Science"),
    ("sciences", "science"),
    ("Studies", "Study"),
    ("studies", "study"),
    ("Technologies", "Technology"),
    ("technologies", "technology"),
    ("Histories", "History"),
    ("histories", "history"),
];

/// Canonicalize a raw taxonomy label.
///
/// Steps, in order: trim, `&` → ` and ` (space padded, so `R&D` becomes
/// `R and D`), strip punctuation (hyphens survive only between two
/// alphanumerics), collapse whitespace, singularize known plural suffixes
/// word by word, trim.
///
/// Total and pure: any input yields a (possibly empty) label.
pub fn normalize_label(raw: &str) -> String {
    let replaced = raw.trim().replace('&', " and ");
    let chars: Vec<char> = replaced.chars().collect();

    let mut stripped = String::with_capacity(replaced.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            stripped.push(c);
        } else if c.is_whitespace() {
            stripped.push(' ');
        } else if c == '-' {
            let before = i > 0 && chars[i - 1].is_alphanumeric();
            let after = chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
            if before && after {
                stripped.push('-');
            }
        }
    }

    stripped
        .split_whitespace()
        .map(singularize)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn singularize(word: &str) -> String {
    for (plural, singular) in SINGULAR_SUFFIXES {
        if let Some(stem) = word.strip_suffix(plural) {
            return format!("{}{}", stem, singular);
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(normalize_label("  Machine    Learning \t"), "Machine Learning");
    }

    #[test]
    fn ampersand_becomes_and() {
        assert_eq!(normalize_label("Arts & Crafts"), "Arts and Crafts");
        assert_eq!(normalize_label("R&D"), "R and D");
    }

    #[test]
    fn strips_punctuation_but_keeps_internal_hyphens() {
        assert_eq!(normalize_label("Self-Study!"), "Self-Study");
        assert_eq!(normalize_label("C++ (Programming)"), "C Programming");
        assert_eq!(normalize_label("- Leading - Dash -"), "Leading Dash");
    }

    #[test]
    fn singularizes_known_suffixes() {
        assert_eq!(normalize_label("Data Sciences"), "Data Science");
        assert_eq!(normalize_label("Cultural Studies"), "Cultural Study");
        assert_eq!(normalize_label("Web Technologies"), "Web Technology");
        assert_eq!(normalize_label("Art Histories"), "Art History");
        assert_eq!(normalize_label("Neurosciences"), "Neuroscience");
    }

    #[test]
    fn leaves_other_plurals_alone() {
        assert_eq!(normalize_label("Neural Networks"), "Neural Networks");
    }

    #[test]
    fn is_case_sensitive_and_idempotent() {
        let once = normalize_label("Computer Sciences & Engineering");
        assert_eq!(normalize_label(&once), once);
        assert_ne!(normalize_label("biology"), normalize_label("Biology"));
    }

    #[test]
    fn punctuation_only_label_is_empty() {
        assert_eq!(normalize_label("?!..."), "");
    }
}
