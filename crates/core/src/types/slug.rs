//! URL slug generation for catalog entities.

/// Maximum slug length in bytes.
pub const MAX_SLUG_LENGTH: usize = 80;

/// Derive a URL slug from a display name.
///
/// Lowercases ASCII letters and digits, collapses every other run of
/// characters into a single `-`, and trims dashes from both ends.
///
/// ```
/// use buildmart_core::slugify;
///
/// assert_eq!(slugify("Portland Cement 50kg"), "portland-cement-50kg");
/// assert_eq!(slugify("  Tiles & Grout -- Outdoor  "), "tiles-grout-outdoor");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_LENGTH {
            break;
        }
    }

    slug.truncate(MAX_SLUG_LENGTH);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Whether `s` is already a well-formed slug.
#[must_use]
pub fn is_valid_slug(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_SLUG_LENGTH
        && !s.starts_with('-')
        && !s.ends_with('-')
        && !s.contains("--")
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Red Clay Bricks"), "red-clay-bricks");
        assert_eq!(slugify("PVC Pipe 1/2\""), "pvc-pipe-1-2");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Ceramic Tile 60×60 m²"), "ceramic-tile-60-60-m");
    }

    #[test]
    fn test_slugify_empty_and_symbols() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("&&&"), "");
    }

    #[test]
    fn test_slugify_output_is_valid() {
        for name in ["Steel Rebar 12mm", "  -Sand- ", "Gravel (20mm) - Bulk Bag"] {
            let slug = slugify(name);
            assert!(is_valid_slug(&slug), "{slug}");
        }
    }

    #[test]
    fn test_slugify_truncates() {
        let slug = slugify(&"word ".repeat(40));
        assert!(slug.len() <= MAX_SLUG_LENGTH);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_is_valid_slug() {
        assert!(is_valid_slug("cement"));
        assert!(!is_valid_slug("Cement"));
        assert!(!is_valid_slug("a--b"));
        assert!(!is_valid_slug("-a"));
        assert!(!is_valid_slug(""));
    }
}
