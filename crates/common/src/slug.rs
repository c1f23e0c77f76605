// Slug derivation for drafts and publications.
//
// Slugs: lowercase, strip non-alphanumeric, hyphenate spaces.
// Collisions: one random suffix, no retry loop; truncate after suffixing.

use uuid::Uuid;

/// Maximum stored slug length. Applied after suffixing.
pub const MAX_SLUG_LEN: usize = 255;

/// Convert a title into a URL-safe slug.
///
/// - Lowercases all characters
/// - Replaces non-ASCII-alphanumeric characters with hyphens
/// - Collapses consecutive hyphens
/// - Strips leading and trailing hyphens
///
/// Returns an empty string if the title contains no alphanumeric characters.
pub fn slugify(title: &str) -> String {
    let raw: String = title
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
        .collect();

    raw.split('-').filter(|part| !part.is_empty()).collect::<Vec<_>>().join("-")
}

/// Resolve a slug collision by appending a freshly generated random token.
///
/// One-shot: the caller performs a single collision check and a single
/// resolution, not a retry loop.
pub fn with_random_suffix(slug: &str) -> String {
    with_suffix(slug, &Uuid::new_v4().to_string())
}

/// Append an explicit suffix and clamp to [`MAX_SLUG_LEN`].
pub fn with_suffix(slug: &str, suffix: &str) -> String {
    clamp(&format!("{slug}-{suffix}"))
}

/// Truncate a slug to [`MAX_SLUG_LEN`] bytes.
pub fn clamp(slug: &str) -> String {
    slug.chars().take(MAX_SLUG_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── slugify ──────────────────────────────────────────────────────

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn slugify_strips_special_characters() {
        assert_eq!(slugify("API: Authentication (v2)"), "api-authentication-v2");
    }

    #[test]
    fn slugify_collapses_consecutive_hyphens() {
        assert_eq!(slugify("a---b"), "a-b");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
    }

    #[test]
    fn slugify_strips_leading_trailing_hyphens() {
        assert_eq!(slugify("--hello--"), "hello");
    }

    #[test]
    fn slugify_returns_empty_for_no_alphanumeric() {
        assert_eq!(slugify("!@#$%"), "");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn slugify_preserves_numbers() {
        assert_eq!(slugify("Phase 2: Setup"), "phase-2-setup");
    }

    #[test]
    fn slugify_handles_unicode_by_replacing_with_hyphens() {
        assert_eq!(slugify("Über Cool"), "ber-cool");
        assert_eq!(slugify("日本語"), "");
    }

    // ── suffixing ────────────────────────────────────────────────────

    #[test]
    fn with_suffix_appends_and_hyphenates() {
        assert_eq!(with_suffix("my-post", "abc123"), "my-post-abc123");
    }

    #[test]
    fn with_random_suffix_changes_the_slug() {
        let suffixed = with_random_suffix("my-post");
        assert!(suffixed.starts_with("my-post-"));
        assert_ne!(suffixed, "my-post");
    }

    #[test]
    fn with_random_suffix_is_unique_per_call() {
        assert_ne!(with_random_suffix("my-post"), with_random_suffix("my-post"));
    }

    #[test]
    fn clamp_truncates_after_suffixing() {
        let long = "a".repeat(MAX_SLUG_LEN + 40);
        let suffixed = with_suffix(&long, "xyz");
        assert_eq!(suffixed.len(), MAX_SLUG_LEN);
    }

    #[test]
    fn clamp_leaves_short_slugs_alone() {
        assert_eq!(clamp("short"), "short");
    }
}
