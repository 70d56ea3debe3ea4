//! Banner link normalization

/// Schemes a banner link may already carry
const KNOWN_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Prefix `https://` onto links without a recognized scheme.
///
/// Scheme matching ignores case. Blank links are returned unchanged.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || has_known_scheme(trimmed) {
        return trimmed.to_string();
    }
    format!("https://{trimmed}")
}

fn has_known_scheme(url: &str) -> bool {
    KNOWN_SCHEMES.iter().any(|scheme| {
        url.get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}
