use url::Url;

/// Canonical host every accepted alias form is rewritten to.
const CANONICAL_HOST: &str = "twitter.com";

/// Rewrites known alias hosts of a post URL to the canonical host.
///
/// Total: anything that does not parse as a URL, or whose host is not a
/// recognized alias, comes back unchanged (trimmed). Applying the function
/// twice yields the same string as applying it once.
pub fn normalize_post_url(raw: &str) -> String {
    let trimmed = raw.trim();

    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    let Some(host) = url.host_str() else {
        return trimmed.to_string();
    };

    let bare = host.strip_prefix("www.").unwrap_or(host);
    match bare.to_ascii_lowercase().as_str() {
        "mobile.twitter.com" | "x.com" | "t.co" | "twitter.com" => {
            if url.set_host(Some(CANONICAL_HOST)).is_err() {
                return trimmed.to_string();
            }
            url.to_string()
        }
        _ => trimmed.to_string(),
    }
}
