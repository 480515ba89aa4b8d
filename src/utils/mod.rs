use url::Url;

/// Hosts accepted as a post URL, before normalization.
const POST_HOSTS: [&str; 4] = ["twitter.com", "x.com", "mobile.twitter.com", "t.co"];

fn is_post_host(host: &str) -> bool {
    let host = host.strip_prefix("www.").unwrap_or(host);
    POST_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h))
}

/// Finds the first post URL in free-form message text.
pub fn extract_url(text: &str) -> Option<String> {
    text.split_whitespace()
        .filter(|word| word.starts_with("http://") || word.starts_with("https://"))
        .find(|word| {
            Url::parse(word)
                .ok()
                .and_then(|u| u.host_str().map(is_post_host))
                .unwrap_or(false)
        })
        .map(|word| word.to_string())
}

pub fn human_readable_filesize(num_bytes: u64) -> String {
    const STEP: f64 = 1024.0;
    let units = ["B", "KB", "MB", "GB", "TB"];
    let mut size = num_bytes as f64;
    for unit in units {
        if size < STEP {
            return format!("{size:.1} {unit}");
        }
        size /= STEP;
    }
    format!("{size:.1} PB")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_url() {
        assert_eq!(
            extract_url("check this https://x.com/user/status/123 out"),
            Some("https://x.com/user/status/123".to_string())
        );
        assert_eq!(
            extract_url("https://mobile.twitter.com/a/status/1"),
            Some("https://mobile.twitter.com/a/status/1".to_string())
        );
        assert_eq!(
            extract_url("https://www.twitter.com/a/status/1"),
            Some("https://www.twitter.com/a/status/1".to_string())
        );
        assert_eq!(extract_url("no links here"), None);
        assert_eq!(extract_url("https://youtube.com/watch?v=123"), None);
        assert_eq!(extract_url(""), None);
    }

    #[test]
    fn test_extract_url_skips_unrelated_links() {
        assert_eq!(
            extract_url("https://example.com and https://twitter.com/a/status/2"),
            Some("https://twitter.com/a/status/2".to_string())
        );
    }

    #[test]
    fn test_human_readable_filesize() {
        assert_eq!(human_readable_filesize(0), "0.0 B");
        assert_eq!(human_readable_filesize(512), "512.0 B");
        assert_eq!(human_readable_filesize(2048), "2.0 KB");
        assert_eq!(human_readable_filesize(5_000_000), "4.8 MB");
        assert_eq!(human_readable_filesize(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
