//! Joining configured base URLs with API paths.

/// Strip trailing slashes so paths can be appended with a single `/`.
///
/// ```
/// use mmchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an API path with exactly one slash between them.
///
/// ```
/// use mmchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://generativelanguage.googleapis.com/v1beta/", "/models/gemini-pro:generateContent"),
///     "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
/// );
/// ```
pub fn construct_api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_and_whitespace_are_removed() {
        assert_eq!(normalize_base_url("http://localhost:8080///"), "http://localhost:8080");
        assert_eq!(normalize_base_url(" https://api.openai.com/v1 "), "https://api.openai.com/v1");
        assert_eq!(normalize_base_url("/"), "");
    }

    #[test]
    fn paths_join_with_a_single_slash() {
        for base in ["https://api.openai.com/v1", "https://api.openai.com/v1/"] {
            for path in ["audio/transcriptions", "/audio/transcriptions", "//audio/transcriptions"] {
                assert_eq!(
                    construct_api_url(base, path),
                    "https://api.openai.com/v1/audio/transcriptions"
                );
            }
        }
    }
}
