//! Shared User-Agent string for manifest and page requests.

/// Product token used in the User-Agent header.
const PRODUCT: &str = "nli-downloader";

/// Default User-Agent for all archive requests (identifies the tool).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version} (book-archive-tool)")
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_crate_version() {
        let ua = default_user_agent();
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("nli-downloader/")
                .and_then(|s| s.split(' ').next())
                .expect("UA has version"),
            "UA must contain crate version"
        );
    }

    #[test]
    fn test_user_agent_identifies_tool_purpose() {
        let ua = default_user_agent();
        assert!(ua.contains("book-archive-tool"), "unexpected UA: {ua}");
    }
}
