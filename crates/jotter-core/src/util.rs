//! Text helpers shared by the config, auth and remote layers.

/// Longest server message quoted back in an error
const QUOTE_LIMIT: usize = 180;

/// Trimmed text, or `None` when absent or blank
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

/// Whether `value` names an `http://` or `https://` origin
pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// A server response body cut down for quoting in an error message
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(QUOTE_LIMIT).collect()
}
