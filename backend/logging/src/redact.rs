//! Log Redaction Layer
//!
//! Scrubs credentials from source URLs and free text prior to logging.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SECRET_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(access_?token|token|api_?key|key|secret|signature|sig|x-amz-signature|x-amz-credential|password)$").unwrap()
});
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[a-zA-Z0-9\-\._~+/]+=*").unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[a-zA-Z][a-zA-Z0-9+.-]*://[^\s()<>"']+"#).unwrap());
static USERINFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?P<scheme>[a-zA-Z][a-zA-Z0-9+.-]*://)[^/@\s]+@").unwrap());

const REDACTED: &str = "[REDACTED]";

/// Redacts userinfo and secret-looking query values in a URL.
///
/// Strings that do not parse as URLs fall back to [`redact_sensitive_data`].
pub fn redact_url(raw: &str) -> String {
    redact_parsed_url(raw).unwrap_or_else(|| redact_sensitive_data(raw))
}

fn redact_parsed_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;

    if !url.username().is_empty() || url.password().is_some() {
        let _ = url.set_username(REDACTED);
        let _ = url.set_password(None);
    }

    if url.query().is_some() {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let value = if SECRET_PARAM_RE.is_match(&k) {
                    REDACTED.to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), value)
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    Some(url.to_string())
}

/// Redacts bearer tokens, and userinfo and secret query values of URLs, in free text.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "[REDACTED_TOKEN]");
    let redacted = URL_RE.replace_all(&redacted, |caps: &regex::Captures| {
        redact_parsed_url(&caps[0]).unwrap_or_else(|| caps[0].to_string())
    });
    USERINFO_RE
        .replace_all(&redacted, format!("$scheme{REDACTED}@"))
        .to_string()
}
