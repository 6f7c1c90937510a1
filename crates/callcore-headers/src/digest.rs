use std::collections::HashMap;

/// Parse an `Authorization`/`WWW-Authenticate` digest value into its
/// `key=value` parameters.
///
/// Returns `None` if the value does not start with the literal `Digest `
/// prefix. Parameter *names* are case-sensitive (per RFC 2617, unlike
/// generic SIP header params) and values preserve their original casing;
/// a single layer of surrounding double quotes is stripped.
pub fn parse_digest(value: &str) -> Option<HashMap<String, String>> {
    let rest = value.strip_prefix("Digest ")?;
    let mut params = HashMap::new();
    for segment in rest.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        let (key, raw_value) = segment.split_once('=')?;
        let raw_value = raw_value.trim();
        let raw_value = raw_value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(raw_value);
        params.insert(key.trim().to_string(), raw_value.to_string());
    }
    Some(params)
}

/// Build a `WWW-Authenticate` digest challenge value.
pub fn format_digest_challenge(realm: &str, nonce: &str, algorithm: &str) -> String {
    format!("Digest realm=\"{realm}\", nonce=\"{nonce}\", algorithm={algorithm}")
}
