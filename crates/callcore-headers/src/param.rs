/// Parse a single already-split `key=value` (or `key="value"`) segment,
/// returning the value if `key` matches `name` case-insensitively.
pub(crate) fn extract_param_segment(segment: &str, name: &str) -> Option<String> {
    let segment = segment.trim();
    let (key, value) = segment.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case(name) {
        return None;
    }
    let value = value.trim();
    let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
    Some(value.to_string())
}

/// Extract the value of a `;name=value` parameter from header text.
///
/// Parameter names are matched case-insensitively (SIP generic-params are
/// case-insensitive by name); the returned value preserves its original
/// casing and has a single layer of surrounding double quotes stripped,
/// if present.
pub fn extract_param(header: &str, name: &str) -> Option<String> {
    for segment in header.split(';').skip(1) {
        let segment = segment.trim();
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case(name) {
            let value = value.trim();
            let value = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value);
            return Some(value.to_string());
        }
    }
    None
}
