use std::fmt;

/// A dialog's identity: the concatenation of Call-ID, local tag, and
/// remote tag, per RFC 3261 Section 12. Early dialogs
/// (no remote tag yet) use an empty third segment, which is still unique
/// per Call-ID/local-tag pair until the remote tag is learned and the
/// id is recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct DialogId(String);

impl DialogId {
    pub fn new(call_id: &str, local_tag: &str, remote_tag: &str) -> Self {
        DialogId(format!("{call_id}-{local_tag}-{remote_tag}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_the_three_part_concatenation() {
        let id = DialogId::new("abc123", "tag-a", "tag-b");
        assert_eq!(id.as_str(), "abc123-tag-a-tag-b");
    }

    #[test]
    fn early_dialog_id_has_empty_remote_segment() {
        let id = DialogId::new("abc123", "tag-a", "");
        assert_eq!(id.as_str(), "abc123-tag-a-");
    }
}
