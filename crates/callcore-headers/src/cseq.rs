/// Parse a `CSeq` header value into `(sequence_number, method)`.
///
/// Malformed input (not exactly two whitespace-separated tokens, or a
/// non-numeric sequence number) yields `(0, "")`.
pub fn parse_cseq(value: &str) -> (u32, String) {
    let mut parts = value.split_whitespace();
    let (Some(number), Some(method), None) = (parts.next(), parts.next(), parts.next()) else {
        return (0, String::new());
    };
    match number.parse::<u32>() {
        Ok(n) => (n, method.to_string()),
        Err(_) => (0, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_cseq() {
        assert_eq!(parse_cseq("314159 INVITE"), (314159, "INVITE".to_string()));
    }

    #[test]
    fn rejects_missing_method() {
        assert_eq!(parse_cseq("314159"), (0, String::new()));
    }

    #[test]
    fn rejects_extra_tokens() {
        assert_eq!(parse_cseq("314159 INVITE extra"), (0, String::new()));
    }

    #[test]
    fn rejects_non_numeric_sequence() {
        assert_eq!(parse_cseq("abc INVITE"), (0, String::new()));
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse_cseq(""), (0, String::new()));
    }
}
