/// Quotes a value for use on the right-hand side of a reply keyword.
///
/// Backslashes and double quotes are escaped so the reply stays a single
/// parseable keyword.
#[must_use]
pub fn quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Formats free text as a `text="..."` keyword.
#[must_use]
pub fn text_key(message: &str) -> String {
    format!("text={}", quoted(message))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("plain", "\"plain\"")]
    #[case("say \"hi\"", "\"say \\\"hi\\\"\"")]
    #[case(r"c:\tmp", "\"c:\\\\tmp\"")]
    fn quoted_escapes_delimiters(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quoted(input), expected);
    }

    #[test]
    fn text_key_wraps_message() {
        assert_eq!(
            text_key("shutting connection 3 down"),
            "text=\"shutting connection 3 down\""
        );
    }
}
