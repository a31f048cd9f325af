//! Parse the slot listing printed by `<test> -functions`.

/// Extract slot names from `-functions` output, preserving order.
///
/// QtTest prints one `name()` per line. Blank lines and surrounding whitespace are dropped.
pub fn parse_function_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim().replacen("()", "", 1))
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_function_list() {
        let output = "testA()\ntestB()\ntestC()\n";
        assert_eq!(parse_function_list(output), vec!["testA", "testB", "testC"]);
    }

    #[test]
    fn test_parse_function_list_windows_newlines_and_blanks() {
        let output = "  testD()\r\n\r\ntestE()\r\n   \r\n";
        assert_eq!(parse_function_list(output), vec!["testD", "testE"]);
    }

    #[test]
    fn test_parse_function_list_empty() {
        assert!(parse_function_list("").is_empty());
    }
}
