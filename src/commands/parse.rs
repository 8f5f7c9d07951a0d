//! Input line splitting.

/// A line of input split into its leading token and remaining arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    pub token: String,
    pub arguments: Vec<String>,
}

/// Split `text` on whitespace.
///
/// Returns `None` when the line has no token at all (empty or only
/// whitespace).
pub fn split_input(text: &str) -> Option<ParsedInput> {
    let mut parts = text.split_whitespace();
    let token = parts.next()?.to_string();
    let arguments = parts.map(str::to_string).collect();
    Some(ParsedInput { token, arguments })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_token_and_arguments() {
        let parsed = split_input("  say   hello there ").unwrap();
        assert_eq!(parsed.token, "say");
        assert_eq!(parsed.arguments, vec!["hello", "there"]);
    }

    #[test]
    fn test_split_single_token() {
        let parsed = split_input("look").unwrap();
        assert_eq!(parsed.token, "look");
        assert!(parsed.arguments.is_empty());
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_input("").is_none());
        assert!(split_input(" \t \n").is_none());
    }
}
