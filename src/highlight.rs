use regex::{Regex, RegexBuilder};

/// Regex marking occurrences of the active search query. Whitespace-only or
/// empty queries highlight nothing.
pub fn build_highlight_regex(query: &str) -> Option<Regex> {
    let needle = query.trim();
    if needle.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(needle))
        .case_insensitive(true)
        .build()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_query_case_insensitively() {
        let regex = build_highlight_regex("Milk").expect("regex");
        let matches: Vec<_> = regex.find_iter("milk and MILK").map(|m| m.as_str()).collect();
        assert_eq!(matches, vec!["milk", "MILK"]);
    }

    #[test]
    fn escapes_regex_metacharacters() {
        let regex = build_highlight_regex("a+b").expect("regex");
        assert!(regex.is_match("x a+b y"));
        assert!(!regex.is_match("aab"));
    }

    #[test]
    fn blank_query_has_no_highlight() {
        assert!(build_highlight_regex("   ").is_none());
    }
}
