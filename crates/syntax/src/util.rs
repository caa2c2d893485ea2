//! Small shared helpers.

use once_cell::sync::Lazy;
use regex::Regex;

/// Escape a literal string so it can be embedded in a regular expression.
#[must_use]
pub fn escape_regex_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        if matches!(
            ch,
            '.' | '*' | '+' | '?' | '^' | '$' | '{' | '}' | '(' | ')' | '|' | '[' | ']' | '\\'
                | '/'
        ) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

static RE_REGEX_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(.+)/(\w*)$").expect("hardcoded regex"));

/// Split a `/body/flags` regex literal into its body and flags.
#[must_use]
pub fn parse_regex_literal(s: &str) -> Option<(&str, &str)> {
    let captures = RE_REGEX_LITERAL.captures(s)?;
    let body = captures.get(1)?;
    let flags = captures.get(2).map_or("", |m| m.as_str());
    Some((&s[body.range()], flags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape() {
        assert_eq!(escape_regex_literal("a.b*c"), r"a\.b\*c");
        assert_eq!(escape_regex_literal("plain"), "plain");
    }

    #[test]
    fn regex_literal() {
        assert_eq!(parse_regex_literal("/sponsor/i"), Some(("sponsor", "i")));
        assert_eq!(parse_regex_literal("/a/"), Some(("a", "")));
        assert_eq!(parse_regex_literal("no-slashes"), None);
        assert_eq!(parse_regex_literal("//"), None);
    }
}
