//! Subject matching.
//!
//! Subjects are `.`-separated tokens. In a subscription pattern `*` matches
//! exactly one token and `>` (only as the last token) matches one or more
//! remaining tokens, so `reload.p.>` matches `reload.p.a` and
//! `reload.p.a.b` but not `reload.p`.

/// Whether `subject` is delivered to a subscription on `pattern`.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(">"), Some(_)) => return pattern_tokens.next().is_none(),
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// A single literal subject token: non-empty, no separators, wildcards or
/// whitespace.
pub fn is_literal_token(token: &str) -> bool {
    !token.is_empty()
        && !token
            .chars()
            .any(|c| matches!(c, '.' | '/' | '*' | '>') || c.is_whitespace())
}
