//! Token estimation for quota accounting.

/// Approximate token count for a piece of text.
///
/// Crude approximation: ~4 characters per token, rounded up. Both the
/// prompt and the response are estimated with this before the commit, so
/// the same bias applies to both sides of an exchange.
pub fn estimate_tokens(text: &str) -> i64 {
    (text.chars().count() as i64 + 3) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_whole_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("a"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(400)), 100);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // four 3-byte characters is still one token
        assert_eq!(estimate_tokens("日本語文"), 1);
    }
}
