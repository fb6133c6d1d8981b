//! Text sanitization for speech.
//!
//! The synthesized text must contain no emoji codepoints, no `#`, and no
//! markdown punctuation; literal `HASH` tokens (artifacts of upstream
//! hashtag mangling) are removed and whitespace is collapsed.

/// Markdown/markup characters stripped before synthesis.
const MARKDOWN_CHARS: &[char] = &['*', '_', '`', '~', '[', ']', '>', '|'];

/// Check whether a codepoint is an emoji, pictograph or one of the
/// invisible joiners/selectors that accompany them.
#[must_use]
pub fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x1F000..=0x1FAFF   // pictographs, emoticons, symbols, supplement
        | 0x2600..=0x27BF   // misc symbols + dingbats
        | 0x2B00..=0x2BFF   // arrows/stars used as emoji
        | 0x2190..=0x21FF   // arrows
        | 0xFE00..=0xFE0F   // variation selectors
        | 0x200D            // zero-width joiner
        | 0x20E3            // combining enclosing keycap
        | 0xE0020..=0xE007F // tag characters
    )
}

/// Sanitize text for synthesis.
///
/// Output contains no emoji, no `#`, no markdown markers, no literal
/// `HASH` tokens, and single-space-collapsed whitespace.
#[must_use]
pub fn sanitize_text(input: &str) -> String {
    let stripped: String = input
        .chars()
        .filter_map(|c| {
            if is_emoji(c) {
                None
            } else if c == '#' || MARKDOWN_CHARS.contains(&c) {
                // Drop the marker, keep the word it decorated.
                None
            } else {
                Some(c)
            }
        })
        .collect();

    stripped
        .split_whitespace()
        .filter(|token| *token != "HASH")
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_reference_case() {
        // Emoji + hashtag + markdown + literal HASH token.
        assert_eq!(
            sanitize_text("\u{2694}\u{FE0F} BTC #alert **breaking** HASH"),
            "BTC alert breaking"
        );
    }

    #[test]
    fn test_strips_emoji_and_selectors() {
        let out = sanitize_text("🚀 moon 📈 soon");
        assert_eq!(out, "moon soon");
        assert!(out.chars().all(|c| !is_emoji(c)));
    }

    #[test]
    fn test_strips_markdown() {
        assert_eq!(sanitize_text("**bold** _em_ `code` [link]"), "bold em code link");
    }

    #[test]
    fn test_hash_token_only_exact() {
        // HASH is removed only as a standalone token.
        assert_eq!(sanitize_text("HASH HASHRATE up"), "HASHRATE up");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(sanitize_text("  a \t b \n c  "), "a b c");
    }

    #[test]
    fn test_all_emoji_is_empty() {
        assert_eq!(sanitize_text("🚀🚀🚀"), "");
    }
}
