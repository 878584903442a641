//! Formatting utilities (message sanitizing, Discord markdown helpers).

use std::sync::OnceLock;

use regex::Regex;

/// Strip everything a translation provider shouldn't see: custom emotes,
/// unicode emoji, markdown decoration and block quote markers.
///
/// Deterministic and idempotent: `sanitize_text(sanitize_text(x)) == sanitize_text(x)`.
pub fn sanitize_text(raw: &str) -> String {
    // A pass can expose a new pattern (e.g. `<<:a:1>:b:2>` leaves `<:b:2>`), so
    // run to a fixed point. After the first pass (which may turn tabs into
    // spaces) every pass that changes the text also shortens it.
    let mut current = sanitize_pass(raw);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_pass(text: &str) -> String {
    let text = custom_emote_re().replace_all(text, "");
    let text: String = text.chars().filter(|c| !is_emoji(*c)).collect();
    let text = markdown_re().replace_all(&text, "");
    let text = block_quote_re().replace_all(&text, "");
    let text = spaces_re().replace_all(&text, " ");

    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn custom_emote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<a?:\w+:\d+>").expect("valid regex"))
}

fn markdown_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[*_~`|]").expect("valid regex"))
}

fn block_quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(?:[ \t]*>)+[ \t]*").expect("valid regex"))
}

fn spaces_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t]+").expect("valid regex"))
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF // pictographs, emoticons, flags, transport, supplemental
            | 0x2600..=0x27BF // misc symbols, dingbats
            | 0x2300..=0x23FF // misc technical (watch, hourglass, ...)
            | 0x2B00..=0x2BFF // arrows, stars
            | 0xFE00..=0xFE0F // variation selectors
            | 0x200D // zero width joiner
            | 0x20E3 // combining keycap
            | 0xE0020..=0xE007F // tag sequences
    )
}

/// Discord italics.
pub fn italics(text: &str) -> String {
    format!("*{text}*")
}

/// Discord block quote: every line prefixed with `> `.
pub fn block_quote(text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    text.lines()
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTENT: &str =
        "👍 test<:disdainsam:630009232128868353> _test_*test*\n> test\n__test__";

    #[test]
    fn sanitize_strips_emotes_emoji_and_markdown() {
        assert_eq!(sanitize_text(CONTENT), "test testtest\ntest\ntest");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let nested = format!("hi {}{}", "<".repeat(6), ":a:1>".repeat(6));
        let inputs = [
            CONTENT,
            "  >>> quoted\n> > nested",
            "<*:weird:123> text",
            "**bold** and ~~strike~~ ||spoiler|| `code`",
            "Bonjour 🇫🇷 le monde",
            "tabs\t\tand  spaces",
            &nested,
            "",
        ];
        for input in inputs {
            let once = sanitize_text(input);
            assert_eq!(sanitize_text(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn sanitize_removes_deeply_nested_emotes() {
        let depth = 8;
        let input = format!("hi {}{}", "<".repeat(depth), ":a:1>".repeat(depth));
        let once = sanitize_text(&input);
        assert_eq!(once, "hi");
        assert_eq!(sanitize_text(&once), once);
    }

    #[test]
    fn sanitize_keeps_non_latin_text() {
        assert_eq!(sanitize_text("こんにちは 世界"), "こんにちは 世界");
        assert_eq!(sanitize_text("Привет, мир!"), "Привет, мир!");
        assert_eq!(sanitize_text("مرحبا"), "مرحبا");
    }

    #[test]
    fn sanitize_emote_only_message_is_empty() {
        assert_eq!(sanitize_text("<a:party:123456> 🎉 🇯🇵"), "");
        assert_eq!(sanitize_text("   \n  "), "");
    }

    #[test]
    fn block_quote_prefixes_each_line() {
        assert_eq!(block_quote("a\nb"), "> a\n> b");
        assert_eq!(block_quote("single"), "> single");
        assert_eq!(block_quote(""), "");
    }

    #[test]
    fn italics_wraps_in_asterisks() {
        assert_eq!(italics("French"), "*French*");
    }
}
