//! Emoji classification and glyph asset keys.

use unicode_segmentation::UnicodeSegmentation;

/// Prefix of asset keys that name an emoji glyph rather than an image location.
pub const EMOJI_KEY_PREFIX: &str = "emoji:";

const TWEMOJI_BASE: &str = "https://cdnjs.cloudflare.com/ajax/libs/twemoji/14.0.2/72x72";

const ZWJ: char = '\u{200D}';
const VS16: char = '\u{FE0F}';

/// Extended_Pictographic code point ranges (Unicode emoji-data).
const PICTOGRAPHIC: &[(u32, u32)] = &[
    (0x00A9, 0x00A9),
    (0x00AE, 0x00AE),
    (0x203C, 0x203C),
    (0x2049, 0x2049),
    (0x2122, 0x2122),
    (0x2139, 0x2139),
    (0x2194, 0x2199),
    (0x21A9, 0x21AA),
    (0x231A, 0x231B),
    (0x2328, 0x2328),
    (0x2388, 0x2388),
    (0x23CF, 0x23CF),
    (0x23E9, 0x23F3),
    (0x23F8, 0x23FA),
    (0x24C2, 0x24C2),
    (0x25AA, 0x25AB),
    (0x25B6, 0x25B6),
    (0x25C0, 0x25C0),
    (0x25FB, 0x25FE),
    (0x2600, 0x2605),
    (0x2607, 0x2612),
    (0x2614, 0x2685),
    (0x2690, 0x2705),
    (0x2708, 0x2712),
    (0x2714, 0x2714),
    (0x2716, 0x2716),
    (0x271D, 0x271D),
    (0x2721, 0x2721),
    (0x2728, 0x2728),
    (0x2733, 0x2734),
    (0x2744, 0x2744),
    (0x2747, 0x2747),
    (0x274C, 0x274C),
    (0x274E, 0x274E),
    (0x2753, 0x2755),
    (0x2757, 0x2757),
    (0x2763, 0x2767),
    (0x2795, 0x2797),
    (0x27A1, 0x27A1),
    (0x27B0, 0x27B0),
    (0x27BF, 0x27BF),
    (0x2934, 0x2935),
    (0x2B05, 0x2B07),
    (0x2B1B, 0x2B1C),
    (0x2B50, 0x2B50),
    (0x2B55, 0x2B55),
    (0x3030, 0x3030),
    (0x303D, 0x303D),
    (0x3297, 0x3297),
    (0x3299, 0x3299),
    (0x1F000, 0x1F0FF),
    (0x1F10D, 0x1F10F),
    (0x1F12F, 0x1F12F),
    (0x1F16C, 0x1F171),
    (0x1F17E, 0x1F17F),
    (0x1F18E, 0x1F18E),
    (0x1F191, 0x1F19A),
    (0x1F1AD, 0x1F1E5),
    (0x1F201, 0x1F20F),
    (0x1F21A, 0x1F21A),
    (0x1F22F, 0x1F22F),
    (0x1F232, 0x1F23A),
    (0x1F23C, 0x1F23F),
    (0x1F249, 0x1F3FA),
    (0x1F400, 0x1F53D),
    (0x1F546, 0x1F64F),
    (0x1F680, 0x1F6FF),
    (0x1F774, 0x1F77F),
    (0x1F7D5, 0x1F7FF),
    (0x1F80C, 0x1F80F),
    (0x1F848, 0x1F84F),
    (0x1F85A, 0x1F85F),
    (0x1F888, 0x1F88F),
    (0x1F8AE, 0x1F8FF),
    (0x1F90C, 0x1F93A),
    (0x1F93C, 0x1F945),
    (0x1F947, 0x1FAFF),
    (0x1FC00, 0x1FFFD),
];

fn is_pictographic_char(ch: char) -> bool {
    let cp = ch as u32;
    PICTOGRAPHIC
        .binary_search_by(|&(lo, hi)| {
            if hi < cp {
                std::cmp::Ordering::Less
            } else if lo > cp {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Whether a grapheme cluster is drawn as an emoji bitmap.
pub fn is_pictographic(cluster: &str) -> bool {
    cluster.chars().any(is_pictographic_char)
}

/// A message made only of pictographic clusters is drawn large without a bubble.
pub fn is_sticker(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.graphemes(true).all(is_pictographic)
}

/// Asset key for an emoji cluster, e.g. `emoji:1f44d` or `emoji:1f468-200d-1f4bb`.
/// U+FE0F is dropped unless the sequence contains a zero-width joiner.
pub fn emoji_asset_key(cluster: &str) -> String {
    let keep_vs16 = cluster.contains(ZWJ);
    let code: Vec<String> = cluster
        .chars()
        .filter(|&ch| keep_vs16 || ch != VS16)
        .map(|ch| format!("{:x}", ch as u32))
        .collect();
    format!("{}{}", EMOJI_KEY_PREFIX, code.join("-"))
}

/// Glyph image URL for an emoji asset key, or None for other keys.
pub fn emoji_url(key: &str) -> Option<String> {
    let code = key.strip_prefix(EMOJI_KEY_PREFIX)?;
    if code.is_empty() {
        return None;
    }
    Some(format!("{}/{}.png", TWEMOJI_BASE, code))
}

/// Emoji asset keys for every pictographic cluster in `text`, deduplicated.
pub fn emoji_keys(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for cluster in text.graphemes(true).filter(|c| is_pictographic(c)) {
        let key = emoji_asset_key(cluster);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges_are_sorted() {
        assert!(PICTOGRAPHIC.windows(2).all(|w| w[0].1 < w[1].0));
    }

    #[test]
    fn test_sticker_classification() {
        assert!(is_sticker("👍"));
        assert!(is_sticker("  😂😂  "));
        assert!(is_sticker("👨‍👩‍👧"));
        assert!(!is_sticker("👍 ok"));
        assert!(!is_sticker("👍 👍"));
        assert!(!is_sticker(""));
        assert!(!is_sticker("hello"));
    }

    #[test]
    fn test_pictographic_clusters() {
        assert!(is_pictographic("❤️"));
        assert!(is_pictographic("👍🏽"));
        assert!(!is_pictographic("a"));
        assert!(!is_pictographic("é"));
        assert!(!is_pictographic("1"));
    }

    #[test]
    fn test_non_pictographic_symbols_are_text() {
        // Regional indicators, enclosed letters and bare skin tones.
        assert!(!is_sticker("🇺🇸"));
        assert!(!is_sticker("🄰"));
        assert!(!is_sticker("🅐"));
        assert!(!is_sticker("🏻"));
        assert!(emoji_keys("🇺🇸 🄰").is_empty());
        assert!(is_sticker("🅰️"));
        assert!(is_sticker("🆘"));
        assert!(is_sticker("🈚"));
        assert!(is_sticker("☀"));
        assert!(!is_sticker("☆"));
    }

    #[test]
    fn test_asset_key_drops_variation_selector() {
        assert_eq!(emoji_asset_key("👍"), "emoji:1f44d");
        assert_eq!(emoji_asset_key("❤️"), "emoji:2764");
        assert_eq!(emoji_asset_key("👁️‍🗨️"), "emoji:1f441-fe0f-200d-1f5e8-fe0f");
    }

    #[test]
    fn test_emoji_url() {
        assert_eq!(
            emoji_url("emoji:1f44d").as_deref(),
            Some("https://cdnjs.cloudflare.com/ajax/libs/twemoji/14.0.2/72x72/1f44d.png")
        );
        assert_eq!(emoji_url("cat.png"), None);
        assert_eq!(emoji_url("emoji:"), None);
    }

    #[test]
    fn test_emoji_keys_dedup() {
        assert_eq!(emoji_keys("hi 👍 there 👍 😂"), vec!["emoji:1f44d", "emoji:1f602"]);
        assert!(emoji_keys("plain").is_empty());
    }
}
