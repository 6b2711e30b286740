//! Conversation script parser — text lines → messages + special elements.
//!
//! Grammar, one entry per non-blank line:
//!
//! ```text
//! R) text                 right-side message (any line starting with `R`)
//! L) text                 left-side message
//! text                    left-side message
//! cat.png <2.5s>          inline image trigger (png, jpg, jpeg, gif, webp)
//! [PLUG_WIDGET]           suggestion widget trigger
//! ```

use std::sync::OnceLock;

use regex::Regex;

use chatreel_core::{ChatreelError, ChatreelResult, Message, Side, SpecialElement, SpecialKind};

/// Reserved line that triggers the suggestion widget.
pub const WIDGET_TOKEN: &str = "[PLUG_WIDGET]";

static IMAGE_LINE: OnceLock<Regex> = OnceLock::new();
static SIDE_PREFIX: OnceLock<Regex> = OnceLock::new();

fn image_line() -> &'static Regex {
    IMAGE_LINE.get_or_init(|| {
        Regex::new(r"(?i)([^\s<>]+\.(?:png|jpg|jpeg|gif|webp))\s*<([\d.]+)s>")
            .expect("inline image pattern must compile")
    })
}

fn side_prefix() -> &'static Regex {
    SIDE_PREFIX.get_or_init(|| Regex::new(r"^(?:R\)|L\))\s*").expect("side prefix pattern must compile"))
}

/// How a single script line is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine<'a> {
    /// Whitespace only; skipped.
    Blank,
    /// Inline image trigger naming an asset key.
    Image(&'a str),
    /// Suggestion widget trigger.
    Widget,
    /// A chat message.
    Message(Message),
}

/// Classify one line of a script. This is the single matching rule shared by
/// parsing and required-asset extraction.
pub fn classify_line(line: &str) -> ScriptLine<'_> {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return ScriptLine::Blank;
    }
    if line.trim() == WIDGET_TOKEN {
        return ScriptLine::Widget;
    }
    if let Some(captures) = image_line().captures(line) {
        if let Some(file) = captures.get(1) {
            return ScriptLine::Image(file.as_str());
        }
    }

    let side = if line.starts_with('R') { Side::Right } else { Side::Left };
    let text = side_prefix().replace(line, "");
    ScriptLine::Message(Message::new(side, text.into_owned()))
}

/// Result of parsing a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedScript {
    pub messages: Vec<Message>,
    pub elements: Vec<SpecialElement>,
}

impl ParsedScript {
    /// Special elements anchored after the message at `index`, in script order.
    pub fn elements_at(&self, index: usize) -> impl Iterator<Item = &SpecialElement> {
        self.elements.iter().filter(move |el| el.anchor == Some(index))
    }
}

/// Script parser.
#[derive(Debug, Clone)]
pub struct ScriptParser {
    widgets_enabled: bool,
}

impl ScriptParser {
    pub fn new() -> Self {
        Self {
            widgets_enabled: true,
        }
    }

    /// Whether widget trigger lines produce elements. When disabled they are dropped.
    pub fn with_widgets(mut self, enabled: bool) -> Self {
        self.widgets_enabled = enabled;
        self
    }

    /// Parse a whole script. Fails with `EmptyScript` if no message was found.
    pub fn parse(&self, source: &str) -> ChatreelResult<ParsedScript> {
        let mut script = ParsedScript::default();

        for (number, line) in source.split('\n').enumerate() {
            match classify_line(line) {
                ScriptLine::Blank => {}
                ScriptLine::Message(message) => script.messages.push(message),
                ScriptLine::Image(file) => {
                    let el = SpecialElement::after(
                        script.messages.len(),
                        SpecialKind::Image {
                            asset_key: file.to_string(),
                        },
                    );
                    if el.anchor.is_none() {
                        tracing::warn!("line {}: image '{}' precedes the first message", number + 1, file);
                    }
                    script.elements.push(el);
                }
                ScriptLine::Widget if self.widgets_enabled => {
                    let el = SpecialElement::after(script.messages.len(), SpecialKind::Widget);
                    if el.anchor.is_none() {
                        tracing::warn!("line {}: widget precedes the first message", number + 1);
                    }
                    script.elements.push(el);
                }
                ScriptLine::Widget => {
                    tracing::debug!("line {}: widget support disabled, skipping", number + 1);
                }
            }
        }

        if script.messages.is_empty() {
            return Err(ChatreelError::EmptyScript);
        }

        tracing::debug!(
            "parsed {} messages and {} special elements",
            script.messages.len(),
            script.elements.len()
        );
        Ok(script)
    }
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Asset keys the script needs uploaded, deduplicated in first-seen order.
pub fn required_asset_keys(source: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for line in source.split('\n') {
        if let ScriptLine::Image(file) = classify_line(line) {
            if !keys.iter().any(|k| k == file) {
                keys.push(file.to_string());
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_prefixes() {
        let script = ScriptParser::new()
            .parse("R) hey\nL) yo\nplain line\nRight away")
            .unwrap();
        assert_eq!(
            script.messages,
            vec![
                Message::right("hey"),
                Message::left("yo"),
                Message::left("plain line"),
                Message::right("Right away"),
            ]
        );
    }

    #[test]
    fn test_blank_lines_and_crlf() {
        let script = ScriptParser::new().parse("L) a\r\n\r\n   \nR) b\r\n").unwrap();
        assert_eq!(script.messages, vec![Message::left("a"), Message::right("b")]);
    }

    #[test]
    fn test_image_line_is_not_a_message() {
        let script = ScriptParser::new()
            .parse("L) Hi\nR) Hello\ncat.png <2s>")
            .unwrap();
        assert_eq!(script.messages.len(), 2);
        assert_eq!(
            script.elements,
            vec![SpecialElement {
                anchor: Some(1),
                kind: SpecialKind::Image {
                    asset_key: "cat.png".into()
                },
            }]
        );
    }

    #[test]
    fn test_image_extension_is_case_insensitive() {
        assert_eq!(classify_line("Photo.JPEG <1.5s>"), ScriptLine::Image("Photo.JPEG"));
        assert!(matches!(classify_line("cat.bmp <1s>"), ScriptLine::Message(_)));
        assert!(matches!(classify_line("cat.png"), ScriptLine::Message(_)));
    }

    #[test]
    fn test_widget_token() {
        let script = ScriptParser::new()
            .parse("L) a\nR) b\n  [PLUG_WIDGET]  \nL) c")
            .unwrap();
        assert_eq!(script.messages.len(), 3);
        assert_eq!(
            script.elements,
            vec![SpecialElement {
                anchor: Some(1),
                kind: SpecialKind::Widget
            }]
        );
        assert_eq!(script.elements_at(1).count(), 1);
    }

    #[test]
    fn test_widgets_disabled() {
        let script = ScriptParser::new()
            .with_widgets(false)
            .parse("L) a\n[PLUG_WIDGET]")
            .unwrap();
        assert!(script.elements.is_empty());
    }

    #[test]
    fn test_element_before_first_message() {
        let script = ScriptParser::new().parse("intro.png <1s>\nL) a").unwrap();
        assert_eq!(script.elements[0].anchor, None);
    }

    #[test]
    fn test_empty_script() {
        assert!(matches!(
            ScriptParser::new().parse("\n \n"),
            Err(ChatreelError::EmptyScript)
        ));
        assert!(matches!(
            ScriptParser::new().parse("cat.png <1s>\n[PLUG_WIDGET]"),
            Err(ChatreelError::EmptyScript)
        ));
    }

    #[test]
    fn test_required_asset_keys_dedup() {
        let keys = required_asset_keys("L) hi\ncat.png <2s>\nR) x\ndog.webp <1s>\ncat.png <3s>");
        assert_eq!(keys, vec!["cat.png".to_string(), "dog.webp".to_string()]);
    }
}
