use serde::{Deserialize, Serialize};

/// Which side of the conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// One chat message. Message order is conversation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub side: Side,
    pub text: String,
}

impl Message {
    pub fn new(side: Side, text: impl Into<String>) -> Self {
        Self {
            side,
            text: text.into(),
        }
    }

    pub fn left(text: impl Into<String>) -> Self {
        Self::new(Side::Left, text)
    }

    pub fn right(text: impl Into<String>) -> Self {
        Self::new(Side::Right, text)
    }
}

/// What a special element shows when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialKind {
    /// A full-screen inline image, looked up by asset key.
    Image { asset_key: String },
    /// The suggestion widget overlay.
    Widget,
}

impl SpecialKind {
    /// Whether two kinds are the same variant, ignoring payload.
    pub fn same_variant(&self, other: &SpecialKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A non-message event that fires after a given message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialElement {
    /// Index of the message after which this element fires.
    /// `None` means it appeared before the first message.
    pub anchor: Option<usize>,
    pub kind: SpecialKind,
}

impl SpecialElement {
    /// Anchor an element after the message at `message_count - 1`.
    pub fn after(message_count: usize, kind: SpecialKind) -> Self {
        Self {
            anchor: message_count.checked_sub(1),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_before_first_message() {
        let el = SpecialElement::after(0, SpecialKind::Widget);
        assert_eq!(el.anchor, None);
        let el = SpecialElement::after(3, SpecialKind::Widget);
        assert_eq!(el.anchor, Some(2));
    }

    #[test]
    fn test_same_variant_ignores_payload() {
        let a = SpecialKind::Image { asset_key: "a.png".into() };
        let b = SpecialKind::Image { asset_key: "b.png".into() };
        assert!(a.same_variant(&b));
        assert!(!a.same_variant(&SpecialKind::Widget));
    }
}
