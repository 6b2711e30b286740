use serde::{Deserialize, Serialize};

use crate::{ChatreelError, Color};

/// Identifier of one of the built-in visual themes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemeKind {
    #[default]
    IosDark,
    IosPink,
    IosLight,
}

impl ThemeKind {
    /// All themes, in menu order.
    pub const ALL: [ThemeKind; 3] = [ThemeKind::IosDark, ThemeKind::IosLight, ThemeKind::IosPink];

    /// Stable key used in job files.
    pub fn key(&self) -> &'static str {
        match self {
            ThemeKind::IosDark => "ios_dark",
            ThemeKind::IosPink => "ios_pink",
            ThemeKind::IosLight => "ios_light",
        }
    }

    /// Resolve the palette for this theme.
    pub fn theme(&self) -> Theme {
        match self {
            ThemeKind::IosDark => Theme {
                name: "iOS Dark",
                right_bubble: Color::from_rgba8([0x00, 0x7A, 0xFF, 0xFF]),
                right_text: Color::WHITE,
                left_bubble: Color::from_rgba8([0x26, 0x26, 0x2B, 0xFF]),
                left_text: Color::WHITE,
                background: Color::BLACK,
                secondary: Color::from_rgba8([0x8E, 0x8E, 0x93, 0xFF]),
            },
            ThemeKind::IosPink => Theme {
                name: "iOS Dark Pink",
                right_bubble: Color::from_rgba8([0xC0, 0x1F, 0x4A, 0xFF]),
                right_text: Color::WHITE,
                left_bubble: Color::from_rgba8([0x2A, 0x2A, 0x2E, 0xFF]),
                left_text: Color::WHITE,
                background: Color::BLACK,
                secondary: Color::from_rgba8([0x8E, 0x8E, 0x93, 0xFF]),
            },
            ThemeKind::IosLight => Theme {
                name: "iOS Light",
                right_bubble: Color::from_rgba8([0x00, 0x7A, 0xFF, 0xFF]),
                right_text: Color::WHITE,
                left_bubble: Color::from_rgba8([0xE9, 0xE9, 0xEB, 0xFF]),
                left_text: Color::BLACK,
                background: Color::WHITE,
                secondary: Color::from_rgba8([0x8E, 0x8E, 0x93, 0xFF]),
            },
        }
    }
}

impl std::str::FromStr for ThemeKind {
    type Err = ChatreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeKind::ALL
            .into_iter()
            .find(|kind| kind.key() == s.trim())
            .ok_or_else(|| ChatreelError::Config(format!("unknown theme '{}'", s)))
    }
}

impl std::fmt::Display for ThemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A resolved color palette. Immutable for the lifetime of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub name: &'static str,
    pub right_bubble: Color,
    pub right_text: Color,
    pub left_bubble: Color,
    pub left_text: Color,
    pub background: Color,
    pub secondary: Color,
}

impl Default for Theme {
    fn default() -> Self {
        ThemeKind::default().theme()
    }
}
