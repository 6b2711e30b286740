//! # chatreel-render
//!
//! The Chatreel rendering engine. Turns `FrameState`s into full-canvas RGBA
//! frames: grapheme-aware text layout, emoji glyph images, chat bubbles, the
//! story reply screen, inline images and the suggestion widget.
//! Images are acquired through a shared, coalescing `AssetCache`.

pub mod asset_cache;
pub mod composer;
pub mod emoji;
pub mod fonts;
pub mod image_loader;
pub mod layout;
pub mod text;
pub mod widget;

pub use asset_cache::{Asset, AssetCache, AssetSet, ImageProvider, LocationProvider, PLACEHOLDER_SIZE};
pub use composer::{ChatLayout, FrameComposer, PlacedBubble};
pub use emoji::{emoji_asset_key, is_pictographic, is_sticker};
pub use fonts::{FixedAdvanceGlyphs, FontFace, Fonts, GlyphSource};
pub use layout::{BubbleLayout, BubbleStyle, LayoutEngine, TextLayout, TextStyle};
pub use widget::WidgetStyle;
