//! # chatreel-core
//!
//! Core types and primitives for the Chatreel renderer.
//! This crate contains the foundational types shared across all Chatreel crates:
//! colors, frame buffers and their raster primitives, themes, conversation
//! messages, render configuration, and the error type.

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod message;
pub mod theme;

pub use color::Color;
pub use config::{
    Capabilities, FetchSettings, FontPaths, JobConfig, RenderConfig, RenderSettings, WidgetStyle,
    CANVAS_HEIGHT, CANVAS_WIDTH,
};
pub use error::{ChatreelError, ChatreelResult};
pub use frame::{FrameBuffer, PixelFormat};
pub use message::{Message, Side, SpecialElement, SpecialKind};
pub use theme::{Theme, ThemeKind};
