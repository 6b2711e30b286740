use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use chatreel_core::{
    ChatreelError, ChatreelResult, Color, FetchSettings, FrameBuffer, Message, RenderConfig,
    RenderSettings, SpecialElement, SpecialKind, ThemeKind,
};
use chatreel_ir::TimelineBuilder;
use chatreel_render::{AssetCache, Fonts, FrameComposer, ImageProvider};

/// In-memory provider that counts fetches.
struct MemoryProvider {
    images: HashMap<String, FrameBuffer>,
    fetches: AtomicUsize,
}

#[async_trait]
impl ImageProvider for MemoryProvider {
    async fn fetch(&self, key: &str) -> ChatreelResult<FrameBuffer> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.images
            .get(key)
            .cloned()
            .ok_or_else(|| ChatreelError::asset(key, "not found"))
    }
}

#[tokio::test]
async fn test_render_every_distinct_state_once() {
    let mut images = HashMap::new();
    images.insert("cat.png".to_string(), FrameBuffer::solid(40, 20, &Color::RED));
    let provider = Arc::new(MemoryProvider {
        images,
        fetches: AtomicUsize::new(0),
    });
    let cache = AssetCache::new(
        provider.clone(),
        FetchSettings {
            retries: 1,
            backoff_ms: 0,
            timeout_secs: 5,
        },
    );

    let config = RenderConfig::new(
        ThemeKind::IosDark,
        &RenderSettings {
            repeat_window: 2,
            hold_seconds: 0.2,
            fade_frames: 2,
            fps: 10,
        },
    )
    .unwrap();
    let timeline = TimelineBuilder::new(vec![
        Message::left("Hi"),
        Message::right("Hello 👋"),
        Message::left("look"),
    ])
    .elements(vec![
        SpecialElement::after(2, SpecialKind::Image { asset_key: "cat.png".into() }),
        SpecialElement::after(3, SpecialKind::Widget),
    ])
    .build(&config);
    let composer = FrameComposer::new(Fonts::fixed(), &config);

    let mut rendered = 0;
    let mut previous: Option<chatreel_ir::Tick> = None;
    let mut frames = 0;
    for tick in timeline.iter() {
        frames += 1;
        if previous.as_ref().is_some_and(|p| p.repeats(&tick)) {
            continue;
        }
        let assets = cache.get_many(composer.required_assets(&tick.state)).await;
        let fb = composer.render(&tick.state, &assets);
        assert_eq!((fb.width, fb.height), (1080, 1920));
        rendered += 1;
        previous = Some(tick);
    }

    assert_eq!(frames, timeline.frame_count());
    // initial, 2 fades + hold for message 1, image, 2 fades + hold for message 2, widget
    assert_eq!(rendered, 1 + 3 + 1 + 3 + 1);
    // cat.png once; the emoji and hint glyph miss and fall back to placeholders once each.
    assert_eq!(provider.fetches.load(Ordering::SeqCst), 3);
}
