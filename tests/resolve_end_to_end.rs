use adaptive_accent::core_modules::adjuster::build_palette;
use adaptive_accent::core_modules::color_math::rgb_to_hsl;
use adaptive_accent::error::ProbeResult;
use adaptive_accent::{
    ContentKey, ContentSnapshot, Coordinator, KeyState, PageTarget, Palette, ProbeError, RawColor,
    Settings, SnapshotSource, StaticSnapshot,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use image::{DynamicImage, ImageBuffer, Rgba};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Hands out whatever snapshot is currently installed.
struct SwappableSource {
    current: parking_lot::Mutex<Arc<StaticSnapshot>>,
    fetches: AtomicUsize,
}

impl SwappableSource {
    fn new(snapshot: StaticSnapshot) -> Arc<Self> {
        Arc::new(Self {
            current: parking_lot::Mutex::new(Arc::new(snapshot)),
            fetches: AtomicUsize::new(0),
        })
    }

    fn install(&self, snapshot: StaticSnapshot) {
        *self.current.lock() = Arc::new(snapshot);
    }
}

impl SnapshotSource for SwappableSource {
    fn snapshot<'a>(
        &'a self,
        _key: &'a ContentKey,
    ) -> BoxFuture<'a, ProbeResult<Arc<dyn ContentSnapshot>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let snapshot: Arc<dyn ContentSnapshot> = self.current.lock().clone();
        async move { Ok::<_, ProbeError>(snapshot) }.boxed()
    }
}

/// A source whose host has gone away.
struct DetachedSource;

impl SnapshotSource for DetachedSource {
    fn snapshot<'a>(
        &'a self,
        key: &'a ContentKey,
    ) -> BoxFuture<'a, ProbeResult<Arc<dyn ContentSnapshot>>> {
        let error = ProbeError::SourceUnavailable(format!("{key} is closed"));
        async move { Err::<Arc<dyn ContentSnapshot>, _>(error) }.boxed()
    }
}

fn coordinator() -> Coordinator {
    Coordinator::new(SwappableSource::new(StaticSnapshot::new()))
}

fn hue_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    d.min(360.0 - d)
}

fn png_icon(color: [u8; 4], size: u32) -> Vec<u8> {
    let icon: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(size, size, Rgba(color));
    let mut encoded = Vec::new();
    DynamicImage::ImageRgba8(icon)
        .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
        .expect("encode png");
    encoded
}

#[tokio::test]
async fn declared_hint_keeps_its_hue_under_any_targets() {
    let snapshot = StaticSnapshot::new().with_theme_hint("theme-color", "#336699");

    for (saturation_target, lightness_target) in [(70.0, 25.0), (40.0, 70.0), (100.0, 50.0)] {
        let coordinator = coordinator();
        coordinator
            .configure(Settings {
                saturation_target,
                lightness_target,
                ..Settings::default()
            })
            .expect("valid settings");

        let palette = coordinator
            .resolve(&ContentKey::new("example.org"), &snapshot)
            .await
            .expect("palette");
        let background = rgb_to_hsl(palette.background);
        assert!(hue_distance(background.hue, 210.0) < 1.5);
        assert!((background.lightness - lightness_target).abs() < 0.5);
        assert!(palette.text == RawColor::WHITE || palette.text == RawColor::BLACK);
    }
}

#[tokio::test]
async fn body_background_is_used_when_nothing_else_exists() {
    let coordinator = coordinator();
    let snapshot = StaticSnapshot::new().with_background(PageTarget::Body, "rgb(10, 10, 10)");

    let palette = coordinator
        .resolve(&ContentKey::new("example.org"), &snapshot)
        .await
        .expect("palette");
    assert_eq!(
        palette,
        build_palette(RawColor::new(10, 10, 10), &Settings::default())
    );
}

#[tokio::test]
async fn neon_hint_yields_the_default_palette() {
    let coordinator = coordinator();
    let key = ContentKey::new("neon.example");
    let snapshot = StaticSnapshot::new().with_theme_hint("theme-color", "rgb(255, 0, 0)");

    let palette = coordinator.resolve(&key, &snapshot).await.expect("palette");
    assert_eq!(palette, Palette::default());
    assert!(coordinator.cached(&key).is_none());
}

#[tokio::test]
async fn muted_color_is_accepted_and_cached() {
    let coordinator = coordinator();
    let key = ContentKey::new("paper.example");
    let snapshot = StaticSnapshot::new().with_theme_hint("theme-color", "rgb(200, 200, 190)");

    let palette = coordinator.resolve(&key, &snapshot).await.expect("palette");
    assert_eq!(
        palette,
        build_palette(RawColor::new(200, 200, 190), &Settings::default())
    );
    assert_eq!(coordinator.cached(&key).map(|entry| entry.palette), Some(palette));
    assert_eq!(coordinator.state(&key), KeyState::Resolved);
}

#[tokio::test]
async fn icon_is_the_last_resort() {
    let coordinator = coordinator();
    let snapshot = StaticSnapshot::new()
        .with_background(PageTarget::Body, "rgba(0, 0, 0, 0)")
        .with_icon(png_icon([0x33, 0x66, 0x99, 255], 16));

    let palette = coordinator
        .resolve(&ContentKey::new("icon.example"), &snapshot)
        .await
        .expect("palette");
    // The winning bucket is (0x30, 0x60, 0x90), the same hue as #336699.
    assert!(hue_distance(rgb_to_hsl(palette.background).hue, 210.0) < 1.5);
}

#[tokio::test]
async fn empty_content_gets_the_default_palette() {
    let palette = coordinator()
        .resolve(&ContentKey::new("blank.example"), &StaticSnapshot::new())
        .await;
    assert_eq!(palette, Some(Palette::default()));
}

#[tokio::test(start_paused = true)]
async fn notifications_after_navigation_pick_up_new_content() {
    let source = SwappableSource::new(
        StaticSnapshot::new().with_background(PageTarget::Body, "rgb(10, 10, 10)"),
    );
    let coordinator = Coordinator::new(source.clone());
    let key = ContentKey::new("example.org");
    let mut updates = coordinator.subscribe();

    coordinator.notify_changed(&key);
    let first = updates.recv().await.expect("first update");
    assert_eq!(coordinator.cached(&key).map(|entry| entry.palette), Some(first.palette));

    source.install(StaticSnapshot::new().with_theme_hint("theme-color", "#336699"));
    for _ in 0..10 {
        coordinator.notify_changed(&key);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let second = updates.recv().await.expect("second update");
    assert_ne!(first.palette, second.palette);
    assert!(hue_distance(rgb_to_hsl(second.palette.background).hue, 210.0) < 1.5);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn stale_entry_is_refreshed_by_a_direct_resolve() {
    let coordinator = coordinator();
    let key = ContentKey::new("example.org");
    let dark = StaticSnapshot::new().with_background(PageTarget::Body, "rgb(10, 10, 10)");
    let first = coordinator.resolve(&key, &dark).await.expect("palette");

    coordinator.notify_changed(&key);
    assert_eq!(coordinator.state(&key), KeyState::Pending);

    let hinted = StaticSnapshot::new().with_theme_hint("theme-color", "#336699");
    let second = coordinator.resolve(&key, &hinted).await.expect("palette");
    assert_ne!(first, second);
    // The direct resolution replaced the pending cycle.
    assert_eq!(coordinator.state(&key), KeyState::Resolved);
}

#[tokio::test(start_paused = true)]
async fn unavailable_snapshot_publishes_the_default_palette() {
    let coordinator = Coordinator::new(Arc::new(DetachedSource));
    let key = ContentKey::new("closed.example");
    let mut updates = coordinator.subscribe();

    coordinator.notify_changed(&key);
    let update = updates.recv().await.expect("update");
    assert_eq!(update.palette, Palette::default());
    assert_eq!(update.provenance, None);
    assert!(coordinator.cached(&key).is_none());
}
