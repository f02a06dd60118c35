// THEORY:
// This file is the entry point for the `adaptive_accent` library crate. It defines
// the public API exposed to hosts (a browser shell, a launcher, a theming daemon).
//
// The primary interface is the `Coordinator`: hosts hand it `Settings`, tell it when
// content may have changed, and get back a four-color `Palette` per content key. The
// `ResolutionPipeline` is exported for hosts that want one-shot resolutions without
// any caching. The `core_modules` hold the pure building blocks (color math,
// quantization, probing, validity, adjustment) and are public so they can be reused
// on their own.

pub mod config;
pub mod coordinator;
pub mod core_modules;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::{RemapMode, Settings};
pub use coordinator::{CacheEntry, ColorScheme, Coordinator, KeyState, PaletteUpdate};
pub use core_modules::adjuster::Palette;
pub use core_modules::color_math::RawColor;
pub use core_modules::snapshot::{
    ContentKey, ContentSnapshot, ElementBox, PageTarget, SnapshotSource, StaticSnapshot,
};
pub use error::{ConfigError, ProbeError};
pub use pipeline::{Resolution, ResolutionPipeline};
