// THEORY:
// The `pipeline` module runs one resolution end to end, with no memory of previous
// ones. It encapsulates the full stack (probe, validity filter, perceptual adjuster)
// behind a single call that cannot fail: every content problem is recovered inside
// and surfaces only as a `Resolution::Fallback`.
//
// Caching, debouncing and ordering are deliberately not here. They belong to the
// `coordinator`, which decides *when* a resolution runs and whether its result may be
// kept. This split keeps the pipeline trivially testable against a static snapshot.

use crate::config::Settings;
use crate::core_modules::adjuster::{Palette, build_palette};
use crate::core_modules::color_math::RawColor;
use crate::core_modules::snapshot::ContentSnapshot;
use crate::core_modules::source_probe::{Provenance, SourceProbe};
use crate::core_modules::validity::validate;
use std::time::Duration;
use tracing::{debug, warn};

/// The outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// A valid color was found and remapped. Eligible for caching.
    Derived {
        palette: Palette,
        raw: RawColor,
        provenance: Provenance,
    },
    /// Nothing usable was found. Carries the default palette and is never cached.
    Fallback(Palette),
}

impl Resolution {
    pub fn palette(&self) -> Palette {
        match self {
            Resolution::Derived { palette, .. } => *palette,
            Resolution::Fallback(palette) => *palette,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            Resolution::Derived { provenance, .. } => Some(*provenance),
            Resolution::Fallback(_) => None,
        }
    }

    pub fn is_cacheable(&self) -> bool {
        matches!(self, Resolution::Derived { .. })
    }
}

/// Probe → validity filter → perceptual adjuster.
#[derive(Debug, Clone, Default)]
pub struct ResolutionPipeline {
    probe: SourceProbe,
}

impl ResolutionPipeline {
    pub fn new(probe: SourceProbe) -> Self {
        Self { probe }
    }

    /// Bound for each host call, including fetching a snapshot to run on.
    pub fn step_timeout(&self) -> Duration {
        self.probe.step_timeout()
    }

    pub async fn run(&self, snapshot: &dyn ContentSnapshot, settings: &Settings) -> Resolution {
        // Stage 1: find a candidate
        let Some(outcome) = self.probe.probe(snapshot).await else {
            debug!("no candidate color, using default palette");
            return Resolution::Fallback(Palette::default());
        };

        // Stage 2: gate it
        let raw = match validate(Some(outcome.sample)) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(provenance = %outcome.provenance, %error, "using default palette");
                return Resolution::Fallback(Palette::default());
            }
        };

        // Stage 3: remap and derive
        let palette = build_palette(raw, settings);
        debug!(
            provenance = %outcome.provenance,
            %raw,
            background = %palette.background,
            "derived palette"
        );
        Resolution::Derived {
            palette,
            raw,
            provenance: outcome.provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color_math::rgb_to_hsl;
    use crate::core_modules::snapshot::{PageTarget, StaticSnapshot};

    #[tokio::test]
    async fn hint_hue_survives_any_targets() {
        let snapshot = StaticSnapshot::new().with_theme_hint("theme-color", "#336699");
        let expected = rgb_to_hsl(RawColor::new(0x33, 0x66, 0x99)).hue;

        for (saturation_target, lightness_target) in [(70.0, 25.0), (30.0, 60.0), (90.0, 40.0)] {
            let settings = Settings {
                saturation_target,
                lightness_target,
                ..Settings::default()
            };
            let resolution = ResolutionPipeline::default().run(&snapshot, &settings).await;
            assert!(resolution.is_cacheable());
            let hue = rgb_to_hsl(resolution.palette().background).hue;
            assert!((hue - expected).abs() < 1.5, "hue {hue} drifted from {expected}");
        }
    }

    #[tokio::test]
    async fn oversaturated_hint_falls_back_to_default() {
        let snapshot = StaticSnapshot::new()
            .with_theme_hint("theme-color", "#ff0000")
            .with_background(PageTarget::Body, "rgb(200, 200, 190)");

        let resolution = ResolutionPipeline::default()
            .run(&snapshot, &Settings::default())
            .await;
        assert_eq!(resolution, Resolution::Fallback(Palette::default()));
        assert_eq!(resolution.provenance(), None);
    }

    #[tokio::test]
    async fn body_background_drives_the_palette() {
        let snapshot = StaticSnapshot::new().with_background(PageTarget::Body, "rgb(10, 10, 10)");
        let settings = Settings::default();

        let resolution = ResolutionPipeline::default().run(&snapshot, &settings).await;
        match resolution {
            Resolution::Derived {
                palette,
                raw,
                provenance,
            } => {
                assert_eq!(raw, RawColor::new(10, 10, 10));
                assert_eq!(provenance, Provenance::PageBackground(PageTarget::Body));
                assert_eq!(palette, build_palette(RawColor::new(10, 10, 10), &settings));
            }
            other => panic!("expected a derived palette, got {other:?}"),
        }
    }
}
