// THEORY:
// The perceptual adjuster turns one sampled color into a four-color `Palette`. It is a
// remap toward a consistent visual weight, not a correction of the sample: in the
// default `Override` mode only the hue survives, and saturation and lightness come
// from `Settings`. Every page ends up with the same "loudness" and only its hue
// differs.
//
// Derivation, all from the same adjusted color (one hue, never mixed across sources):
// - `background`: the adjusted color itself.
// - `text`: pure white or pure black. White when `luminance(adjusted) <= 128`.
//   The midpoint is fixed and never reparametrized per theme.
// - `border`: the adjusted color blended 10% toward white when text is black,
//   10% toward black when text is white.
// - `accent`: the adjusted color at 80% over the text polarity.
//
// Blending with black or white moves a color along a line through gray, which keeps
// its HSL hue. That is what lets all four members share one hue in an opaque output
// representation.

use crate::config::{RemapMode, Settings};
use crate::core_modules::color_math::{
    HslColor, LUMINANCE_MIDPOINT, RawColor, hsl_to_rgb, luminance, mix, rgb_to_hex, rgb_to_hsl,
};

const BORDER_BLEND: f64 = 0.1;
const ACCENT_TEXT_BLEND: f64 = 0.2;

/// The four named colors handed to styling consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Palette {
    pub background: RawColor,
    pub text: RawColor,
    pub border: RawColor,
    pub accent: RawColor,
}

impl Default for Palette {
    /// Neutral light palette used when nothing usable could be extracted.
    fn default() -> Self {
        let background = RawColor::WHITE;
        Self {
            background,
            text: RawColor::BLACK,
            border: mix(background, RawColor::BLACK, BORDER_BLEND),
            accent: mix(background, RawColor::BLACK, ACCENT_TEXT_BLEND),
        }
    }
}

impl Palette {
    /// Stable CSS custom properties for the four members.
    pub fn css_variables(&self) -> [(&'static str, String); 4] {
        [
            ("--adaptive-bg-color", rgb_to_hex(self.background)),
            ("--adaptive-text-color", rgb_to_hex(self.text)),
            ("--adaptive-border-color", rgb_to_hex(self.border)),
            ("--adaptive-accent-color", rgb_to_hex(self.accent)),
        ]
    }
}

/// Pure white for dark colors, pure black for light ones.
pub fn contrast_text(color: RawColor) -> RawColor {
    if luminance(color) <= LUMINANCE_MIDPOINT {
        RawColor::WHITE
    } else {
        RawColor::BLACK
    }
}

/// Replaces (or blends) saturation and lightness with the configured targets.
pub fn remap(color: RawColor, settings: &Settings) -> RawColor {
    let sampled = rgb_to_hsl(color);
    let (saturation, lightness) = match settings.remap_mode {
        RemapMode::Override => (settings.saturation_target, settings.lightness_target),
        RemapMode::Blend => (
            (sampled.saturation + settings.saturation_target) / 2.0,
            (sampled.lightness + settings.lightness_target) / 2.0,
        ),
    };
    hsl_to_rgb(HslColor {
        hue: sampled.hue,
        saturation,
        lightness,
    })
}

pub fn build_palette(raw: RawColor, settings: &Settings) -> Palette {
    let adjusted = remap(raw, settings);
    let text = contrast_text(adjusted);
    let border_overlay = if text == RawColor::BLACK {
        RawColor::WHITE
    } else {
        RawColor::BLACK
    };

    Palette {
        background: adjusted,
        text,
        border: mix(adjusted, border_overlay, BORDER_BLEND),
        accent: mix(adjusted, text, ACCENT_TEXT_BLEND),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hue_distance(a: f64, b: f64) -> f64 {
        let d = (a - b).abs() % 360.0;
        d.min(360.0 - d)
    }

    #[test]
    fn contrast_law_examples() {
        assert_eq!(contrast_text(RawColor::new(20, 20, 20)), RawColor::WHITE);
        assert_eq!(contrast_text(RawColor::new(240, 240, 240)), RawColor::BLACK);
        assert_eq!(contrast_text(RawColor::new(127, 127, 127)), RawColor::WHITE);
        assert_eq!(contrast_text(RawColor::new(129, 129, 129)), RawColor::BLACK);
    }

    #[test]
    fn override_keeps_hue_and_applies_targets() {
        let settings = Settings::default();
        let raw = RawColor::new(0x33, 0x66, 0x99);
        let adjusted = rgb_to_hsl(remap(raw, &settings));
        assert!(hue_distance(adjusted.hue, 210.0) < 1.0);
        assert!((adjusted.saturation - 70.0).abs() < 1.5);
        assert!((adjusted.lightness - 25.0).abs() < 0.5);
    }

    #[test]
    fn blend_moves_halfway() {
        let settings = Settings {
            remap_mode: RemapMode::Blend,
            saturation_target: 100.0,
            lightness_target: 50.0,
            ..Settings::default()
        };
        // #336699 is hsl(210, 50%, 40%)
        let adjusted = rgb_to_hsl(remap(RawColor::new(0x33, 0x66, 0x99), &settings));
        assert!((adjusted.saturation - 75.0).abs() < 1.5);
        assert!((adjusted.lightness - 45.0).abs() < 0.5);
    }

    #[test]
    fn dark_targets_get_white_text_and_darker_border() {
        let palette = build_palette(RawColor::new(0x33, 0x66, 0x99), &Settings::default());
        assert_eq!(palette.text, RawColor::WHITE);
        assert!(palette.border.luminance() < palette.background.luminance());
        assert!(palette.accent.luminance() > palette.background.luminance());
    }

    #[test]
    fn light_targets_get_black_text_and_lighter_border() {
        let settings = Settings {
            lightness_target: 85.0,
            ..Settings::default()
        };
        let palette = build_palette(RawColor::new(0x33, 0x66, 0x99), &settings);
        assert_eq!(palette.text, RawColor::BLACK);
        assert!(palette.border.luminance() > palette.background.luminance());
        assert!(palette.accent.luminance() < palette.background.luminance());
    }

    #[test]
    fn every_member_shares_the_hue() {
        let palette = build_palette(RawColor::new(0x33, 0x66, 0x99), &Settings::default());
        let hue = rgb_to_hsl(palette.background).hue;
        assert!(hue_distance(rgb_to_hsl(palette.border).hue, hue) < 3.0);
        assert!(hue_distance(rgb_to_hsl(palette.accent).hue, hue) < 3.0);
    }

    #[test]
    fn text_always_follows_background_luminance() {
        for lightness in [0.0, 10.0, 25.0, 45.0, 50.0, 55.0, 75.0, 100.0] {
            let settings = Settings {
                lightness_target: lightness,
                ..Settings::default()
            };
            for raw in [
                RawColor::new(10, 10, 10),
                RawColor::new(200, 200, 190),
                RawColor::new(0x33, 0x66, 0x99),
            ] {
                let palette = build_palette(raw, &settings);
                assert_eq!(palette.text, contrast_text(palette.background));
            }
        }
    }

    #[test]
    fn css_variables_are_hex() {
        let vars = Palette::default().css_variables();
        assert_eq!(vars[0], ("--adaptive-bg-color", "#ffffff".to_string()));
        assert_eq!(vars[1], ("--adaptive-text-color", "#000000".to_string()));
    }
}
