// THEORY:
// The validity filter is the gate between "something was sampled" and "this is a color
// worth theming with". It runs on the raw sample, before any perceptual remap, and
// before anything can reach the cache.
//
// A sample is rejected when it is absent, fully transparent, or oversaturated. The
// saturation envelope only has an upper edge: neon extraction artifacts are excluded,
// while low-saturation colors (near-white, near-black, muted grays) are explicitly
// welcome.

use crate::core_modules::color_math::{CssColor, RawColor, Saturation};
use crate::error::{ProbeError, ProbeResult};

/// Samples with `(max - min) / max` above this are rejected.
pub const MAX_SATURATION: Saturation = 0.9;

/// Passes an acceptable sample through as an opaque `RawColor`.
pub fn validate(sample: Option<CssColor>) -> ProbeResult<RawColor> {
    let Some(sample) = sample else {
        return Err(ProbeError::InvalidColor("<absent>".to_string()));
    };
    if sample.is_transparent() {
        return Err(ProbeError::InvalidColor(format!("{} (transparent)", sample.color)));
    }
    let saturation = sample.color.saturation();
    if saturation > MAX_SATURATION {
        return Err(ProbeError::InvalidColor(format!(
            "{} (saturation {saturation:.2})",
            sample.color
        )));
    }
    Ok(sample.color)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(red: u8, green: u8, blue: u8) -> Option<CssColor> {
        Some(CssColor {
            color: RawColor::new(red, green, blue),
            alpha: 1.0,
        })
    }

    #[test]
    fn pure_red_is_rejected() {
        assert!(matches!(
            validate(opaque(255, 0, 0)),
            Err(ProbeError::InvalidColor(_))
        ));
    }

    #[test]
    fn muted_colors_pass() {
        assert_eq!(
            validate(opaque(200, 200, 190)).expect("accepted"),
            RawColor::new(200, 200, 190)
        );
        assert!(validate(opaque(250, 250, 250)).is_ok());
        assert!(validate(opaque(0, 0, 0)).is_ok());
        assert!(validate(opaque(10, 10, 10)).is_ok());
    }

    #[test]
    fn boundary_saturation_is_accepted() {
        // (100 - 10) / 100 = 0.9 exactly
        assert!(validate(opaque(100, 10, 10)).is_ok());
        assert!(validate(opaque(100, 9, 9)).is_err());
    }

    #[test]
    fn absent_and_transparent_samples_are_rejected() {
        assert!(validate(None).is_err());
        let clear = Some(CssColor {
            color: RawColor::new(40, 40, 40),
            alpha: 0.0,
        });
        assert!(validate(clear).is_err());
    }
}
