// THEORY:
// `color_math` is the stateless foundation every other module stands on. It owns the
// two color representations the pipeline passes around (`RawColor`, `HslColor`) and
// the pure conversions between them.
//
// Key principles:
// 1.  **One luminance**: `luminance` uses the fixed Rec. 601 weights
//     (0.299, 0.587, 0.114) on 0..255 channels. The quantizer reports it and the
//     adjuster picks text polarity from it. Nothing else in the crate computes
//     brightness, so the contrast law cannot drift between modules.
// 2.  **Fail, don't guess**: parsers return `None` on anything malformed. A color
//     that cannot be read is simply not a candidate.
// 3.  **Hosts speak CSS**: resolved backgrounds arrive as computed-style strings
//     (`rgb(…)`, `rgba(…)`, `transparent`, hex), so the parser understands those.

use std::fmt;

pub type Channel = u8;
pub type Luminance = f64;
pub type Hue = f64;
pub type Saturation = f64;
pub type Lightness = f64;

/// Contrast threshold on the 0..255 luminance scale.
pub const LUMINANCE_MIDPOINT: Luminance = 128.0;

/// An unadjusted, opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawColor {
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

impl RawColor {
    pub const BLACK: RawColor = RawColor::new(0, 0, 0);
    pub const WHITE: RawColor = RawColor::new(255, 255, 255);

    pub const fn new(red: Channel, green: Channel, blue: Channel) -> Self {
        Self { red, green, blue }
    }

    pub fn luminance(&self) -> Luminance {
        luminance(*self)
    }

    pub fn saturation(&self) -> Saturation {
        saturation(*self)
    }

    pub fn to_hsl(&self) -> HslColor {
        rgb_to_hsl(*self)
    }

    pub fn to_hex(&self) -> String {
        rgb_to_hex(*self)
    }

    fn max_channel(&self) -> Channel {
        self.red.max(self.green).max(self.blue)
    }

    fn min_channel(&self) -> Channel {
        self.red.min(self.green).min(self.blue)
    }
}

impl fmt::Display for RawColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// Hue in degrees [0, 360), saturation and lightness in percent [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HslColor {
    pub hue: Hue,
    pub saturation: Saturation,
    pub lightness: Lightness,
}

/// A parsed CSS color. Alpha is 0.0 (transparent) ..= 1.0 (opaque).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CssColor {
    pub color: RawColor,
    pub alpha: f64,
}

impl CssColor {
    pub fn is_transparent(&self) -> bool {
        self.alpha <= 0.0
    }
}

/// Rec. 601 luma on 0..255 channels.
pub fn luminance(color: RawColor) -> Luminance {
    0.299 * color.red as f64 + 0.587 * color.green as f64 + 0.114 * color.blue as f64
}

/// HSV-style saturation `(max - min) / max`, 0.0 for black.
pub fn saturation(color: RawColor) -> Saturation {
    let max = color.max_channel();
    if max == 0 {
        return 0.0;
    }
    (max - color.min_channel()) as f64 / max as f64
}

pub fn rgb_to_hsl(color: RawColor) -> HslColor {
    let red = color.red as f64 / 255.0;
    let green = color.green as f64 / 255.0;
    let blue = color.blue as f64 / 255.0;

    let max = red.max(green).max(blue);
    let min = red.min(green).min(blue);
    let lightness = (max + min) / 2.0;
    let delta = max - min;

    if delta <= f64::EPSILON {
        return HslColor {
            hue: 0.0,
            saturation: 0.0,
            lightness: lightness * 100.0,
        };
    }

    let saturation = if lightness > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let sector = if max == red {
        (green - blue) / delta + if green < blue { 6.0 } else { 0.0 }
    } else if max == green {
        (blue - red) / delta + 2.0
    } else {
        (red - green) / delta + 4.0
    };

    HslColor {
        hue: (sector * 60.0).rem_euclid(360.0),
        saturation: saturation * 100.0,
        lightness: lightness * 100.0,
    }
}

pub fn hsl_to_rgb(hsl: HslColor) -> RawColor {
    let hue = hsl.hue.rem_euclid(360.0) / 360.0;
    let saturation = (hsl.saturation / 100.0).clamp(0.0, 1.0);
    let lightness = (hsl.lightness / 100.0).clamp(0.0, 1.0);

    let q = if lightness < 0.5 {
        lightness * (1.0 + saturation)
    } else {
        lightness + saturation - lightness * saturation
    };
    let p = 2.0 * lightness - q;

    RawColor::new(
        to_channel(hue_to_channel(p, q, hue + 1.0 / 3.0)),
        to_channel(hue_to_channel(p, q, hue)),
        to_channel(hue_to_channel(p, q, hue - 1.0 / 3.0)),
    )
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn to_channel(normalized: f64) -> Channel {
    (normalized * 255.0).round().clamp(0.0, 255.0) as Channel
}

/// Linear blend: `weight` 0.0 keeps `base`, 1.0 yields `overlay`.
pub fn mix(base: RawColor, overlay: RawColor, weight: f64) -> RawColor {
    let weight = weight.clamp(0.0, 1.0);
    let blend = |a: Channel, b: Channel| -> Channel {
        (a as f64 * (1.0 - weight) + b as f64 * weight)
            .round()
            .clamp(0.0, 255.0) as Channel
    };
    RawColor::new(
        blend(base.red, overlay.red),
        blend(base.green, overlay.green),
        blend(base.blue, overlay.blue),
    )
}

/// Accepts `#rgb`, `#rrggbb`, with or without the leading `#`.
pub fn hex_to_rgb(input: &str) -> Option<RawColor> {
    let digits = input.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    match digits.len() {
        3 => {
            let mut channels = digits
                .chars()
                .map(|c| c.to_digit(16).map(|d| (d * 17) as Channel));
            Some(RawColor::new(
                channels.next()??,
                channels.next()??,
                channels.next()??,
            ))
        }
        6 => Some(RawColor::new(
            Channel::from_str_radix(&digits[0..2], 16).ok()?,
            Channel::from_str_radix(&digits[2..4], 16).ok()?,
            Channel::from_str_radix(&digits[4..6], 16).ok()?,
        )),
        _ => None,
    }
}

pub fn rgb_to_hex(color: RawColor) -> String {
    format!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue)
}

/// Parses the color forms a host's computed style can report.
pub fn parse_css_color(input: &str) -> Option<CssColor> {
    let value = input.trim().to_ascii_lowercase();
    if value.is_empty() {
        return None;
    }
    if value == "transparent" {
        return Some(CssColor {
            color: RawColor::BLACK,
            alpha: 0.0,
        });
    }
    if let Some(args) = function_args(&value, "rgba").or_else(|| function_args(&value, "rgb")) {
        return parse_rgb_args(args);
    }
    hex_to_rgb(&value).map(|color| CssColor { color, alpha: 1.0 })
}

fn function_args<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_rgb_args(args: &str) -> Option<CssColor> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();

    let (rgb, alpha) = match parts.as_slice() {
        [r, g, b] => ([*r, *g, *b], None),
        [r, g, b, a] => ([*r, *g, *b], Some(*a)),
        _ => return None,
    };

    let mut channels = [0 as Channel; 3];
    for (slot, raw) in channels.iter_mut().zip(rgb) {
        let number: f64 = raw.parse().ok()?;
        *slot = number.round().clamp(0.0, 255.0) as Channel;
    }

    let alpha = match alpha {
        None => 1.0,
        Some(raw) => match raw.strip_suffix('%') {
            Some(percent) => percent.parse::<f64>().ok()? / 100.0,
            None => raw.parse::<f64>().ok()?,
        }
        .clamp(0.0, 1.0),
    };

    Some(CssColor {
        color: RawColor::new(channels[0], channels[1], channels[2]),
        alpha,
    })
}
