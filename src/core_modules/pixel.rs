// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the smallest unit the quantizer reads. It is a "dumb" data
// container for a single RGBA sample plus the handful of single-pixel heuristics the
// color pipeline needs. Anything that needs more than one pixel (histograms, votes,
// dominance) belongs to the `quantizer`.
//
// What lives here:
// - Raw channels (RGBA) as read from a row-major buffer.
// - Opacity gate: a pixel below half alpha is translucent and must not vote.
// - Bucketing: flooring each channel to a fixed granularity so that near-identical
//   colors collapse into one histogram key.
// - Brightness: luminance, delegated to `color_math` so every module agrees on it.
//
// Alpha is only ever a gate. Once a pixel is accepted, its alpha is dropped and only
// the `RawColor` moves on.

pub mod pixel {
    use crate::core_modules::color_math::{Channel, Luminance, RawColor};

    pub type Byte = u8;
    pub type BucketKey = (Channel, Channel, Channel);

    pub const CHANNELS: usize = 4;
    /// Pixels with alpha strictly below this are skipped by the quantizer.
    pub const OPACITY_THRESHOLD: Channel = 128;

    /// A "dumb" data container representing a single RGBA pixel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Pixel {
        /// The red channel value (0-255).
        pub red: Channel,
        /// The green channel value (0-255).
        pub green: Channel,
        /// The blue channel value (0-255).
        pub blue: Channel,
        /// The alpha (transparency) channel value (0-255).
        pub alpha: Channel,
    }

    impl Pixel {
        pub fn new(red: Channel, green: Channel, blue: Channel, alpha: Channel) -> Self {
            Pixel {
                red,
                green,
                blue,
                alpha,
            }
        }

        /// True when the pixel is opaque enough to take part in a color vote.
        pub fn is_opaque(&self) -> bool {
            self.alpha >= OPACITY_THRESHOLD
        }

        /// The color part of the pixel, alpha dropped.
        pub fn color(&self) -> RawColor {
            RawColor::new(self.red, self.green, self.blue)
        }

        /// Luminance estimate (Rec. 601 luma) on 0..255 channels.
        pub fn luminance(&self) -> Luminance {
            self.color().luminance()
        }

        /// Floors every channel to a multiple of `bucket_width`.
        ///
        /// The result doubles as the histogram key and as the representative color
        /// of the bucket (floor values, never re-averaged).
        pub fn bucket(&self, bucket_width: Channel) -> BucketKey {
            let floor = |channel: Channel| channel - channel % bucket_width;
            (floor(self.red), floor(self.green), floor(self.blue))
        }
    }

    impl TryFrom<&[Byte]> for Pixel {
        type Error = usize;

        /// Fails with the offending length unless exactly four bytes are given.
        fn try_from(bytes: &[Byte]) -> Result<Self, Self::Error> {
            match bytes {
                [red, green, blue, alpha] => Ok(Pixel::new(*red, *green, *blue, *alpha)),
                _ => Err(bytes.len()),
            }
        }
    }
}
