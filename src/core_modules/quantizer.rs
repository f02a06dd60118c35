// THEORY:
// The `Quantizer` turns a pixel buffer into one representative color. It plays the
// role of spatial pooling for the whole pipeline: instead of averaging (which turns a
// red logo on white into pink), it votes. Every sampled pixel is floored into a
// coarse bucket and the most popular bucket wins.
//
// Key architectural principles:
// 1.  **Sampling, not exhaustion**: decoded icons are thumbnailed down to
//     `ICON_SAMPLE_EDGE` before voting, which bounds the work for any input size.
//     On top of that, pixels can be read at a fixed stride (1 by default, i.e. every
//     pixel of the thumbnail). The stride is part of the input, so the same buffer
//     and stride always produce the same answer.
// 2.  **Translucency never votes**: pixels below half alpha are skipped outright.
//     Transparent padding around an icon must not decide its color.
// 3.  **Deterministic ties**: buckets are recorded in the order they are first seen
//     and the winner must strictly beat the current leader, so a tie always goes to
//     the bucket that appeared first in scan order.
// 4.  **Floor values out**: the winning bucket's floor triple is the output. The
//     original pixels are not re-averaged.

use crate::core_modules::color_math::{Channel, Luminance, RawColor};
use crate::core_modules::pixel::pixel::{BucketKey, CHANNELS, Pixel};
use crate::error::{ConfigError, ProbeError, ProbeResult};
use image::DynamicImage;
use std::collections::HashMap;

pub const DEFAULT_BUCKET_WIDTH: Channel = 16;
/// Decoded icons are reduced to at most this edge length before voting.
pub const ICON_SAMPLE_EDGE: u32 = 64;

/// The winning bucket of a histogram vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantColor {
    pub color: RawColor,
    pub luminance: Luminance,
}

/// Bucketed histogram voter over RGBA row-major buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    stride: usize,
    bucket_width: Channel,
}

impl Default for Quantizer {
    fn default() -> Self {
        Self {
            stride: 1,
            bucket_width: DEFAULT_BUCKET_WIDTH,
        }
    }
}

impl Quantizer {
    /// `stride` is counted in pixels; `bucket_width` must be 16 or 32.
    pub fn new(stride: usize, bucket_width: Channel) -> Result<Self, ConfigError> {
        if stride == 0 {
            return Err(ConfigError::ZeroStride);
        }
        if !matches!(bucket_width, 16 | 32) {
            return Err(ConfigError::BucketWidth(bucket_width));
        }
        Ok(Self {
            stride,
            bucket_width,
        })
    }

    /// Votes over every `stride`-th pixel of `buffer`.
    ///
    /// Trailing bytes that do not form a whole pixel are ignored. Returns `None`
    /// when no opaque pixel was sampled.
    pub fn dominant_color(&self, buffer: &[u8]) -> Option<DominantColor> {
        let mut first_seen: HashMap<BucketKey, usize> = HashMap::new();
        let mut votes: Vec<(BucketKey, u32)> = Vec::new();

        for bytes in buffer.chunks_exact(CHANNELS).step_by(self.stride) {
            let Ok(pixel) = Pixel::try_from(bytes) else {
                continue;
            };
            if !pixel.is_opaque() {
                continue;
            }

            let key = pixel.bucket(self.bucket_width);
            match first_seen.get(&key) {
                Some(&index) => votes[index].1 += 1,
                None => {
                    first_seen.insert(key, votes.len());
                    votes.push((key, 1));
                }
            }
        }

        let mut winner: Option<(BucketKey, u32)> = None;
        for &(key, count) in &votes {
            match winner {
                Some((_, best)) if count <= best => {}
                _ => winner = Some((key, count)),
            }
        }

        winner.map(|((red, green, blue), _)| {
            let representative = Pixel::new(red, green, blue, Channel::MAX);
            DominantColor {
                color: representative.color(),
                luminance: representative.luminance(),
            }
        })
    }

    /// Reduces a decoded image to icon scale and votes over its RGBA pixels.
    pub fn quantize_image(&self, image: &DynamicImage) -> Option<DominantColor> {
        let sample = if image.width() > ICON_SAMPLE_EDGE || image.height() > ICON_SAMPLE_EDGE {
            image.thumbnail(ICON_SAMPLE_EDGE, ICON_SAMPLE_EDGE)
        } else {
            image.clone()
        };
        let rgba = sample.to_rgba8();
        self.dominant_color(rgba.as_raw())
    }

    /// Decodes encoded icon bytes (PNG, ICO, …) and votes over the result.
    pub fn decode_and_quantize(&self, bytes: &[u8]) -> ProbeResult<Option<DominantColor>> {
        let image =
            image::load_from_memory(bytes).map_err(|e| ProbeError::DecodeFailure(e.to_string()))?;
        Ok(self.quantize_image(&image))
    }
}
