pub mod adjuster;
pub mod color_math;
pub mod pixel;
pub mod quantizer;
pub mod snapshot;
pub mod source_probe;
pub mod validity;
