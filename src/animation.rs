/// Per-channel keyframe sampling.
pub mod sample;
