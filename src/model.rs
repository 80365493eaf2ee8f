/// Per-property keyframes.
pub mod keyframe;
/// Scenes, layers, and blocks.
pub mod scene;
