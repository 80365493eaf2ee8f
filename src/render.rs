/// Asset lookup contract, stores, and image decoding.
pub mod assets;
/// Image compositor contract and the software compositor.
pub mod compositor;
/// Frame export pipeline.
pub mod export;
/// Frame store contract and the directory-backed store.
pub mod frames;
/// Authoring-to-output geometry.
pub mod layout;
