/// Serializable edit commands and the committing editor.
pub mod editor;
/// Track mutation operations over an in-memory timeline.
pub mod ops;
/// Project persistence contract and the in-memory store.
pub mod store;
/// Timeline aggregate: layers, blocks, and their keyframes.
pub mod track;
