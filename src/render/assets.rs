use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::core::AssetId;
use crate::foundation::error::{CutlineError, CutlineResult};

/// Media kind of a stored asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Still image; composited into frames.
    Image,
    /// Video; not composited per frame.
    Video,
    /// Audio; never composited.
    Audio,
}

impl AssetKind {
    /// Return `true` for kinds the compositor can draw.
    pub fn is_image_capable(self) -> bool {
        matches!(self, Self::Image)
    }
}

/// Where an asset's bytes live.
#[derive(Clone, Debug)]
pub enum AssetSource {
    /// Bytes already in memory.
    Bytes(Arc<Vec<u8>>),
    /// File on disk.
    Path(PathBuf),
}

/// Result of resolving an asset id.
#[derive(Clone, Debug)]
pub struct ResolvedAsset {
    /// Media kind.
    pub kind: AssetKind,
    /// Content location.
    pub source: AssetSource,
}

impl ResolvedAsset {
    /// Load the asset's raw bytes.
    pub fn read_bytes(&self) -> CutlineResult<Arc<Vec<u8>>> {
        match &self.source {
            AssetSource::Bytes(b) => Ok(Arc::clone(b)),
            AssetSource::Path(p) => std::fs::read(p).map(Arc::new).map_err(|e| {
                CutlineError::asset_unavailable(format!("read '{}': {e}", p.display()))
            }),
        }
    }
}

/// Lookup contract for media referenced by blocks.
pub trait AssetStore {
    /// Resolve an asset id; unknown ids are [`CutlineError::AssetUnavailable`].
    fn resolve(&self, id: AssetId) -> CutlineResult<ResolvedAsset>;
}

/// Asset store holding everything in memory; used by tests and embedders.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAssetStore {
    assets: BTreeMap<AssetId, ResolvedAsset>,
}

impl InMemoryAssetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset, replacing any previous entry for `id`.
    pub fn insert(&mut self, id: AssetId, kind: AssetKind, source: AssetSource) {
        self.assets.insert(id, ResolvedAsset { kind, source });
    }

    /// Register encoded image bytes (PNG, JPEG, ...).
    pub fn insert_image_bytes(&mut self, id: AssetId, bytes: Vec<u8>) {
        self.insert(id, AssetKind::Image, AssetSource::Bytes(Arc::new(bytes)));
    }
}

impl AssetStore for InMemoryAssetStore {
    fn resolve(&self, id: AssetId) -> CutlineResult<ResolvedAsset> {
        self.assets
            .get(&id)
            .cloned()
            .ok_or_else(|| CutlineError::asset_unavailable(format!("{id} is not registered")))
    }
}

#[derive(Clone, Debug, serde::Deserialize)]
struct ManifestEntry {
    id: AssetId,
    kind: AssetKind,
    path: String,
}

#[derive(Clone, Debug, serde::Deserialize)]
struct Manifest {
    #[serde(default)]
    assets: Vec<ManifestEntry>,
}

/// Asset store reading files under a root directory, described by a JSON manifest:
///
/// ```json
/// { "assets": [ { "id": 7, "kind": "image", "path": "img/logo.png" } ] }
/// ```
#[derive(Clone, Debug)]
pub struct DirAssetStore {
    root: PathBuf,
    entries: BTreeMap<AssetId, (AssetKind, String)>,
}

impl DirAssetStore {
    /// Create an empty store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Register a root-relative file.
    pub fn insert(&mut self, id: AssetId, kind: AssetKind, rel_path: &str) -> CutlineResult<()> {
        let rel = normalize_rel_path(rel_path)?;
        self.entries.insert(id, (kind, rel));
        Ok(())
    }

    /// Load a manifest file; paths resolve against the manifest's directory.
    pub fn from_manifest_file(path: &Path) -> CutlineResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read asset manifest '{}'", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut store = Self::new(root);
        for entry in manifest.assets {
            store.insert(entry.id, entry.kind, &entry.path)?;
        }
        Ok(store)
    }
}

impl AssetStore for DirAssetStore {
    fn resolve(&self, id: AssetId) -> CutlineResult<ResolvedAsset> {
        let (kind, rel) = self
            .entries
            .get(&id)
            .ok_or_else(|| CutlineError::asset_unavailable(format!("{id} is not in the manifest")))?;
        let path = self.root.join(rel);
        if !path.is_file() {
            return Err(CutlineError::asset_unavailable(format!(
                "{id} points at missing file '{}'",
                path.display()
            )));
        }
        Ok(ResolvedAsset {
            kind: *kind,
            source: AssetSource::Path(path),
        })
    }
}

/// Normalize and validate root-relative asset paths.
///
/// The result uses `/` separators, drops `.` segments, and rejects absolute paths or `..`.
pub(crate) fn normalize_rel_path(source: &str) -> CutlineResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(CutlineError::validation("asset paths must be relative"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(CutlineError::validation("asset paths must not contain '..'"));
        }
        out.push(part);
    }
    if out.is_empty() {
        return Err(CutlineError::validation("asset path must contain a file name"));
    }
    Ok(out.join("/"))
}

/// Decode encoded image bytes into straight-alpha RGBA8.
pub fn decode_image(bytes: &[u8]) -> CutlineResult<image::RgbaImage> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| CutlineError::compositing(format!("decode image: {e}")))?;
    Ok(img.to_rgba8())
}

/// Decoded sources for one export, keyed by asset id.
#[derive(Default)]
pub(crate) struct ImageCache {
    images: BTreeMap<AssetId, Option<Arc<image::RgbaImage>>>,
}

impl ImageCache {
    /// Resolve and decode `id` once; `Ok(None)` for assets that do not composite.
    pub(crate) fn get<A: AssetStore + ?Sized>(
        &mut self,
        assets: &A,
        id: AssetId,
    ) -> CutlineResult<Option<Arc<image::RgbaImage>>> {
        if let Some(hit) = self.images.get(&id) {
            return Ok(hit.clone());
        }
        let resolved = assets.resolve(id)?;
        if !resolved.kind.is_image_capable() {
            tracing::debug!(asset = %id, kind = ?resolved.kind, "asset does not composite");
            self.images.insert(id, None);
            return Ok(None);
        }
        let bytes = resolved.read_bytes()?;
        let img = Arc::new(decode_image(&bytes)?);
        tracing::debug!(asset = %id, width = img.width(), height = img.height(), "decoded image");
        self.images.insert(id, Some(Arc::clone(&img)));
        Ok(Some(img))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/assets.rs"]
mod tests;
