//! Imports the files of a story's assets folder into a media store.

use crate::error::{ConversionError, MediaStoreError};
use crate::paths::PathMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions accepted by the default store whitelist.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "png", "gif", "webp", "avif", "bmp", "ico", "heic", "svg", "mp4", "m4v",
    "webm", "ogv", "mov", "mp3", "m4a", "ogg", "oga", "wav", "aac", "vtt",
];

/// A file accepted by the media store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedMedia {
    pub url: String,
    pub media_id: u64,
}

/// The durable media library the pipeline writes into. One call imports one
/// file; a failure must leave previously imported files untouched.
pub trait MediaStore {
    /// Whitelist check for a lowercase extension (no dot).
    fn accepts_extension(&self, ext: &str) -> bool {
        MEDIA_EXTENSIONS.contains(&ext)
    }

    fn import_file(
        &mut self,
        local_path: &Path,
        suggested_name: &str,
    ) -> Result<ImportedMedia, MediaStoreError>;

    fn resolve_url_to_media_id(&self, url: &str) -> Option<u64>;
}

/// One asset that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub path: String,
    pub message: String,
}

impl From<AssetFailure> for ConversionError {
    fn from(failure: AssetFailure) -> Self {
        ConversionError::AssetStore {
            path: failure.path,
            message: failure.message,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetImport {
    pub path_map: PathMap,
    /// Keyed by the `assets/`-rooted relative path.
    pub errors: BTreeMap<String, String>,
}

impl AssetImport {
    pub fn failures(&self) -> Vec<AssetFailure> {
        self.errors
            .iter()
            .map(|(path, message)| AssetFailure {
                path: path.clone(),
                message: message.clone(),
            })
            .collect()
    }
}

fn relative_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Unreadable directories and entries are recorded under their
/// `assets/`-relative key like any other failed asset.
fn walk_assets(dir: &Path, rel: &str, store: &mut dyn MediaStore, out: &mut AssetImport) {
    let listing = match fs::read_dir(dir) {
        Ok(listing) => listing,
        Err(err) => {
            warn!("could not list {rel}: {err}");
            out.errors.insert(rel.to_string(), err.to_string());
            return;
        }
    };
    let mut entries = Vec::new();
    for entry in listing {
        match entry {
            Ok(entry) => entries.push(entry.path()),
            Err(err) => {
                warn!("could not read an entry of {rel}: {err}");
                out.errors.insert(rel.to_string(), err.to_string());
            }
        }
    }
    entries.sort();

    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            warn!("skipping asset with non UTF-8 name: {}", path.display());
            continue;
        };
        let key = relative_key(rel, &name);

        if path.is_dir() {
            walk_assets(&path, &key, store, out);
            continue;
        }
        if !path.is_file() {
            continue;
        }

        let ext = crate::paths::extension_of(&name);
        if !store.accepts_extension(&ext) {
            debug!("skipping {key}: extension '{ext}' is not importable");
            continue;
        }

        match store.import_file(&path, &name) {
            Ok(media) => {
                debug!("imported {key} as {} (id {})", media.url, media.media_id);
                out.path_map.insert(key, media.url);
            }
            Err(err) => {
                warn!("asset {key} failed to import: {err}");
                out.errors.insert(key, err.to_string());
            }
        }
    }
}

/// Recursively imports every whitelisted file under `assets_dir`. Keys in the
/// result are rooted at the assets folder's own name (`assets/...`), matching
/// how the HTML references them.
pub fn import_assets(assets_dir: Option<&Path>, store: &mut dyn MediaStore) -> AssetImport {
    let mut out = AssetImport::default();
    let Some(dir) = assets_dir else {
        return out;
    };

    let root_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(crate::archive::ASSETS_DIR_NAME)
        .to_string();
    walk_assets(dir, &root_name, store, &mut out);

    info!(
        "imported {} asset(s), {} failure(s)",
        out.path_map.len(),
        out.errors.len()
    );
    out
}

/// A media store backed by a local directory, serving files under a base URL.
#[derive(Debug)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
    next_id: u64,
    by_url: HashMap<String, u64>,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> std::io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            base_url: base_url.trim_end_matches('/').to_string(),
            next_id: 1,
            by_url: HashMap::new(),
        })
    }

    /// `name.ext`, then `name-1.ext`, `name-2.ext`, ... until unused.
    fn unique_name(&self, suggested: &str) -> String {
        let (stem, ext) = match suggested.rfind('.') {
            Some(idx) if idx > 0 => (&suggested[..idx], &suggested[idx..]),
            _ => (suggested, ""),
        };
        let mut candidate = suggested.to_string();
        let mut n = 1;
        while self.root.join(&candidate).exists() {
            candidate = format!("{stem}-{n}{ext}");
            n += 1;
        }
        candidate
    }
}

impl MediaStore for LocalMediaStore {
    fn import_file(
        &mut self,
        local_path: &Path,
        suggested_name: &str,
    ) -> Result<ImportedMedia, MediaStoreError> {
        let ext = crate::paths::extension_of(suggested_name);
        if !self.accepts_extension(&ext) {
            return Err(MediaStoreError::DisallowedType(ext));
        }
        let name = self.unique_name(suggested_name);
        fs::copy(local_path, self.root.join(&name))?;

        let url = format!("{}/{}", self.base_url, name);
        let media_id = self.next_id;
        self.next_id += 1;
        self.by_url.insert(url.clone(), media_id);
        Ok(ImportedMedia { url, media_id })
    }

    fn resolve_url_to_media_id(&self, url: &str) -> Option<u64> {
        self.by_url.get(url.trim()).copied()
    }
}
