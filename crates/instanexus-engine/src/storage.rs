//! On-disk layout for generated assets.
//!
//! ```text
//! {root}/generated_images/midjourney_grid_{unix_ts}.jpg
//! {root}/generated_images/midjourney_{unix_ts}.jpg
//! {root}/fallback_images/
//! ```

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const GENERATED_DIR: &str = "generated_images";
pub const FALLBACK_DIR: &str = "fallback_images";
const EXTENSION: &str = "jpg";
const MAX_NAME_SUFFIX: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Grid,
    Final,
}

impl AssetKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Grid => "midjourney_grid",
            Self::Final => "midjourney",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Final => "final",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssetStore {
    root: PathBuf,
    grid_retention: Option<usize>,
}

impl AssetStore {
    /// Creates the generated and fallback directories under `root`.
    pub fn open(root: impl Into<PathBuf>, grid_retention: Option<usize>) -> io::Result<Self> {
        let store = Self {
            root: root.into(),
            grid_retention,
        };
        std::fs::create_dir_all(store.generated_dir())?;
        std::fs::create_dir_all(store.fallback_dir())?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.root.join(GENERATED_DIR)
    }

    pub fn fallback_dir(&self) -> PathBuf {
        self.root.join(FALLBACK_DIR)
    }

    pub fn file_name(kind: AssetKind, unix_ts: i64) -> String {
        format!("{}_{unix_ts}.{EXTENSION}", kind.prefix())
    }

    /// Writes `bytes` to a fresh timestamped file and returns its path.
    ///
    /// Files are never overwritten: a name already taken in the same second
    /// gets a numeric suffix. Saving a grid prunes old grids afterwards.
    pub async fn save(&self, kind: AssetKind, bytes: &[u8]) -> io::Result<PathBuf> {
        let ts = Utc::now().timestamp();
        let base = Self::file_name(kind, ts);
        let mut suffix = 0u32;
        let (path, mut file) = loop {
            let name = if suffix == 0 {
                base.clone()
            } else {
                format!("{}_{ts}_{suffix}.{EXTENSION}", kind.prefix())
            };
            let path = self.generated_dir().join(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    suffix += 1;
                    if suffix > MAX_NAME_SUFFIX {
                        return Err(err);
                    }
                }
                Err(err) => return Err(err),
            }
        };
        file.write_all(bytes).await?;
        file.flush().await?;
        info!(kind = kind.as_str(), path = %path.display(), bytes = bytes.len(), "asset saved");

        if kind == AssetKind::Grid {
            if let Err(err) = self.prune_grids().await {
                warn!(error = %err, "grid pruning failed");
            }
        }
        Ok(path)
    }

    /// Deletes the oldest grid files beyond the retention limit. Returns the
    /// removed paths. Without a limit nothing is removed.
    pub async fn prune_grids(&self) -> io::Result<Vec<PathBuf>> {
        let Some(limit) = self.grid_retention else {
            return Ok(Vec::new());
        };
        let mut grids = Vec::new();
        let mut entries = tokio::fs::read_dir(self.generated_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(order) = name.to_str().and_then(grid_order) {
                grids.push((order, entry.path()));
            }
        }
        if grids.len() <= limit {
            return Ok(Vec::new());
        }
        grids.sort();
        let excess = grids.len() - limit;
        let mut removed = Vec::with_capacity(excess);
        for (_, path) in grids.into_iter().take(excess) {
            tokio::fs::remove_file(&path).await?;
            debug!(path = %path.display(), "pruned grid");
            removed.push(path);
        }
        Ok(removed)
    }
}

/// `(timestamp, suffix)` for grid file names, `None` for anything else.
fn grid_order(name: &str) -> Option<(i64, u32)> {
    let stem = name
        .strip_prefix(AssetKind::Grid.prefix())?
        .strip_prefix('_')?
        .strip_suffix(EXTENSION)?
        .strip_suffix('.')?;
    match stem.split_once('_') {
        Some((ts, suffix)) => Some((ts.parse().ok()?, suffix.parse().ok()?)),
        None => Some((stem.parse().ok()?, 0)),
    }
}
