//! Source string resolution
//!
//! Host sources come in three shapes:
//! - `asset://<path>`: bundled asset, located by an [`AssetResolver`]
//! - `file://<path>` or a bare filesystem path
//! - anything else with a scheme: network-addressed

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const ASSET_SCHEME: &str = "asset://";

/// Where a source lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Asset,
    File,
    Network,
}

/// Container hint for engines that need an explicit MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerHint {
    /// Let the engine sniff the container
    Auto,
    /// HLS playlist
    Hls,
}

impl ContainerHint {
    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            ContainerHint::Auto => None,
            ContainerHint::Hls => Some("application/x-mpegURL"),
        }
    }
}

/// A native-engine-loadable media reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLocator {
    pub uri: Url,
    pub origin: SourceOrigin,
    pub hint: ContainerHint,
}

impl MediaLocator {
    pub fn is_network(&self) -> bool {
        self.origin == SourceOrigin::Network
    }
}

impl std::fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Locates bundled assets on disk
pub trait AssetResolver: Send + Sync {
    /// Map an asset key (the part after `asset://`) to a filesystem path
    fn resolve(&self, key: &str) -> Result<PathBuf>;
}

/// Resolves assets under a fixed root directory
#[derive(Debug, Clone)]
pub struct DirectoryAssetResolver {
    root: PathBuf,
}

impl DirectoryAssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetResolver for DirectoryAssetResolver {
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let key = key.trim_start_matches('/');
        if key.is_empty() || key.split('/').any(|part| part == "..") {
            return Err(Error::AssetNotFound {
                path: key.to_string(),
            });
        }
        Ok(absolute(&self.root.join(key)))
    }
}

/// Resolve a host source string into a locator
pub fn resolve_source(source: &str, assets: &dyn AssetResolver) -> Result<MediaLocator> {
    let source = source.trim();
    if source.is_empty() {
        return Err(Error::InvalidSource("empty source".to_string()));
    }

    let (uri, origin) = if let Some(key) = source.strip_prefix(ASSET_SCHEME) {
        let path = assets.resolve(key)?;
        (file_url(&path)?, SourceOrigin::Asset)
    } else if source.starts_with("file://") {
        let uri = Url::parse(source).map_err(|e| Error::InvalidSource(format!("{source}: {e}")))?;
        (uri, SourceOrigin::File)
    } else if !source.contains("://") {
        (file_url(Path::new(source))?, SourceOrigin::File)
    } else {
        let uri = Url::parse(source).map_err(|e| Error::InvalidSource(format!("{source}: {e}")))?;
        (uri, SourceOrigin::Network)
    };

    let hint = if uri.as_str().contains(".m3u8") {
        ContainerHint::Hls
    } else {
        ContainerHint::Auto
    };

    Ok(MediaLocator { uri, origin, hint })
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(absolute(path))
        .map_err(|_| Error::InvalidSource(format!("not a usable file path: {}", path.display())))
}
