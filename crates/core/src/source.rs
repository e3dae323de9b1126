// Data source classification
// An opaque id is classified once into a typed descriptor; nothing downstream re-parses it.

use crate::error::{Result, SoundError};
use crate::platform::ResourceCatalog;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default prefix for packaged assets
pub const ASSET_PREFIX: &str = "asset:/";

/// Resolved content location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Raw resource packaged with the application
    BundledResource(String),
    /// Path inside the asset archive (prefix stripped)
    AssetPath(String),
    /// http(s) URL streamed by the engine
    NetworkUrl(String),
    /// File on the local filesystem
    LocalFile(PathBuf),
}

impl SourceDescriptor {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceDescriptor::BundledResource(_) => "resource",
            SourceDescriptor::AssetPath(_) => "asset",
            SourceDescriptor::NetworkUrl(_) => "network",
            SourceDescriptor::LocalFile(_) => "file",
        }
    }
}

/// Resolver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub asset_prefix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            asset_prefix: ASSET_PREFIX.to_string(),
        }
    }
}

/// Classifies source ids
///
/// Order: bundled resource, asset prefix, http(s) URL, local file. A bundled
/// resource wins over a same-named file on disk.
#[derive(Clone)]
pub struct DataSourceResolver {
    catalog: Arc<dyn ResourceCatalog>,
    config: ResolverConfig,
}

impl DataSourceResolver {
    pub fn new(catalog: Arc<dyn ResourceCatalog>) -> Self {
        Self::with_config(catalog, ResolverConfig::default())
    }

    pub fn with_config(catalog: Arc<dyn ResourceCatalog>, config: ResolverConfig) -> Self {
        Self { catalog, config }
    }

    pub fn resolve(&self, id: &str) -> Result<SourceDescriptor> {
        if id.is_empty() {
            return Err(SoundError::InvalidSource("empty source id".to_string()));
        }

        if self.catalog.contains(id) {
            return Ok(SourceDescriptor::BundledResource(id.to_string()));
        }

        if let Some(path) = id.strip_prefix(self.config.asset_prefix.as_str()) {
            if path.is_empty() {
                return Err(SoundError::InvalidSource(format!("empty asset path: {}", id)));
            }
            return Ok(SourceDescriptor::AssetPath(path.to_string()));
        }

        if is_network_url(id) {
            return Ok(SourceDescriptor::NetworkUrl(id.to_string()));
        }

        let path = Path::new(id);
        if path.exists() {
            Ok(SourceDescriptor::LocalFile(path.to_path_buf()))
        } else {
            Err(SoundError::SourceNotFound(id.to_string()))
        }
    }
}

fn is_network_url(id: &str) -> bool {
    id.starts_with("http://") || id.starts_with("https://")
}

/// Build a source id from a file name and an optional base directory.
///
/// With a base path the result is `"{base}/{file}"`. Without one, relative
/// names are treated as bundled resource names: lower-cased with the final
/// non-empty extension removed. Absolute paths, URLs and asset ids pass through.
pub fn compose_source_id(file_name: &str, base_path: Option<&str>) -> String {
    if let Some(base) = base_path.filter(|b| !b.is_empty()) {
        return format!("{}/{}", base, file_name);
    }
    if is_absolute_id(file_name) {
        return file_name.to_string();
    }
    let lowered = file_name.to_lowercase();
    match lowered.rfind('.') {
        Some(dot) if dot + 1 < lowered.len() => lowered[..dot].to_string(),
        _ => lowered,
    }
}

fn is_absolute_id(id: &str) -> bool {
    id.starts_with('/') || id.starts_with("http") || id.starts_with("asset")
}
