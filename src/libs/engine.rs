//! Seam to the engine that fetches, relocates and attaches artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::libs::descriptor::DependencyDescriptor;
use crate::libs::relocation::RelocationRule;
use crate::libs::repository::ArtifactSource;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("not found in {searched}")]
    Resolution { searched: String },

    #[error("download failed: {0}")]
    Download(String),

    #[error("could not attach: {0}")]
    Load(String),

    #[error("engine panicked: {0}")]
    Panicked(String),
}

impl EngineError {
    pub fn not_found(source: &ArtifactSource) -> Self {
        let searched = match source {
            ArtifactSource::Direct(url) => url.clone(),
            ArtifactSource::Repositories(repositories) if repositories.is_empty() => {
                "no repositories".to_string()
            }
            ArtifactSource::Repositories(repositories) => {
                format!("{} repositories", repositories.len())
            }
        };
        Self::Resolution { searched }
    }
}

/// Everything the engine needs for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest<'a> {
    pub descriptor: &'a DependencyDescriptor,
    pub source: ArtifactSource,
    pub relocations: &'a [RelocationRule],
    pub isolated: bool,
    /// Cache directory name; the engine owns the layout beneath it.
    pub cache_dir: &'a Path,
}

/// Blocking fetch/relocate/load call. Retries, if any, happen inside.
pub trait FetchEngine {
    fn load(&mut self, request: &LoadRequest<'_>) -> Result<(), EngineError>;
}

/// Offline engine: attaches artifacts already present in the cache.
#[derive(Debug, Clone)]
pub struct LocalCacheEngine {
    root: PathBuf,
    loaded: Vec<LoadedArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedArtifact {
    pub path: PathBuf,
    pub isolated: bool,
    pub relocations: usize,
}

impl LocalCacheEngine {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: Vec::new(),
        }
    }

    pub fn loaded(&self) -> &[LoadedArtifact] {
        &self.loaded
    }

    /// Maven layout, or the URL's file name for direct downloads.
    pub fn artifact_path(&self, request: &LoadRequest<'_>) -> Result<PathBuf, EngineError> {
        let cache = self.root.join(request.cache_dir);
        let descriptor = request.descriptor;

        match &request.source {
            ArtifactSource::Direct(url) => url
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .map(|name| cache.join("direct").join(name))
                .ok_or_else(|| EngineError::Download(format!("no file name in {url}"))),
            ArtifactSource::Repositories(_) => {
                let mut path = cache;
                path.extend(descriptor.group_id().split('.'));
                Ok(path
                    .join(descriptor.artifact_id())
                    .join(descriptor.version())
                    .join(format!(
                        "{}-{}.jar",
                        descriptor.artifact_id(),
                        descriptor.version()
                    )))
            }
        }
    }
}

impl FetchEngine for LocalCacheEngine {
    fn load(&mut self, request: &LoadRequest<'_>) -> Result<(), EngineError> {
        let path = self.artifact_path(request)?;

        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(EngineError::Load(format!("{} is not a file", path.display()))),
            Err(_) => return Err(EngineError::not_found(&request.source)),
        };

        if metadata.len() == 0 {
            return Err(EngineError::Load(format!("{} is empty", path.display())));
        }

        tracing::debug!("attached {} from {}", request.descriptor, path.display());
        self.loaded.push(LoadedArtifact {
            path,
            isolated: request.isolated,
            relocations: request.relocations.len(),
        });
        Ok(())
    }
}
