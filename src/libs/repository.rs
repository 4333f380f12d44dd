use crate::libs::descriptor::DependencyDescriptor;

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/";

/// Where the engine should look for one descriptor's artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSource {
    /// Explicit URL; repositories are not searched.
    Direct(String),
    /// Repositories to search, in order.
    Repositories(Vec<String>),
}

/// Ordered, de-duplicated repository base URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryRegistry {
    base: Vec<String>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for url in urls {
            registry.add(url.as_ref());
        }
        registry
    }

    pub fn add_maven_central(&mut self) -> bool {
        self.add(MAVEN_CENTRAL)
    }

    /// Returns false for duplicates and unusable URLs.
    pub fn add(&mut self, url: &str) -> bool {
        let Some(url) = normalize_url(url) else {
            tracing::warn!("ignoring repository with unsupported url: {url}");
            return false;
        };

        if self.base.contains(&url) {
            return false;
        }

        self.base.push(url);
        true
    }

    pub fn base_repositories(&self) -> &[String] {
        &self.base
    }

    /// Base list followed by the descriptor's own repository, if new.
    pub fn with_supplemental(&self, descriptor: &DependencyDescriptor) -> Vec<String> {
        let mut repositories = self.base.clone();
        if let Some(extra) = descriptor.repository() {
            if !repositories.iter().any(|existing| existing == extra) {
                repositories.push(extra.to_string());
            }
        }
        repositories
    }

    pub fn source_for(&self, descriptor: &DependencyDescriptor) -> ArtifactSource {
        match descriptor.source_url() {
            Some(url) => ArtifactSource::Direct(url.to_string()),
            None => ArtifactSource::Repositories(self.with_supplemental(descriptor)),
        }
    }
}

/// Trims and appends a trailing slash; `None` unless http(s) or file.
pub(crate) fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    let scheme_ok = ["https://", "http://", "file://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme));
    if !scheme_ok || url.chars().any(char::is_whitespace) {
        return None;
    }

    if url.ends_with('/') {
        Some(url.to_string())
    } else {
        Some(format!("{url}/"))
    }
}

/// Artifact URLs point at a file, so no trailing slash is added.
pub(crate) fn normalize_artifact_url(raw: &str) -> Option<String> {
    normalize_url(raw).map(|url| url.trim_end_matches('/').to_string())
}
