//! Concrete dependency descriptors and the builder that derives them from the
//! manifest and the detected environment.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::libs::environment::EnvironmentFacts;
use crate::libs::error::ManifestError;
use crate::libs::manifest::{IsolationPolicy, Manifest, ManifestEntry};
use crate::libs::relocation::{RelocationPlanner, RelocationRule, Relocations, normalize_separators};
use crate::libs::repository::{normalize_artifact_url, normalize_url};

static GROUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-]+(\.[A-Za-z0-9_\-]+)*$").expect("valid group id regex")
});
static ARTIFACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9_.\-]*$").expect("valid artifact id regex"));
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-][A-Za-z0-9_.+\-]*$").expect("valid version regex"));

/// `(group, artifact)`: identity used in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    pub group: String,
    pub artifact: String,
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

/// A fully resolved library. Coordinates are fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
    pub(crate) id: ArtifactId,
    pub(crate) version: String,
    pub(crate) relocations: Relocations,
    pub(crate) source_url: Option<String>,
    pub(crate) repository: Option<String>,
    pub(crate) isolated: bool,
}

impl DependencyDescriptor {
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    pub fn group_id(&self) -> &str {
        &self.id.group
    }

    pub fn artifact_id(&self) -> &str {
        &self.id.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn relocations(&self) -> &[RelocationRule] {
        &self.relocations
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    pub fn isolated(&self) -> bool {
        self.isolated
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.version)
    }
}

#[derive(Debug, Clone)]
pub struct DependencySpecBuilder {
    manifest: Manifest,
    planner: RelocationPlanner,
    isolation: IsolationPolicy,
}

impl DependencySpecBuilder {
    pub fn new(manifest: Manifest, planner: RelocationPlanner) -> Self {
        Self {
            manifest,
            planner,
            isolation: IsolationPolicy,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Pure given `facts`: one descriptor per entry, in declaration order.
    pub fn build(&self, facts: &EnvironmentFacts) -> Result<Vec<DependencyDescriptor>, ManifestError> {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(self.manifest.libraries.len());

        for entry in &self.manifest.libraries {
            let descriptor = self.build_entry(entry, facts)?;
            if !seen.insert(descriptor.id.clone()) {
                return Err(ManifestError::DuplicateLibrary {
                    library: descriptor.id.to_string(),
                });
            }
            descriptors.push(descriptor);
        }

        Ok(descriptors)
    }

    fn build_entry(
        &self,
        entry: &ManifestEntry,
        facts: &EnvironmentFacts,
    ) -> Result<DependencyDescriptor, ManifestError> {
        let library = entry.label();

        let group = normalize_separators(&entry.group);
        check(&GROUP_RE, &library, "group", &group)?;
        let artifact = entry.resolve_artifact(facts)?;
        check(&ARTIFACT_RE, &library, "artifact", &artifact)?;
        let version = entry.version.trim().to_string();
        check(&VERSION_RE, &library, "version", &version)?;

        let source_url = entry
            .url
            .as_deref()
            .map(|url| {
                normalize_artifact_url(url)
                    .ok_or_else(|| ManifestError::invalid_coordinate(library.as_str(), "url", url))
            })
            .transpose()?;
        let repository = entry
            .repository
            .as_deref()
            .map(|url| {
                normalize_url(url).ok_or_else(|| {
                    ManifestError::invalid_coordinate(library.as_str(), "repository", url)
                })
            })
            .transpose()?;

        Ok(DependencyDescriptor {
            id: ArtifactId { group, artifact },
            version,
            relocations: self.planner.plan_for(entry)?,
            source_url,
            repository,
            isolated: self.isolation.isolation_for(entry),
        })
    }
}

fn check(re: &Regex, library: &str, field: &'static str, value: &str) -> Result<(), ManifestError> {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ManifestError::invalid_coordinate(library, field, value))
    }
}
