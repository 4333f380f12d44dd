use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::libs::environment::{EnvironmentFacts, HostVersion};
use crate::libs::error::ManifestError;
use crate::libs::relocation::normalize_separators;

pub const MANIFEST_VERSION: u32 = 1;

const BUILTIN_MANIFEST: &str = include_str!("../../config/libraries.toml");

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub version: u32,
    #[serde(default, rename = "library")]
    pub libraries: Vec<ManifestEntry>,
}

impl Manifest {
    /// The libraries the plugin ships with.
    pub fn builtin() -> Result<Self, ManifestError> {
        Self::parse(BUILTIN_MANIFEST)
    }

    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(raw)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(ManifestError::UnsupportedVersion {
                found: manifest.version,
                expected: MANIFEST_VERSION,
            });
        }
        Ok(manifest)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid manifest {}", path.display()))
    }
}

/// One `[[library]]` declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestEntry {
    pub group: String,
    #[serde(default)]
    pub artifact: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantArm>,
    pub version: String,
    #[serde(default)]
    pub relocate: Vec<RelocationSpec>,
    #[serde(default)]
    pub isolated: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantArm {
    /// `None` marks the fallback arm.
    #[serde(default)]
    pub when: Option<Condition>,
    pub artifact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RelocationSpec {
    /// Source prefix moved directly under the reserved namespace.
    Into(String),
    Explicit { from: String, to: String },
}

/// Predicate over [`EnvironmentFacts`] used to pick a variant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Vendor(String),
    Capability(String),
    VersionAtLeast(String),
    VersionBelow(String),
    VersionIs(String),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    pub fn evaluate(&self, facts: &EnvironmentFacts, library: &str) -> Result<bool, ManifestError> {
        Ok(match self {
            Condition::Vendor(vendor) => facts.vendor().trim().eq_ignore_ascii_case(vendor.trim()),
            Condition::Capability(name) => facts.capability(name),
            Condition::VersionAtLeast(raw) => facts.host_version() >= condition_version(raw, library)?,
            Condition::VersionBelow(raw) => facts.host_version() < condition_version(raw, library)?,
            Condition::VersionIs(raw) => facts.host_version() == condition_version(raw, library)?,
            Condition::Not(inner) => !inner.evaluate(facts, library)?,
            Condition::All(all) => {
                for condition in all {
                    if !condition.evaluate(facts, library)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Any(any) => {
                for condition in any {
                    if condition.evaluate(facts, library)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }

    /// Checks every branch, not only the ones a given environment would reach.
    fn validate(&self, library: &str) -> Result<(), ManifestError> {
        match self {
            Condition::Vendor(_) | Condition::Capability(_) => Ok(()),
            Condition::VersionAtLeast(raw)
            | Condition::VersionBelow(raw)
            | Condition::VersionIs(raw) => condition_version(raw, library).map(|_| ()),
            Condition::Not(inner) => inner.validate(library),
            Condition::All(conditions) | Condition::Any(conditions) => conditions
                .iter()
                .try_for_each(|condition| condition.validate(library)),
        }
    }
}

fn condition_version(raw: &str, library: &str) -> Result<HostVersion, ManifestError> {
    HostVersion::parse(raw).ok_or_else(|| ManifestError::InvalidConditionVersion {
        library: library.to_string(),
        value: raw.to_string(),
    })
}

impl ManifestEntry {
    /// Used in diagnostics before the artifact is known.
    pub fn label(&self) -> String {
        let group = normalize_separators(&self.group);
        match &self.artifact {
            Some(artifact) => format!("{group}:{}", normalize_separators(artifact)),
            None => format!("{group}:<variant>"),
        }
    }

    /// Picks the one artifact id this entry stands for under `facts`.
    pub fn resolve_artifact(&self, facts: &EnvironmentFacts) -> Result<String, ManifestError> {
        let library = self.label();
        self.validate_variants(&library)?;

        if let Some(artifact) = &self.artifact {
            return Ok(normalize_separators(artifact));
        }

        for arm in &self.variants {
            let matched = match &arm.when {
                Some(condition) => condition.evaluate(facts, &library)?,
                None => true,
            };
            if matched {
                return Ok(normalize_separators(&arm.artifact));
            }
        }

        Err(ManifestError::NoVariantMatches { library })
    }

    fn validate_variants(&self, library: &str) -> Result<(), ManifestError> {
        if self.artifact.is_some() == !self.variants.is_empty() {
            return Err(ManifestError::AmbiguousArtifact {
                library: library.to_string(),
            });
        }

        let last = self.variants.len().saturating_sub(1);
        for (idx, arm) in self.variants.iter().enumerate() {
            match &arm.when {
                Some(condition) => condition.validate(library)?,
                None if idx != last => {
                    return Err(ManifestError::UnreachableVariant {
                        library: library.to_string(),
                    });
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Decides which libraries get a private load scope.
///
/// Static per entry: set for libraries whose classes are known to clash with
/// other plugins bundling a different version.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsolationPolicy;

impl IsolationPolicy {
    pub fn isolation_for(&self, entry: &ManifestEntry) -> bool {
        entry.isolated
    }
}
