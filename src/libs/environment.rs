//! Host environment detection.
//!
//! The host is reached through [`HostProbe`]; everything the rest of the
//! crate needs is condensed into an immutable [`EnvironmentFacts`] value.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Deserialize;

use crate::libs::error::ProbeError;

/// Capability set when the host version is one of the configured legacy versions.
pub const LEGACY: &str = "legacy";
/// Capability set when the Paper marker class is present.
pub const PAPER_MARKER: &str = "paper_marker";

const UNKNOWN_VENDOR: &str = "unknown";
const UNKNOWN_VERSION: &str = "0";

/// What the host tells us about itself.
pub trait HostProbe {
    fn vendor(&self) -> Option<String>;
    fn version(&self) -> Option<String>;
    fn has_symbol(&self, symbol: &str) -> Result<bool, ProbeError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvironmentFacts {
    vendor: String,
    version: String,
    capabilities: BTreeMap<String, bool>,
}

impl EnvironmentFacts {
    pub fn new(vendor: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            version: version.into(),
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with_capability(mut self, name: impl Into<String>, present: bool) -> Self {
        self.capabilities.insert(name.into(), present);
        self
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn host_version(&self) -> HostVersion {
        HostVersion::parse_lenient(&self.version)
    }

    /// Unknown capabilities read as absent.
    pub fn capability(&self, name: &str) -> bool {
        self.capabilities.get(name).copied().unwrap_or(false)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = (&str, bool)> {
        self.capabilities
            .iter()
            .map(|(name, present)| (name.as_str(), *present))
    }
}

impl fmt::Display for EnvironmentFacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.vendor, self.version)?;
        let present: Vec<&str> = self
            .capabilities()
            .filter(|(_, present)| *present)
            .map(|(name, _)| name)
            .collect();
        if !present.is_empty() {
            write!(f, " [{}]", present.join(", "))?;
        }
        Ok(())
    }
}

/// Dotted numeric host version. Missing trailing segments compare as zero.
#[derive(Debug, Clone, Default)]
pub struct HostVersion(Vec<u32>);

impl HostVersion {
    /// Accepts only `N(.N)*`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        raw.split('.')
            .map(|segment| segment.parse::<u32>().ok())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// Host-reported versions may carry suffixes (`1.21-R0.1-SNAPSHOT`);
    /// each segment keeps only its leading digits.
    pub fn parse_lenient(raw: &str) -> Self {
        let numeric = raw.trim().split(['-', ' ', '+']).next().unwrap_or_default();
        Self(
            numeric
                .split('.')
                .map(|segment| {
                    let digits: String =
                        segment.chars().take_while(char::is_ascii_digit).collect();
                    digits.parse::<u32>().unwrap_or(0)
                })
                .collect(),
        )
    }
}

impl PartialEq for HostVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HostVersion {}

impl PartialOrd for HostVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HostVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|idx| {
                let left = self.0.get(idx).copied().unwrap_or(0);
                let right = other.0.get(idx).copied().unwrap_or(0);
                left.cmp(&right)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Capability name bound to the host symbol whose presence proves it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CapabilityCheck {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone)]
pub struct EnvironmentProbe {
    checks: Vec<CapabilityCheck>,
    legacy_versions: Vec<String>,
}

impl Default for EnvironmentProbe {
    fn default() -> Self {
        Self {
            checks: vec![CapabilityCheck {
                name: PAPER_MARKER.to_string(),
                symbol: "com.destroystokyo.paper.event.entity.EntityRemoveFromWorldEvent"
                    .to_string(),
            }],
            legacy_versions: vec!["1.20.4".to_string()],
        }
    }
}

impl EnvironmentProbe {
    pub fn new(checks: Vec<CapabilityCheck>, legacy_versions: Vec<String>) -> Self {
        Self {
            checks,
            legacy_versions,
        }
    }

    /// Never fails: anything the host cannot answer degrades to a default.
    pub fn detect(&self, host: &dyn HostProbe) -> EnvironmentFacts {
        let vendor = host.vendor().unwrap_or_else(|| UNKNOWN_VENDOR.to_string());
        let version = host.version().unwrap_or_else(|| UNKNOWN_VERSION.to_string());

        let legacy = self
            .legacy_versions
            .iter()
            .any(|legacy| legacy.trim() == version.trim());
        let mut facts = EnvironmentFacts::new(vendor, version).with_capability(LEGACY, legacy);

        for check in &self.checks {
            let present = match host.has_symbol(&check.symbol) {
                Ok(present) => present,
                Err(err) => {
                    tracing::warn!("capability {} assumed absent: {err}", check.name);
                    false
                }
            };
            facts = facts.with_capability(check.name.clone(), present);
        }

        tracing::debug!("environment detected: {facts}");
        facts
    }
}

/// A host snapshot taken from configuration or command-line flags.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub symbols: BTreeSet<String>,
}

impl HostProbe for StaticHost {
    fn vendor(&self) -> Option<String> {
        self.vendor.clone().filter(|vendor| !vendor.trim().is_empty())
    }

    fn version(&self) -> Option<String> {
        self.version.clone().filter(|version| !version.trim().is_empty())
    }

    fn has_symbol(&self, symbol: &str) -> Result<bool, ProbeError> {
        Ok(self.symbols.contains(symbol))
    }
}
