//! Namespace relocation rules.
//!
//! Every rule renames into the reserved private namespace and never into one
//! the host owns.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use smallvec::SmallVec;

use crate::libs::error::ManifestError;
use crate::libs::manifest::{ManifestEntry, RelocationSpec};

static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*\.?$")
        .expect("valid namespace prefix regex")
});

/// Rules attached to one descriptor. Almost always zero or one.
pub type Relocations = SmallVec<[RelocationRule; 1]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelocationRule {
    from: String,
    to: String,
}

impl RelocationRule {
    pub fn from_prefix(&self) -> &str {
        &self.from
    }

    pub fn to_prefix(&self) -> &str {
        &self.to
    }
}

impl fmt::Display for RelocationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, Clone)]
pub struct RelocationPlanner {
    reserved: String,
    host: Vec<String>,
}

impl RelocationPlanner {
    pub fn new(reserved: &str, host: &[String]) -> Result<Self, ManifestError> {
        let reserved = normalize_separators(reserved);
        if reserved.trim_end_matches('.').is_empty() || !PREFIX_RE.is_match(&reserved) {
            return Err(ManifestError::invalid_coordinate(
                "namespace",
                "reserved namespace",
                reserved,
            ));
        }

        let host: Vec<String> = host
            .iter()
            .map(|ns| normalize_separators(ns))
            .filter(|ns| !ns.trim_end_matches('.').is_empty())
            .collect();

        if let Some(host) = host
            .iter()
            .find(|host| is_under(&reserved, host) || is_under(host, &reserved))
        {
            return Err(ManifestError::ReservedOverlapsHost {
                reserved: reserved.clone(),
                host: host.clone(),
            });
        }

        Ok(Self { reserved, host })
    }

    pub fn reserved(&self) -> &str {
        &self.reserved
    }

    /// Zero rules is valid: the library stays in its original namespace.
    pub fn plan_for(&self, entry: &ManifestEntry) -> Result<Relocations, ManifestError> {
        let library = entry.label();
        let mut rules = Relocations::new();

        for spec in &entry.relocate {
            let (from, to) = match spec {
                RelocationSpec::Into(from) => (normalize_separators(from), self.reserved.clone()),
                RelocationSpec::Explicit { from, to } => {
                    (normalize_separators(from), normalize_separators(to))
                }
            };

            let rule = self.validate(&library, from, to)?;
            if rules
                .iter()
                .any(|existing| same_namespace(&existing.from, &rule.from))
            {
                return Err(ManifestError::DuplicateRelocation {
                    library,
                    from: rule.from,
                });
            }
            rules.push(rule);
        }

        Ok(rules)
    }

    fn validate(
        &self,
        library: &str,
        from: String,
        to: String,
    ) -> Result<RelocationRule, ManifestError> {
        if from.trim_end_matches('.').is_empty() || to.trim_end_matches('.').is_empty() {
            return Err(ManifestError::EmptyRelocationPrefix {
                library: library.to_string(),
            });
        }

        for (field, value) in [("relocation source", &from), ("relocation target", &to)] {
            if !PREFIX_RE.is_match(value) {
                return Err(ManifestError::invalid_coordinate(library, field, value.as_str()));
            }
        }

        if same_namespace(&from, &to) {
            return Err(ManifestError::IdentityRelocation {
                library: library.to_string(),
                prefix: from,
            });
        }

        if let Some(host) = self.host.iter().find(|host| is_under(&to, host)) {
            return Err(ManifestError::HostNamespaceAlias {
                library: library.to_string(),
                to,
                host: host.clone(),
            });
        }

        if !is_under(&to, &self.reserved) {
            return Err(ManifestError::OutsideReservedNamespace {
                library: library.to_string(),
                to,
                reserved: self.reserved.clone(),
            });
        }

        Ok(RelocationRule { from, to })
    }
}

/// `{}` stands in for the package separator so build-time shading leaves
/// manifest strings alone.
pub(crate) fn normalize_separators(raw: &str) -> String {
    raw.trim().replace("{}", ".")
}

fn same_namespace(left: &str, right: &str) -> bool {
    left.trim_end_matches('.') == right.trim_end_matches('.')
}

/// True when `prefix` is `namespace` itself or nested below it.
fn is_under(prefix: &str, namespace: &str) -> bool {
    let prefix = prefix.trim_end_matches('.');
    let namespace = namespace.trim_end_matches('.');
    prefix == namespace
        || prefix
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'))
}
