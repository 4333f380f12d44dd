use thiserror::Error;

/// A defect in the manifest itself. Fatal, raised before any loading begins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ManifestError {
    #[error("failed to parse manifest: {0}")]
    Parse(String),

    #[error("unsupported manifest version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("{library}: invalid {field} `{value}`")]
    InvalidCoordinate {
        library: String,
        field: &'static str,
        value: String,
    },

    #[error("{library}: relocation prefixes must not be empty")]
    EmptyRelocationPrefix { library: String },

    #[error("{library}: relocation `{prefix}` maps onto itself")]
    IdentityRelocation { library: String, prefix: String },

    #[error("{library}: relocation target `{to}` is not under the reserved namespace `{reserved}`")]
    OutsideReservedNamespace {
        library: String,
        to: String,
        reserved: String,
    },

    #[error("{library}: relocation target `{to}` aliases host namespace `{host}`")]
    HostNamespaceAlias {
        library: String,
        to: String,
        host: String,
    },

    #[error("{library}: duplicate relocation source `{from}`")]
    DuplicateRelocation { library: String, from: String },

    #[error("reserved namespace `{reserved}` overlaps host namespace `{host}`")]
    ReservedOverlapsHost { reserved: String, host: String },

    #[error("{library}: declare exactly one of `artifact` or `variants`")]
    AmbiguousArtifact { library: String },

    #[error("{library}: fallback variant must be the last arm")]
    UnreachableVariant { library: String },

    #[error("{library}: no variant matches the detected environment")]
    NoVariantMatches { library: String },

    #[error("{library}: declared more than once")]
    DuplicateLibrary { library: String },

    #[error("{library}: invalid version `{value}` in variant condition")]
    InvalidConditionVersion { library: String, value: String },
}

impl ManifestError {
    pub fn invalid_coordinate(
        library: impl Into<String>,
        field: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidCoordinate {
            library: library.into(),
            field,
            value: value.into(),
        }
    }
}

impl From<toml::de::Error> for ManifestError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// A host capability lookup that could not be answered. Never escapes the probe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("capability lookup for `{symbol}` unavailable: {reason}")]
pub struct ProbeError {
    pub symbol: String,
    pub reason: String,
}

impl ProbeError {
    pub fn new(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}
