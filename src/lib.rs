//! Runtime library provisioning for a plugin running inside a host it does
//! not control.
//!
//! Libraries are declared in a [`Manifest`], resolved against the detected
//! [`EnvironmentFacts`] into [`DependencyDescriptor`]s, and handed one by one
//! to a [`FetchEngine`]. Each pass yields a [`LoadSummary`]; what to do about
//! failures is left to the caller.

pub mod libs;
pub mod model;

pub use libs::{
    ArtifactId, ArtifactSource, DependencyDescriptor, DependencySpecBuilder, EngineError,
    EnvironmentFacts, EnvironmentProbe, FetchEngine, HostProbe, IsolationPolicy, LibraryManager,
    LoadOrchestrator, LoadOutcome, LoadRequest, LoadResult, LoadSummary, LocalCacheEngine,
    Manifest, ManifestEntry, ManifestError, ProbeError, RelocationPlanner, RelocationRule,
    RepositoryRegistry, StaticHost,
};
pub use model::config::AppConfig;
