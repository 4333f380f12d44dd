pub mod descriptor;
pub mod engine;
pub mod environment;
pub mod error;
pub mod manager;
pub mod manifest;
pub mod relocation;
pub mod repository;
pub mod runtime;
pub mod summary;

pub use descriptor::{ArtifactId, DependencyDescriptor, DependencySpecBuilder};
pub use engine::{EngineError, FetchEngine, LoadRequest, LocalCacheEngine};
pub use environment::{EnvironmentFacts, EnvironmentProbe, HostProbe, StaticHost};
pub use error::{ManifestError, ProbeError};
pub use manager::{LibraryManager, LoadOrchestrator};
pub use manifest::{IsolationPolicy, Manifest, ManifestEntry};
pub use relocation::{RelocationPlanner, RelocationRule};
pub use repository::{ArtifactSource, RepositoryRegistry};
pub use summary::{LoadOutcome, LoadResult, LoadSummary};
