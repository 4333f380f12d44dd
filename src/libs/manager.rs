use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use crate::libs::descriptor::{DependencyDescriptor, DependencySpecBuilder};
use crate::libs::engine::{EngineError, FetchEngine, LoadRequest};
use crate::libs::environment::{EnvironmentFacts, EnvironmentProbe, HostProbe};
use crate::libs::error::ManifestError;
use crate::libs::manifest::Manifest;
use crate::libs::relocation::RelocationPlanner;
use crate::libs::repository::RepositoryRegistry;
use crate::libs::runtime::{LibraryRuntime, LoadState};
use crate::libs::summary::{LoadOutcome, LoadResult, LoadSummary};
use crate::model::config::AppConfig;

/// Drives one pass over the descriptors, strictly in order.
///
/// A failing descriptor is recorded and the pass moves on; nothing a single
/// library does can stop a later one from being attempted.
pub struct LoadOrchestrator<'a, E: FetchEngine + ?Sized> {
    engine: &'a mut E,
    registry: &'a RepositoryRegistry,
    cache_dir: &'a Path,
    diagnostic_prefix: &'a str,
}

impl<'a, E: FetchEngine + ?Sized> LoadOrchestrator<'a, E> {
    pub fn new(
        engine: &'a mut E,
        registry: &'a RepositoryRegistry,
        cache_dir: &'a Path,
        diagnostic_prefix: &'a str,
    ) -> Self {
        Self {
            engine,
            registry,
            cache_dir,
            diagnostic_prefix,
        }
    }

    pub fn load_all(&mut self, descriptors: &[DependencyDescriptor]) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for descriptor in descriptors {
            summary.record(self.load_one(descriptor));
        }
        summary
    }

    fn load_one(&mut self, descriptor: &DependencyDescriptor) -> LoadResult {
        let mut runtime = LibraryRuntime::declare(descriptor);
        runtime.begin();

        let request = LoadRequest {
            descriptor,
            source: self.registry.source_for(descriptor),
            relocations: descriptor.relocations(),
            isolated: descriptor.isolated(),
            cache_dir: self.cache_dir,
        };

        let engine = &mut *self.engine;
        let result = panic::catch_unwind(AssertUnwindSafe(|| engine.load(&request)))
            .unwrap_or_else(|payload| Err(EngineError::Panicked(panic_message(payload.as_ref()))));
        runtime.finish(result);

        let outcome = match runtime.state() {
            LoadState::Loaded => LoadOutcome::Success,
            LoadState::Failed(err) => {
                let reason = format!(
                    "{} Failed to load library: {} ({err})",
                    self.diagnostic_prefix,
                    descriptor.artifact_id()
                );
                tracing::error!("{reason}");
                LoadOutcome::Failure { reason }
            }
            state => LoadOutcome::Failure {
                reason: format!(
                    "{} Failed to load library: {} (stopped while {})",
                    self.diagnostic_prefix,
                    descriptor.artifact_id(),
                    state.label()
                ),
            },
        };

        LoadResult {
            descriptor: descriptor.clone(),
            outcome,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Everything one startup needs. Built fresh each time; holds no state
/// between passes.
#[derive(Debug, Clone)]
pub struct LibraryManager {
    probe: EnvironmentProbe,
    builder: DependencySpecBuilder,
    registry: RepositoryRegistry,
    cache_dir: PathBuf,
    diagnostic_prefix: String,
}

impl LibraryManager {
    pub fn new(config: &AppConfig, manifest: Manifest) -> Result<Self, ManifestError> {
        let planner = RelocationPlanner::new(&config.namespace.reserved, &config.namespace.host)?;

        let mut registry = RepositoryRegistry::new();
        if config.repositories.maven_central {
            registry.add_maven_central();
        }
        for url in &config.repositories.urls {
            registry.add(url);
        }

        Ok(Self {
            probe: EnvironmentProbe::new(
                config.probe.symbols.clone(),
                config.probe.legacy_versions.clone(),
            ),
            builder: DependencySpecBuilder::new(manifest, planner),
            registry,
            cache_dir: PathBuf::from(&config.general.cache_dir),
            diagnostic_prefix: config.general.diagnostic_prefix.clone(),
        })
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn diagnostic_prefix(&self) -> &str {
        &self.diagnostic_prefix
    }

    pub fn detect(&self, host: &dyn HostProbe) -> EnvironmentFacts {
        self.probe.detect(host)
    }

    pub fn plan(&self, facts: &EnvironmentFacts) -> Result<Vec<DependencyDescriptor>, ManifestError> {
        self.builder.build(facts)
    }

    /// Probe once, build, then attempt every descriptor.
    ///
    /// Only a manifest defect is an error, and it is raised before anything
    /// is loaded. Whether failures matter is the caller's call.
    pub fn run<E: FetchEngine + ?Sized>(
        &self,
        host: &dyn HostProbe,
        engine: &mut E,
    ) -> Result<LoadSummary, ManifestError> {
        tracing::info!("{} Loading libraries...", self.diagnostic_prefix);

        let facts = self.detect(host);
        let descriptors = self.plan(&facts)?;

        let summary = LoadOrchestrator::new(
            engine,
            &self.registry,
            &self.cache_dir,
            &self.diagnostic_prefix,
        )
        .load_all(&descriptors);

        tracing::info!(
            "{} {} (environment: {facts})",
            self.diagnostic_prefix,
            summary.summary_notification()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::libs::descriptor::tests::descriptor;
    use crate::libs::environment::StaticHost;
    use crate::libs::relocation::RelocationRule;
    use crate::libs::repository::{ArtifactSource, MAVEN_CENTRAL};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Call {
        pub artifact: String,
        pub source: ArtifactSource,
        pub relocations: Vec<RelocationRule>,
        pub isolated: bool,
        pub cache_dir: PathBuf,
    }

    /// Records every call; fails or panics for the listed artifacts.
    #[derive(Debug, Default)]
    struct RecordingEngine {
        pub calls: Vec<Call>,
        pub fail: BTreeSet<String>,
        pub panic: BTreeSet<String>,
    }

    impl RecordingEngine {
        pub fn failing(artifacts: &[&str]) -> Self {
            Self {
                fail: artifacts.iter().map(|a| a.to_string()).collect(),
                ..Self::default()
            }
        }
    }

    impl FetchEngine for RecordingEngine {
        fn load(&mut self, request: &LoadRequest<'_>) -> Result<(), EngineError> {
            let artifact = request.descriptor.artifact_id().to_string();
            self.calls.push(Call {
                artifact: artifact.clone(),
                source: request.source.clone(),
                relocations: request.relocations.to_vec(),
                isolated: request.isolated,
                cache_dir: request.cache_dir.to_path_buf(),
            });
            if self.panic.contains(&artifact) {
                panic!("engine blew up on {artifact}");
            }
            if self.fail.contains(&artifact) {
                return Err(EngineError::Download("connection reset".to_string()));
            }
            Ok(())
        }
    }

    fn orchestrate(engine: &mut RecordingEngine, descriptors: &[DependencyDescriptor]) -> LoadSummary {
        let registry = RepositoryRegistry::from_urls([MAVEN_CENTRAL]);
        LoadOrchestrator::new(engine, &registry, Path::new("libs"), "[Nexo]").load_all(descriptors)
    }

    #[test]
    fn partial_failure_is_independent() {
        let descriptors = [descriptor("a"), descriptor("b"), descriptor("c")];
        let mut engine = RecordingEngine::failing(&["b"]);
        let summary = orchestrate(&mut engine, &descriptors);

        assert_eq!(summary.attempted(), 3);
        let succeeded: Vec<&str> = summary.succeeded().into_iter().map(|d| d.artifact_id()).collect();
        assert_eq!(succeeded, ["a", "c"]);
        let failed: Vec<&str> = summary
            .failed()
            .into_iter()
            .map(|r| r.descriptor.artifact_id())
            .collect();
        assert_eq!(failed, ["b"]);
        assert!(summary.had_failures());

        let order: Vec<&str> = engine.calls.iter().map(|c| c.artifact.as_str()).collect();
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn failure_reason_names_the_artifact() {
        let mut engine = RecordingEngine::failing(&["b"]);
        let summary = orchestrate(&mut engine, &[descriptor("b")]);
        assert_eq!(
            summary.error_notifications(),
            ["[Nexo] Failed to load library: b (download failed: connection reset)"]
        );
    }

    #[test]
    fn every_failure_still_completes_the_pass() {
        let descriptors = [descriptor("a"), descriptor("b"), descriptor("c")];
        let mut engine = RecordingEngine::failing(&["a", "b", "c"]);
        let summary = orchestrate(&mut engine, &descriptors);
        assert_eq!(summary.attempted(), 3);
        assert!(summary.succeeded().is_empty());
        assert_eq!(summary.failed().len(), 3);
    }

    #[test]
    fn panicking_engine_is_recorded_as_failure() {
        let descriptors = [descriptor("a"), descriptor("b"), descriptor("c")];
        let mut engine = RecordingEngine {
            panic: ["b".to_string()].into(),
            ..RecordingEngine::default()
        };
        let summary = orchestrate(&mut engine, &descriptors);
        assert_eq!(summary.succeeded().len(), 2);
        assert!(summary.error_notifications()[0].contains("engine blew up on b"));
    }

    #[test]
    fn explicit_url_bypasses_repositories() {
        let direct = DependencyDescriptor {
            source_url: Some("https://cdn.example.com/a.jar".to_string()),
            repository: Some("https://repo.example.com/maven/".to_string()),
            ..descriptor("a")
        };
        let mut engine = RecordingEngine::default();
        orchestrate(&mut engine, &[direct]);
        assert_eq!(
            engine.calls[0].source,
            ArtifactSource::Direct("https://cdn.example.com/a.jar".to_string())
        );
    }

    #[test]
    fn request_carries_isolation_and_cache_dir() {
        let isolated = DependencyDescriptor {
            isolated: true,
            ..descriptor("a")
        };
        let mut engine = RecordingEngine::default();
        orchestrate(&mut engine, &[isolated, descriptor("b")]);
        assert!(engine.calls[0].isolated);
        assert!(!engine.calls[1].isolated);
        assert_eq!(engine.calls[0].cache_dir, PathBuf::from("libs"));
        assert_eq!(
            engine.calls[1].source,
            ArtifactSource::Repositories(vec![MAVEN_CENTRAL.to_string()])
        );
    }

    fn host(vendor: &str, version: &str) -> StaticHost {
        StaticHost {
            vendor: Some(vendor.to_string()),
            version: Some(version.to_string()),
            symbols: BTreeSet::new(),
        }
    }

    #[test]
    fn manager_runs_builtin_manifest() {
        let config = AppConfig::layered(None).unwrap();
        let manager = LibraryManager::new(&config, Manifest::builtin().unwrap()).unwrap();
        assert_eq!(manager.registry().base_repositories().len(), 5);

        let mut engine = RecordingEngine::failing(&["s3"]);
        let summary = manager.run(&host("Paper", "1.21.4"), &mut engine).unwrap();

        assert_eq!(summary.attempted(), 6);
        assert_eq!(summary.failed().len(), 1);
        assert!(
            engine
                .calls
                .iter()
                .any(|call| call.artifact == "commandapi-bukkit-shade-mojang-mapped")
        );
        let stdlib = engine
            .calls
            .iter()
            .find(|call| call.artifact == "kotlin-stdlib")
            .unwrap();
        assert_eq!(stdlib.relocations.len(), 1);
        assert_eq!(stdlib.relocations[0].to_prefix(), "com.nexomc.libs.kotlin.");
    }

    #[test]
    fn manifest_defect_aborts_before_loading() {
        let config = AppConfig::layered(None).unwrap();
        let manifest = Manifest::parse(
            r#"
            version = 1

            [[library]]
            group = "org.jetbrains.kotlin"
            artifact = "kotlin-stdlib"
            version = "2.2.0"
            relocate = [{ from = "kotlin.", to = "com.nexomc.nexo.kotlin." }]
            "#,
        )
        .unwrap();
        let manager = LibraryManager::new(&config, manifest).unwrap();

        let mut engine = RecordingEngine::default();
        let err = manager.run(&host("Paper", "1.21"), &mut engine).unwrap_err();
        assert!(matches!(err, ManifestError::HostNamespaceAlias { .. }));
        assert!(engine.calls.is_empty());
    }
}
